// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The loopback net plugin, linked into every executable using this crate.
//!
//! Each loopback socket delivers what it sends back to itself.

use crate::socket::{SocketClass, SocketConfig, SocketExport};
use crate::NetError;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use ember_core::{object_create, ConstructObject, Object, ObjectBox, ObjectClass, TypeInfo, Version};
use ember_plugins::{ExportTable, PluginDescriptor};
use std::any::Any;

/// Plugin id of the loopback plugin.
pub const PLUGIN_ID: &str = "loopback";

/// Type name of the loopback socket class.
pub const SOCKET_TYPE: &str = "loopback_socket";

/// A socket whose datagrams come back to itself.
pub struct LoopbackSocket {
    address: String,
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl LoopbackSocket {
    /// The address the socket was opened with.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Datagrams waiting to be received.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Object for LoopbackSocket {
    fn class(&self) -> &'static dyn ObjectClass {
        &LOOPBACK_SOCKET_CLASS
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The loopback socket class.
pub struct LoopbackSocketClass {
    info: TypeInfo,
}

/// The one instance of [`LoopbackSocketClass`].
pub static LOOPBACK_SOCKET_CLASS: LoopbackSocketClass = LoopbackSocketClass {
    info: TypeInfo::of::<LoopbackSocket>(SOCKET_TYPE),
};

impl ObjectClass for LoopbackSocketClass {
    fn info(&self) -> &TypeInfo {
        &self.info
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ConstructObject for LoopbackSocketClass {
    type Config = SocketConfig;
    type Object = LoopbackSocket;

    fn construct(&'static self, config: SocketConfig) -> Option<LoopbackSocket> {
        if config.address.is_empty() {
            log::warn!("Loopback sockets need a non-empty address");
            return None;
        }
        let (tx, rx) = match config.capacity {
            Some(0) => {
                log::warn!("Loopback socket '{}' needs a non-zero capacity", config.address);
                return None;
            }
            Some(capacity) => crossbeam_channel::bounded(capacity),
            None => crossbeam_channel::unbounded(),
        };
        Some(LoopbackSocket {
            address: config.address,
            tx,
            rx,
        })
    }
}

fn loopback(socket: &mut dyn Object) -> Result<&mut LoopbackSocket, NetError> {
    socket
        .as_any_mut()
        .downcast_mut::<LoopbackSocket>()
        .ok_or(NetError::WrongSocket { expected: SOCKET_TYPE })
}

impl SocketClass for LoopbackSocketClass {
    fn protocol(&self) -> &str {
        PLUGIN_ID
    }

    fn open(&'static self, config: SocketConfig) -> Option<ObjectBox<dyn Object>> {
        object_create(self, config).map(ObjectBox::into_object)
    }

    fn send(&self, socket: &mut dyn Object, payload: &[u8]) -> Result<usize, NetError> {
        let socket = loopback(socket)?;
        match socket.tx.try_send(payload.to_vec()) {
            Ok(()) => Ok(payload.len()),
            Err(TrySendError::Full(_)) => Err(NetError::WouldBlock),
            Err(TrySendError::Disconnected(_)) => Err(NetError::Disconnected),
        }
    }

    fn recv(&self, socket: &mut dyn Object) -> Result<Option<Vec<u8>>, NetError> {
        Ok(loopback(socket)?.rx.try_recv().ok())
    }
}

struct LoopbackPlugin;

impl PluginDescriptor for LoopbackPlugin {
    fn name(&self) -> &str {
        PLUGIN_ID
    }
    fn display_name(&self) -> &str {
        "Loopback Network"
    }
    fn version(&self) -> Version {
        Version::new(0, 1, 0)
    }
    fn category(&self) -> &str {
        "net"
    }
    fn on_load(&self) -> bool {
        log::debug!("Loopback network plugin ready");
        true
    }
}

static LOOPBACK_SOCKET_EXPORT: SocketExport = SocketExport::new(&LOOPBACK_SOCKET_CLASS);

fn plugin() -> Option<&'static dyn PluginDescriptor> {
    Some(&LoopbackPlugin)
}

fn socket_class() -> Option<&'static dyn ObjectClass> {
    Some(&LOOPBACK_SOCKET_EXPORT)
}

ember_plugins::module_exports! {
    static LOOPBACK_EXPORTS = "ember-net-loopback" {
        plugin "loopback" => plugin,
        object "loopback_socket" => socket_class,
    }
}
ember_plugins::link_module!(LOOPBACK_EXPORTS);

/// The loopback module's export table.
pub fn exports() -> &'static ExportTable {
    &LOOPBACK_EXPORTS
}

/// Name under which the loopback module is linked.
pub fn module_name() -> &'static str {
    LOOPBACK_EXPORTS.module
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_plugins::{Module, Plugin};

    #[test]
    fn exported_class_reports_the_socket_layout() {
        let plugin = Plugin::load(Module::from_table(exports()), PLUGIN_ID).unwrap();
        assert_eq!(plugin.category(), "net");

        let class = plugin.object_class(SOCKET_TYPE).expect("socket class exported");
        assert_eq!(class.info(), LOOPBACK_SOCKET_CLASS.info());
        let socket_class = SocketExport::from_object_class(class).expect("socket view");
        assert_eq!(socket_class.protocol(), PLUGIN_ID);
    }

    #[test]
    fn bounded_socket_reports_back_pressure() {
        let mut socket = LOOPBACK_SOCKET_CLASS
            .open(SocketConfig::new("bounded").with_capacity(1))
            .expect("open");

        assert_eq!(LOOPBACK_SOCKET_CLASS.send(&mut *socket, b"one").unwrap(), 3);
        assert!(matches!(
            LOOPBACK_SOCKET_CLASS.send(&mut *socket, b"two"),
            Err(NetError::WouldBlock)
        ));
        assert_eq!(
            socket.downcast_ref::<LoopbackSocket>().map(LoopbackSocket::pending),
            Some(1)
        );
        assert_eq!(
            LOOPBACK_SOCKET_CLASS.recv(&mut *socket).unwrap().as_deref(),
            Some(&b"one"[..])
        );
        assert_eq!(LOOPBACK_SOCKET_CLASS.recv(&mut *socket).unwrap(), None);
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        assert!(LOOPBACK_SOCKET_CLASS.open(SocketConfig::new("")).is_none());
        assert!(LOOPBACK_SOCKET_CLASS
            .open(SocketConfig::new("zero").with_capacity(0))
            .is_none());
    }
}
