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

//! The network context: one net plugin and the sockets opened through it.

use crate::socket::{SocketClass, SocketConfig, SocketExport};
use crate::NetError;
use ember_core::{Object, ObjectBox};
use ember_plugins::{OpenFlags, Plugin, PluginRegistry};
use std::fmt;
use std::path::Path;

/// Identifies a socket within its [`NetContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u64);

struct OpenSocket {
    id: SocketId,
    class: &'static dyn SocketClass,
    object: ObjectBox<dyn Object>,
}

/// Owns a net plugin and every socket created from it.
///
/// Sockets are destroyed before the plugin is unloaded.
pub struct NetContext {
    sockets: Vec<OpenSocket>,
    next_id: u64,
    plugin_id: String,
    registry: PluginRegistry,
}

impl NetContext {
    /// Uses plugin `id` from a module linked into the executable.
    pub fn with_linked_plugin(module: &str, id: &str) -> Result<Self, NetError> {
        let mut registry = PluginRegistry::new();
        registry.load_linked(module, id)?;
        Ok(Self::from_registry(registry, id))
    }

    /// Uses plugin `id` from a shared library.
    ///
    /// # Safety
    ///
    /// Sockets are closed before the library is unmapped, but references reached
    /// through [`plugin`](Self::plugin) point into the library and must not be
    /// used after the context is dropped. See
    /// [`PluginRegistry::load_path`].
    pub unsafe fn with_plugin_path(path: impl AsRef<Path>, id: &str) -> Result<Self, NetError> {
        let mut registry = PluginRegistry::new();
        unsafe { registry.load_path(path, OpenFlags::default(), id)? };
        Ok(Self::from_registry(registry, id))
    }

    fn from_registry(registry: PluginRegistry, id: &str) -> Self {
        let context = Self {
            sockets: Vec::new(),
            next_id: 1,
            plugin_id: id.to_string(),
            registry,
        };
        log::info!(
            "Network context using plugin '{id}' (protocols: {:?})",
            context.protocols()
        );
        context
    }

    /// The net plugin.
    pub fn plugin(&self) -> Option<&Plugin> {
        self.registry.get(&self.plugin_id)
    }

    /// Protocols offered by the plugin's socket classes.
    pub fn protocols(&self) -> Vec<&str> {
        self.socket_classes().map(|class| class.protocol()).collect()
    }

    /// Opens a socket of the given protocol.
    pub fn open(&mut self, protocol: &str, config: SocketConfig) -> Result<SocketId, NetError> {
        let class = self
            .socket_classes()
            .find(|class| class.protocol() == protocol)
            .ok_or_else(|| {
                log::error!("No socket class for protocol '{protocol}'");
                NetError::UnknownProtocol {
                    protocol: protocol.to_string(),
                }
            })?;

        let address = config.address.clone();
        let object = class.open(config).ok_or_else(|| {
            log::error!("Failed to open {protocol} socket at '{address}'");
            NetError::OpenFailed {
                protocol: protocol.to_string(),
                address,
            }
        })?;

        let id = SocketId(self.next_id);
        self.next_id += 1;
        self.sockets.push(OpenSocket { id, class, object });
        log::debug!("Opened {protocol} socket {id:?}");
        Ok(id)
    }

    /// Sends a datagram, returning the bytes accepted.
    pub fn send(&mut self, id: SocketId, payload: &[u8]) -> Result<usize, NetError> {
        let socket = self.socket_mut(id)?;
        socket.class.send(&mut *socket.object, payload)
    }

    /// Takes the next pending datagram, if any.
    pub fn recv(&mut self, id: SocketId) -> Result<Option<Vec<u8>>, NetError> {
        let socket = self.socket_mut(id)?;
        socket.class.recv(&mut *socket.object)
    }

    /// Destroys a socket. Returns `false` if it was not open.
    pub fn close(&mut self, id: SocketId) -> bool {
        let Some(index) = self.sockets.iter().position(|socket| socket.id == id) else {
            return false;
        };
        let socket = self.sockets.swap_remove(index);
        ember_core::object_destroy(socket.object);
        log::debug!("Closed socket {id:?}");
        true
    }

    /// Number of open sockets.
    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    fn socket_classes(&self) -> impl Iterator<Item = &'static dyn SocketClass> + '_ {
        self.plugin()
            .into_iter()
            .flat_map(|plugin| plugin.object_classes().iter().copied())
            .filter_map(SocketExport::from_object_class)
    }

    fn socket_mut(&mut self, id: SocketId) -> Result<&mut OpenSocket, NetError> {
        self.sockets
            .iter_mut()
            .find(|socket| socket.id == id)
            .ok_or(NetError::UnknownSocket(id))
    }
}

impl Drop for NetContext {
    fn drop(&mut self) {
        for socket in self.sockets.drain(..) {
            ember_core::object_destroy(socket.object);
        }
    }
}

impl fmt::Debug for NetContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetContext")
            .field("plugin", &self.plugin_id)
            .field("sockets", &self.sockets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback;

    fn loopback_context() -> NetContext {
        NetContext::with_linked_plugin(loopback::module_name(), loopback::PLUGIN_ID)
            .expect("loopback plugin is linked")
    }

    #[test]
    fn loopback_plugin_offers_its_protocol() {
        let net = loopback_context();
        assert_eq!(net.protocols(), vec![loopback::PLUGIN_ID]);
        assert!(net.plugin().is_some_and(Plugin::is_initialized));
    }

    #[test]
    fn sockets_echo_and_close() {
        let mut net = loopback_context();
        let id = net
            .open(loopback::PLUGIN_ID, SocketConfig::new("local:1"))
            .unwrap();

        assert_eq!(net.send(id, b"ping").unwrap(), 4);
        assert_eq!(net.recv(id).unwrap(), Some(b"ping".to_vec()));
        assert_eq!(net.recv(id).unwrap(), None);

        assert!(net.close(id));
        assert!(!net.close(id));
        assert!(matches!(net.send(id, b"late"), Err(NetError::UnknownSocket(_))));
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        let mut net = loopback_context();
        let err = net.open("udp", SocketConfig::new("0.0.0.0:0")).unwrap_err();
        assert!(matches!(err, NetError::UnknownProtocol { ref protocol } if protocol == "udp"));
        assert_eq!(net.socket_count(), 0);
    }

    #[test]
    fn socket_ids_are_not_reused() {
        let mut net = loopback_context();
        let first = net.open(loopback::PLUGIN_ID, SocketConfig::new("a")).unwrap();
        net.close(first);
        let second = net.open(loopback::PLUGIN_ID, SocketConfig::new("b")).unwrap();
        assert_ne!(first, second);
    }
}
