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

use anyhow::Result;
use ember_net::{loopback, NetContext, NetError, SocketConfig, SocketExport};
use ember_plugins::{Module, Plugin, PluginError};

// --- Test Setup ---
fn open_loopback() -> Result<NetContext> {
    Ok(NetContext::with_linked_plugin(
        loopback::module_name(),
        loopback::PLUGIN_ID,
    )?)
}

#[test]
fn test_loopback_module_is_discoverable() -> Result<()> {
    let module = Module::linked("ember-net-loopback")?;
    assert!(module.symbol("__ember_plugin_loopback").is_some());
    assert!(module.symbol("__ember_object_loopback_socket").is_some());

    let plugin = Plugin::load(module, loopback::PLUGIN_ID)?;
    assert_eq!(plugin.category(), "net");
    let class = plugin
        .object_class(loopback::SOCKET_TYPE)
        .expect("socket class exported");
    assert!(SocketExport::from_object_class(class).is_some());
    plugin.unload();
    Ok(())
}

#[test]
fn test_many_sockets_keep_their_own_queues() -> Result<()> {
    let mut net = open_loopback()?;
    let a = net.open(loopback::PLUGIN_ID, SocketConfig::new("a"))?;
    let b = net.open(loopback::PLUGIN_ID, SocketConfig::new("b").with_capacity(2))?;

    net.send(a, b"to-a")?;
    net.send(b, b"to-b-1")?;
    net.send(b, b"to-b-2")?;
    assert!(matches!(net.send(b, b"overflow"), Err(NetError::WouldBlock)));

    assert_eq!(net.recv(a)?, Some(b"to-a".to_vec()));
    assert_eq!(net.recv(a)?, None);
    assert_eq!(net.recv(b)?, Some(b"to-b-1".to_vec()));
    assert_eq!(net.recv(b)?, Some(b"to-b-2".to_vec()));
    assert_eq!(net.socket_count(), 2);
    Ok(())
}

#[test]
fn test_open_failures_are_reported() -> Result<()> {
    let mut net = open_loopback()?;
    let err = net
        .open(loopback::PLUGIN_ID, SocketConfig::new("zero").with_capacity(0))
        .unwrap_err();
    assert!(matches!(err, NetError::OpenFailed { .. }), "got {err:?}");
    assert_eq!(net.socket_count(), 0);
    Ok(())
}

#[test]
fn test_missing_plugin_id_fails_to_load() {
    let err = NetContext::with_linked_plugin(loopback::module_name(), "quic").unwrap_err();
    assert!(
        matches!(err, NetError::Plugin(PluginError::NotFound { .. })),
        "got {err:?}"
    );
}
