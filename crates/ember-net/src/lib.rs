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

//! # Ember Net
//!
//! A network context built on the plugin contract. A `net` plugin exports
//! socket classes; [`NetContext`] loads the plugin, opens sockets through
//! those classes and owns the resulting objects.
//!
//! The [`loopback`] plugin is linked into every executable that uses this
//! crate and can be loaded with
//! `NetContext::with_linked_plugin(loopback::module_name(), loopback::PLUGIN_ID)`.

#![warn(missing_docs)]

pub mod context;
pub mod loopback;
pub mod socket;

pub use context::{NetContext, SocketId};
pub use socket::{SocketClass, SocketConfig, SocketExport};

use ember_plugins::PluginError;

/// Errors reported by the network context and socket classes.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The net plugin could not be loaded or initialized.
    #[error(transparent)]
    Plugin(#[from] PluginError),
    /// No exported socket class speaks the protocol.
    #[error("no socket class for protocol '{protocol}'")]
    UnknownProtocol {
        /// The requested protocol.
        protocol: String,
    },
    /// The socket class refused to open the socket.
    #[error("failed to open {protocol} socket at '{address}'")]
    OpenFailed {
        /// The requested protocol.
        protocol: String,
        /// The requested address.
        address: String,
    },
    /// The id does not name an open socket.
    #[error("socket {0:?} is not open")]
    UnknownSocket(SocketId),
    /// The socket object was not built by the class handling it.
    #[error("expected a {expected} object")]
    WrongSocket {
        /// Type name of the expected socket.
        expected: &'static str,
    },
    /// The socket's queue is full.
    #[error("socket queue is full")]
    WouldBlock,
    /// The socket's peer is gone.
    #[error("socket is disconnected")]
    Disconnected,
}
