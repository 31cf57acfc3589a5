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

//! The socket class family.
//!
//! A socket class is an [`ObjectClass`] that also knows how to open, feed and
//! drain the socket objects it builds. Plugins export socket classes wrapped in
//! a [`SocketExport`], which is what lets a host recover the [`SocketClass`]
//! view from the plain object class discovery hands out.

use crate::NetError;
use ember_core::{AsObjectClass, Object, ObjectBox, ObjectClass, TypeInfo};
use std::any::Any;

/// Parameters for opening a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConfig {
    /// Protocol-specific address.
    pub address: String,
    /// Maximum queued datagrams, or `None` for no bound.
    pub capacity: Option<usize>,
}

impl SocketConfig {
    /// An unbounded socket at `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            capacity: None,
        }
    }

    /// Bounds the socket's queue.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

/// Behaviour shared by every socket class.
pub trait SocketClass: ObjectClass {
    /// The protocol name used to select this class.
    fn protocol(&self) -> &str;

    /// Opens a socket object.
    fn open(&'static self, config: SocketConfig) -> Option<ObjectBox<dyn Object>>;

    /// Sends a datagram through `socket`, returning the bytes accepted.
    fn send(&self, socket: &mut dyn Object, payload: &[u8]) -> Result<usize, NetError>;

    /// Takes the next pending datagram from `socket`, if any.
    fn recv(&self, socket: &mut dyn Object) -> Result<Option<Vec<u8>>, NetError>;
}

/// The exported form of a socket class.
///
/// Reports the wrapped class's [`TypeInfo`], so discovery sees it under the
/// class's own type name.
pub struct SocketExport {
    class: &'static dyn SocketClass,
}

impl SocketExport {
    /// Wraps `class` for export.
    pub const fn new(class: &'static dyn SocketClass) -> Self {
        Self { class }
    }

    /// The wrapped socket class.
    pub fn class(&self) -> &'static dyn SocketClass {
        self.class
    }

    /// Recovers the socket view of a discovered object class, if it is one.
    pub fn from_object_class(class: &'static dyn ObjectClass) -> Option<&'static dyn SocketClass> {
        class
            .as_any()
            .downcast_ref::<SocketExport>()
            .map(SocketExport::class)
    }
}

impl ObjectClass for SocketExport {
    fn info(&self) -> &TypeInfo {
        self.class.as_object_class().info()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
