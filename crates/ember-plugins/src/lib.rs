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

//! # Ember Plugins
//!
//! Loads modules and discovers the plugins and object classes they export.
//!
//! * [`dso`]: opening shared libraries and linked modules
//! * [`exports`]: the export table format and its declaration macros
//! * [`plugin`]: plugin discovery and the init/fini lifecycle
//! * [`registry`]: id-keyed ownership of loaded plugins

#![warn(missing_docs)]

pub mod dso;
pub mod exports;
pub mod plugin;
pub mod registry;

pub use dso::{Binding, DsoError, Module, OpenFlags, Visibility};
pub use exports::{linked_modules, Accessor, ExportEntry, ExportTable};
pub use plugin::{Plugin, PluginDescriptor, PluginError};
pub use registry::PluginRegistry;

#[doc(hidden)]
pub use inventory;
