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

//! Dynamic library loader.
//!
//! A [`Module`] is either a shared library opened from disk or an export table
//! linked into the executable. Both expose the same named-export view.

use crate::exports::{EntryFn, ExportEntry, ExportTable, LinkedModule, ENTRY_SYMBOL};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// When symbols of a shared library are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binding {
    /// Resolve every symbol while opening.
    #[default]
    Now,
    /// Resolve symbols on first use.
    Lazy,
}

/// Whether a shared library's symbols are visible to libraries opened later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Symbols stay private to the library.
    #[default]
    Local,
    /// Symbols are made available to subsequently opened libraries.
    Global,
}

/// Flags for [`Module::open`]. Ignored on platforms without `dlopen` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags {
    /// Binding mode.
    pub binding: Binding,
    /// Symbol visibility.
    pub visibility: Visibility,
}

/// Errors raised while opening a module.
#[derive(Debug, Error)]
pub enum DsoError {
    /// The platform loader refused the library.
    #[error("failed to open module '{}': {message}", path.display())]
    Open {
        /// The library path.
        path: PathBuf,
        /// The platform loader's diagnostic.
        message: String,
    },
    /// The library does not export an [`ExportTable`] entry point.
    #[error("module '{}' has no 'ember_module_exports' entry point: {message}", path.display())]
    MissingEntry {
        /// The library path.
        path: PathBuf,
        /// The platform loader's diagnostic.
        message: String,
    },
    /// No module of that name was linked into the executable.
    #[error("no module named '{name}' is linked into this executable")]
    NotLinked {
        /// The requested module name.
        name: String,
    },
}

/// An open module.
///
/// Everything obtained through a module's exports, including `'static`
/// references handed out by accessors, is only valid while the module is open.
pub struct Module {
    name: String,
    path: Option<PathBuf>,
    table: &'static ExportTable,
    // Keeps the code behind `table` mapped; dropped last.
    library: Option<libloading::Library>,
}

impl Module {
    /// Opens a shared library and resolves its export table.
    ///
    /// # Safety
    ///
    /// Opening a library runs its initialisers, and its export table must come
    /// from [`dynamic_module!`](crate::dynamic_module) built by the same
    /// toolchain. Every reference reached through the module's exports, such as
    /// plugin descriptors and object classes, points into the library: the
    /// caller must not use any of them after the module is closed.
    pub unsafe fn open(path: impl AsRef<Path>, flags: OpenFlags) -> Result<Self, DsoError> {
        let path = path.as_ref();

        let library = open_library(path, flags).map_err(|e| {
            log::error!("Failed to open module {path:?}: {e}");
            DsoError::Open {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        // SAFETY: the entry point is produced by `dynamic_module!`, which gives it
        // the `EntryFn` signature. Both sides are built by the same toolchain.
        let table = unsafe {
            let entry = library
                .get::<EntryFn>(ENTRY_SYMBOL.as_bytes())
                .map_err(|e| {
                    log::error!("Module {path:?} does not export '{ENTRY_SYMBOL}': {e}");
                    DsoError::MissingEntry {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    }
                })?;
            entry()
        };

        log::info!(
            "Opened module '{}' from {path:?} ({} exports)",
            table.module,
            table.entries.len()
        );

        Ok(Self {
            name: table.module.to_string(),
            path: Some(path.to_path_buf()),
            table,
            library: Some(library),
        })
    }

    /// Opens a module registered with [`link_module!`](crate::link_module).
    pub fn linked(name: &str) -> Result<Self, DsoError> {
        let linked = inventory::iter::<LinkedModule>
            .into_iter()
            .find(|linked| linked.table().module == name)
            .ok_or_else(|| {
                log::error!("No linked module named '{name}'");
                DsoError::NotLinked {
                    name: name.to_string(),
                }
            })?;

        log::debug!("Opened linked module '{name}'");
        Ok(Self::from_table(linked.table()))
    }

    /// Wraps a table that lives for the whole program.
    pub fn from_table(table: &'static ExportTable) -> Self {
        Self {
            name: table.module.to_string(),
            path: None,
            table,
            library: None,
        }
    }

    /// The module name declared by its export table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file the module was opened from, if it is a shared library.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Looks up an export by exact name. Absence is not an error.
    pub fn symbol(&self, name: &str) -> Option<&ExportEntry> {
        self.table.entries.iter().find(|entry| entry.symbol == name)
    }

    /// Calls `callback` for every export in table order and returns how many
    /// were visited.
    pub fn iterate_symbols<F>(&self, mut callback: F) -> usize
    where
        F: FnMut(&ExportEntry),
    {
        self.table.entries.iter().fold(0, |count, entry| {
            callback(entry);
            count + 1
        })
    }

    /// Closes the module. Equivalent to dropping it.
    pub fn close(self) {
        log::debug!("Closing module '{}'", self.name);
        drop(self);
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("linked", &self.library.is_none())
            .field("exports", &self.table.entries.len())
            .finish()
    }
}

#[cfg(unix)]
fn open_library(path: &Path, flags: OpenFlags) -> Result<libloading::Library, libloading::Error> {
    use libloading::os::unix::{Library, RTLD_GLOBAL, RTLD_LAZY, RTLD_LOCAL, RTLD_NOW};

    let binding = match flags.binding {
        Binding::Now => RTLD_NOW,
        Binding::Lazy => RTLD_LAZY,
    };
    let visibility = match flags.visibility {
        Visibility::Local => RTLD_LOCAL,
        Visibility::Global => RTLD_GLOBAL,
    };

    // SAFETY: loading a library runs its initialisers; modules are trusted code.
    unsafe { Library::open(Some(path), binding | visibility).map(Into::into) }
}

#[cfg(not(unix))]
fn open_library(path: &Path, _flags: OpenFlags) -> Result<libloading::Library, libloading::Error> {
    // SAFETY: loading a library runs its initialisers; modules are trusted code.
    unsafe { libloading::Library::new(path) }
}
