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

//! Plugin discovery and lifecycle.
//!
//! [`Plugin::load`] scans every export of a module. Object classes are collected
//! whichever plugin the caller asked for; the plugin descriptor is the first one
//! whose name equals the requested id. A loaded plugin is inert until
//! [`Plugin::init`] succeeds.

use crate::dso::{DsoError, Module};
use crate::exports::{Accessor, OBJECT_PREFIX, PLUGIN_PREFIX};
use ember_core::{ObjectClass, Version};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Metadata and lifecycle hooks of a plugin.
pub trait PluginDescriptor: Send + Sync + 'static {
    /// Unique plugin id; discovery matches it exactly.
    fn name(&self) -> &str;

    /// Human-readable name.
    fn display_name(&self) -> &str {
        self.name()
    }

    /// Plugin version.
    fn version(&self) -> Version;

    /// Free-form category, such as `"net"` or `"video"`.
    fn category(&self) -> &str;

    /// Called by [`Plugin::init`]. Returning `false` aborts initialisation.
    fn on_load(&self) -> bool {
        true
    }

    /// Called by [`Plugin::fini`].
    fn on_unload(&self) {}
}

/// Errors from plugin discovery, lifecycle and registry operations.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The module could not be opened.
    #[error(transparent)]
    Dso(#[from] DsoError),
    /// No descriptor with the requested id was exported.
    #[error("plugin '{id}' not found in module '{module}'")]
    NotFound {
        /// Requested plugin id.
        id: String,
        /// The scanned module.
        module: String,
    },
    /// The descriptor's `on_load` hook refused to initialise.
    #[error("plugin '{id}' failed to initialise")]
    InitFailed {
        /// Plugin id.
        id: String,
    },
    /// A plugin with this id is already registered.
    #[error("plugin '{id}' is already loaded")]
    AlreadyLoaded {
        /// Plugin id.
        id: String,
    },
    /// No registered plugin exports an object class of this type.
    #[error("no loaded plugin provides object class '{type_name}'")]
    ClassNotFound {
        /// The requested type name.
        type_name: String,
    },
    /// An object class exists but is not of the requested concrete class type.
    #[error("object class '{type_name}' is not a {expected}")]
    ClassMismatch {
        /// The requested type name.
        type_name: String,
        /// The concrete class type the caller asked for.
        expected: &'static str,
    },
    /// The class constructor rejected its configuration or memory ran out.
    #[error("failed to construct an object of class '{type_name}'")]
    ConstructFailed {
        /// The requested type name.
        type_name: String,
    },
}

/// A plugin discovered in an open module.
pub struct Plugin {
    id: String,
    descriptor: &'static dyn PluginDescriptor,
    classes: Vec<&'static dyn ObjectClass>,
    initialized: Mutex<bool>,
    // Declared last so the descriptor and classes above never outlive it.
    module: Option<Module>,
}

impl Plugin {
    /// Discovers the plugin `id` in `module`, taking ownership of the module.
    ///
    /// Ill-formed exports are logged and skipped. Fails with
    /// [`PluginError::NotFound`] when no export describes a plugin named `id`;
    /// the module is closed in that case.
    pub fn load(module: Module, id: &str) -> Result<Self, PluginError> {
        let mut descriptor: Option<&'static dyn PluginDescriptor> = None;
        let mut classes = Vec::new();

        let visited = module.iterate_symbols(|entry| {
            if entry.symbol.starts_with(OBJECT_PREFIX) {
                match entry.accessor {
                    Accessor::Object(get) => match get() {
                        Some(class) => classes.push(class),
                        None => log::warn!(
                            "Skipping ill-formed object class '{}' in module '{}'",
                            entry.symbol,
                            module.name()
                        ),
                    },
                    Accessor::Plugin(_) => log::warn!(
                        "Skipping '{}' in module '{}': object symbol with a plugin accessor",
                        entry.symbol,
                        module.name()
                    ),
                }
            } else if entry.symbol.starts_with(PLUGIN_PREFIX) {
                if descriptor.is_some() {
                    return;
                }
                match entry.accessor {
                    Accessor::Plugin(get) => match get() {
                        Some(candidate) if candidate.name() == id => descriptor = Some(candidate),
                        Some(_) => {}
                        None => log::warn!(
                            "Skipping ill-formed plugin descriptor '{}' in module '{}'",
                            entry.symbol,
                            module.name()
                        ),
                    },
                    Accessor::Object(_) => log::warn!(
                        "Skipping '{}' in module '{}': plugin symbol with an object accessor",
                        entry.symbol,
                        module.name()
                    ),
                }
            }
        });

        let Some(descriptor) = descriptor else {
            log::error!(
                "Plugin '{id}' not found in module '{}' ({visited} exports scanned)",
                module.name()
            );
            return Err(PluginError::NotFound {
                id: id.to_string(),
                module: module.name().to_string(),
            });
        };

        log::info!(
            "Discovered plugin '{}' v{} ({}) with {} object classes in module '{}'",
            descriptor.name(),
            descriptor.version(),
            descriptor.category(),
            classes.len(),
            module.name()
        );

        Ok(Self {
            id: id.to_string(),
            descriptor,
            classes,
            initialized: Mutex::new(false),
            module: Some(module),
        })
    }

    /// Runs the descriptor's `on_load` hook once. Further calls succeed
    /// without running it again.
    pub fn init(&self) -> Result<(), PluginError> {
        let mut initialized = self.latch();
        if *initialized {
            return Ok(());
        }

        if !self.descriptor.on_load() {
            log::error!("Plugin '{}' failed to initialise", self.id);
            return Err(PluginError::InitFailed {
                id: self.id.clone(),
            });
        }

        *initialized = true;
        log::info!("Plugin '{}' initialised", self.id);
        Ok(())
    }

    /// Runs the descriptor's `on_unload` hook if the plugin is initialised.
    pub fn fini(&self) {
        let mut initialized = self.latch();
        if !*initialized {
            return;
        }

        self.descriptor.on_unload();
        *initialized = false;
        log::info!("Plugin '{}' finalised", self.id);
    }

    /// Finalises the plugin if needed and closes its module.
    pub fn unload(mut self) {
        self.fini();
        if let Some(module) = self.module.take() {
            module.close();
        }
    }

    /// The id the plugin was loaded under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The discovered descriptor.
    pub fn descriptor(&self) -> &dyn PluginDescriptor {
        self.descriptor
    }

    /// Plugin name as reported by its descriptor.
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Plugin version.
    pub fn version(&self) -> Version {
        self.descriptor.version()
    }

    /// Plugin category.
    pub fn category(&self) -> &str {
        self.descriptor.category()
    }

    /// Name of the module the plugin was discovered in.
    pub fn module_name(&self) -> &str {
        self.module.as_ref().map_or("", Module::name)
    }

    /// Whether `init` has succeeded and `fini` has not run since.
    pub fn is_initialized(&self) -> bool {
        *self.latch()
    }

    /// Every object class exported by the plugin's module.
    pub fn object_classes(&self) -> &[&'static dyn ObjectClass] {
        &self.classes
    }

    /// Finds an object class by its type name.
    pub fn object_class(&self, type_name: &str) -> Option<&'static dyn ObjectClass> {
        self.classes
            .iter()
            .copied()
            .find(|class| class.info().type_name() == type_name)
    }

    fn latch(&self) -> MutexGuard<'_, bool> {
        self.initialized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Plugin {
    fn drop(&mut self) {
        self.fini();
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.id)
            .field("version", &self.version())
            .field("category", &self.category())
            .field("classes", &self.classes.len())
            .field("initialized", &self.is_initialized())
            .field("module", &self.module)
            .finish()
    }
}
