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

//! A registry of initialised plugins, keyed by id.

use crate::dso::{Module, OpenFlags};
use crate::plugin::{Plugin, PluginError};
use ember_core::{object_create, ConstructObject, ObjectBox, ObjectClass};
use std::path::Path;

/// Owns every loaded plugin, in load order.
///
/// Plugins enter the registry initialised. Dropping the registry unloads them
/// in reverse load order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discovers and initialises plugin `id` from a module linked into the executable.
    pub fn load_linked(&mut self, module: &str, id: &str) -> Result<&Plugin, PluginError> {
        self.ensure_vacant(id)?;
        let plugin = Plugin::load(Module::linked(module)?, id)?;
        self.insert(plugin)
    }

    /// Discovers and initialises plugin `id` from a shared library.
    ///
    /// # Safety
    ///
    /// The library is unmapped when the plugin is unloaded. Anything obtained
    /// from it, including the classes returned by [`find_class`](Self::find_class)
    /// and objects built from them, must be dropped before the plugin is
    /// unloaded or the registry is dropped. See [`Module::open`].
    pub unsafe fn load_path(
        &mut self,
        path: impl AsRef<Path>,
        flags: OpenFlags,
        id: &str,
    ) -> Result<&Plugin, PluginError> {
        self.ensure_vacant(id)?;
        let plugin = Plugin::load(unsafe { Module::open(path, flags)? }, id)?;
        self.insert(plugin)
    }

    /// Initialises `plugin` if needed and takes ownership of it.
    ///
    /// A plugin that fails to initialise is unloaded.
    pub fn insert(&mut self, plugin: Plugin) -> Result<&Plugin, PluginError> {
        self.ensure_vacant(plugin.id())?;
        plugin.init()?;

        log::info!("Registered plugin '{}'", plugin.id());
        self.plugins.push(plugin);
        Ok(&self.plugins[self.plugins.len() - 1])
    }

    /// Looks up a plugin by id.
    pub fn get(&self, id: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|plugin| plugin.id() == id)
    }

    /// Unloads plugin `id`. Returns `false` if it was not registered.
    pub fn unload(&mut self, id: &str) -> bool {
        let Some(index) = self.plugins.iter().position(|plugin| plugin.id() == id) else {
            log::warn!("Cannot unload plugin '{id}': not loaded");
            return false;
        };
        self.plugins.remove(index).unload();
        true
    }

    /// Finds an object class by type name across every plugin, in load order.
    pub fn find_class(&self, type_name: &str) -> Option<&'static dyn ObjectClass> {
        self.plugins
            .iter()
            .find_map(|plugin| plugin.object_class(type_name))
    }

    /// Creates an object from the class registered under `type_name`, which must
    /// be a `C`. Memory comes from the calling thread's active allocator.
    pub fn create_object<C: ConstructObject>(
        &self,
        type_name: &str,
        config: C::Config,
    ) -> Result<ObjectBox<C::Object>, PluginError> {
        let class = self
            .find_class(type_name)
            .ok_or_else(|| PluginError::ClassNotFound {
                type_name: type_name.to_string(),
            })?;

        let class = class
            .as_any()
            .downcast_ref::<C>()
            .ok_or_else(|| PluginError::ClassMismatch {
                type_name: type_name.to_string(),
                expected: std::any::type_name::<C>(),
            })?;

        object_create(class, config).ok_or_else(|| PluginError::ConstructFailed {
            type_name: type_name.to_string(),
        })
    }

    /// Ids of every registered plugin, in load order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(Plugin::id)
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugin is registered.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    fn ensure_vacant(&self, id: &str) -> Result<(), PluginError> {
        if self.get(id).is_some() {
            log::warn!("Plugin '{id}' is already loaded");
            return Err(PluginError::AlreadyLoaded { id: id.to_string() });
        }
        Ok(())
    }
}

impl Drop for PluginRegistry {
    fn drop(&mut self) {
        while let Some(plugin) = self.plugins.pop() {
            plugin.unload();
        }
    }
}
