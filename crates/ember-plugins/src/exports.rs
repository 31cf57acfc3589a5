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

//! The export table a module publishes, and the macros that build it.
//!
//! A module lists its exports explicitly as `(symbol, accessor)` pairs. Symbols
//! follow a naming convention that discovery relies on:
//!
//! * `__ember_plugin_<id>` for plugin descriptors,
//! * `__ember_object_<type>` for object classes.
//!
//! ```ignore
//! fn plugin() -> Option<&'static dyn PluginDescriptor> { Some(&MY_PLUGIN) }
//! fn socket() -> Option<&'static dyn ObjectClass> { Some(&MY_SOCKET_CLASS) }
//!
//! ember_plugins::module_exports! {
//!     pub static EXPORTS = "my-module" {
//!         plugin "my_plugin" => plugin,
//!         object "my_socket" => socket,
//!     }
//! }
//!
//! // Linked into the executable:
//! ember_plugins::link_module!(EXPORTS);
//! // Or, in a `cdylib`:
//! ember_plugins::dynamic_module!(EXPORTS);
//! ```

use crate::plugin::PluginDescriptor;
use ember_core::ObjectClass;
use std::fmt;

/// Name of the entry point a dynamic module exports to publish its table.
pub const ENTRY_SYMBOL: &str = "ember_module_exports";

/// Prefix of plugin descriptor symbols.
pub const PLUGIN_PREFIX: &str = "__ember_plugin_";

/// Prefix of object class symbols.
pub const OBJECT_PREFIX: &str = "__ember_object_";

/// Signature of [`ENTRY_SYMBOL`].
pub type EntryFn = fn() -> &'static ExportTable;

/// How an export is resolved. Accessors return `None` when the export is
/// ill-formed, which discovery tolerates.
#[derive(Clone, Copy, Debug)]
pub enum Accessor {
    /// Returns a plugin descriptor.
    Plugin(fn() -> Option<&'static dyn PluginDescriptor>),
    /// Returns an object class.
    Object(fn() -> Option<&'static dyn ObjectClass>),
}

/// A single named export.
#[derive(Clone, Copy, Debug)]
pub struct ExportEntry {
    /// The export's symbol name.
    pub symbol: &'static str,
    /// How to resolve it.
    pub accessor: Accessor,
}

impl ExportEntry {
    /// An entry resolving to a plugin descriptor.
    pub const fn plugin(
        symbol: &'static str,
        accessor: fn() -> Option<&'static dyn PluginDescriptor>,
    ) -> Self {
        Self {
            symbol,
            accessor: Accessor::Plugin(accessor),
        }
    }

    /// An entry resolving to an object class.
    pub const fn object(
        symbol: &'static str,
        accessor: fn() -> Option<&'static dyn ObjectClass>,
    ) -> Self {
        Self {
            symbol,
            accessor: Accessor::Object(accessor),
        }
    }
}

/// Every export of one module, in declaration order.
pub struct ExportTable {
    /// Module name, used to find linked modules.
    pub module: &'static str,
    /// The exports.
    pub entries: &'static [ExportEntry],
}

impl fmt::Debug for ExportTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportTable")
            .field("module", &self.module)
            .field(
                "entries",
                &self.entries.iter().map(|e| e.symbol).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A table registered at link time by [`link_module!`](crate::link_module).
pub struct LinkedModule {
    table: &'static ExportTable,
}

impl LinkedModule {
    #[doc(hidden)]
    pub const fn new(table: &'static ExportTable) -> Self {
        Self { table }
    }

    /// The registered table.
    pub fn table(&self) -> &'static ExportTable {
        self.table
    }
}

inventory::collect!(LinkedModule);

/// Names of every module linked into the executable.
pub fn linked_modules() -> impl Iterator<Item = &'static str> {
    inventory::iter::<LinkedModule>
        .into_iter()
        .map(|linked| linked.table.module)
}

/// Declares a `static` [`ExportTable`].
///
/// Each line is `plugin "<id>" => accessor` or `object "<type>" => accessor`;
/// the symbol prefix is added from the kind.
#[macro_export]
macro_rules! module_exports {
    (
        $vis:vis static $name:ident = $module:literal {
            $( $kind:ident $id:literal => $accessor:expr ),* $(,)?
        }
    ) => {
        $vis static $name: $crate::exports::ExportTable = $crate::exports::ExportTable {
            module: $module,
            entries: &[ $( $crate::module_exports!(@entry $kind $id $accessor) ),* ],
        };
    };
    (@entry plugin $id:literal $accessor:expr) => {
        $crate::exports::ExportEntry::plugin(concat!("__ember_plugin_", $id), $accessor)
    };
    (@entry object $id:literal $accessor:expr) => {
        $crate::exports::ExportEntry::object(concat!("__ember_object_", $id), $accessor)
    };
}

/// Registers an export table with the executable, so that
/// [`Module::linked`](crate::dso::Module::linked) can open it by name.
#[macro_export]
macro_rules! link_module {
    ($table:path) => {
        $crate::inventory::submit! {
            $crate::exports::LinkedModule::new(&$table)
        }
    };
}

/// Exports the entry point of a dynamic module (`crate-type = ["cdylib"]`).
///
/// Host and module must be built with the same toolchain.
#[macro_export]
macro_rules! dynamic_module {
    ($table:path) => {
        #[no_mangle]
        pub fn ember_module_exports() -> &'static $crate::exports::ExportTable {
            &$table
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{TypeInfo, Version};
    use std::any::Any;

    struct Marker;

    static MARKER_CLASS: MarkerClass = MarkerClass {
        info: TypeInfo::of::<Marker>("marker"),
    };

    struct MarkerClass {
        info: TypeInfo,
    }

    impl ObjectClass for MarkerClass {
        fn info(&self) -> &TypeInfo {
            &self.info
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct MarkerPlugin;

    impl PluginDescriptor for MarkerPlugin {
        fn name(&self) -> &str {
            "marker"
        }
        fn version(&self) -> Version {
            Version::new(1, 0, 0)
        }
        fn category(&self) -> &str {
            "test"
        }
    }

    fn plugin() -> Option<&'static dyn PluginDescriptor> {
        Some(&MarkerPlugin)
    }

    fn class() -> Option<&'static dyn ObjectClass> {
        Some(&MARKER_CLASS)
    }

    crate::module_exports! {
        static EXPORTS = "exports-test" {
            plugin "marker" => plugin,
            object "marker" => class,
        }
    }

    crate::link_module!(EXPORTS);

    #[test]
    fn macro_prefixes_symbols_in_order() {
        assert_eq!(EXPORTS.module, "exports-test");
        let symbols: Vec<_> = EXPORTS.entries.iter().map(|e| e.symbol).collect();
        assert_eq!(symbols, ["__ember_plugin_marker", "__ember_object_marker"]);
        assert!(matches!(EXPORTS.entries[0].accessor, Accessor::Plugin(_)));
        assert!(matches!(EXPORTS.entries[1].accessor, Accessor::Object(_)));
    }

    #[test]
    fn linked_table_is_discoverable() {
        assert!(linked_modules().any(|name| name == "exports-test"));
    }
}
