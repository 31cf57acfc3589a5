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

//! A plugin module built as a shared library, for loader tests.

use ember_core::{ObjectClass, TypeInfo, Version};
use ember_plugins::PluginDescriptor;
use std::any::Any;

#[allow(dead_code)]
struct Counter {
    _value: u64,
}

struct CounterClass {
    info: TypeInfo,
}

static COUNTER_CLASS: CounterClass = CounterClass {
    info: TypeInfo::of::<Counter>("fixture_counter"),
};

impl ObjectClass for CounterClass {
    fn info(&self) -> &TypeInfo {
        &self.info
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct FixturePlugin;

impl PluginDescriptor for FixturePlugin {
    fn name(&self) -> &str {
        "fixture"
    }
    fn display_name(&self) -> &str {
        "Shared Library Fixture"
    }
    fn version(&self) -> Version {
        Version::new(4, 5, 6)
    }
    fn category(&self) -> &str {
        "test"
    }
}

fn plugin() -> Option<&'static dyn PluginDescriptor> {
    Some(&FixturePlugin)
}

fn counter_class() -> Option<&'static dyn ObjectClass> {
    Some(&COUNTER_CLASS)
}

ember_plugins::module_exports! {
    static EXPORTS = "ember-test-plugin" {
        plugin "fixture" => plugin,
        object "fixture_counter" => counter_class,
    }
}
ember_plugins::dynamic_module!(EXPORTS);
