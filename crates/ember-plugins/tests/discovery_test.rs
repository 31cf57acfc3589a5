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
use ember_core::{ObjectClass, TypeInfo, Version};
use ember_plugins::{Module, Plugin, PluginDescriptor, PluginError, PluginRegistry};
use std::any::Any;

// --- Test module: a linked "audio" plugin with one object class ---
const AUDIO_NAME: &str = "audio_test";
const AUDIO_VERSION: Version = Version::new(3, 4, 5);
const AUDIO_CATEGORY: &str = "audio";

struct AudioPlugin;

impl PluginDescriptor for AudioPlugin {
    fn name(&self) -> &str {
        AUDIO_NAME
    }
    fn display_name(&self) -> &str {
        "Test Audio"
    }
    fn version(&self) -> Version {
        AUDIO_VERSION
    }
    fn category(&self) -> &str {
        AUDIO_CATEGORY
    }
}

struct Voice {
    _channel: u8,
}

struct VoiceClass {
    info: TypeInfo,
}

static VOICE_CLASS: VoiceClass = VoiceClass {
    info: TypeInfo::of::<Voice>("voice"),
};

impl ObjectClass for VoiceClass {
    fn info(&self) -> &TypeInfo {
        &self.info
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn audio_plugin() -> Option<&'static dyn PluginDescriptor> {
    Some(&AudioPlugin)
}

fn voice_class() -> Option<&'static dyn ObjectClass> {
    Some(&VOICE_CLASS)
}

ember_plugins::module_exports! {
    static AUDIO_EXPORTS = "audio-module" {
        plugin "audio_test" => audio_plugin,
        object "voice" => voice_class,
    }
}
ember_plugins::link_module!(AUDIO_EXPORTS);

// --- A module that only carries object classes ---
ember_plugins::module_exports! {
    static VOICES_ONLY = "voices-only" {
        object "voice" => voice_class,
    }
}
ember_plugins::link_module!(VOICES_ONLY);
// ---

#[test]
fn test_discovery_round_trip() -> Result<()> {
    let module = Module::linked("audio-module")?;
    assert!(module.symbol("__ember_plugin_audio_test").is_some());

    let plugin = Plugin::load(module, AUDIO_NAME)?;
    assert_eq!(plugin.name(), AUDIO_NAME);
    assert_eq!(plugin.descriptor().display_name(), "Test Audio");
    assert_eq!(plugin.version(), AUDIO_VERSION);
    assert_eq!(plugin.category(), AUDIO_CATEGORY);
    assert_eq!(plugin.object_classes().len(), 1);

    plugin.init()?;
    plugin.unload();
    Ok(())
}

#[test]
fn test_unknown_id_in_module_without_descriptors() -> Result<()> {
    let module = Module::linked("voices-only")?;
    assert_eq!(module.iterate_symbols(|_| {}), 1);

    let err = Plugin::load(module, AUDIO_NAME).unwrap_err();
    assert!(
        matches!(err, PluginError::NotFound { .. }),
        "expected NotFound, got {err:?}"
    );
    Ok(())
}

#[test]
fn test_registry_loads_linked_plugins() -> Result<()> {
    let mut registry = PluginRegistry::new();
    registry.load_linked("audio-module", AUDIO_NAME)?;

    assert!(registry.get(AUDIO_NAME).is_some_and(Plugin::is_initialized));
    assert_eq!(
        registry.find_class("voice").map(|c| c.info().type_name()),
        Some("voice")
    );

    let err = registry
        .load_linked("audio-module", AUDIO_NAME)
        .unwrap_err();
    assert!(matches!(err, PluginError::AlreadyLoaded { .. }));

    let err = registry.load_linked("missing-module", "x").unwrap_err();
    assert!(matches!(err, PluginError::Dso(_)));
    Ok(())
}
