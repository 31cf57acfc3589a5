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

use anyhow::{ensure, Context, Result};
use ember_core::Version;
use ember_plugins::{Module, OpenFlags, Plugin, PluginRegistry};
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

// --- Test Setup: build the `ember-test-plugin` cdylib once per run ---
// The fixture gets its own target directory: the one running these tests is
// locked by the outer cargo invocation.
fn fixture_library() -> Result<&'static Path> {
    static LIBRARY: OnceLock<Result<PathBuf, String>> = OnceLock::new();
    LIBRARY
        .get_or_init(|| build_fixture().map_err(|e| format!("{e:#}")))
        .as_deref()
        .map_err(|e| anyhow::anyhow!("{e}"))
}

fn build_fixture() -> Result<PathBuf> {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("../ember-test-plugin/Cargo.toml");
    let test_binary = std::env::current_exe()?;
    // <target>/<profile>/deps/<test binary>
    let target = test_binary
        .ancestors()
        .nth(3)
        .context("test binary is not inside a cargo target directory")?
        .join("fixtures");

    let profile = if cfg!(debug_assertions) { "debug" } else { "release" };
    let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
    let mut build = Command::new(cargo);
    build
        .args(["build", "--quiet", "--manifest-path"])
        .arg(&manifest)
        .arg("--target-dir")
        .arg(&target);
    if profile == "release" {
        build.arg("--release");
    }
    let status = build.status().context("failed to run cargo")?;
    ensure!(status.success(), "building the fixture plugin failed: {status}");

    let library = target
        .join(profile)
        .join(format!("{DLL_PREFIX}ember_test_plugin{DLL_SUFFIX}"));
    ensure!(library.is_file(), "fixture library missing at {}", library.display());
    Ok(library)
}
// ---

#[test]
fn test_shared_library_exports_round_trip() -> Result<()> {
    let path = fixture_library()?;

    // SAFETY: everything read from the module is dropped before it is closed.
    let module = unsafe { Module::open(path, OpenFlags::default())? };
    assert_eq!(module.name(), "ember-test-plugin");
    assert_eq!(module.path(), Some(path));
    assert!(module.symbol("__ember_plugin_fixture").is_some());
    assert_eq!(module.iterate_symbols(|_| {}), 2);

    let plugin = Plugin::load(module, "fixture")?;
    assert_eq!(plugin.name(), "fixture");
    assert_eq!(plugin.descriptor().display_name(), "Shared Library Fixture");
    assert_eq!(plugin.version(), Version::new(4, 5, 6));
    assert_eq!(plugin.category(), "test");
    assert_eq!(plugin.module_name(), "ember-test-plugin");

    let class = plugin
        .object_class("fixture_counter")
        .context("fixture exports its counter class")?;
    assert_eq!(class.info().size(), std::mem::size_of::<u64>());

    plugin.init()?;
    assert!(plugin.is_initialized());
    plugin.unload();
    Ok(())
}

#[test]
fn test_registry_loads_and_unloads_a_shared_library() -> Result<()> {
    let path = fixture_library()?;
    let mut registry = PluginRegistry::new();

    // SAFETY: no class or object obtained from the registry outlives the unload below.
    let plugin = unsafe { registry.load_path(path, OpenFlags::default(), "fixture")? };
    assert!(plugin.is_initialized());
    assert_eq!(plugin.module_name(), "ember-test-plugin");

    assert_eq!(
        registry.find_class("fixture_counter").map(|class| class.info().type_name()),
        Some("fixture_counter")
    );
    assert!(registry.unload("fixture"));
    assert!(registry.get("fixture").is_none());
    assert!(registry.find_class("fixture_counter").is_none());
    Ok(())
}

#[test]
fn test_missing_plugin_id_in_shared_library_is_reported() -> Result<()> {
    let path = fixture_library()?;
    let mut registry = PluginRegistry::new();

    // SAFETY: nothing is kept from a failed load.
    let err = unsafe { registry.load_path(path, OpenFlags::default(), "absent") }.unwrap_err();
    assert!(err.to_string().contains("absent"), "got {err}");
    assert!(registry.is_empty());
    Ok(())
}
