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
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

// --- Test Setup ---
const DESCRIPTOR: &str = r#"{
  "app-info": {
    "id": 7,
    "name": "cli-test",
    "display-name": "CLI Test",
    "author": "eraflo",
    "version": [1, 0, 0],
    "license": "Apache-2.0",
    "description": "Runtime binary smoke test"
  }
}"#;

fn run_runtime(descriptor: &Path, extra: &[&str]) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_ember-runtime"))
        .arg("--app")
        .arg(descriptor)
        .args(extra)
        .env("RUST_LOG", "warn")
        .output()?)
}
// ---

#[test]
fn test_runtime_exits_cleanly_after_frame_limit() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("app.json");
    fs::write(&path, DESCRIPTOR)?;

    let output = run_runtime(&path, &["--frames", "10", "--rate", "500"])?;
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    Ok(())
}

#[test]
fn test_unknown_net_plugin_exits_with_launch_failure() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("app.json");
    fs::write(&path, DESCRIPTOR)?;

    let output = run_runtime(&path, &["--frames", "10", "--plugin", "quic"])?;
    assert_eq!(output.status.code(), Some(2), "{output:?}");
    Ok(())
}

#[test]
fn test_invalid_descriptor_is_reported() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("app.json");
    fs::write(&path, r#"{"app-info": {"id": "seven"}}"#)?;

    let output = run_runtime(&path, &["--frames", "1"])?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("app-info.id"), "stderr: {stderr}");
    Ok(())
}
