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
use ember_core::AppDescriptor;
use std::path::Path;
use tempfile::tempdir;

// Alone in its own test binary: it changes the process's current directory.
#[test]
fn test_bare_file_name_uses_the_current_directory() -> Result<()> {
    let dir = tempdir()?;
    std::fs::write(
        dir.path().join("app.json"),
        r#"{
            "app-info": {
                "id": 11,
                "name": "cwd",
                "display-name": "Current Directory",
                "author": "eraflo",
                "version": [1, 0, 0],
                "license": "Apache-2.0",
                "description": "Loaded by bare file name"
            }
        }"#,
    )?;
    std::env::set_current_dir(dir.path())?;

    let descriptor = AppDescriptor::load("app.json")?;
    assert_eq!(descriptor.working_dir, Path::new("."));
    assert!(descriptor.working_dir.is_dir());
    Ok(())
}
