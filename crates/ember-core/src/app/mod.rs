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

//! Application identity and its external descriptor document.

mod document;

pub use document::DescriptorError;

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A semantic version triple. Serialises as `[major, minor, patch]`, the
/// descriptor document's form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(into = "[u32; 3]")]
pub struct Version {
    /// Incompatible API changes.
    pub major: u32,
    /// Backwards-compatible additions.
    pub minor: u32,
    /// Backwards-compatible fixes.
    pub patch: u32,
}

impl Version {
    /// Creates a version from its three components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl From<Version> for [u32; 3] {
    fn from(version: Version) -> Self {
        [version.major, version.minor, version.patch]
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Identity of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppInfo {
    /// Numeric application id.
    pub id: u64,
    /// Machine name.
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    /// Author or studio.
    pub author: String,
    /// Application version.
    pub version: Version,
    /// License identifier.
    pub license: String,
    /// Free-form description.
    pub description: String,
}

impl AppInfo {
    /// Parses the `app-info` section of a descriptor document.
    pub fn from_json_str(text: &str) -> Result<Self, DescriptorError> {
        let root: serde_json::Value = serde_json::from_str(text)?;
        document::parse_app_info(&root)
    }
}

/// Everything the engine needs to know about an application besides its behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDescriptor {
    /// Identity fields.
    pub info: AppInfo,
    /// Directory the application runs from; must exist when the engine is created.
    pub working_dir: PathBuf,
}

impl AppDescriptor {
    /// Creates a descriptor from its parts.
    pub fn new(info: AppInfo, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            info,
            working_dir: working_dir.into(),
        }
    }

    /// Loads and validates a descriptor document from disk.
    ///
    /// A relative `working-dir` is resolved against the document's directory;
    /// without one, the document's directory is the working directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DescriptorError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = document_dir(path);

        Self::from_json_str(&text, base_dir).inspect_err(|e| {
            log::error!("Rejected application descriptor {}: {e}", path.display());
        })
    }

    /// Parses a descriptor document, resolving paths against `base_dir`.
    pub fn from_json_str(text: &str, base_dir: &Path) -> Result<Self, DescriptorError> {
        let root: serde_json::Value = serde_json::from_str(text)?;
        let info = document::parse_app_info(&root)?;
        let working_dir = match document::parse_working_dir(&root)? {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => base_dir.join(dir),
            None => base_dir.to_path_buf(),
        };
        Ok(Self { info, working_dir })
    }

    /// The descriptor as a document, with the working directory spelled out.
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "app-info": self.info,
            "working-dir": self.working_dir.to_string_lossy(),
        })
    }
}

/// Directory holding the document at `path`; `.` for a bare file name.
fn document_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}
