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

//! Field-by-field validation of the descriptor document.
//!
//! ```json
//! {
//!   "app-info": {
//!     "id": 7,
//!     "name": "sandbox",
//!     "display-name": "Sandbox",
//!     "author": "eraflo",
//!     "version": [0, 1, 0],
//!     "license": "Apache-2.0",
//!     "description": "..."
//!   },
//!   "working-dir": "."
//! }
//! ```

use super::{AppInfo, Version};
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

const APP_INFO: &str = "app-info";
const WORKING_DIR: &str = "working-dir";

/// Why a descriptor document was rejected.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The document could not be read.
    #[error("failed to read descriptor '{}': {source}", path.display())]
    Io {
        /// The document path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid JSON.
    #[error("descriptor is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    /// A required key is absent.
    #[error("descriptor is missing required key '{key}'")]
    Missing {
        /// Dotted path of the key.
        key: String,
    },
    /// A key is present with the wrong type.
    #[error("descriptor key '{key}' must be {expected}")]
    WrongType {
        /// Dotted path of the key.
        key: String,
        /// Description of the expected type.
        expected: &'static str,
    },
}

pub(super) fn parse_app_info(root: &Value) -> Result<AppInfo, DescriptorError> {
    let root = as_object(root, "<root>")?;
    let info = as_object(required(root, "", APP_INFO)?, APP_INFO)?;

    Ok(AppInfo {
        id: unsigned(required(info, APP_INFO, "id")?, &path(APP_INFO, "id"))?,
        name: string(info, APP_INFO, "name")?,
        display_name: string(info, APP_INFO, "display-name")?,
        author: string(info, APP_INFO, "author")?,
        version: version(required(info, APP_INFO, "version")?)?,
        license: string(info, APP_INFO, "license")?,
        description: string(info, APP_INFO, "description")?,
    })
}

pub(super) fn parse_working_dir(root: &Value) -> Result<Option<PathBuf>, DescriptorError> {
    let root = as_object(root, "<root>")?;
    match root.get(WORKING_DIR) {
        None => Ok(None),
        Some(Value::String(dir)) => Ok(Some(PathBuf::from(dir))),
        Some(_) => Err(DescriptorError::WrongType {
            key: WORKING_DIR.to_string(),
            expected: "a string",
        }),
    }
}

fn path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn as_object<'a>(value: &'a Value, key: &str) -> Result<&'a Map<String, Value>, DescriptorError> {
    value.as_object().ok_or_else(|| DescriptorError::WrongType {
        key: key.to_string(),
        expected: "an object",
    })
}

fn required<'a>(
    object: &'a Map<String, Value>,
    parent: &str,
    key: &str,
) -> Result<&'a Value, DescriptorError> {
    object.get(key).ok_or_else(|| DescriptorError::Missing {
        key: path(parent, key),
    })
}

fn string(object: &Map<String, Value>, parent: &str, key: &str) -> Result<String, DescriptorError> {
    required(object, parent, key)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| DescriptorError::WrongType {
            key: path(parent, key),
            expected: "a string",
        })
}

fn unsigned(value: &Value, key: &str) -> Result<u64, DescriptorError> {
    value.as_u64().ok_or_else(|| DescriptorError::WrongType {
        key: key.to_string(),
        expected: "an unsigned integer",
    })
}

fn version(value: &Value) -> Result<Version, DescriptorError> {
    let key = path(APP_INFO, "version");
    let parts = value
        .as_array()
        .filter(|parts| parts.len() == 3)
        .ok_or_else(|| DescriptorError::WrongType {
            key: key.clone(),
            expected: "an array of 3 unsigned integers",
        })?;

    let mut numbers = [0u32; 3];
    for (index, (part, slot)) in parts.iter().zip(numbers.iter_mut()).enumerate() {
        *slot = part
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| DescriptorError::WrongType {
                key: format!("{key}[{index}]"),
                expected: "an unsigned 32-bit integer",
            })?;
    }

    Ok(Version::new(numbers[0], numbers[1], numbers[2]))
}
