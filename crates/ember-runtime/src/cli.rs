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

//! Command line of the runtime binary.

use clap::Parser;
use std::path::PathBuf;

/// Where the net subsystem gets its plugin from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSource {
    /// A plugin linked into this executable.
    Linked { id: String },
    /// A plugin in a shared library.
    Path { path: PathBuf, id: String },
}

#[derive(Parser, Debug)]
#[command(name = "ember-runtime", version)]
#[command(about = "Run an Ember application until it exits", long_about = None)]
pub struct Cli {
    /// Path to the application descriptor document
    #[arg(long, value_name = "JSON_FILE")]
    pub app: PathBuf,

    /// Stop after this many main loop frames (runs until interrupted otherwise)
    #[arg(long)]
    pub frames: Option<u64>,

    /// Main loop rate in Hz
    #[arg(long, default_value_t = 60.0)]
    pub rate: f64,

    /// Net subsystem rate in Hz (engine rate when omitted)
    #[arg(long)]
    pub net_rate: Option<f64>,

    /// Video subsystem rate in Hz (engine rate when omitted)
    #[arg(long)]
    pub video_rate: Option<f64>,

    /// Game subsystem rate in Hz (engine rate when omitted)
    #[arg(long)]
    pub game_rate: Option<f64>,

    /// Id of the net plugin
    #[arg(long, default_value = "loopback")]
    pub plugin: String,

    /// Shared library holding the net plugin (linked plugins are used otherwise)
    #[arg(long, value_name = "LIBRARY")]
    pub plugin_path: Option<PathBuf>,
}

impl Cli {
    /// The net plugin selected on the command line.
    pub fn plugin_source(&self) -> PluginSource {
        match &self.plugin_path {
            Some(path) => PluginSource::Path {
                path: path.clone(),
                id: self.plugin.clone(),
            },
            None => PluginSource::Linked {
                id: self.plugin.clone(),
            },
        }
    }
}

/// Converts a rate in Hz to a minimum frame time, rejecting non-positive rates.
pub fn min_dt(rate: f64) -> Option<f64> {
    (rate.is_finite() && rate > 0.0).then(|| 1.0 / rate)
}
