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

//! # Ember Engine
//!
//! Turns one process into a supervised set of independently clocked threads:
//! the application's main loop on the calling thread plus up to
//! [`MAX_SUBSYSTEMS`] subsystem threads.
//!
//! ```no_run
//! use ember_core::AppDescriptor;
//! use ember_engine::{Application, Engine, EngineContext};
//!
//! struct Game {
//!     frames: u32,
//! }
//!
//! impl Application for Game {
//!     fn init(&mut self, _ctx: &mut EngineContext) -> bool {
//!         true
//!     }
//!     fn tick(&mut self, ctx: &mut EngineContext, _dt: f64) {
//!         self.frames += 1;
//!         if self.frames == 600 {
//!             ctx.request_exit(0);
//!         }
//!     }
//!     fn fini(&mut self, _ctx: &mut EngineContext) {}
//! }
//!
//! let descriptor = AppDescriptor::load("app.json").unwrap();
//! let mut engine = Engine::create(descriptor, Box::new(Game { frames: 0 })).unwrap();
//! let status = engine.exec();
//! engine.destroy();
//! std::process::exit(status);
//! ```

#![warn(missing_docs)]

pub mod context;
pub mod exec;
pub mod status;
pub mod subsystem;

pub use context::{
    Application, Engine, EngineContext, EngineError, EngineHandle, DEFAULT_MIN_DT, MAX_SUBSYSTEMS,
};
pub use status::ExitStatus;
pub use subsystem::{Subsystem, SubsystemContext, SubsystemError, SubsystemHandler, SubsystemId};
