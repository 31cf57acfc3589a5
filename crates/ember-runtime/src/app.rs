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

//! The runtime's main loop behaviour.

use crate::cli;
use ember_core::Stopwatch;
use ember_engine::{Application, EngineContext, ExitStatus};

/// Drives the main loop, optionally stopping after a fixed number of frames.
pub struct RuntimeApp {
    frame_limit: Option<u64>,
    rate: f64,
    frames: u64,
    clock: Stopwatch,
}

impl RuntimeApp {
    pub fn new(frame_limit: Option<u64>, rate: f64) -> Self {
        Self {
            frame_limit,
            rate,
            frames: 0,
            clock: Stopwatch::new(),
        }
    }
}

impl Application for RuntimeApp {
    fn init(&mut self, ctx: &mut EngineContext) -> bool {
        match cli::min_dt(self.rate) {
            Some(dt) => ctx.set_min_dt(dt),
            None => log::warn!(
                "Ignoring engine rate {} Hz; keeping {:.4}s",
                self.rate,
                ctx.min_dt()
            ),
        }
        log::info!(
            "{} v{} initialized ({:.4}s per frame)",
            ctx.info().display_name,
            ctx.info().version,
            ctx.min_dt()
        );
        true
    }

    fn tick(&mut self, ctx: &mut EngineContext, _dt: f64) {
        self.frames += 1;
        if self.frame_limit.is_some_and(|limit| self.frames >= limit) {
            log::info!("Frame limit reached after {} frames", self.frames);
            ctx.request_exit(ExitStatus::Success.code());
        }
    }

    fn fini(&mut self, ctx: &mut EngineContext) {
        log::info!(
            "{} ran {} frames in {:.2}s",
            ctx.info().display_name,
            self.frames,
            self.clock.elapsed_secs_f64()
        );
    }
}
