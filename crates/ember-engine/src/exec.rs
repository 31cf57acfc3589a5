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

//! The engine main loop.

use crate::context::Engine;
use crate::status::ExitStatus;
use ember_core::Ticker;

impl Engine {
    /// Runs the engine until exit is requested and returns the exit status.
    ///
    /// Every registered subsystem is launched first, in registration order. If
    /// one fails, the loop never starts and the status is
    /// [`ExitStatus::LaunchFailed`]. Otherwise the application ticks at the
    /// engine's minimum interval for as long as the engine runs.
    pub fn exec(&mut self) -> i32 {
        let (ctx, app) = self.parts();
        let handle = ctx.handle();
        handle.start();

        for subsystem in ctx.subsystems() {
            if let Err(e) = subsystem.launch() {
                log::error!("Engine '{}' cannot start: {e}", ctx.info().name);
                handle.stop(ExitStatus::LaunchFailed);
                return ExitStatus::LaunchFailed.code();
            }
        }

        log::info!(
            "Engine '{}' running with {} subsystems",
            ctx.info().name,
            ctx.subsystem_count()
        );

        let mut ticker = Ticker::new();
        let mut frames: u64 = 0;
        loop {
            let dt = ticker.accumulate(handle.min_dt());
            app.tick(ctx, dt);
            frames += 1;

            if !handle.is_running() {
                break;
            }
        }

        let status = handle.status();
        log::info!(
            "Engine '{}' stopped after {frames} frames with status {status}",
            ctx.info().name
        );
        status
    }
}
