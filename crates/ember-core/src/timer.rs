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

//! CPU timing primitives: [`Stopwatch`] and the fixed-timestep [`Ticker`].

use std::thread;
use std::time::{Duration, Instant};

/// Measures time since it was started or last lapped.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    start_time: Instant,
}

impl Stopwatch {
    /// Creates a new, running stopwatch.
    #[inline]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Returns the elapsed time since the stopwatch was started.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the elapsed time in seconds as f64.
    #[inline]
    pub fn elapsed_secs_f64(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    /// Returns the elapsed time and restarts the stopwatch at the same instant.
    #[inline]
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.start_time);
        self.start_time = now;
        elapsed
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Measures the time between successive ticks and can block to enforce a
/// minimum interval between them.
///
/// Every engine loop and every subsystem thread owns its own ticker, which is
/// what makes their timesteps independent.
#[derive(Debug, Clone, Default)]
pub struct Ticker {
    watch: Stopwatch,
    ticks: u64,
}

impl Ticker {
    /// Creates a ticker whose first interval starts now.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the seconds elapsed since the previous tick and starts a new interval.
    pub fn tick(&mut self) -> f64 {
        self.ticks += 1;
        self.watch.lap().as_secs_f64()
    }

    /// Ticks until at least `min_dt` seconds have accumulated, sleeping for the
    /// remainder between ticks. Returns the accumulated time.
    ///
    /// A non-positive or non-finite `min_dt` returns after a single tick.
    pub fn accumulate(&mut self, min_dt: f64) -> f64 {
        let mut dt = self.tick();
        if !min_dt.is_finite() {
            return dt;
        }
        while dt < min_dt {
            if let Ok(remaining) = Duration::try_from_secs_f64(min_dt - dt) {
                thread::sleep(remaining);
            }
            dt += self.tick();
        }
        dt
    }

    /// Number of ticks taken so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
