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

//! The subsystem scheduler.
//!
//! A subsystem is an OS thread with its own [`Ticker`]. The thread is spawned
//! blocked on a launch gate; [`Subsystem::launch`] releases it, after which it
//! runs `init`, then `tick` at its own minimum interval until stopped, then `fini`.
//!
//! Cancellation is cooperative: clearing the running flag makes the thread leave
//! its loop after the current tick. [`Subsystem::destroy`] always joins.

use crate::context::EngineHandle;
use crate::status::ExitStatus;
use ember_core::Ticker;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Behaviour of a subsystem. Runs on the subsystem's own thread.
pub trait SubsystemHandler: Send + 'static {
    /// Called once after launch. Returning `false` aborts the launch.
    fn init(&mut self, _ctx: &mut SubsystemContext) -> bool {
        true
    }

    /// Called repeatedly while the subsystem runs, with the seconds elapsed
    /// since the previous tick.
    fn tick(&mut self, ctx: &mut SubsystemContext, dt: f64);

    /// Called once after the loop ends.
    fn fini(&mut self, _ctx: &mut SubsystemContext) {}
}

/// Errors raised by subsystem operations.
#[derive(Debug, Error)]
pub enum SubsystemError {
    /// The OS refused to create the thread.
    #[error("failed to spawn the thread of subsystem '{name}': {source}")]
    Spawn {
        /// Subsystem name.
        name: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The handler's `init` returned `false` or panicked.
    #[error("subsystem '{name}' failed to initialise")]
    InitFailed {
        /// Subsystem name.
        name: String,
    },
    /// The subsystem already ran and has stopped; it cannot be launched again.
    #[error("subsystem '{name}' has stopped")]
    Stopped {
        /// Subsystem name.
        name: String,
    },
}

/// Identifies one subsystem of an engine.
///
/// Ids stay valid while their subsystem lives and never resolve to a
/// subsystem created later in the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubsystemId {
    pub(crate) slot: usize,
    pub(crate) serial: u64,
}

impl SubsystemId {
    /// The slot index.
    pub fn index(self) -> usize {
        self.slot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Closed,
    Open,
}

struct Shared {
    name: String,
    running: AtomicBool,
    min_dt: AtomicU64,
    ticks: AtomicU64,
    gate: Mutex<Gate>,
    released: Condvar,
}

impl Shared {
    fn gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_gate(&self) {
        *self.gate() = Gate::Open;
        self.released.notify_one();
    }

    /// Blocks until the gate opens. Returns whether the thread should run.
    fn wait_for_launch(&self) -> bool {
        let mut gate = self.gate();
        while *gate == Gate::Closed {
            gate = self
                .released
                .wait(gate)
                .unwrap_or_else(PoisonError::into_inner);
        }
        self.running.load(Ordering::Relaxed)
    }

    fn min_dt(&self) -> f64 {
        f64::from_bits(self.min_dt.load(Ordering::Relaxed))
    }

    fn set_min_dt(&self, dt: f64) {
        self.min_dt.store(dt.to_bits(), Ordering::Relaxed);
    }
}

/// What a [`SubsystemHandler`] sees of its subsystem.
pub struct SubsystemContext {
    shared: Arc<Shared>,
    engine: EngineHandle,
}

impl SubsystemContext {
    /// The subsystem name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The owning engine.
    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Whether the subsystem is still meant to run.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }

    /// Leaves the loop after the current tick.
    pub fn request_stop(&self) {
        self.shared.running.store(false, Ordering::Relaxed);
    }

    /// Minimum seconds between ticks.
    pub fn min_dt(&self) -> f64 {
        self.shared.min_dt()
    }

    /// Changes the minimum seconds between ticks.
    pub fn set_min_dt(&self, dt: f64) {
        self.shared.set_min_dt(dt);
    }

    /// Ticks completed so far.
    pub fn tick_count(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }
}

/// A worker thread owned by an engine.
pub struct Subsystem {
    shared: Arc<Shared>,
    engine: EngineHandle,
    init_outcome: flume::Receiver<bool>,
    thread: Option<JoinHandle<i32>>,
}

impl Subsystem {
    /// Spawns the subsystem's thread, blocked until [`launch`](Self::launch).
    pub fn spawn(
        name: &str,
        handler: Box<dyn SubsystemHandler>,
        engine: EngineHandle,
    ) -> Result<Self, SubsystemError> {
        let shared = Arc::new(Shared {
            name: name.to_string(),
            running: AtomicBool::new(false),
            min_dt: AtomicU64::new(engine.min_dt().to_bits()),
            ticks: AtomicU64::new(0),
            gate: Mutex::new(Gate::Closed),
            released: Condvar::new(),
        });
        let (outcome_tx, outcome_rx) = flume::bounded(1);

        let thread = {
            let shared = Arc::clone(&shared);
            let engine = engine.clone();
            thread::Builder::new()
                .name(format!("ember-{name}"))
                .spawn(move || run(shared, engine, handler, outcome_tx))
                .map_err(|source| {
                    log::error!("Failed to spawn subsystem '{name}': {source}");
                    SubsystemError::Spawn {
                        name: name.to_string(),
                        source,
                    }
                })?
        };

        log::debug!("Subsystem '{name}' created");
        Ok(Self {
            shared,
            engine,
            init_outcome: outcome_rx,
            thread: Some(thread),
        })
    }

    /// Releases the thread and waits for its `init` to finish.
    ///
    /// Launching a running subsystem succeeds without signalling it again.
    pub fn launch(&self) -> Result<(), SubsystemError> {
        {
            let mut gate = self.shared.gate();
            if *gate == Gate::Open {
                return if self.is_running() {
                    Ok(())
                } else {
                    Err(SubsystemError::Stopped {
                        name: self.shared.name.clone(),
                    })
                };
            }
            self.shared.running.store(true, Ordering::Relaxed);
            *gate = Gate::Open;
            self.shared.released.notify_one();
        }

        match self.init_outcome.recv() {
            Ok(true) => {
                log::info!("Subsystem '{}' launched", self.shared.name);
                Ok(())
            }
            Ok(false) | Err(_) => {
                log::error!("Subsystem '{}' failed to initialise", self.shared.name);
                self.shared.running.store(false, Ordering::Relaxed);
                Err(SubsystemError::InitFailed {
                    name: self.shared.name.clone(),
                })
            }
        }
    }

    /// Stops the subsystem and waits for its thread to exit.
    pub fn destroy(mut self) {
        self.shutdown();
    }

    /// The subsystem name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Whether the thread is inside its tick loop, or about to enter it.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }

    /// The owning engine.
    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Minimum seconds between ticks.
    pub fn min_dt(&self) -> f64 {
        self.shared.min_dt()
    }

    /// Changes the minimum seconds between ticks. Takes effect on the next tick.
    pub fn set_min_dt(&self, dt: f64) {
        self.shared.set_min_dt(dt);
    }

    /// Ticks completed so far.
    pub fn tick_count(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.shared.running.store(false, Ordering::Relaxed);
        self.shared.open_gate();

        match thread.join() {
            Ok(0) => log::debug!("Subsystem '{}' stopped", self.shared.name),
            Ok(status) => log::warn!(
                "Subsystem '{}' exited with status {status}",
                self.shared.name
            ),
            Err(_) => log::warn!("Subsystem '{}' thread panicked", self.shared.name),
        }
    }
}

impl Drop for Subsystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subsystem")
            .field("name", &self.shared.name)
            .field("running", &self.is_running())
            .field("min_dt", &self.min_dt())
            .field("ticks", &self.tick_count())
            .finish()
    }
}

fn run(
    shared: Arc<Shared>,
    engine: EngineHandle,
    mut handler: Box<dyn SubsystemHandler>,
    init_outcome: flume::Sender<bool>,
) -> i32 {
    if !shared.wait_for_launch() {
        log::debug!("Subsystem '{}' released without launch", shared.name);
        return ExitStatus::Success.code();
    }

    let mut ctx = SubsystemContext {
        shared: Arc::clone(&shared),
        engine,
    };

    if !handler.init(&mut ctx) {
        shared.running.store(false, Ordering::Relaxed);
        let _ = init_outcome.send(false);
        return ExitStatus::InitFailed.code();
    }
    let _ = init_outcome.send(true);

    let mut ticker = Ticker::new();
    loop {
        let dt = ticker.accumulate(shared.min_dt());
        handler.tick(&mut ctx, dt);
        shared.ticks.fetch_add(1, Ordering::Relaxed);

        if !shared.running.load(Ordering::Relaxed) {
            break;
        }
    }

    handler.fini(&mut ctx);
    ExitStatus::Success.code()
}
