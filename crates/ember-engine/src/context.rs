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

//! The engine context.
//!
//! An [`Engine`] owns the application, its subsystems and the shared run state.
//! At most one engine is alive per process; the rule is enforced by an instance
//! guard held for the engine's whole life, and there is no global accessor.
//! Callbacks receive the engine explicitly, as an [`EngineContext`] on the main
//! thread or an [`EngineHandle`] anywhere else.

use crate::status::ExitStatus;
use crate::subsystem::{Subsystem, SubsystemError, SubsystemHandler, SubsystemId};
use ember_core::{AppDescriptor, AppInfo};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Maximum number of subsystems one engine can own.
pub const MAX_SUBSYSTEMS: usize = 16;

/// Default minimum seconds between main-loop ticks.
pub const DEFAULT_MIN_DT: f64 = 1.0 / 60.0;

/// Behaviour of an application. Runs on the thread that calls [`Engine::exec`].
pub trait Application {
    /// Called once by [`Engine::create`]. Returning `false` aborts creation.
    fn init(&mut self, ctx: &mut EngineContext) -> bool;

    /// Called once per main-loop iteration with the seconds since the previous one.
    fn tick(&mut self, ctx: &mut EngineContext, dt: f64);

    /// Called once when the engine is destroyed.
    fn fini(&mut self, ctx: &mut EngineContext);
}

/// Errors raised by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The descriptor's working directory does not exist.
    #[error("working directory '{}' does not exist", path.display())]
    MissingWorkingDirectory {
        /// The offending path.
        path: PathBuf,
    },
    /// Another engine is alive in this process.
    #[error("an engine is already live in this process")]
    AlreadyLive,
    /// The application's `init` returned `false`.
    #[error("application '{name}' failed to initialise")]
    AppInitFailed {
        /// Application name.
        name: String,
    },
    /// Every subsystem slot is taken.
    #[error("cannot create more than {max} subsystems")]
    SubsystemCapacity {
        /// The capacity.
        max: usize,
    },
    /// A subsystem with this name already exists.
    #[error("a subsystem named '{name}' already exists")]
    DuplicateSubsystem {
        /// Subsystem name.
        name: String,
    },
    /// A subsystem operation failed.
    #[error(transparent)]
    Subsystem(#[from] SubsystemError),
}

static ENGINE_LIVE: Mutex<bool> = Mutex::new(false);

/// Proof that the holder is the process's only live engine.
struct InstanceGuard(());

impl InstanceGuard {
    fn acquire() -> Option<Self> {
        let mut live = ENGINE_LIVE.lock().unwrap_or_else(PoisonError::into_inner);
        if *live {
            return None;
        }
        *live = true;
        Some(Self(()))
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        *ENGINE_LIVE.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

struct Shared {
    descriptor: AppDescriptor,
    running: AtomicBool,
    status: AtomicI32,
    min_dt: AtomicU64,
}

/// A cheap, thread-safe view of an engine's run state.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<Shared>,
}

impl EngineHandle {
    pub(crate) fn new(descriptor: AppDescriptor) -> Self {
        Self {
            shared: Arc::new(Shared {
                descriptor,
                running: AtomicBool::new(false),
                status: AtomicI32::new(ExitStatus::Success.code()),
                min_dt: AtomicU64::new(DEFAULT_MIN_DT.to_bits()),
            }),
        }
    }

    /// The application descriptor.
    pub fn descriptor(&self) -> &AppDescriptor {
        &self.shared.descriptor
    }

    /// The application identity.
    pub fn info(&self) -> &AppInfo {
        &self.shared.descriptor.info
    }

    /// Whether the main loop is running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }

    /// The current exit status.
    pub fn status(&self) -> i32 {
        self.shared.status.load(Ordering::Relaxed)
    }

    /// Stops the main loop after its current iteration, reporting `status`.
    pub fn request_exit(&self, status: i32) {
        log::info!("Exit requested with status {status}");
        self.shared.status.store(status, Ordering::Relaxed);
        self.shared.running.store(false, Ordering::Relaxed);
    }

    /// Minimum seconds between main-loop ticks.
    pub fn min_dt(&self) -> f64 {
        f64::from_bits(self.shared.min_dt.load(Ordering::Relaxed))
    }

    /// Changes the minimum seconds between main-loop ticks.
    pub fn set_min_dt(&self, dt: f64) {
        self.shared.min_dt.store(dt.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn start(&self) {
        self.shared
            .status
            .store(ExitStatus::Success.code(), Ordering::Relaxed);
        self.shared.running.store(true, Ordering::Relaxed);
    }

    pub(crate) fn stop(&self, status: ExitStatus) {
        self.shared.status.store(status.code(), Ordering::Relaxed);
        self.shared.running.store(false, Ordering::Relaxed);
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("app", &self.info().name)
            .field("running", &self.is_running())
            .field("status", &self.status())
            .finish()
    }
}

struct Slot {
    serial: u64,
    subsystem: Subsystem,
}

/// The engine state visible to application callbacks.
///
/// A subsystem keeps its slot for its whole life; freed slots are reused.
pub struct EngineContext {
    handle: EngineHandle,
    slots: [Option<Slot>; MAX_SUBSYSTEMS],
    next_serial: u64,
}

impl EngineContext {
    fn new(descriptor: AppDescriptor) -> Self {
        Self {
            handle: EngineHandle::new(descriptor),
            slots: std::array::from_fn(|_| None),
            next_serial: 0,
        }
    }

    /// A handle usable from other threads.
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// The application descriptor.
    pub fn descriptor(&self) -> &AppDescriptor {
        self.handle.descriptor()
    }

    /// The application identity.
    pub fn info(&self) -> &AppInfo {
        self.handle.info()
    }

    /// Whether the main loop is running.
    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// The current exit status.
    pub fn status(&self) -> i32 {
        self.handle.status()
    }

    /// Stops the main loop after its current iteration, reporting `status`.
    pub fn request_exit(&self, status: i32) {
        self.handle.request_exit(status);
    }

    /// Minimum seconds between main-loop ticks.
    pub fn min_dt(&self) -> f64 {
        self.handle.min_dt()
    }

    /// Changes the minimum seconds between main-loop ticks.
    pub fn set_min_dt(&self, dt: f64) {
        self.handle.set_min_dt(dt);
    }

    /// Registers a subsystem. Its thread is spawned blocked and only starts
    /// when the subsystem is launched, which [`Engine::exec`] does for every
    /// registered subsystem.
    pub fn create_subsystem(
        &mut self,
        name: &str,
        handler: Box<dyn SubsystemHandler>,
    ) -> Result<SubsystemId, EngineError> {
        if self.subsystem(name).is_some() {
            log::error!("Subsystem '{name}' already exists");
            return Err(EngineError::DuplicateSubsystem {
                name: name.to_string(),
            });
        }

        let Some(index) = self.slots.iter().position(Option::is_none) else {
            log::error!("Cannot create subsystem '{name}': all {MAX_SUBSYSTEMS} slots are taken");
            return Err(EngineError::SubsystemCapacity {
                max: MAX_SUBSYSTEMS,
            });
        };

        let subsystem = Subsystem::spawn(name, handler, self.handle())?;
        let serial = self.next_serial;
        self.next_serial += 1;
        self.slots[index] = Some(Slot { serial, subsystem });
        Ok(SubsystemId {
            slot: index,
            serial,
        })
    }

    /// Stops and joins subsystem `name`, freeing its slot. Returns `false` if
    /// no such subsystem exists.
    pub fn destroy_subsystem(&mut self, name: &str) -> bool {
        let Some(index) = self
            .slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|s| s.subsystem.name() == name))
        else {
            log::warn!("Cannot destroy subsystem '{name}': not found");
            return false;
        };

        if let Some(slot) = self.slots[index].take() {
            slot.subsystem.destroy();
        }
        true
    }

    /// Looks up a subsystem by name.
    pub fn subsystem(&self, name: &str) -> Option<&Subsystem> {
        self.subsystems().find(|s| s.name() == name)
    }

    /// Looks up a subsystem by id.
    pub fn subsystem_by_id(&self, id: SubsystemId) -> Option<&Subsystem> {
        self.slots
            .get(id.slot)?
            .as_ref()
            .filter(|slot| slot.serial == id.serial)
            .map(|slot| &slot.subsystem)
    }

    /// Number of registered subsystems.
    pub fn subsystem_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Every registered subsystem, in registration order.
    pub fn subsystems(&self) -> impl Iterator<Item = &Subsystem> {
        let mut live: Vec<&Slot> = self.slots.iter().flatten().collect();
        live.sort_by_key(|slot| slot.serial);
        live.into_iter().map(|slot| &slot.subsystem)
    }

    /// Destroys every subsystem, newest first.
    fn destroy_subsystems(&mut self) {
        let mut live: Vec<Slot> = self.slots.iter_mut().filter_map(Option::take).collect();
        live.sort_by_key(|slot| std::cmp::Reverse(slot.serial));
        for slot in live {
            slot.subsystem.destroy();
        }
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("handle", &self.handle)
            .field("subsystems", &self.subsystems().collect::<Vec<_>>())
            .finish()
    }
}

/// A live engine.
///
/// Dereferences to its [`EngineContext`] for state accessors and subsystem
/// management.
pub struct Engine {
    ctx: EngineContext,
    app: Box<dyn Application>,
    app_initialized: bool,
    // Released after the subsystems above are joined.
    _guard: InstanceGuard,
}

impl Engine {
    /// Creates the process's engine and runs the application's `init`.
    pub fn create(
        descriptor: AppDescriptor,
        app: Box<dyn Application>,
    ) -> Result<Self, EngineError> {
        if !descriptor.working_dir.is_dir() {
            log::error!(
                "Working directory {:?} of '{}' does not exist",
                descriptor.working_dir,
                descriptor.info.name
            );
            return Err(EngineError::MissingWorkingDirectory {
                path: descriptor.working_dir,
            });
        }

        let guard = InstanceGuard::acquire().ok_or_else(|| {
            log::error!("Cannot create '{}': an engine is already live", descriptor.info.name);
            EngineError::AlreadyLive
        })?;

        let mut engine = Self {
            ctx: EngineContext::new(descriptor),
            app,
            app_initialized: false,
            _guard: guard,
        };

        if !engine.app.init(&mut engine.ctx) {
            let name = engine.ctx.info().name.clone();
            log::error!("Application '{name}' failed to initialise");
            return Err(EngineError::AppInitFailed { name });
        }
        engine.app_initialized = true;

        log::info!(
            "Engine created for '{}' v{}",
            engine.ctx.info().display_name,
            engine.ctx.info().version
        );
        Ok(engine)
    }

    /// Finalises the application, joins every subsystem and releases the
    /// engine. Returns the final status; a still-running engine is reported as
    /// [`ExitStatus::ForcedStop`].
    pub fn destroy(mut self) -> i32 {
        self.teardown()
    }

    pub(crate) fn parts(&mut self) -> (&mut EngineContext, &mut dyn Application) {
        (&mut self.ctx, self.app.as_mut())
    }

    fn teardown(&mut self) -> i32 {
        if self.ctx.is_running() {
            log::warn!(
                "Engine '{}' destroyed while running; forcing stop",
                self.ctx.info().name
            );
            self.ctx.handle.stop(ExitStatus::ForcedStop);
        }

        if self.app_initialized {
            self.app.fini(&mut self.ctx);
            self.app_initialized = false;
        }
        self.ctx.destroy_subsystems();

        self.ctx.status()
    }
}

impl Deref for Engine {
    type Target = EngineContext;

    fn deref(&self) -> &EngineContext {
        &self.ctx
    }
}

impl DerefMut for Engine {
    fn deref_mut(&mut self) -> &mut EngineContext {
        &mut self.ctx
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("ctx", &self.ctx)
            .field("app_initialized", &self.app_initialized)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{app_descriptor, serial};
    use crate::subsystem::SubsystemContext;
    use std::sync::Barrier;

    struct Quiet;

    impl Application for Quiet {
        fn init(&mut self, _ctx: &mut EngineContext) -> bool {
            true
        }
        fn tick(&mut self, _ctx: &mut EngineContext, _dt: f64) {}
        fn fini(&mut self, _ctx: &mut EngineContext) {}
    }

    struct Idle;

    impl SubsystemHandler for Idle {
        fn tick(&mut self, _ctx: &mut SubsystemContext, _dt: f64) {}
    }

    #[test]
    fn only_one_engine_is_live() {
        let _serial = serial();
        let dir = tempfile::tempdir().unwrap();

        let first = Engine::create(app_descriptor(dir.path()), Box::new(Quiet)).unwrap();
        let second = Engine::create(app_descriptor(dir.path()), Box::new(Quiet));
        assert!(matches!(second, Err(EngineError::AlreadyLive)));

        assert_eq!(first.destroy(), 0);
        let third = Engine::create(app_descriptor(dir.path()), Box::new(Quiet));
        assert!(third.is_ok(), "guard must be released by destroy");
    }

    #[test]
    fn missing_working_directory_is_rejected() {
        let _serial = serial();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let err = Engine::create(app_descriptor(&missing), Box::new(Quiet)).unwrap_err();
        assert!(matches!(err, EngineError::MissingWorkingDirectory { path } if path == missing));
    }

    #[test]
    fn defaults_follow_the_descriptor() {
        let _serial = serial();
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::create(app_descriptor(dir.path()), Box::new(Quiet)).unwrap();

        assert_eq!(engine.info().name, "engine-test");
        assert_eq!(engine.descriptor().working_dir, dir.path());
        assert!(!engine.is_running());
        assert_eq!(engine.status(), 0);
        assert!((engine.min_dt() - DEFAULT_MIN_DT).abs() < f64::EPSILON);

        engine.set_min_dt(0.5);
        assert_eq!(engine.handle().min_dt(), 0.5);
    }

    #[test]
    fn subsystem_slots_are_bounded() {
        let _serial = serial();
        let dir = tempfile::tempdir().unwrap();
        let mut engine = Engine::create(app_descriptor(dir.path()), Box::new(Quiet)).unwrap();

        for i in 0..MAX_SUBSYSTEMS {
            let id = engine
                .create_subsystem(&format!("worker-{i}"), Box::new(Idle))
                .unwrap();
            assert_eq!(id.index(), i);
        }
        assert_eq!(engine.subsystem_count(), MAX_SUBSYSTEMS);

        let err = engine.create_subsystem("one-too-many", Box::new(Idle)).unwrap_err();
        assert!(matches!(err, EngineError::SubsystemCapacity { max: MAX_SUBSYSTEMS }));

        let err = engine.create_subsystem("worker-3", Box::new(Idle)).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateSubsystem { .. }));

        assert!(engine.destroy_subsystem("worker-3"));
        assert!(!engine.destroy_subsystem("worker-3"));
        let names: Vec<_> = engine.subsystems().map(Subsystem::name).collect();
        assert_eq!(names.len(), MAX_SUBSYSTEMS - 1);
        assert_eq!(names[3], "worker-4", "registration order is preserved");

        let late = engine.create_subsystem("late", Box::new(Idle)).unwrap();
        assert_eq!(late.index(), 3, "the freed slot is reused");
        assert_eq!(engine.subsystem("late").map(Subsystem::name), Some("late"));
        let names: Vec<_> = engine.subsystems().map(Subsystem::name).collect();
        assert_eq!(names.last().copied(), Some("late"));
    }

    #[test]
    fn ids_survive_destroying_other_subsystems() {
        let _serial = serial();
        let dir = tempfile::tempdir().unwrap();
        let mut engine = Engine::create(app_descriptor(dir.path()), Box::new(Quiet)).unwrap();

        let a = engine.create_subsystem("a", Box::new(Idle)).unwrap();
        let b = engine.create_subsystem("b", Box::new(Idle)).unwrap();
        let c = engine.create_subsystem("c", Box::new(Idle)).unwrap();

        assert!(engine.destroy_subsystem("a"));
        assert!(engine.subsystem_by_id(a).is_none());
        assert_eq!(engine.subsystem_by_id(b).map(Subsystem::name), Some("b"));
        assert_eq!(engine.subsystem_by_id(c).map(Subsystem::name), Some("c"));

        let d = engine.create_subsystem("d", Box::new(Idle)).unwrap();
        assert_eq!(d.index(), a.index());
        assert!(engine.subsystem_by_id(a).is_none(), "stale id must not resolve to 'd'");
        assert_eq!(engine.subsystem_by_id(d).map(Subsystem::name), Some("d"));
        assert_eq!(engine.destroy(), 0);
    }

    #[test]
    fn concurrent_creates_yield_one_engine() {
        let _serial = serial();
        let dir = tempfile::tempdir().unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let racers: Vec<_> = (0..2)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let descriptor = app_descriptor(dir.path());
                std::thread::spawn(move || {
                    barrier.wait();
                    // Keep the winner alive until both threads have tried.
                    let outcome = Engine::create(descriptor, Box::new(Quiet));
                    barrier.wait();
                    outcome.map(Engine::destroy).map_err(|e| e.to_string())
                })
            })
            .collect();

        let outcomes: Vec<_> = racers
            .into_iter()
            .map(|racer| racer.join().expect("racer panicked"))
            .collect();
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1, "{outcomes:?}");
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, Err(e) if e == &EngineError::AlreadyLive.to_string())));
    }
}
