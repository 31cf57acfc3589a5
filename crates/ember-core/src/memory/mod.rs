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

//! The allocator capability.
//!
//! Every object of the runtime core is allocated through an [`Allocator`]. The
//! capability is handed around as an [`AllocatorRef`], a `'static` reference that
//! is never owned by the memory it produced. Allocators are treated as immutable
//! once published, so the same reference is shared across threads without any
//! locking discipline.
//!
//! The allocator used by a call is resolved in this order:
//! 1. an explicit per-call allocator (the `*_in` functions),
//! 2. the top of the calling thread's scoped stack (see [`push_allocator`] and
//!    [`AllocatorScope`]),
//! 3. the process-wide [`SYSTEM`] allocator.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::ptr::NonNull;

mod tracking;

pub use tracking::{MemoryStats, TrackingAllocator};

/// A source of raw memory.
///
/// Implementations only ever see layouts with a non-zero size; zero-sized
/// requests are satisfied by the caller without touching the allocator.
pub trait Allocator: Send + Sync {
    /// Allocates a block matching `layout`, or returns `None` when exhausted.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate`](Allocator::allocate) on this
    /// same allocator with the same `layout`, and must not have been freed yet.
    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout);

    /// A short label used in log messages.
    fn label(&self) -> &str {
        "allocator"
    }
}

/// A shared, immutable reference to an allocator capability.
pub type AllocatorRef = &'static dyn Allocator;

/// The operating system allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(layout.size() != 0);
        NonNull::new(unsafe { System.alloc(layout) })
    }

    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { System.dealloc(ptr.as_ptr(), layout) };
    }

    fn label(&self) -> &str {
        "system"
    }
}

/// The process-wide default allocator.
pub static SYSTEM: SystemAllocator = SystemAllocator;

thread_local! {
    static ALLOCATOR_STACK: RefCell<Vec<AllocatorRef>> = const { RefCell::new(Vec::new()) };
}

/// Returns the allocator active on the calling thread.
pub fn current_allocator() -> AllocatorRef {
    ALLOCATOR_STACK
        .with(|stack| stack.borrow().last().copied())
        .unwrap_or(&SYSTEM)
}

/// Makes `allocator` the active allocator of the calling thread until it is popped.
pub fn push_allocator(allocator: AllocatorRef) {
    log::trace!("Pushing allocator '{}'", allocator.label());
    ALLOCATOR_STACK.with(|stack| stack.borrow_mut().push(allocator));
}

/// Removes the allocator pushed last on the calling thread.
///
/// Returns `None` when only the process default is active.
pub fn pop_allocator() -> Option<AllocatorRef> {
    let popped = ALLOCATOR_STACK.with(|stack| stack.borrow_mut().pop());
    if popped.is_none() {
        log::warn!("pop_allocator called with an empty allocator stack");
    }
    popped
}

/// Number of allocators currently pushed on the calling thread.
pub fn allocator_depth() -> usize {
    ALLOCATOR_STACK.with(|stack| stack.borrow().len())
}

/// Pushes an allocator for the lifetime of the guard.
///
/// The guard is tied to the thread that created it.
#[must_use = "the allocator is popped as soon as the scope is dropped"]
pub struct AllocatorScope {
    depth: usize,
    _thread_bound: PhantomData<*const ()>,
}

impl AllocatorScope {
    /// Pushes `allocator` and returns the guard that pops it.
    pub fn enter(allocator: AllocatorRef) -> Self {
        push_allocator(allocator);
        Self {
            depth: allocator_depth(),
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for AllocatorScope {
    fn drop(&mut self) {
        ALLOCATOR_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.len() != self.depth {
                log::warn!(
                    "Allocator stack depth is {} while closing a scope opened at depth {}",
                    stack.len(),
                    self.depth
                );
            }
            stack.truncate(self.depth.saturating_sub(1));
        });
    }
}
