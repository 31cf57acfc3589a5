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

//! An [`Allocator`] wrapper that counts what flows through it.

use super::{Allocator, SystemAllocator};
use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Wraps another allocator and keeps per-instance usage counters.
///
/// Unlike a `#[global_allocator]`, the counters live in the instance, so two
/// trackers pushed on different threads report independently.
///
/// ```rust
/// use ember_core::memory::{SystemAllocator, TrackingAllocator};
///
/// static TRACKED: TrackingAllocator = TrackingAllocator::new(SystemAllocator);
/// assert_eq!(TRACKED.stats().current_bytes, 0);
/// ```
#[derive(Debug, Default)]
pub struct TrackingAllocator<A = SystemAllocator> {
    inner: A,
    current_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
    allocations: AtomicU64,
    deallocations: AtomicU64,
    failed_allocations: AtomicU64,
    bytes_allocated_lifetime: AtomicU64,
    bytes_deallocated_lifetime: AtomicU64,
}

impl<A> TrackingAllocator<A> {
    /// Creates a tracker around `inner` with all counters at zero.
    pub const fn new(inner: A) -> Self {
        Self {
            inner,
            current_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
            allocations: AtomicU64::new(0),
            deallocations: AtomicU64::new(0),
            failed_allocations: AtomicU64::new(0),
            bytes_allocated_lifetime: AtomicU64::new(0),
            bytes_deallocated_lifetime: AtomicU64::new(0),
        }
    }

    /// Takes a snapshot of the counters and computes the derived metrics.
    pub fn stats(&self) -> MemoryStats {
        let mut stats = MemoryStats {
            current_bytes: self.current_bytes.load(Ordering::Relaxed),
            peak_bytes: self.peak_bytes.load(Ordering::Relaxed),
            total_allocations: self.allocations.load(Ordering::Relaxed),
            total_deallocations: self.deallocations.load(Ordering::Relaxed),
            failed_allocations: self.failed_allocations.load(Ordering::Relaxed),
            bytes_allocated_lifetime: self.bytes_allocated_lifetime.load(Ordering::Relaxed),
            bytes_deallocated_lifetime: self.bytes_deallocated_lifetime.load(Ordering::Relaxed),
            ..Default::default()
        };
        stats.calculate_derived_metrics();
        stats
    }
}

impl<A: Allocator> Allocator for TrackingAllocator<A> {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        let Some(ptr) = self.inner.allocate(layout) else {
            self.failed_allocations.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let size = layout.size();
        let result =
            self.current_bytes
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                    current.checked_add(size)
                });

        match result {
            Ok(previous) => {
                self.peak_bytes.fetch_max(previous + size, Ordering::Relaxed);
                self.allocations.fetch_add(1, Ordering::Relaxed);
                self.bytes_allocated_lifetime
                    .fetch_add(size as u64, Ordering::Relaxed);
            }
            Err(_) => log::error!("Memory tracking counter overflowed during allocate! Size: {size}"),
        }
        Some(ptr)
    }

    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) {
        let size = layout.size();
        let result =
            self.current_bytes
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                    current.checked_sub(size)
                });

        if result.is_err() {
            log::error!("Memory tracking counter underflowed during free! Size: {size}");
        } else {
            self.deallocations.fetch_add(1, Ordering::Relaxed);
            self.bytes_deallocated_lifetime
                .fetch_add(size as u64, Ordering::Relaxed);
        }

        unsafe { self.inner.free(ptr, layout) };
    }

    fn label(&self) -> &str {
        "tracking"
    }
}

/// A snapshot of a [`TrackingAllocator`]'s counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoryStats {
    /// Bytes currently handed out.
    pub current_bytes: usize,
    /// Highest value `current_bytes` ever reached.
    pub peak_bytes: usize,
    /// Successful allocation calls.
    pub total_allocations: u64,
    /// Free calls.
    pub total_deallocations: u64,
    /// Allocation calls the inner allocator could not satisfy.
    pub failed_allocations: u64,
    /// `total_allocations - total_deallocations`.
    pub live_allocations: i64,
    /// Cumulative bytes ever allocated.
    pub bytes_allocated_lifetime: u64,
    /// Cumulative bytes ever freed.
    pub bytes_deallocated_lifetime: u64,
    /// `bytes_allocated_lifetime / total_allocations`.
    pub average_allocation_size: f64,
}

impl MemoryStats {
    /// Populates the derived metrics from the raw counters.
    pub fn calculate_derived_metrics(&mut self) {
        self.live_allocations = self.total_allocations as i64 - self.total_deallocations as i64;
        if self.total_allocations > 0 {
            self.average_allocation_size =
                self.bytes_allocated_lifetime as f64 / self.total_allocations as f64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Exhausted;

    impl Allocator for Exhausted {
        fn allocate(&self, _layout: Layout) -> Option<NonNull<u8>> {
            None
        }

        unsafe fn free(&self, _ptr: NonNull<u8>, _layout: Layout) {
            unreachable!("nothing was ever allocated");
        }
    }

    #[test]
    fn counts_allocate_and_free() {
        let tracker = TrackingAllocator::new(SystemAllocator);
        let layout = Layout::from_size_align(64, 16).unwrap();

        let a = tracker.allocate(layout).expect("allocation should succeed");
        let b = tracker.allocate(layout).expect("allocation should succeed");
        assert_eq!(a.as_ptr() as usize % 16, 0);

        let stats = tracker.stats();
        assert_eq!(stats.current_bytes, 128);
        assert_eq!(stats.peak_bytes, 128);
        assert_eq!(stats.total_allocations, 2);
        assert_eq!(stats.live_allocations, 2);

        unsafe {
            tracker.free(a, layout);
            tracker.free(b, layout);
        }

        let stats = tracker.stats();
        assert_eq!(stats.current_bytes, 0);
        assert_eq!(stats.peak_bytes, 128, "peak survives frees");
        assert_eq!(stats.total_deallocations, 2);
        assert_eq!(stats.bytes_deallocated_lifetime, 128);
        assert_eq!(stats.average_allocation_size, 64.0);
    }

    #[test]
    fn failed_allocations_are_counted() {
        let tracker = TrackingAllocator::new(Exhausted);
        let layout = Layout::new::<u64>();
        assert!(tracker.allocate(layout).is_none());

        let stats = tracker.stats();
        assert_eq!(stats.failed_allocations, 1);
        assert_eq!(stats.total_allocations, 0);
        assert_eq!(stats.current_bytes, 0);
    }
}
