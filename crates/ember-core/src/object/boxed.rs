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

//! Heap storage for objects, allocated through the allocator capability.

use super::{ConstructObject, Object};
use crate::memory::{current_allocator, AllocatorRef};
use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

/// An exclusively owned object living in memory obtained from an [`AllocatorRef`].
///
/// Dropping the box destroys the object and returns its memory to the allocator
/// that produced it, whichever allocator is active at that point.
pub struct ObjectBox<T: ?Sized> {
    ptr: NonNull<T>,
    layout: Layout,
    allocator: AllocatorRef,
    _owns: PhantomData<T>,
}

// The box owns its `T` exclusively, and the allocator reference is `Send + Sync`.
unsafe impl<T: ?Sized + Send> Send for ObjectBox<T> {}
unsafe impl<T: ?Sized + Sync> Sync for ObjectBox<T> {}

impl<T: ?Sized> ObjectBox<T> {
    /// The layout of the allocation backing this object.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// The allocator the object will be returned to.
    pub fn allocator(&self) -> AllocatorRef {
        self.allocator
    }
}

impl<T: Object> ObjectBox<T> {
    /// Erases the concrete type, keeping the same allocation.
    pub fn into_object(self) -> ObjectBox<dyn Object> {
        let this = ManuallyDrop::new(self);
        ObjectBox {
            ptr: this.ptr,
            layout: this.layout,
            allocator: this.allocator,
            _owns: PhantomData,
        }
    }
}

impl ObjectBox<dyn Object> {
    /// Returns `true` if the object is a `T`.
    pub fn is<T: Object>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrows the object as a `T`, if it is one.
    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably borrows the object as a `T`, if it is one.
    pub fn downcast_mut<T: Object>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

impl<T: ?Sized> Deref for ObjectBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ?Sized> DerefMut for ObjectBox<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: ?Sized> Drop for ObjectBox<T> {
    fn drop(&mut self) {
        unsafe {
            ptr::drop_in_place(self.ptr.as_ptr());
            if self.layout.size() != 0 {
                self.allocator.free(self.ptr.cast::<u8>(), self.layout);
            }
        }
    }
}

impl<T: ?Sized> fmt::Debug for ObjectBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBox")
            .field("ptr", &self.ptr.cast::<u8>())
            .field("layout", &self.layout)
            .field("allocator", &self.allocator.label())
            .finish()
    }
}

/// Creates an object of `class` using the calling thread's active allocator.
pub fn object_create<C: ConstructObject>(
    class: &'static C,
    config: C::Config,
) -> Option<ObjectBox<C::Object>> {
    object_create_in(current_allocator(), class, config)
}

/// Creates an object of `class` in memory obtained from `allocator`.
///
/// Memory is reserved according to the class [`TypeInfo`](super::TypeInfo)
/// before the constructor runs, and released again if the constructor rejects
/// its configuration. Returns `None` on layout mismatch, exhaustion, or
/// constructor failure.
pub fn object_create_in<C: ConstructObject>(
    allocator: AllocatorRef,
    class: &'static C,
    config: C::Config,
) -> Option<ObjectBox<C::Object>> {
    let info = *class.info();
    let layout = Layout::new::<C::Object>();
    if info.layout() != layout {
        log::error!(
            "Class '{}' declares {:?} but constructs {:?}; refusing to allocate",
            info.type_name(),
            info.layout(),
            layout
        );
        return None;
    }

    let memory = if layout.size() == 0 {
        NonNull::<C::Object>::dangling()
    } else {
        match allocator.allocate(layout) {
            Some(memory) => memory.cast::<C::Object>(),
            None => {
                log::error!(
                    "Allocator '{}' could not provide {} bytes for '{}'",
                    allocator.label(),
                    layout.size(),
                    info.type_name()
                );
                return None;
            }
        }
    };

    let Some(value) = class.construct(config) else {
        log::warn!("Constructor of '{}' rejected its configuration", info.type_name());
        if layout.size() != 0 {
            unsafe { allocator.free(memory.cast::<u8>(), layout) };
        }
        return None;
    };

    unsafe { memory.as_ptr().write(value) };
    log::trace!("Created '{}' through '{}'", info.type_name(), allocator.label());

    Some(ObjectBox {
        ptr: memory,
        layout,
        allocator,
        _owns: PhantomData,
    })
}

/// Destroys an object and frees its memory. Never fails.
pub fn object_destroy<T: ?Sized>(object: ObjectBox<T>) {
    drop(object);
}
