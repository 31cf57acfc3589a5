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

//! # Ember Core
//!
//! Leaf crate of the runtime core. It defines the contracts every other crate
//! builds on:
//!
//! * [`memory`]: the allocator capability and its per-thread scoped stack
//! * [`object`]: the object/class model used for plugin-provided types
//! * [`timer`]: `Stopwatch` and the fixed-timestep `Ticker`
//! * [`app`]: application identity and its JSON descriptor document

#![warn(missing_docs)]

pub mod app;
pub mod memory;
pub mod object;
pub mod timer;

pub use app::{AppDescriptor, AppInfo, DescriptorError, Version};
pub use memory::{current_allocator, Allocator, AllocatorRef, AllocatorScope};
pub use object::{
    object_create, object_create_in, object_destroy, AsObjectClass, ConstructObject, Object,
    ObjectBox, ObjectClass, TypeInfo,
};
pub use timer::{Stopwatch, Ticker};
