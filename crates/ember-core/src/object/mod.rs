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

//! The object/class model.
//!
//! A *class* describes one concrete type exported by a module: its identity and
//! memory layout ([`TypeInfo`]) plus the behaviour shared by every instance.
//! All classes implement the base trait [`ObjectClass`]; specialised class
//! families (sockets, draw groups, ...) are traits that declare `ObjectClass` as
//! a supertrait, so generic code can treat any of them uniformly through
//! [`AsObjectClass::as_object_class`].
//!
//! An *object* is a value produced by a class. It always knows the class that
//! built it ([`Object::class`]) and lives in an [`ObjectBox`] allocated through
//! the allocator capability. Classes live as long as the module exporting them;
//! nothing counts references to a class.

mod boxed;

pub use boxed::{object_create, object_create_in, object_destroy, ObjectBox};

use std::alloc::Layout;
use std::any::Any;
use std::fmt;

/// Identity and memory layout of a concrete object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    type_name: &'static str,
    layout: Layout,
}

impl TypeInfo {
    /// Describes a type by name and layout.
    pub const fn new(type_name: &'static str, layout: Layout) -> Self {
        Self { type_name, layout }
    }

    /// Describes `T` under the given name.
    pub const fn of<T>(type_name: &'static str) -> Self {
        Self::new(type_name, Layout::new::<T>())
    }

    /// The textual type identifier.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Size of an instance in bytes.
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Alignment of an instance in bytes.
    pub fn alignment(&self) -> usize {
        self.layout.align()
    }

    /// The full layout.
    pub fn layout(&self) -> Layout {
        self.layout
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (size {}, align {})",
            self.type_name,
            self.size(),
            self.alignment()
        )
    }
}

/// Upcast from any class family to the base class trait.
///
/// Implemented for every sized [`ObjectClass`]; callers holding a `&dyn Derived`
/// use it to reach the base behaviour.
pub trait AsObjectClass {
    /// Returns `self` as the base class trait object.
    fn as_object_class(&self) -> &dyn ObjectClass;
}

impl<T: ObjectClass> AsObjectClass for T {
    fn as_object_class(&self) -> &dyn ObjectClass {
        self
    }
}

/// The base class record shared by every exported type.
pub trait ObjectClass: AsObjectClass + Send + Sync + 'static {
    /// Identity and layout of the objects this class constructs.
    fn info(&self) -> &TypeInfo;

    /// Allows downcasting to the concrete class type.
    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectClass")
            .field("info", self.info())
            .finish()
    }
}

/// A class that can build instances from a typed configuration value.
///
/// Each concrete class names its own `Config`, replacing untyped argument lists.
pub trait ConstructObject: ObjectClass {
    /// What the constructor needs.
    type Config;
    /// The object type produced; its layout must match [`ObjectClass::info`].
    type Object: Object;

    /// Builds a new instance, or returns `None` when the configuration is rejected.
    fn construct(&'static self, config: Self::Config) -> Option<Self::Object>;
}

/// A value built by a class.
pub trait Object: Send + 'static {
    /// The class that constructed this object.
    fn class(&self) -> &'static dyn ObjectClass;

    /// Allows downcasting to the concrete object type.
    fn as_any(&self) -> &dyn Any;

    /// Allows mutable downcasting to the concrete object type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
