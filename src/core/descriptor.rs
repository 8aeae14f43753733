//! Type descriptors: the declared shape of a value crossing a callable boundary.
//!
//! Descriptors are plain values, created once when a callable is registered and
//! compared with [`compatible`] when edges are connected. Nothing on the hot call
//! path inspects them.

use crate::core::sync_impl::NodeValue;
use serde::Serialize;
use std::any::{type_name, TypeId};
use std::fmt;

/// How a descriptor refers to its underlying type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indirection {
    /// The value itself.
    Value,
    /// A pointer-like handle (`&T`, `Box<T>`, `Arc<T>`) to the value.
    Pointer,
    /// Accepts any non-void value.
    Any,
}

/// The declared type of a request or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
    indirection: Indirection,
}

impl TypeDescriptor {
    /// Descriptor for `T`. `TypeDescriptor::of::<()>()` is the void descriptor and
    /// `TypeDescriptor::of::<NodeValue>()` is [`any`](Self::any): a raw JSON value slot
    /// takes whatever it is given.
    pub fn of<T: ?Sized + 'static>() -> Self {
        if TypeId::of::<T>() == TypeId::of::<NodeValue>() {
            return Self::any();
        }
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            indirection: Indirection::Value,
        }
    }

    /// Descriptor for a pointer-like handle to `T`.
    pub fn pointer<T: ?Sized + 'static>() -> Self {
        if TypeId::of::<T>() == TypeId::of::<NodeValue>() {
            return Self::any();
        }
        Self {
            indirection: Indirection::Pointer,
            ..Self::of::<T>()
        }
    }

    /// The descriptor for callables with no request or no response.
    pub fn void() -> Self {
        Self::of::<()>()
    }

    /// The open descriptor every non-void descriptor is assignable to.
    pub fn any() -> Self {
        Self {
            id: TypeId::of::<NodeValue>(),
            name: "any",
            indirection: Indirection::Any,
        }
    }

    /// Describes the type of `value`.
    pub fn describe<T: 'static>(_value: &T) -> Self {
        Self::of::<T>()
    }

    pub fn is_void(&self) -> bool {
        self.indirection == Indirection::Value && self.id == TypeId::of::<()>()
    }

    pub fn is_any(&self) -> bool {
        self.indirection == Indirection::Any
    }

    pub fn indirection(&self) -> Indirection {
        self.indirection
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.indirection {
            Indirection::Pointer => write!(f, "&{}", self.name),
            _ => write!(f, "{}", self.name),
        }
    }
}

impl Serialize for TypeDescriptor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Returns true when a value described by `a` may flow into a slot described by `b`
/// or the other way around.
///
/// A descriptor and its pointer form are compatible in either direction. The void
/// descriptor is compatible only with itself, and the `any` descriptor accepts every
/// non-void descriptor.
pub fn compatible(a: &TypeDescriptor, b: &TypeDescriptor) -> bool {
    if a.is_void() || b.is_void() {
        return a.is_void() && b.is_void();
    }
    if a.is_any() || b.is_any() {
        return true;
    }
    a.id == b.id
}

/// Whether a callable consumes a request and/or produces a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Signature {
    NoRequestNoResponse,
    NoRequestExistsResponse,
    ExistsRequestNoResponse,
    ExistsRequestExistsResponse,
}

impl Signature {
    pub fn classify(request: &TypeDescriptor, response: &TypeDescriptor) -> Self {
        match (request.is_void(), response.is_void()) {
            (true, true) => Signature::NoRequestNoResponse,
            (true, false) => Signature::NoRequestExistsResponse,
            (false, true) => Signature::ExistsRequestNoResponse,
            (false, false) => Signature::ExistsRequestExistsResponse,
        }
    }
}
