// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Attribute identification types.
//!
//! This module provides [`AttributeId`] for runtime identification and
//! [`Attribute<T>`] for typed keys.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

/// A runtime attribute identifier.
///
/// A compact (u16) handle that identifies an attribute within an
/// [`AttributeRegistry`](crate::AttributeRegistry).
///
/// ```rust
/// use understory_attribute::AttributeId;
///
/// let id = AttributeId::new(7);
/// assert_eq!(id.index(), 7);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeId(u16);

impl AttributeId {
    /// Creates an attribute ID from the given index.
    ///
    /// This is typically called by [`AttributeRegistry::register`](crate::AttributeRegistry::register)
    /// rather than directly.
    #[must_use]
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the underlying index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AttributeId").field(&self.0).finish()
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A typed attribute key.
///
/// Wraps an [`AttributeId`] with the attribute's declared value type so that
/// typed reads and writes are checked at compile time. The handle is `Copy`
/// and the same size as the ID.
pub struct Attribute<T> {
    id: AttributeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Attribute<T> {
    /// Creates a typed attribute from an ID.
    ///
    /// The caller must make sure `id` was registered with value type `T`;
    /// typed reads of a mismatched handle return `None`.
    #[must_use]
    #[inline]
    pub const fn from_id(id: AttributeId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Returns the underlying ID.
    #[must_use]
    #[inline]
    pub const fn id(self) -> AttributeId {
        self.id
    }
}

impl<T> Copy for Attribute<T> {}

impl<T> Clone for Attribute<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Attribute<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Attribute<T> {}

impl<T> Hash for Attribute<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> From<Attribute<T>> for AttributeId {
    #[inline]
    fn from(attribute: Attribute<T>) -> Self {
        attribute.id
    }
}

impl<T> fmt::Debug for Attribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("id", &self.id)
            .field("type", &core::any::type_name::<T>())
            .finish()
    }
}
