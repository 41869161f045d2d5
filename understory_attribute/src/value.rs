// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type-erased attribute values.
//!
//! This module provides [`ErasedValue`], the storage form of declared values.

use alloc::sync::Arc;
use core::any::{Any, TypeId};
use core::fmt;

/// A type-erased, shareable attribute value.
///
/// Values are reference counted, so cloning an `ErasedValue` never clones the
/// underlying value, and they are `Send + Sync` so that style storage can be
/// read while another thread updates it.
///
/// ```rust
/// use understory_attribute::ErasedValue;
///
/// let value = ErasedValue::new(42_i32);
/// assert!(value.is::<i32>());
/// assert_eq!(value.downcast_ref::<i32>(), Some(&42));
/// assert_eq!(value.downcast_ref::<u8>(), None);
///
/// let shared = value.clone();
/// assert!(shared.ptr_eq(&value));
/// ```
#[derive(Clone)]
pub struct ErasedValue {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ErasedValue {
    /// Erases a concrete value.
    #[must_use]
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: core::any::type_name::<T>(),
        }
    }

    /// Returns the [`TypeId`] of the contained value.
    #[must_use]
    #[inline]
    pub fn type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    /// Returns the type name of the contained value, for diagnostics.
    #[must_use]
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the contained value is of type `T`.
    #[must_use]
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Attempts to downcast to a reference of type `T`.
    #[must_use]
    #[inline]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Returns `true` if both handles share the same allocation.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ErasedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedValue")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::String;

    #[test]
    fn erased_value_string() {
        let value = ErasedValue::new(String::from("hello"));
        assert!(value.is::<String>());
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("hello"));
        assert_eq!(value.type_id(), TypeId::of::<String>());
    }

    #[test]
    fn erased_value_clone_shares() {
        let a = ErasedValue::new(1.5_f32);
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&ErasedValue::new(1.5_f32)));
    }

    #[test]
    fn erased_value_debug() {
        let debug = format!("{:?}", ErasedValue::new(7_u8));
        assert!(debug.contains("ErasedValue"));
        assert!(debug.contains("u8"));
    }
}
