// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Attribute registry.
//!
//! This module provides [`AttributeRegistry`] for registering attributes and
//! checking values against their declared type and validator.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::{Any, TypeId};
use hashbrown::HashMap;

use crate::error::{CheckError, ValidationError};
use crate::id::{Attribute, AttributeId};
use crate::metadata::AttributeMetadata;
use crate::value::ErasedValue;

/// A registration entry for an attribute.
pub struct AttributeRegistration {
    name: &'static str,
    type_id: TypeId,
    type_name: &'static str,
    metadata: Box<dyn ErasedMetadata>,
}

impl AttributeRegistration {
    /// Returns the attribute name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the [`TypeId`] of the declared value type.
    #[must_use]
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the declared value type's name.
    #[must_use]
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Checks an erased value against the declared type and validator.
    pub fn check(&self, value: &ErasedValue) -> Result<(), CheckError> {
        if value.type_id() != self.type_id {
            return Err(CheckError::TypeMismatch {
                expected: self.type_name,
                found: value.type_name(),
            });
        }
        self.metadata.validate_erased(value).map_err(CheckError::from)
    }

    /// Returns the default value, erased.
    #[must_use]
    pub fn default_erased(&self) -> ErasedValue {
        self.metadata.default_erased()
    }
}

impl core::fmt::Debug for AttributeRegistration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AttributeRegistration")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// The registry of attributes known to a style engine.
///
/// Attributes are registered once, up front. The registry is an explicit
/// object rather than global state: share it (typically in an `Arc`) with the
/// styles that need to validate writes or fall back to defaults.
///
/// ```rust
/// use understory_attribute::{AttributeMetadataBuilder, AttributeRegistry};
///
/// let mut registry = AttributeRegistry::new();
/// let width = registry.register("Width", AttributeMetadataBuilder::new(0.0_f64).build());
///
/// assert_eq!(registry.by_name("Width"), Some(width.id()));
/// assert_eq!(registry.name(width.id()), Some("Width"));
/// ```
#[derive(Default)]
pub struct AttributeRegistry {
    attributes: Vec<AttributeRegistration>,
    by_name: HashMap<&'static str, AttributeId>,
}

impl AttributeRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new attribute with the given name and metadata.
    ///
    /// # Panics
    ///
    /// Panics if an attribute with the same name is already registered,
    /// or if more than 65,535 attributes are registered.
    pub fn register<T: Clone + Send + Sync + 'static>(
        &mut self,
        name: &'static str,
        metadata: AttributeMetadata<T>,
    ) -> Attribute<T> {
        assert!(
            !self.by_name.contains_key(name),
            "Attribute '{name}' is already registered"
        );
        assert!(
            self.attributes.len() < u16::MAX as usize,
            "Too many attributes registered (max {})",
            u16::MAX
        );

        #[expect(clippy::cast_possible_truncation, reason = "checked above")]
        let id = AttributeId::new(self.attributes.len() as u16);

        self.attributes.push(AttributeRegistration {
            name,
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            metadata: Box::new(metadata),
        });
        self.by_name.insert(name, id);

        Attribute::from_id(id)
    }

    /// Returns the number of registered attributes.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns `true` if no attributes are registered.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<AttributeId> {
        self.by_name.get(name).copied()
    }

    /// Returns the name of an attribute.
    #[must_use]
    pub fn name(&self, id: AttributeId) -> Option<&'static str> {
        self.get(id).map(|r| r.name)
    }

    /// Returns the registration for an attribute.
    #[must_use]
    pub fn get(&self, id: AttributeId) -> Option<&AttributeRegistration> {
        self.attributes.get(id.index() as usize)
    }

    /// Returns the metadata for a typed attribute.
    ///
    /// Returns `None` if the attribute is not registered or the type doesn't match.
    #[must_use]
    pub fn get_metadata<T: Clone + 'static>(
        &self,
        attribute: Attribute<T>,
    ) -> Option<&AttributeMetadata<T>> {
        self.get(attribute.id())
            .and_then(|r| r.metadata.as_any().downcast_ref())
    }

    /// Returns the default value of a typed attribute.
    #[must_use]
    pub fn default_value<T: Clone + 'static>(&self, attribute: Attribute<T>) -> Option<&T> {
        self.get_metadata(attribute)
            .map(AttributeMetadata::default_value)
    }

    /// Validates a typed value for an attribute.
    pub fn validate<T: Clone + 'static>(
        &self,
        attribute: Attribute<T>,
        value: &T,
    ) -> Result<(), CheckError> {
        let registration = self
            .get(attribute.id())
            .ok_or(CheckError::Unknown(attribute.id()))?;
        let metadata = registration
            .metadata
            .as_any()
            .downcast_ref::<AttributeMetadata<T>>()
            .ok_or(CheckError::TypeMismatch {
                expected: registration.type_name,
                found: core::any::type_name::<T>(),
            })?;
        metadata.validate(value).map_err(CheckError::from)
    }

    /// Checks an erased value against an attribute's type and validator.
    pub fn check(&self, id: AttributeId, value: &ErasedValue) -> Result<(), CheckError> {
        self.get(id).ok_or(CheckError::Unknown(id))?.check(value)
    }

    /// Returns an attribute's default value, erased.
    #[must_use]
    pub fn default_erased(&self, id: AttributeId) -> Option<ErasedValue> {
        self.get(id).map(AttributeRegistration::default_erased)
    }

    /// Returns an iterator over all registered attributes.
    pub fn iter(&self) -> impl Iterator<Item = (AttributeId, &AttributeRegistration)> {
        self.attributes.iter().enumerate().map(|(i, r)| {
            #[expect(clippy::cast_possible_truncation, reason = "index < len < u16::MAX")]
            (AttributeId::new(i as u16), r)
        })
    }
}

impl core::fmt::Debug for AttributeRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AttributeRegistry")
            .field("count", &self.attributes.len())
            .field("attributes", &self.by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Type-erased metadata for heterogeneous storage.
trait ErasedMetadata: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn validate_erased(&self, value: &ErasedValue) -> Result<(), ValidationError>;
    fn default_erased(&self) -> ErasedValue;
}

impl<T: Clone + Send + Sync + 'static> ErasedMetadata for AttributeMetadata<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn validate_erased(&self, value: &ErasedValue) -> Result<(), ValidationError> {
        match value.downcast_ref::<T>() {
            Some(value) => self.validate(value),
            None => Err(ValidationError::new("value type does not match")),
        }
    }

    fn default_erased(&self) -> ErasedValue {
        ErasedValue::new(self.default_value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::AttributeMetadataBuilder;
    use alloc::{format, vec, vec::Vec};

    fn bounded(max: f64) -> AttributeMetadata<f64> {
        AttributeMetadataBuilder::new(0.0)
            .validate(move |v| {
                if *v <= max {
                    Ok(())
                } else {
                    Err(ValidationError::new("too large"))
                }
            })
            .build()
    }

    #[test]
    fn registry_register() {
        let mut registry = AttributeRegistry::new();
        assert!(registry.is_empty());
        let width = registry.register("Width", bounded(10.0));
        assert_eq!(registry.len(), 1);
        assert_eq!(width.id().index(), 0);
        assert_eq!(registry.get(width.id()).map(|r| r.type_name()), Some("f64"));
    }

    #[test]
    fn registry_typed_validation() {
        let mut registry = AttributeRegistry::new();
        let width = registry.register("Width", bounded(10.0));
        assert!(registry.validate(width, &5.0).is_ok());
        assert_eq!(
            registry.validate(width, &11.0),
            Err(CheckError::Rejected(ValidationError::new("too large")))
        );
    }

    #[test]
    fn registry_erased_check() {
        let mut registry = AttributeRegistry::new();
        let width = registry.register("Width", bounded(10.0));

        assert!(registry.check(width.id(), &ErasedValue::new(3.0_f64)).is_ok());
        assert!(matches!(
            registry.check(width.id(), &ErasedValue::new(3_i32)),
            Err(CheckError::TypeMismatch { expected: "f64", found: "i32" })
        ));
        assert!(matches!(
            registry.check(width.id(), &ErasedValue::new(30.0_f64)),
            Err(CheckError::Rejected(_))
        ));
        assert!(matches!(
            registry.check(AttributeId::new(9), &ErasedValue::new(1.0_f64)),
            Err(CheckError::Unknown(_))
        ));
    }

    #[test]
    fn registry_defaults() {
        let mut registry = AttributeRegistry::new();
        let name = registry.register(
            "Label",
            AttributeMetadata::new(alloc::string::String::from("none")),
        );
        assert_eq!(registry.default_value(name).map(|s| s.as_str()), Some("none"));
        let erased = registry.default_erased(name.id()).unwrap();
        assert!(erased.is::<alloc::string::String>());
    }

    #[test]
    fn registry_iter_and_names() {
        let mut registry = AttributeRegistry::new();
        registry.register("Width", AttributeMetadata::new(0.0_f64));
        registry.register("Height", AttributeMetadata::new(0.0_f64));

        let names: Vec<_> = registry.iter().map(|(_, r)| r.name()).collect();
        assert_eq!(names, vec!["Width", "Height"]);
        assert_eq!(registry.by_name("Height").map(AttributeId::index), Some(1));
        assert_eq!(registry.name(AttributeId::new(5)), None);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn registry_duplicate_name() {
        let mut registry = AttributeRegistry::new();
        registry.register("Width", AttributeMetadata::new(0.0_f64));
        registry.register("Width", AttributeMetadata::new(0.0_f64));
    }

    #[test]
    fn registry_debug() {
        let mut registry = AttributeRegistry::new();
        registry.register("Width", AttributeMetadata::new(0.0_f64));
        let debug = format!("{registry:?}");
        assert!(debug.contains("AttributeRegistry"));
        assert!(debug.contains("Width"));
    }
}
