// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Attribute metadata definitions.
//!
//! This module provides [`AttributeMetadata`] and [`AttributeMetadataBuilder`].

use alloc::boxed::Box;

use crate::error::ValidationError;

/// Callback deciding whether a value is acceptable for an attribute.
pub type ValidateCallback<T> = Box<dyn Fn(&T) -> Result<(), ValidationError> + Send + Sync>;

/// Metadata for an attribute: its default value and optional validator.
///
/// ```rust
/// use understory_attribute::{AttributeMetadataBuilder, ValidationError};
///
/// let metadata = AttributeMetadataBuilder::new(4_u32)
///     .validate(|v| if *v > 0 { Ok(()) } else { Err(ValidationError::new("must be positive")) })
///     .build();
///
/// assert_eq!(metadata.default_value(), &4);
/// assert!(metadata.validate(&0).is_err());
/// ```
pub struct AttributeMetadata<T: Clone + 'static> {
    default_value: T,
    validator: Option<ValidateCallback<T>>,
}

impl<T: Clone + 'static> AttributeMetadata<T> {
    /// Creates metadata with the given default value and no validator.
    #[must_use]
    pub fn new(default_value: T) -> Self {
        Self {
            default_value,
            validator: None,
        }
    }

    /// Returns a reference to the default value.
    #[must_use]
    #[inline]
    pub fn default_value(&self) -> &T {
        &self.default_value
    }

    /// Runs the validator, if any.
    #[inline]
    pub fn validate(&self, value: &T) -> Result<(), ValidationError> {
        match &self.validator {
            Some(validator) => validator(value),
            None => Ok(()),
        }
    }

    /// Returns whether a validator is set.
    #[must_use]
    #[inline]
    pub fn has_validator(&self) -> bool {
        self.validator.is_some()
    }
}

impl<T: Clone + core::fmt::Debug + 'static> core::fmt::Debug for AttributeMetadata<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AttributeMetadata")
            .field("default_value", &self.default_value)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// Builder for [`AttributeMetadata`].
pub struct AttributeMetadataBuilder<T: Clone + 'static> {
    default_value: T,
    validator: Option<ValidateCallback<T>>,
}

impl<T: Clone + core::fmt::Debug + 'static> core::fmt::Debug for AttributeMetadataBuilder<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AttributeMetadataBuilder")
            .field("default_value", &self.default_value)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

impl<T: Clone + 'static> AttributeMetadataBuilder<T> {
    /// Creates a new builder with the given default value.
    #[must_use]
    pub fn new(default_value: T) -> Self {
        Self {
            default_value,
            validator: None,
        }
    }

    /// Sets the validator run before a value is stored.
    ///
    /// A rejected value is never stored; the rejection is reported to the
    /// caller that attempted the write.
    #[must_use]
    pub fn validate<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validator = Some(Box::new(callback));
        self
    }

    /// Builds the [`AttributeMetadata`].
    #[must_use]
    pub fn build(self) -> AttributeMetadata<T> {
        AttributeMetadata {
            default_value: self.default_value,
            validator: self.validator,
        }
    }
}
