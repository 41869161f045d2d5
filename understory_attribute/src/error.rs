// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Validation errors.

use alloc::borrow::Cow;
use core::fmt;

use crate::id::AttributeId;

/// A value was rejected by an attribute's validator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    reason: Cow<'static, str>,
}

impl ValidationError {
    /// Creates a validation error with a human-readable reason.
    #[must_use]
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns the reason the value was rejected.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl core::error::Error for ValidationError {}

/// Error returned when an erased value is checked against an attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckError {
    /// The attribute is not registered.
    Unknown(AttributeId),
    /// The value's type differs from the attribute's declared type.
    TypeMismatch {
        /// The declared type.
        expected: &'static str,
        /// The type of the offered value.
        found: &'static str,
    },
    /// The value has the right type but the validator rejected it.
    Rejected(ValidationError),
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(id) => write!(f, "attribute {id} is not registered"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected a value of type `{expected}`, found `{found}`")
            }
            Self::Rejected(err) => write!(f, "value rejected: {err}"),
        }
    }
}

impl core::error::Error for CheckError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Rejected(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for CheckError {
    fn from(err: ValidationError) -> Self {
        Self::Rejected(err)
    }
}
