// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Attribute: attribute identity for conditional styling.
//!
//! Styles declare values for *attributes*. This crate defines what an
//! attribute is, independently of any style engine:
//!
//! - [`Attribute<T>`]: a compact, typed handle (a [`AttributeId`] plus a
//!   phantom value type).
//! - [`AttributeMetadata<T>`]: the default value and an optional validator.
//! - [`AttributeRegistry`]: an explicit registry object that owns attribute
//!   names and metadata. There is no global registry; the embedder creates
//!   one and shares it with whatever needs to resolve attributes.
//! - [`ErasedValue`]: a cheaply clonable, thread-safe, type-erased value
//!   used by heterogeneous per-attribute storage.
//!
//! ## Quick Start
//!
//! ```rust
//! use understory_attribute::{AttributeMetadataBuilder, AttributeRegistry, ErasedValue, ValidationError};
//!
//! let mut registry = AttributeRegistry::new();
//! let opacity = registry.register(
//!     "Opacity",
//!     AttributeMetadataBuilder::new(1.0_f64)
//!         .validate(|v| {
//!             if (0.0..=1.0).contains(v) {
//!                 Ok(())
//!             } else {
//!                 Err(ValidationError::new("opacity must be within 0..=1"))
//!             }
//!         })
//!         .build(),
//! );
//!
//! assert_eq!(registry.default_value(opacity), Some(&1.0));
//! assert!(registry.validate(opacity, &0.5).is_ok());
//! assert!(registry.validate(opacity, &2.0).is_err());
//!
//! // Erased values are checked against the declared type too.
//! assert!(registry.check(opacity.id(), &ErasedValue::new(0.25_f64)).is_ok());
//! assert!(registry.check(opacity.id(), &ErasedValue::new("half")).is_err());
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.

#![no_std]

extern crate alloc;

mod error;
mod id;
mod metadata;
mod registry;
mod value;

pub use error::{CheckError, ValidationError};
pub use id::{Attribute, AttributeId};
pub use metadata::{AttributeMetadata, AttributeMetadataBuilder, ValidateCallback};
pub use registry::{AttributeRegistration, AttributeRegistry};
pub use value::ErasedValue;
