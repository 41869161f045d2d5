// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! [`StyleError`] is returned synchronously by mutating calls; a failed call
//! never leaves a partial change behind. [`EvalError`] describes a deferred
//! value that could not be evaluated; it is reported to
//! [`Diagnostics`](crate::Diagnostics) rather than propagated through change
//! notifications.

use std::sync::Arc;

use thiserror::Error;
use understory_attribute::{AttributeId, CheckError};

use crate::feed::StyleId;

/// Errors returned by style mutations.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum StyleError {
    /// The style has been sealed and no longer accepts mutations.
    #[error("style {0} is sealed")]
    Sealed(StyleId),
    /// A value did not satisfy the attribute's declared type or validator.
    #[error("rejected value for attribute `{name}`: {source}")]
    Invalid {
        /// The attribute written to.
        attribute: AttributeId,
        /// The attribute's registered name.
        name: &'static str,
        /// Why the value was rejected.
        #[source]
        source: CheckError,
    },
    /// A style cannot depend on itself.
    #[error("style {0} cannot depend on itself")]
    SelfDependency(StyleId),
    /// The dependency is already in the list.
    #[error("style {0} is already a dependency")]
    DuplicateDependency(StyleId),
    /// Adding the dependency would close a cycle.
    #[error("depending on style {0} would create a cycle")]
    DependencyCycle(StyleId),
    /// A dependency index was out of range.
    #[error("dependency index {index} out of range for {len} dependencies")]
    DependencyIndex {
        /// The requested index.
        index: usize,
        /// The number of dependencies.
        len: usize,
    },
    /// An animated variable segment moves by less than its step size.
    #[error("segment {index} of variable `{variable}` is malformed: {reason}")]
    MalformedSegment {
        /// The variable name.
        variable: Arc<str>,
        /// Index of the offending segment.
        index: usize,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// A variable with the same name is already registered.
    #[error("variable `{0}` is already defined")]
    DuplicateVariable(Arc<str>),
    /// No variable with this name is registered.
    #[error("variable `{0}` is not defined")]
    UnknownVariable(Arc<str>),
}

/// Errors raised while evaluating a deferred (animated) value.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EvalError {
    /// The value expression could not be parsed.
    #[error("syntax error at byte {position}: {message}")]
    Parse {
        /// Byte offset into the source text.
        position: usize,
        /// What the parser expected.
        message: &'static str,
    },
    /// The expression references a variable that is not bound.
    #[error("variable `{0}` is not bound")]
    MissingVariable(Arc<str>),
    /// A function was called with the wrong number of arguments.
    #[error("`{name}` takes {expected} arguments")]
    Arity {
        /// The function name.
        name: &'static str,
        /// Expected argument count.
        expected: &'static str,
    },
    /// The expression evaluated to NaN or an infinity.
    #[error("expression did not evaluate to a finite number")]
    NotFinite,
    /// The number cannot be represented as the attribute's type.
    #[error("{value} cannot be represented as `{type_name}`")]
    Cast {
        /// The evaluated number.
        value: f64,
        /// The attribute's value type.
        type_name: &'static str,
    },
    /// The evaluated value was rejected by the attribute.
    #[error("evaluated value rejected: {0}")]
    Rejected(CheckError),
}
