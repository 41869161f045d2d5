// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Where evaluation failures go.

use std::fmt;
use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;
use understory_attribute::AttributeId;

use crate::error::EvalError;
use crate::feed::StyleId;
use crate::selector::StateGroupTypeExpression;

/// A deferred value that failed to evaluate.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalReport {
    /// The sheet holding the declaration.
    pub style: StyleId,
    /// The attribute being evaluated.
    pub attribute: AttributeId,
    /// The attribute's registered name.
    pub attribute_name: &'static str,
    /// The declaration's condition.
    pub expression: Option<StateGroupTypeExpression>,
    /// The value expression's source text.
    pub source: Arc<str>,
    /// What went wrong.
    pub error: EvalError,
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: `{}` = `{}`: {}",
            self.style, self.attribute_name, self.source, self.error
        )
    }
}

/// Receives evaluation failures.
///
/// Reports are delivered on the thread that evaluated the value, which for
/// animation ticks is the scheduler's thread.
pub trait Diagnostics: Send + Sync {
    /// Handles one failure.
    fn report(&self, report: &EvalReport);
}

/// Forwards reports to `log::warn!`.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&self, report: &EvalReport) {
        warn!("{report}");
    }
}

/// Buffers reports until they are taken.
#[derive(Debug, Default)]
pub struct CollectDiagnostics {
    reports: Mutex<Vec<EvalReport>>,
}

impl CollectDiagnostics {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the buffered reports.
    pub fn take(&self) -> Vec<EvalReport> {
        std::mem::take(&mut *self.reports.lock())
    }

    /// Returns the number of buffered reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl Diagnostics for CollectDiagnostics {
    fn report(&self, report: &EvalReport) {
        self.reports.lock().push(report.clone());
    }
}
