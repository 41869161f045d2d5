// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Piecewise-linear animated variables.

use std::sync::Arc;
use std::time::Duration;

use crate::error::StyleError;

/// One leg of an [`AnimatedVariable`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Segment {
    /// The value reached at the end of the segment.
    pub end: f64,
    /// Quantization step; `0.0` interpolates continuously.
    pub step: f64,
    /// How long the segment takes.
    pub duration: Duration,
}

impl Segment {
    /// A segment moving to `end` over `duration`, in increments of `step`.
    #[must_use]
    pub fn new(end: f64, step: f64, duration: Duration) -> Self {
        Self {
            end,
            step,
            duration,
        }
    }
}

/// A named number that moves through a sequence of [`Segment`]s over time.
///
/// ```rust
/// use std::time::Duration;
/// use understory_cascade::{AnimatedVariable, Segment};
///
/// let ms = Duration::from_millis;
/// let x = AnimatedVariable::new("x", 0.0, vec![Segment::new(10.0, 0.0, ms(1000))], false).unwrap();
/// assert_eq!(x.value_at(ms(0)), 0.0);
/// assert_eq!(x.value_at(ms(500)), 5.0);
/// assert_eq!(x.value_at(ms(1000)), 10.0);
/// assert_eq!(x.value_at(ms(1500)), 10.0);
///
/// let looping = x.clone().with_repeating(true);
/// assert_eq!(looping.value_at(ms(1500)), 5.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct AnimatedVariable {
    name: Arc<str>,
    start: f64,
    segments: Vec<Segment>,
    repeating: bool,
}

impl AnimatedVariable {
    /// Creates a variable starting at `start`.
    ///
    /// Fails if a segment has a negative or non-finite step, a non-finite
    /// end, or moves by less than its step.
    pub fn new(
        name: &str,
        start: f64,
        segments: Vec<Segment>,
        repeating: bool,
    ) -> Result<Self, StyleError> {
        let name: Arc<str> = Arc::from(name);
        let malformed = |index, reason| StyleError::MalformedSegment {
            variable: name.clone(),
            index,
            reason,
        };
        let mut from = start;
        for (index, segment) in segments.iter().enumerate() {
            if !segment.step.is_finite() || segment.step < 0.0 {
                return Err(malformed(index, "step must be finite and non-negative"));
            }
            if !segment.end.is_finite() {
                return Err(malformed(index, "end value must be finite"));
            }
            if (segment.end - from).abs() < segment.step {
                return Err(malformed(index, "moves by less than one step"));
            }
            from = segment.end;
        }
        Ok(Self {
            name,
            start,
            segments,
            repeating,
        })
    }

    /// Returns a copy that loops (or not) once the last segment finishes.
    #[must_use]
    pub fn with_repeating(mut self, repeating: bool) -> Self {
        self.repeating = repeating;
        self
    }

    /// Returns the variable's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        self.name.clone()
    }

    /// Returns the starting value.
    #[must_use]
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Returns the segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns `true` if the variable loops.
    #[must_use]
    pub fn is_repeating(&self) -> bool {
        self.repeating
    }

    /// Returns the time to walk every segment once.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Returns the value at `time` since the animation started.
    ///
    /// At or past the total duration a non-repeating variable holds its last
    /// end value. A repeating variable wraps around; exact nonzero multiples
    /// of the total duration yield the last end value rather than the start.
    #[must_use]
    pub fn value_at(&self, time: Duration) -> f64 {
        let last = self.segments.last().map_or(self.start, |s| s.end);
        let total = self.total_duration();
        if total.is_zero() || (time >= total && !self.repeating) {
            return last;
        }
        let local = if time >= total {
            let wrapped = time.as_nanos() % total.as_nanos();
            if wrapped == 0 {
                return last;
            }
            Duration::from_nanos(u64::try_from(wrapped).unwrap_or(u64::MAX))
        } else {
            time
        };
        self.walk(local)
    }

    /// Walks the segments to `time`, which must be below the total duration.
    fn walk(&self, mut time: Duration) -> f64 {
        let mut from = self.start;
        for segment in &self.segments {
            if time < segment.duration {
                let t = time.as_secs_f64() / segment.duration.as_secs_f64();
                let delta = segment.end - from;
                let mut moved = delta * t;
                if segment.step > 0.0 {
                    moved = (moved.abs() / segment.step).floor() * segment.step * delta.signum();
                }
                return from + moved;
            }
            time -= segment.duration;
            from = segment.end;
        }
        from
    }
}
