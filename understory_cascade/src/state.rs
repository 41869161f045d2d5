// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Boolean expressions over element states.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

use crate::expression::StyleExpression;
use crate::ids::{StateId, StateSet};

/// A boolean expression over [`StateId`]s.
///
/// Expressions compose with `&`, `|`, and `!`:
///
/// ```rust
/// use understory_cascade::{StateExpression, StateId, StateSet, StyleExpression};
///
/// let hover = StateExpression::state(StateId(0));
/// let pressed = StateExpression::state(StateId(1));
/// let hot = hover.clone() & !pressed.clone();
///
/// assert!(hot.matches(&StateSet::from_ids([StateId(0)])));
/// assert!(!hot.matches(&StateSet::from_ids([StateId(0), StateId(1)])));
/// assert!((hover.clone() & pressed).implies_when_true(&hover) > 0);
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StateExpression {
    /// The element is in this state.
    State(StateId),
    /// Both operands hold.
    And(Arc<Self>, Arc<Self>),
    /// Either operand holds.
    Or(Arc<Self>, Arc<Self>),
    /// The operand does not hold.
    Not(Arc<Self>),
}

impl StateExpression {
    /// An expression that holds while the element is in `id`.
    #[must_use]
    pub fn state(id: StateId) -> Self {
        Self::State(id)
    }

    /// Both `self` and `other`.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Arc::new(self), Arc::new(other))
    }

    /// Either `self` or `other`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Arc::new(self), Arc::new(other))
    }

    /// The negation of `self`.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => Arc::unwrap_or_clone(inner),
            other => Self::Not(Arc::new(other)),
        }
    }

    /// Evaluates the expression against a state set.
    #[must_use]
    pub fn eval(&self, states: &StateSet) -> bool {
        match self {
            Self::State(id) => states.contains(*id),
            Self::And(a, b) => a.eval(states) && b.eval(states),
            Self::Or(a, b) => a.eval(states) || b.eval(states),
            Self::Not(inner) => !inner.eval(states),
        }
    }

    /// Returns `true` if the expression mentions `id`.
    #[must_use]
    pub fn references(&self, id: StateId) -> bool {
        match self {
            Self::State(s) => *s == id,
            Self::And(a, b) | Self::Or(a, b) => a.references(id) || b.references(id),
            Self::Not(inner) => inner.references(id),
        }
    }

    /// How many states the expression pins down.
    ///
    /// Conjunctions add up, disjunctions count their more specific side, and
    /// negation is as specific as its operand.
    #[must_use]
    pub fn specificity(&self) -> u32 {
        match self {
            Self::State(_) => 1,
            Self::And(a, b) => a.specificity().saturating_add(b.specificity()),
            Self::Or(a, b) => a.specificity().max(b.specificity()),
            Self::Not(inner) => inner.specificity(),
        }
    }

    /// Returns `true` if `self` holding is known to make `other` hold.
    ///
    /// This is a sound but incomplete structural check.
    #[must_use]
    pub fn implies(&self, other: &Self) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (_, Self::Or(a, b)) if self.implies(a) || self.implies(b) => true,
            (_, Self::And(a, b)) if self.implies(a) && self.implies(b) => true,
            (Self::And(a, b), _) if a.implies(other) || b.implies(other) => true,
            (Self::Or(a, b), _) => a.implies(other) && b.implies(other),
            (Self::Not(a), Self::Not(b)) => b.implies(a),
            _ => false,
        }
    }

    /// Pushes negation down to the states.
    fn complement(&self) -> Self {
        match self {
            Self::State(_) => Self::Not(Arc::new(self.clone())),
            Self::Not(inner) => (**inner).clone(),
            Self::And(a, b) => Self::Or(Arc::new(a.complement()), Arc::new(b.complement())),
            Self::Or(a, b) => Self::And(Arc::new(a.complement()), Arc::new(b.complement())),
        }
    }
}

fn strength(from: &StateExpression, to: &StateExpression) -> u32 {
    1 + from.specificity().saturating_sub(to.specificity())
}

impl StyleExpression for StateExpression {
    type Context<'a> = StateSet;
    type Priority = u32;

    fn matches(&self, states: &StateSet) -> bool {
        self.eval(states)
    }

    fn implies_when_true(&self, other: &Self) -> u32 {
        if self.implies(other) {
            strength(self, other)
        } else {
            0
        }
    }

    fn implies_when_false(&self, other: &Self) -> u32 {
        let complement = self.complement();
        if complement.implies(other) {
            strength(&complement, other)
        } else {
            0
        }
    }

    fn priority(&self) -> u32 {
        self.specificity()
    }
}

impl BitAnd for StateExpression {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.and(rhs)
    }
}

impl BitOr for StateExpression {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.or(rhs)
    }
}

impl Not for StateExpression {
    type Output = Self;

    fn not(self) -> Self {
        self.negate()
    }
}

impl From<StateId> for StateExpression {
    fn from(id: StateId) -> Self {
        Self::State(id)
    }
}

impl fmt::Debug for StateExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(id) => write!(f, "s{}", id.0),
            Self::And(a, b) => write!(f, "({a:?} & {b:?})"),
            Self::Or(a, b) => write!(f, "({a:?} | {b:?})"),
            Self::Not(inner) => write!(f, "!{inner:?}"),
        }
    }
}
