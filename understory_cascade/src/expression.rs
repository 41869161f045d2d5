// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The expression model shared by every style flavor.
//!
//! A style stores values per attribute, each guarded by an optional
//! expression. The expression type decides *when* a value applies
//! ([`StyleExpression::matches`]) and *which* of several matching values wins
//! ([`StyleExpression::priority`], refined by implication strength).

use std::fmt;
use std::hash::Hash;

/// A condition guarding a declared value.
///
/// Implementations must keep [`priority`](Self::priority) consistent with
/// [`Eq`]: equal expressions have equal priority.
pub trait StyleExpression: Clone + Eq + Ord + Hash + fmt::Debug + Send + Sync + 'static {
    /// The input an expression is evaluated against.
    type Context<'a>: ?Sized;

    /// A totally ordered specificity; greater wins.
    type Priority: Copy + Ord + fmt::Debug;

    /// Returns `true` if the expression holds in `cx`.
    fn matches(&self, cx: &Self::Context<'_>) -> bool;

    /// Returns a nonzero strength if `self` holding guarantees `other` holds.
    ///
    /// Zero means no implication is known. Larger values mean `self` is more
    /// specific relative to `other`.
    fn implies_when_true(&self, other: &Self) -> u32;

    /// Returns a nonzero strength if `self` failing guarantees `other` holds.
    fn implies_when_false(&self, other: &Self) -> u32;

    /// Returns the expression's priority.
    fn priority(&self) -> Self::Priority;
}

/// Orders `(expression, value)` pairs from highest to lowest precedence.
///
/// Conditional entries come first, by descending priority; ties are broken
/// by the expression's own ordering so the result is deterministic. The
/// unconditional entry (if any) comes last. A final insertion pass moves an
/// entry ahead of an earlier one when it strictly implies it.
pub(crate) fn sort_by_precedence<E: StyleExpression, V>(entries: &mut Vec<(Option<E>, V)>) {
    entries.sort_by(|(a, _), (b, _)| match (a, b) {
        (None, None) => core::cmp::Ordering::Equal,
        (None, Some(_)) => core::cmp::Ordering::Greater,
        (Some(_), None) => core::cmp::Ordering::Less,
        (Some(a), Some(b)) => b.priority().cmp(&a.priority()).then_with(|| a.cmp(b)),
    });

    let conditional = entries.iter().take_while(|(e, _)| e.is_some()).count();
    for j in 1..conditional {
        let Some(later) = entries[j].0.as_ref() else {
            continue;
        };
        let target = (0..j).find(|&i| {
            entries[i].0.as_ref().is_some_and(|earlier| {
                later.implies_when_true(earlier) > earlier.implies_when_true(later)
            })
        });
        if let Some(i) = target {
            entries[i..=j].rotate_right(1);
        }
    }
}
