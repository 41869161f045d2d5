// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The predicate algebra.
//!
//! This module provides [`TypedPredicate`], a closed sum type over leaf
//! predicates and their boolean compositions.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

/// Identifier of a leaf predicate within a [`PredicateRegistry`](crate::PredicateRegistry).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PredicateId(u32);

impl PredicateId {
    /// Creates a predicate ID from the given index.
    ///
    /// This is typically called by [`PredicateRegistry::register`](crate::PredicateRegistry::register)
    /// rather than directly.
    #[must_use]
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the underlying index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// The function behind a leaf predicate.
///
/// Returns `None` to reject the input, or the (possibly narrowed) accepted value.
pub type TestFn<V> = dyn Fn(&V) -> Option<V> + Send + Sync;

/// A registered leaf predicate.
///
/// Leaves compare equal when they share a [`PredicateId`]; the test function
/// itself is never compared.
pub struct Leaf<V> {
    id: PredicateId,
    name: Arc<str>,
    test: Arc<TestFn<V>>,
}

impl<V> Leaf<V> {
    pub(crate) fn new(id: PredicateId, name: Arc<str>, test: Arc<TestFn<V>>) -> Self {
        Self { id, name, test }
    }

    /// Returns the leaf's registry ID.
    #[must_use]
    #[inline]
    pub fn id(&self) -> PredicateId {
        self.id
    }

    /// Returns the name the leaf was registered under.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<V> Clone for Leaf<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            test: self.test.clone(),
        }
    }
}

impl<V> fmt::Debug for Leaf<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leaf")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A predicate that tests a value and narrows it on success.
///
/// The algebra is closed: a predicate is either always-true, a registered
/// [`Leaf`], or one of three compositions. Composition never mutates an
/// existing predicate; composites share their components through `Arc`.
///
/// # Example
///
/// ```rust
/// use understory_predicate::{PredicateRegistry, TypedPredicate};
///
/// let mut registry = PredicateRegistry::<i32>::new();
/// let small = registry.filter("small", |v| v.abs() < 10);
/// let double = registry.register("double", |v| v.checked_mul(2));
///
/// // `and` is sequential: `small` sees the doubled value.
/// let p = double.and(&small);
/// assert_eq!(p.test(&3), Some(6));
/// assert_eq!(p.test(&7), None);
///
/// // `not` passes the original input through.
/// assert_eq!(small.not().test(&12), Some(12));
/// assert!(TypedPredicate::<i32>::Always.accepts(&12));
/// ```
pub enum TypedPredicate<V> {
    /// Accepts every input unchanged. This is the predicate of a tree root.
    Always,
    /// A registered leaf test.
    Leaf(Leaf<V>),
    /// Apply the first predicate, then the second to the narrowed result.
    Intersect(Arc<Self>, Arc<Self>),
    /// Try each component in order; the first accepted result wins.
    Union(Arc<[Self]>),
    /// Accept exactly when the inner predicate rejects; the input is passed through.
    Not(Arc<Self>),
}

impl<V> TypedPredicate<V> {
    /// Returns `true` for the always-accepting predicate.
    #[must_use]
    #[inline]
    pub fn is_always(&self) -> bool {
        matches!(self, Self::Always)
    }

    /// Composes `self` AND `next`, sequentially.
    ///
    /// `Always` is the identity on either side.
    #[must_use]
    pub fn and(&self, next: &Self) -> Self {
        match (self, next) {
            (Self::Always, _) => next.clone(),
            (_, Self::Always) => self.clone(),
            _ => Self::Intersect(Arc::new(self.clone()), Arc::new(next.clone())),
        }
    }

    /// Composes `self` OR `other`.
    ///
    /// Nested unions are flattened so that order of evaluation is preserved.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        if self.is_always() {
            return Self::Always;
        }
        let mut parts: Vec<Self> = Vec::new();
        for side in [self, other] {
            match side {
                Self::Union(inner) => parts.extend(inner.iter().cloned()),
                _ => parts.push(side.clone()),
            }
        }
        Self::Union(parts.into())
    }

    /// Negates `self`.
    #[must_use]
    pub fn not(&self) -> Self {
        Self::Not(Arc::new(self.clone()))
    }

    /// Flattens a chain of intersections into its sequential stages.
    ///
    /// `Always` contributes no stage, so the root predicate has none.
    #[must_use]
    pub fn stages(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        self.push_stages(&mut out);
        out
    }

    fn push_stages<'a>(&'a self, out: &mut Vec<&'a Self>) {
        match self {
            Self::Always => {}
            Self::Intersect(first, second) => {
                first.push_stages(out);
                second.push_stages(out);
            }
            _ => out.push(self),
        }
    }
}

impl<V: Clone> TypedPredicate<V> {
    /// Tests `input`, returning the narrowed value on acceptance.
    #[must_use]
    pub fn test(&self, input: &V) -> Option<V> {
        match self {
            Self::Always => Some(input.clone()),
            Self::Leaf(leaf) => (leaf.test)(input),
            Self::Intersect(first, second) => first.test(input).and_then(|mid| second.test(&mid)),
            Self::Union(parts) => parts.iter().find_map(|p| p.test(input)),
            Self::Not(inner) => match inner.test(input) {
                Some(_) => None,
                None => Some(input.clone()),
            },
        }
    }

    /// Returns `true` if `input` is accepted.
    #[must_use]
    pub fn accepts(&self, input: &V) -> bool {
        self.test(input).is_some()
    }

    /// Tests `input` and extracts the narrowed value as a `T`.
    ///
    /// `None` if the input is rejected or the result is not a `T`.
    #[must_use]
    pub fn test_as<T: TryFrom<V>>(&self, input: &V) -> Option<T> {
        self.test(input).and_then(|v| T::try_from(v).ok())
    }
}

impl<V> Clone for TypedPredicate<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Always => Self::Always,
            Self::Leaf(leaf) => Self::Leaf(leaf.clone()),
            Self::Intersect(a, b) => Self::Intersect(a.clone(), b.clone()),
            Self::Union(parts) => Self::Union(parts.clone()),
            Self::Not(inner) => Self::Not(inner.clone()),
        }
    }
}

impl<V> PartialEq for TypedPredicate<V> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Always, Self::Always) => true,
            (Self::Leaf(a), Self::Leaf(b)) => a.id == b.id,
            (Self::Intersect(a1, a2), Self::Intersect(b1, b2)) => a1 == b1 && a2 == b2,
            (Self::Union(a), Self::Union(b)) => a[..] == b[..],
            (Self::Not(a), Self::Not(b)) => a == b,
            _ => false,
        }
    }
}

impl<V> Eq for TypedPredicate<V> {}

impl<V> fmt::Debug for TypedPredicate<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Leaf(leaf) => write!(f, "{}", leaf.name),
            Self::Intersect(a, b) => write!(f, "({a:?} & {b:?})"),
            Self::Union(parts) => {
                f.write_str("(")?;
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{p:?}")?;
                }
                f.write_str(")")
            }
            Self::Not(inner) => write!(f, "!{inner:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PredicateRegistry;
    use alloc::format;

    fn setup() -> (
        PredicateRegistry<i64>,
        TypedPredicate<i64>,
        TypedPredicate<i64>,
        TypedPredicate<i64>,
    ) {
        let mut registry = PredicateRegistry::new();
        let positive = registry.filter("positive", |v: &i64| *v > 0);
        let halve = registry.register("halve", |v: &i64| (v % 2 == 0).then(|| v / 2));
        let dec = registry.register("dec", |v: &i64| v.checked_sub(1));
        (registry, positive, halve, dec)
    }

    #[test]
    fn intersect_is_sequential() {
        let (_, positive, halve, _) = setup();
        let p = halve.and(&positive);

        for x in -6..=6_i64 {
            let expected = halve.test(&x).and_then(|m| positive.test(&m));
            assert_eq!(p.test(&x), expected, "mismatch for {x}");
        }
        assert_eq!(p.test(&8), Some(4));
        assert_eq!(p.test(&0), None);
    }

    #[test]
    fn union_first_match_wins() {
        let (_, positive, halve, dec) = setup();
        let p = halve.or(&dec);
        assert_eq!(p.test(&4), Some(2));
        assert_eq!(p.test(&5), Some(4));

        let q = positive.or(&halve);
        assert_eq!(q.test(&-4), Some(-2));
        assert_eq!(q.test(&6), Some(6));
    }

    #[test]
    fn union_flattens() {
        let (_, positive, halve, dec) = setup();
        let p = positive.or(&halve).or(&dec);
        match &p {
            TypedPredicate::Union(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected union, got {other:?}"),
        }
    }

    #[test]
    fn not_passes_input_through() {
        let (_, _, halve, _) = setup();
        let odd = halve.not();
        assert_eq!(odd.test(&3), Some(3));
        assert_eq!(odd.test(&4), None);
    }

    #[test]
    fn always_is_identity_for_and() {
        let (_, positive, _, _) = setup();
        assert_eq!(TypedPredicate::Always.and(&positive), positive);
        assert_eq!(positive.and(&TypedPredicate::Always), positive);
        assert!(TypedPredicate::Always.or(&positive).is_always());
    }

    #[test]
    fn composition_does_not_mutate_components() {
        let (_, positive, halve, _) = setup();
        let before = positive.clone();
        let _ = positive.and(&halve);
        let _ = positive.or(&halve);
        let _ = positive.not();
        assert_eq!(positive, before);
        assert!(matches!(positive, TypedPredicate::Leaf(_)));
    }

    #[test]
    fn structural_equality() {
        let (_, positive, halve, _) = setup();
        assert_eq!(positive.and(&halve), positive.and(&halve));
        assert_ne!(positive.and(&halve), halve.and(&positive));
        assert_eq!(positive.not(), positive.not());
        assert_ne!(positive, halve);
    }

    #[test]
    fn stages_flatten_nested_intersections() {
        let (_, positive, halve, dec) = setup();
        let left = positive.and(&halve).and(&dec);
        let right = positive.and(&halve.and(&dec));
        assert_eq!(left.stages(), right.stages());
        assert_eq!(left.stages(), [&positive, &halve, &dec]);
        assert!(TypedPredicate::<i64>::Always.stages().is_empty());
    }

    #[test]
    fn debug_formatting() {
        let (_, positive, halve, _) = setup();
        let p = positive.and(&halve.not());
        assert_eq!(format!("{p:?}"), "(positive & !halve)");
    }
}
