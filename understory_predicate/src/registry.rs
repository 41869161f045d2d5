// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Leaf predicate registry.
//!
//! This module provides [`PredicateRegistry`], the explicit owner of leaf
//! predicate identities. Leaves registered in the same registry compare by ID,
//! so two lookups of the same name yield structurally equal predicates.

use alloc::sync::Arc;
use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::predicate::{Leaf, PredicateId, TypedPredicate};

/// A registry of named leaf predicates over values of type `V`.
///
/// # Example
///
/// ```rust
/// use understory_predicate::PredicateRegistry;
///
/// let mut registry = PredicateRegistry::<u8>::new();
/// let even = registry.filter("even", |v| v % 2 == 0);
///
/// assert_eq!(registry.get("even"), Some(even));
/// assert_eq!(registry.len(), 1);
/// ```
pub struct PredicateRegistry<V> {
    leaves: Vec<Leaf<V>>,
    by_name: HashMap<Arc<str>, PredicateId>,
}

impl<V> Default for PredicateRegistry<V> {
    fn default() -> Self {
        Self {
            leaves: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<V> PredicateRegistry<V> {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a narrowing leaf predicate.
    ///
    /// # Panics
    ///
    /// Panics if a predicate with the same name is already registered,
    /// or if more than `u32::MAX` predicates are registered.
    pub fn register<F>(&mut self, name: &str, test: F) -> TypedPredicate<V>
    where
        F: Fn(&V) -> Option<V> + Send + Sync + 'static,
    {
        assert!(
            !self.by_name.contains_key(name),
            "Predicate '{name}' is already registered"
        );
        assert!(
            self.leaves.len() < u32::MAX as usize,
            "Too many predicates registered (max {})",
            u32::MAX
        );

        #[expect(clippy::cast_possible_truncation, reason = "checked above")]
        let id = PredicateId::new(self.leaves.len() as u32);
        let name: Arc<str> = Arc::from(name);

        let leaf = Leaf::new(id, name.clone(), Arc::new(test));
        self.leaves.push(leaf.clone());
        self.by_name.insert(name, id);

        TypedPredicate::Leaf(leaf)
    }

    /// Looks up a predicate by name, registering it with `test` if absent.
    pub fn get_or_register<F>(&mut self, name: &str, test: F) -> TypedPredicate<V>
    where
        F: Fn(&V) -> Option<V> + Send + Sync + 'static,
    {
        match self.get(name) {
            Some(existing) => existing,
            None => self.register(name, test),
        }
    }

    /// Looks up a predicate by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<TypedPredicate<V>> {
        let id = self.by_name.get(name)?;
        self.leaves
            .get(id.index() as usize)
            .map(|leaf| TypedPredicate::Leaf(leaf.clone()))
    }

    /// Returns the name of a registered predicate.
    #[must_use]
    pub fn name(&self, id: PredicateId) -> Option<&str> {
        self.leaves.get(id.index() as usize).map(Leaf::name)
    }

    /// Returns the number of registered predicates.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Returns `true` if no predicates are registered.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Returns an iterator over all registered leaves.
    pub fn iter(&self) -> impl Iterator<Item = &Leaf<V>> {
        self.leaves.iter()
    }
}

impl<V: Clone + 'static> PredicateRegistry<V> {
    /// Registers a non-narrowing leaf: accepted inputs pass through unchanged.
    ///
    /// # Panics
    ///
    /// Panics if a predicate with the same name is already registered.
    pub fn filter<F>(&mut self, name: &str, accept: F) -> TypedPredicate<V>
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.register(name, move |v| accept(v).then(|| v.clone()))
    }

    /// Registers a casting leaf: `cast` extracts a narrower `T` from the
    /// input, and later stages see that `T` re-embedded as a `V`.
    ///
    /// ```rust
    /// use understory_predicate::PredicateRegistry;
    ///
    /// #[derive(Clone, Debug, PartialEq)]
    /// enum Num {
    ///     Signed(i64),
    ///     Unsigned(u64),
    /// }
    ///
    /// impl From<u64> for Num {
    ///     fn from(n: u64) -> Self {
    ///         Self::Unsigned(n)
    ///     }
    /// }
    ///
    /// let mut registry = PredicateRegistry::<Num>::new();
    /// let unsigned = registry.cast("unsigned", |v| match v {
    ///     Num::Signed(n) => u64::try_from(*n).ok(),
    ///     Num::Unsigned(n) => Some(*n),
    /// });
    /// assert_eq!(unsigned.test(&Num::Signed(3)), Some(Num::Unsigned(3)));
    /// assert_eq!(unsigned.test(&Num::Signed(-3)), None);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if a predicate with the same name is already registered.
    pub fn cast<T, F>(&mut self, name: &str, cast: F) -> TypedPredicate<V>
    where
        T: Into<V>,
        F: Fn(&V) -> Option<T> + Send + Sync + 'static,
    {
        self.register(name, move |v| cast(v).map(Into::into))
    }
}

impl<V> core::fmt::Debug for PredicateRegistry<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PredicateRegistry")
            .field("count", &self.leaves.len())
            .field("predicates", &self.by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}
