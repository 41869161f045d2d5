// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Identifier types and the [`Symbols`] interner.
//!
//! States, groups, and template attach points are application-defined
//! vocabularies. They are referred to by compact `u32` newtypes; [`Symbols`]
//! maps human-readable names to those IDs when an embedder wants one.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

/// A stable identifier for a boolean element state (e.g. `hover`, `pressed`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub u32);

/// A stable identifier for a style group (a named class of elements).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u32);

/// A stable identifier for a named attachment point inside a template.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttachPoint(pub u32);

/// An owned, sorted, deduplicated set of IDs.
///
/// Membership is O(log n); subset checks are a merge walk.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdSet<T>(Box<[T]>);

/// The set of states an element is currently in.
pub type StateSet = IdSet<StateId>;

impl<T> Default for IdSet<T> {
    fn default() -> Self {
        Self(Vec::new().into_boxed_slice())
    }
}

impl<T> IdSet<T>
where
    T: Copy + Ord,
{
    /// Constructs a set from an iterator, sorting and deduplicating.
    #[must_use]
    pub fn from_ids(iter: impl IntoIterator<Item = T>) -> Self {
        let mut ids: Vec<T> = iter.into_iter().collect();
        ids.sort();
        ids.dedup();
        Self(ids.into_boxed_slice())
    }

    /// Returns the empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of IDs in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the set as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    /// Returns an iterator over the IDs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.0.iter().copied()
    }

    /// Returns `true` if this set contains the given ID.
    #[must_use]
    pub fn contains(&self, id: T) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    /// Returns `true` if every ID of `self` is also in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        is_subset(&self.0, &other.0)
    }

    /// Returns a copy of this set with `id` added.
    #[must_use]
    pub fn with(&self, id: T) -> Self {
        match self.0.binary_search(&id) {
            Ok(_) => self.clone(),
            Err(at) => {
                let mut ids = self.0.to_vec();
                ids.insert(at, id);
                Self(ids.into_boxed_slice())
            }
        }
    }

    /// Returns a copy of this set with `id` removed.
    #[must_use]
    pub fn without(&self, id: T) -> Self {
        match self.0.binary_search(&id) {
            Ok(at) => {
                let mut ids = self.0.to_vec();
                ids.remove(at);
                Self(ids.into_boxed_slice())
            }
            Err(_) => self.clone(),
        }
    }

    /// Returns the IDs present in exactly one of the two sets.
    #[must_use]
    pub fn symmetric_difference(&self, other: &Self) -> Self {
        let (a, b) = (&self.0, &other.0);
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                core::cmp::Ordering::Less => {
                    out.push(a[i]);
                    i += 1;
                }
                core::cmp::Ordering::Greater => {
                    out.push(b[j]);
                    j += 1;
                }
                core::cmp::Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        Self(out.into_boxed_slice())
    }
}

impl<T> FromIterator<T> for IdSet<T>
where
    T: Copy + Ord,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_ids(iter)
    }
}

fn is_subset<T: Ord>(needles: &[T], haystack: &[T]) -> bool {
    if needles.is_empty() {
        return true;
    }
    let mut j = 0;
    for needle in needles {
        loop {
            let Some(candidate) = haystack.get(j) else {
                return false;
            };
            j += 1;
            match needle.cmp(candidate) {
                core::cmp::Ordering::Less => return false,
                core::cmp::Ordering::Equal => break,
                core::cmp::Ordering::Greater => {}
            }
        }
    }
    true
}

/// An ID type that can be minted by a [`NameTable`].
pub trait SymbolId: Copy + Eq {
    /// Creates the ID for a table index.
    fn from_index(index: u32) -> Self;
    /// Returns the table index of this ID.
    fn index(self) -> u32;
}

macro_rules! symbol_id {
    ($($ty:ident),*) => {
        $(impl SymbolId for $ty {
            #[inline]
            fn from_index(index: u32) -> Self {
                Self(index)
            }

            #[inline]
            fn index(self) -> u32 {
                self.0
            }
        })*
    };
}

symbol_id!(StateId, GroupId, AttachPoint);

/// A bidirectional name table for one ID vocabulary.
#[derive(Clone)]
pub struct NameTable<I> {
    names: Vec<Arc<str>>,
    by_name: HashMap<Arc<str>, I>,
}

impl<I> Default for NameTable<I> {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<I: SymbolId> NameTable<I> {
    /// Returns the ID for `name`, allocating one if it is new.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` names are interned.
    pub fn intern(&mut self, name: &str) -> I {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        assert!(
            self.names.len() < u32::MAX as usize,
            "Too many names interned (max {})",
            u32::MAX
        );
        #[expect(clippy::cast_possible_truncation, reason = "checked above")]
        let id = I::from_index(self.names.len() as u32);
        let name: Arc<str> = Arc::from(name);
        self.names.push(name.clone());
        self.by_name.insert(name, id);
        id
    }

    /// Looks up an already-interned name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<I> {
        self.by_name.get(name).copied()
    }

    /// Returns the name behind an ID.
    #[must_use]
    pub fn name(&self, id: I) -> Option<&str> {
        self.names.get(id.index() as usize).map(|n| &**n)
    }

    /// Returns the number of interned names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<I> fmt::Debug for NameTable<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names.iter()).finish()
    }
}

/// Name tables for the state, group, and attach point vocabularies.
///
/// ```rust
/// use understory_cascade::Symbols;
///
/// let mut symbols = Symbols::new();
/// let hover = symbols.state("hover");
/// assert_eq!(symbols.state("hover"), hover);
/// assert_eq!(symbols.states.name(hover), Some("hover"));
///
/// let set = symbols.state_set(["hover", "pressed"]);
/// assert!(set.contains(hover));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Symbols {
    /// State names.
    pub states: NameTable<StateId>,
    /// Group names.
    pub groups: NameTable<GroupId>,
    /// Template attach point names.
    pub attach_points: NameTable<AttachPoint>,
}

impl Symbols {
    /// Creates empty name tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a state name.
    pub fn state(&mut self, name: &str) -> StateId {
        self.states.intern(name)
    }

    /// Interns a group name.
    pub fn group(&mut self, name: &str) -> GroupId {
        self.groups.intern(name)
    }

    /// Interns an attach point name.
    pub fn attach_point(&mut self, name: &str) -> AttachPoint {
        self.attach_points.intern(name)
    }

    /// Interns every name and returns the resulting state set.
    pub fn state_set<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> StateSet {
        names.into_iter().map(|n| self.state(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_set_from_iter_sorts_and_dedups() {
        let set = IdSet::from_ids([StateId(3), StateId(1), StateId(3), StateId(2)]);
        assert_eq!(set.as_slice(), &[StateId(1), StateId(2), StateId(3)]);
        assert!(set.contains(StateId(2)));
        assert!(!set.contains(StateId(4)));
    }

    #[test]
    fn id_set_subset() {
        let small = IdSet::from_ids([GroupId(2), GroupId(4)]);
        let big = IdSet::from_ids([GroupId(1), GroupId(2), GroupId(3), GroupId(4)]);
        assert!(small.is_subset(&big));
        assert!(!big.is_subset(&small));
        assert!(IdSet::<GroupId>::empty().is_subset(&small));
        assert!(!small.is_subset(&IdSet::empty()));
        assert!(!IdSet::from_ids([GroupId(5)]).is_subset(&big));
    }

    #[test]
    fn id_set_with_without() {
        let set = IdSet::from_ids([StateId(1)]);
        let grown = set.with(StateId(0)).with(StateId(1));
        assert_eq!(grown.as_slice(), &[StateId(0), StateId(1)]);
        assert_eq!(grown.without(StateId(0)), set);
        assert_eq!(set.without(StateId(9)), set);
    }

    #[test]
    fn id_set_symmetric_difference() {
        let a = IdSet::from_ids([StateId(1), StateId(2), StateId(3)]);
        let b = IdSet::from_ids([StateId(2), StateId(4)]);
        assert_eq!(
            a.symmetric_difference(&b).as_slice(),
            &[StateId(1), StateId(3), StateId(4)]
        );
        assert!(a.symmetric_difference(&a).is_empty());
    }

    #[test]
    fn symbols_are_per_vocabulary() {
        let mut symbols = Symbols::new();
        let hover = symbols.state("hover");
        let group = symbols.group("hover");
        assert_eq!(hover.0, 0);
        assert_eq!(group.0, 0);
        assert_eq!(symbols.states.len(), 1);
        assert_eq!(symbols.groups.get("hover"), Some(group));
        assert_eq!(symbols.attach_points.get("hover"), None);
        assert!(symbols.attach_points.is_empty());
    }
}
