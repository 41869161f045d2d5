// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Condition trees.
//!
//! A [`ConditionTree`] attaches values to paths of predicates. Each node holds
//! one predicate; a child's predicate is applied to whatever its parent
//! narrowed the input to. A value attached at a node is "registered under" the
//! conjunction of every predicate on the path from the root.
//!
//! Lookup descends once: a branch whose predicate rejects the narrowed input
//! is skipped entirely, so the cost follows the matching depth rather than
//! the number of registered conditions.

use alloc::vec::Vec;
use core::fmt;
use smallvec::SmallVec;

use crate::predicate::TypedPredicate;

/// A node of a [`ConditionTree`].
///
/// Sibling nodes never hold structurally equal predicates: insertion always
/// finds an existing child before creating a new one.
pub struct ConditionTreeNode<V, T> {
    predicate: TypedPredicate<V>,
    children: Vec<Self>,
    values: SmallVec<[T; 2]>,
}

impl<V, T: PartialEq> ConditionTreeNode<V, T> {
    /// Creates an empty node holding `predicate`.
    #[must_use]
    pub fn new(predicate: TypedPredicate<V>) -> Self {
        Self {
            predicate,
            children: Vec::new(),
            values: SmallVec::new(),
        }
    }

    /// Returns this node's predicate.
    #[must_use]
    #[inline]
    pub fn predicate(&self) -> &TypedPredicate<V> {
        &self.predicate
    }

    /// Returns the values attached exactly at this node.
    #[must_use]
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Returns this node's children.
    #[must_use]
    #[inline]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Returns `true` if neither this node nor any descendant holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.children.iter().all(Self::is_empty)
    }

    /// Attaches `values` under `predicate`, relative to this node.
    ///
    /// - `Always` or a predicate equal to this node's attaches here.
    /// - A predicate whose leading stages are this node's predicate descends
    ///   through the remaining stages, reusing matching children and creating
    ///   the missing ones.
    ///
    /// Returns `false` (and changes nothing) if `predicate` has no structural
    /// relationship with this node; the caller should insert it elsewhere,
    /// usually at the root.
    pub fn add<I>(&mut self, predicate: &TypedPredicate<V>, values: I) -> bool
    where
        I: IntoIterator<Item = T>,
    {
        if predicate.is_always() || *predicate == self.predicate {
            self.merge(values);
            return true;
        }
        let own = self.predicate.stages();
        let stages = predicate.stages();
        if !stages.starts_with(&own) {
            return false;
        }
        let rest = &stages[own.len()..];
        self.insert_path(rest, values);
        true
    }

    /// Detaches `values` previously added under `predicate`.
    ///
    /// Never creates nodes. Children left without values or descendants are
    /// pruned. Returns `true` if at least one value was removed.
    pub fn remove(&mut self, predicate: &TypedPredicate<V>, values: &[T]) -> bool {
        if predicate.is_always() || *predicate == self.predicate {
            return self.detach(values);
        }
        let own = self.predicate.stages();
        let stages = predicate.stages();
        if !stages.starts_with(&own) {
            return false;
        }
        let rest = &stages[own.len()..];
        self.remove_path(rest, values)
    }

    /// Removes every value for which `keep` returns `false`, anywhere below
    /// and including this node, pruning emptied children.
    pub fn retain(&mut self, keep: &mut impl FnMut(&T) -> bool) {
        self.values.retain(|v| keep(v));
        for child in &mut self.children {
            child.retain(&mut *keep);
        }
        self.children.retain(|c| !c.is_empty());
    }

    fn merge<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            if !self.values.contains(&value) {
                self.values.push(value);
            }
        }
    }

    fn detach(&mut self, values: &[T]) -> bool {
        let before = self.values.len();
        self.values.retain(|v| !values.contains(v));
        before != self.values.len()
    }

    fn insert_path<I>(&mut self, stages: &[&TypedPredicate<V>], values: I)
    where
        I: IntoIterator<Item = T>,
    {
        let Some((first, rest)) = stages.split_first() else {
            self.merge(values);
            return;
        };
        let index = match self.children.iter().position(|c| c.predicate == **first) {
            Some(index) => index,
            None => {
                self.children.push(Self::new((*first).clone()));
                self.children.len() - 1
            }
        };
        self.children[index].insert_path(rest, values);
    }

    fn remove_path(&mut self, stages: &[&TypedPredicate<V>], values: &[T]) -> bool {
        let Some((first, rest)) = stages.split_first() else {
            return self.detach(values);
        };
        let Some(index) = self.children.iter().position(|c| c.predicate == **first) else {
            return false;
        };
        let removed = self.children[index].remove_path(rest, values);
        if self.children[index].is_empty() {
            self.children.remove(index);
        }
        removed
    }
}

impl<V: Clone, T> ConditionTreeNode<V, T> {
    /// Collects every value whose path accepts `input`, starting at this node.
    ///
    /// Values are yielded parents-first, children in insertion order.
    #[must_use]
    pub fn values_for(&self, input: &V) -> Vec<&T> {
        let mut out = Vec::new();
        if let Some(narrowed) = self.predicate.test(input) {
            self.collect(&narrowed, &mut out);
        }
        out
    }

    fn collect<'a>(&'a self, narrowed: &V, out: &mut Vec<&'a T>) {
        out.extend(self.values.iter());
        for child in &self.children {
            // A rejected branch is never re-entered.
            if let Some(next) = child.predicate.test(narrowed) {
                child.collect(&next, out);
            }
        }
    }
}

impl<V, T: fmt::Debug> fmt::Debug for ConditionTreeNode<V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionTreeNode")
            .field("predicate", &self.predicate)
            .field("values", &self.values)
            .field("children", &self.children)
            .finish()
    }
}

/// An index from composed predicates to values.
///
/// The root holds [`TypedPredicate::Always`], so insertion through the tree
/// never fails.
///
/// # Example
///
/// ```rust
/// use understory_predicate::{ConditionTree, PredicateRegistry, TypedPredicate};
///
/// let mut registry = PredicateRegistry::<&'static str>::new();
/// let short = registry.filter("short", |s| s.len() < 4);
/// let upper = registry.filter("upper", |s| s.chars().all(|c| c.is_ascii_uppercase()));
///
/// let mut tree = ConditionTree::new();
/// tree.add(&TypedPredicate::Always, ["any"]);
/// tree.add(&short.and(&upper), ["short upper"]);
///
/// assert_eq!(tree.values_for(&"ABC"), vec![&"any", &"short upper"]);
/// assert_eq!(tree.values_for(&"abc"), vec![&"any"]);
/// ```
pub struct ConditionTree<V, T> {
    root: ConditionTreeNode<V, T>,
}

impl<V, T: PartialEq> Default for ConditionTree<V, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, T: PartialEq> ConditionTree<V, T> {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: ConditionTreeNode::new(TypedPredicate::Always),
        }
    }

    /// Returns the root node.
    #[must_use]
    #[inline]
    pub fn root(&self) -> &ConditionTreeNode<V, T> {
        &self.root
    }

    /// Returns the root node mutably, for subtree-relative insertion.
    #[inline]
    pub fn root_mut(&mut self) -> &mut ConditionTreeNode<V, T> {
        &mut self.root
    }

    /// Attaches `values` under `predicate`. Duplicates at a node are merged.
    pub fn add<I>(&mut self, predicate: &TypedPredicate<V>, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        let added = self.root.add(predicate, values);
        debug_assert!(added, "the root accepts every predicate");
    }

    /// Detaches `values` from `predicate`. Returns `true` if anything was removed.
    pub fn remove(&mut self, predicate: &TypedPredicate<V>, values: &[T]) -> bool {
        self.root.remove(predicate, values)
    }

    /// Removes values anywhere in the tree for which `keep` returns `false`.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.root.retain(&mut keep);
    }

    /// Returns `true` if no values are attached anywhere.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Returns the total number of nodes, including the root.
    #[must_use]
    pub fn node_count(&self) -> usize {
        fn count<V, T>(node: &ConditionTreeNode<V, T>) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        count(&self.root)
    }
}

impl<V: Clone, T> ConditionTree<V, T> {
    /// Returns every value whose condition accepts `input`.
    #[must_use]
    pub fn values_for(&self, input: &V) -> Vec<&T> {
        let mut out = Vec::new();
        self.root.collect(input, &mut out);
        out
    }
}

impl<V, T: fmt::Debug> fmt::Debug for ConditionTree<V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionTree")
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PredicateRegistry;
    use alloc::sync::Arc;
    use core::any::Any;

    struct Preds {
        positive: TypedPredicate<i64>,
        halve: TypedPredicate<i64>,
        small: TypedPredicate<i64>,
    }

    fn setup() -> Preds {
        let mut registry = PredicateRegistry::new();
        Preds {
            positive: registry.filter("positive", |v| *v > 0),
            halve: registry.register("halve", |v| (v % 2 == 0).then(|| v / 2)),
            small: registry.filter("small", |v| v.abs() < 10),
        }
    }

    #[test]
    fn values_at_root() {
        let mut tree = ConditionTree::<i64, u32>::new();
        tree.add(&TypedPredicate::Always, [1, 2, 1]);
        assert_eq!(tree.root().values(), &[1, 2]);
        assert_eq!(tree.values_for(&-5), [&1, &2]);
    }

    #[test]
    fn shared_prefix_reuses_nodes() {
        let p = setup();
        let mut tree = ConditionTree::new();
        tree.add(&p.positive.and(&p.halve), ["a"]);
        tree.add(&p.positive.and(&p.small), ["b"]);
        tree.add(&p.positive, ["c"]);

        // root -> positive -> {halve, small}
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.root().children().len(), 1);
        assert_eq!(tree.root().children()[0].values(), &["c"]);
    }

    #[test]
    fn narrowing_applies_down_the_path() {
        let p = setup();
        let mut tree = ConditionTree::new();
        // Accepts x when x is even and x/2 is small.
        tree.add(&p.halve.and(&p.small), ["half small"]);

        assert_eq!(tree.values_for(&18), [&"half small"]);
        assert!(tree.values_for(&20).is_empty());
        assert!(tree.values_for(&9).is_empty());
    }

    #[test]
    fn value_reported_once_regardless_of_insertion_order() {
        let p = setup();
        let conditions = [
            p.positive.clone(),
            p.halve.and(&p.small),
            p.positive.and(&p.halve),
            p.small.not(),
        ];
        let target = p.positive.and(&p.small);

        for rotation in 0..conditions.len() {
            let mut tree = ConditionTree::new();
            for (i, c) in conditions.iter().cycle().skip(rotation).take(2).enumerate() {
                tree.add(c, [i]);
            }
            tree.add(&target, [99]);
            for (i, c) in conditions.iter().cycle().skip(rotation + 2).take(2).enumerate() {
                tree.add(c, [i + 10]);
            }
            tree.add(&target, [99]);

            for x in [2_i64, 4, 7] {
                let hits = tree.values_for(&x).into_iter().filter(|v| **v == 99).count();
                assert_eq!(hits, 1, "rotation {rotation}, input {x}");
            }
        }
    }

    #[test]
    fn subtree_insert_fails_when_unrelated() {
        let p = setup();
        let mut node = ConditionTreeNode::<i64, u8>::new(p.positive.clone());

        assert!(!node.add(&p.halve, [1]));
        assert!(node.is_empty());

        assert!(node.add(&p.positive.and(&p.halve), [2]));
        assert!(node.add(&p.positive, [3]));
        assert!(node.add(&TypedPredicate::Always, [4]));
        assert_eq!(node.values(), &[3, 4]);
        assert_eq!(node.values_for(&4), [&3, &4, &2]);
        assert!(node.values_for(&-4).is_empty());
    }

    #[test]
    fn composite_node_predicate_matches_by_stages() {
        let p = setup();
        let mut node = ConditionTreeNode::<i64, u8>::new(p.positive.and(&p.halve));
        assert!(node.add(&p.positive.and(&p.halve).and(&p.small), [1]));
        assert_eq!(node.children().len(), 1);
        assert_eq!(node.children()[0].predicate(), &p.small);
    }

    #[test]
    fn remove_never_creates_and_prunes() {
        let p = setup();
        let mut tree = ConditionTree::new();
        tree.add(&p.positive.and(&p.halve), [1_u8, 2]);

        assert!(!tree.remove(&p.small, &[1]));
        assert!(!tree.remove(&p.positive.and(&p.small), &[1]));
        assert_eq!(tree.node_count(), 3);

        assert!(tree.remove(&p.positive.and(&p.halve), &[1]));
        assert_eq!(tree.values_for(&4), [&2]);
        assert!(tree.remove(&p.positive.and(&p.halve), &[2]));
        assert!(tree.is_empty());
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn retain_prunes_everywhere() {
        let p = setup();
        let mut tree = ConditionTree::new();
        tree.add(&TypedPredicate::Always, [1_u8]);
        tree.add(&p.positive, [2]);
        tree.add(&p.positive.and(&p.small), [3]);
        tree.retain(|v| *v != 3);
        assert_eq!(tree.node_count(), 2);
        tree.retain(|v| *v == 1);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.values_for(&5), [&1]);
    }

    #[test]
    fn type_narrowing_with_dynamic_values() {
        type Dyn = Arc<dyn Any + Send + Sync>;

        let mut registry = PredicateRegistry::<Dyn>::new();
        let is_u32 = registry.filter("u32", |v| v.is::<u32>());
        let is_str = registry.filter("str", |v| v.is::<&'static str>());
        let big = registry.filter("big", |v| v.downcast_ref::<u32>().is_some_and(|n| *n > 100));
        // Casts text to a number; later stages see the `u32`.
        let parse = registry.register("parse", |v| {
            let text = v.downcast_ref::<&'static str>()?;
            let n = text.parse::<u32>().ok()?;
            Some(Arc::new(n) as Dyn)
        });

        let mut tree = ConditionTree::new();
        tree.add(&is_u32, ["number"]);
        tree.add(&is_u32.and(&big), ["big number"]);
        tree.add(&is_str, ["text"]);
        tree.add(&parse, ["numeric text"]);
        tree.add(&parse.and(&big), ["big numeric text"]);

        let n: Dyn = Arc::new(500_u32);
        let s: Dyn = Arc::new("hi");
        let digits: Dyn = Arc::new("500");
        assert_eq!(tree.values_for(&n), [&"number", &"big number"]);
        assert_eq!(tree.values_for(&s), [&"text"]);
        assert!(!big.accepts(&digits));
        assert_eq!(
            tree.values_for(&digits),
            [&"text", &"numeric text", &"big numeric text"]
        );
        let narrowed = parse.and(&big).test(&digits).unwrap();
        assert_eq!(narrowed.downcast_ref::<u32>(), Some(&500));
    }
}
