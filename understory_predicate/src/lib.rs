// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Predicate: type-narrowing predicates and condition trees.
//!
//! A [`TypedPredicate`] is a test that also narrows: applied to a value it
//! either rejects it (`None`) or returns the value it accepted, possibly
//! cast or refined into a more specific form. Predicates compose with
//! [`and`](TypedPredicate::and) (sequential: the second stage sees what the
//! first stage produced), [`or`](TypedPredicate::or) (first match wins) and
//! [`not`](TypedPredicate::not) (negation, input passed through unchanged).
//!
//! A [`ConditionTree`] indexes values under composed predicates so that
//! "every value whose condition accepts this input" is answered in a single
//! descent. Branches that reject the input are skipped whole.
//!
//! ## Quick Start
//!
//! ```rust
//! use understory_predicate::{ConditionTree, PredicateRegistry};
//!
//! let mut registry = PredicateRegistry::<i64>::new();
//! let positive = registry.filter("positive", |v| *v > 0);
//! let halve = registry.register("halve-even", |v| (v % 2 == 0).then(|| v / 2));
//!
//! let mut tree = ConditionTree::new();
//! tree.add(&positive, ["positive"]);
//! tree.add(&positive.and(&halve), ["positive and even"]);
//! tree.add(&halve.and(&positive), ["half is positive"]);
//!
//! assert_eq!(tree.values_for(&4), vec![&"positive", &"positive and even", &"half is positive"]);
//! assert_eq!(tree.values_for(&3), vec![&"positive"]);
//! assert!(tree.values_for(&-3).is_empty());
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.

#![no_std]

extern crate alloc;

mod predicate;
mod registry;
mod tree;

pub use predicate::{Leaf, PredicateId, TestFn, TypedPredicate};
pub use registry::PredicateRegistry;
pub use tree::{ConditionTree, ConditionTreeNode};
