// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ordered dependency lists.
//!
//! A style consults its dependencies, in list order, for attributes it does
//! not set itself. Each link owns the [`Subscription`] that relays the
//! dependency's changes, so removing or replacing a link unsubscribes
//! exactly that relay and leaves the others alone.

use hashbrown::HashSet;
use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;

use crate::error::StyleError;
use crate::feed::{StyleId, Subscription};

static WIRING: Mutex<()> = Mutex::new(());

/// Serializes dependency-list edits across all styles.
///
/// Must be taken before any dependency write lock. The cycle check then
/// reads other styles' lists while no other editor holds a write lock, and
/// two opposing edits cannot both pass it.
pub(crate) fn wiring() -> MutexGuard<'static, ()> {
    WIRING.lock()
}

/// A style that can appear in a dependency list.
pub(crate) trait CascadeNode: Clone + Send + Sync + 'static {
    fn style_id(&self) -> StyleId;

    /// The node's direct dependencies, in order.
    fn dependency_snapshot(&self) -> Vec<Self>;
}

struct DependencyLink<S> {
    style: S,
    _relay: Subscription,
}

pub(crate) struct DependencyList<S> {
    links: SmallVec<[DependencyLink<S>; 4]>,
}

impl<S> Default for DependencyList<S> {
    fn default() -> Self {
        Self {
            links: SmallVec::new(),
        }
    }
}

impl<S: CascadeNode> DependencyList<S> {
    pub(crate) fn len(&self) -> usize {
        self.links.len()
    }

    pub(crate) fn styles(&self) -> Vec<S> {
        self.links.iter().map(|l| l.style.clone()).collect()
    }

    pub(crate) fn position(&self, id: StyleId) -> Option<usize> {
        self.links.iter().position(|l| l.style.style_id() == id)
    }

    /// Inserts `candidate` at `index`, subscribing the relay only once every
    /// check has passed.
    pub(crate) fn insert(
        &mut self,
        owner: StyleId,
        index: usize,
        candidate: S,
        relay: impl FnOnce(&S) -> Subscription,
    ) -> Result<(), StyleError> {
        if index > self.links.len() {
            return Err(StyleError::DependencyIndex {
                index,
                len: self.links.len(),
            });
        }
        self.check(owner, &candidate, None)?;
        let relay = relay(&candidate);
        self.links.insert(
            index,
            DependencyLink {
                style: candidate,
                _relay: relay,
            },
        );
        Ok(())
    }

    /// Replaces the dependency at `index`, returning the old one.
    pub(crate) fn replace(
        &mut self,
        owner: StyleId,
        index: usize,
        candidate: S,
        relay: impl FnOnce(&S) -> Subscription,
    ) -> Result<S, StyleError> {
        if index >= self.links.len() {
            return Err(StyleError::DependencyIndex {
                index,
                len: self.links.len(),
            });
        }
        self.check(owner, &candidate, Some(index))?;
        let relay = relay(&candidate);
        let old = core::mem::replace(
            &mut self.links[index],
            DependencyLink {
                style: candidate,
                _relay: relay,
            },
        );
        Ok(old.style)
    }

    /// Removes the dependency with the given identity.
    pub(crate) fn remove(&mut self, id: StyleId) -> Option<S> {
        let index = self.position(id)?;
        Some(self.links.remove(index).style)
    }

    fn check(&self, owner: StyleId, candidate: &S, replacing: Option<usize>) -> Result<(), StyleError> {
        let id = candidate.style_id();
        if id == owner {
            return Err(StyleError::SelfDependency(id));
        }
        let duplicate = self
            .links
            .iter()
            .enumerate()
            .any(|(i, l)| Some(i) != replacing && l.style.style_id() == id);
        if duplicate {
            return Err(StyleError::DuplicateDependency(id));
        }
        if reaches(candidate, owner) {
            return Err(StyleError::DependencyCycle(id));
        }
        Ok(())
    }
}

/// Returns `true` if `target` is a transitive dependency of `from`.
///
/// Never inspects the dependencies of `target` itself, so the caller may
/// hold `target`'s dependency lock. Other lists are read-locked in turn;
/// callers hold [`wiring`] so no editor is waiting on them.
pub(crate) fn reaches<S: CascadeNode>(from: &S, target: StyleId) -> bool {
    let mut stack = from.dependency_snapshot();
    let mut seen = HashSet::new();
    while let Some(next) = stack.pop() {
        let id = next.style_id();
        if id == target {
            return true;
        }
        if seen.insert(id) {
            stack.extend(next.dependency_snapshot());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ChangeFeed;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone)]
    struct Node {
        id: StyleId,
        deps: Arc<Mutex<DependencyList<Node>>>,
        feed: ChangeFeed<u8>,
    }

    impl Node {
        fn new() -> Self {
            Self {
                id: StyleId::next(),
                deps: Arc::default(),
                feed: ChangeFeed::new(),
            }
        }

        fn push(&self, dep: &Self) -> Result<(), StyleError> {
            let mut deps = self.deps.lock();
            let len = deps.len();
            deps.insert(self.id, len, dep.clone(), |d| d.feed.subscribe(|_| {}))
        }
    }

    impl CascadeNode for Node {
        fn style_id(&self) -> StyleId {
            self.id
        }

        fn dependency_snapshot(&self) -> Vec<Self> {
            self.deps.lock().styles()
        }
    }

    #[test]
    fn rejects_self_duplicate_and_cycle() {
        let (a, b, c) = (Node::new(), Node::new(), Node::new());
        assert_eq!(a.push(&a), Err(StyleError::SelfDependency(a.id)));
        a.push(&b).unwrap();
        assert_eq!(a.push(&b), Err(StyleError::DuplicateDependency(b.id)));
        b.push(&c).unwrap();
        assert_eq!(c.push(&a), Err(StyleError::DependencyCycle(a.id)));
        assert_eq!(a.deps.lock().len(), 1);
        assert_eq!(c.deps.lock().len(), 0);
    }

    #[test]
    fn splice_keeps_other_relays() {
        let owner = Node::new();
        let (x, y, z) = (Node::new(), Node::new(), Node::new());
        owner.push(&x).unwrap();
        owner.push(&y).unwrap();
        assert_eq!(x.feed.listener_count(), 1);

        let old = {
            let mut deps = owner.deps.lock();
            deps.replace(owner.id, 0, z.clone(), |d| d.feed.subscribe(|_| {}))
                .unwrap()
        };
        assert_eq!(old.id, x.id);
        assert_eq!(x.feed.listener_count(), 0);
        assert_eq!(y.feed.listener_count(), 1);
        assert_eq!(z.feed.listener_count(), 1);

        let removed = owner.deps.lock().remove(y.id).unwrap();
        assert_eq!(removed.id, y.id);
        assert_eq!(y.feed.listener_count(), 0);
        assert_eq!(owner.deps.lock().position(z.id), Some(0));
    }

    #[test]
    fn index_out_of_range() {
        let owner = Node::new();
        let dep = Node::new();
        let err = owner
            .deps
            .lock()
            .insert(owner.id, 2, dep.clone(), |d| d.feed.subscribe(|_| {}))
            .unwrap_err();
        assert_eq!(err, StyleError::DependencyIndex { index: 2, len: 0 });
        assert_eq!(dep.feed.listener_count(), 0);
    }
}
