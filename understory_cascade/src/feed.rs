// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change notification.
//!
//! Every style owns a [`ChangeFeed`]. Listeners subscribe with an optional
//! [`TypedPredicate`] over the event; subscriptions are routed through a
//! [`ConditionTree`] so listeners sharing a filter share the node that tests
//! it.
//!
//! Delivery takes a snapshot of the matching listeners under the feed lock
//! and invokes them after releasing it. A listener may therefore subscribe,
//! unsubscribe, or mutate styles re-entrantly. A listener removed during a
//! dispatch is skipped if it has not run yet.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use parking_lot::Mutex;
use understory_attribute::{AttributeId, ErasedValue};
use understory_predicate::{ConditionTree, PredicateRegistry, TypedPredicate};

static NEXT_STYLE_ID: AtomicU64 = AtomicU64::new(1);

/// The identity of a style instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StyleId(u64);

impl StyleId {
    pub(crate) fn next() -> Self {
        Self(NEXT_STYLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric ID.
    #[must_use]
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "style#{}", self.0)
    }
}

/// A change to the value of an attribute.
///
/// For a direct write, `expression` is the declaration's guard and the
/// values are the stored values before and after. For a change re-fired
/// by a stateful style or a dependent, `expression` identifies the
/// declaration that changed and `new_value` is the effective value seen
/// by the style that fired it.
#[derive(Clone, Debug)]
pub struct StyleChange<E> {
    /// The attribute that changed.
    pub attribute: AttributeId,
    /// The guarding expression, `None` for the unconditional declaration.
    pub expression: Option<E>,
    /// The value before the change, if known.
    pub old_value: Option<ErasedValue>,
    /// The value after the change; `None` when cleared or no longer set.
    pub new_value: Option<ErasedValue>,
    /// The style the change originated in.
    pub source: StyleId,
}

impl<E> StyleChange<E> {
    /// Returns the new value as `T`, if present and of that type.
    #[must_use]
    pub fn new_as<T: 'static>(&self) -> Option<&T> {
        self.new_value.as_ref()?.downcast_ref()
    }

    /// Returns the old value as `T`, if present and of that type.
    #[must_use]
    pub fn old_as<T: 'static>(&self) -> Option<&T> {
        self.old_value.as_ref()?.downcast_ref()
    }
}

/// A change listener.
pub type Listener<Ev> = dyn Fn(&Ev) + Send + Sync;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct SubscriptionKey(u64);

struct Slot<Ev> {
    listener: Arc<Listener<Ev>>,
    predicate: TypedPredicate<Ev>,
    active: Arc<AtomicBool>,
}

struct FeedState<Ev> {
    next_key: u64,
    routes: ConditionTree<Ev, SubscriptionKey>,
    slots: HashMap<SubscriptionKey, Slot<Ev>>,
    predicates: PredicateRegistry<Ev>,
}

struct FeedInner<Ev> {
    state: Mutex<FeedState<Ev>>,
}

trait Detach: Send + Sync {
    fn detach(&self, key: SubscriptionKey);
}

impl<Ev: Send + Sync + 'static> Detach for FeedInner<Ev> {
    fn detach(&self, key: SubscriptionKey) {
        let mut state = self.state.lock();
        if let Some(slot) = state.slots.remove(&key) {
            state.routes.remove(&slot.predicate, &[key]);
        }
    }
}

/// A set of listeners for events of type `Ev`.
///
/// Cloning a feed yields another handle to the same listeners.
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use understory_cascade::ChangeFeed;
///
/// let feed = ChangeFeed::<u32>::new();
/// let even = feed.predicate("even", |v| v % 2 == 0);
/// let seen = Arc::new(AtomicU32::new(0));
///
/// let sink = seen.clone();
/// let sub = feed.subscribe_where(even, move |v| {
///     sink.fetch_add(*v, Ordering::Relaxed);
/// });
///
/// feed.emit(&3);
/// feed.emit(&4);
/// assert_eq!(seen.load(Ordering::Relaxed), 4);
///
/// drop(sub);
/// feed.emit(&6);
/// assert_eq!(seen.load(Ordering::Relaxed), 4);
/// ```
pub struct ChangeFeed<Ev> {
    inner: Arc<FeedInner<Ev>>,
}

impl<Ev> Clone for ChangeFeed<Ev> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Ev: Clone + Send + Sync + 'static> Default for ChangeFeed<Ev> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ev: Clone + Send + Sync + 'static> ChangeFeed<Ev> {
    /// Creates a feed with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FeedInner {
                state: Mutex::new(FeedState {
                    next_key: 0,
                    routes: ConditionTree::new(),
                    slots: HashMap::new(),
                    predicates: PredicateRegistry::new(),
                }),
            }),
        }
    }

    /// Returns the named filter of this feed, registering `accept` if new.
    ///
    /// Predicates passed to [`subscribe_where`](Self::subscribe_where) must
    /// be built from leaves obtained here: leaves are identified per feed.
    pub fn predicate<F>(&self, name: &str, accept: F) -> TypedPredicate<Ev>
    where
        F: Fn(&Ev) -> bool + Send + Sync + 'static,
    {
        let mut state = self.inner.state.lock();
        match state.predicates.get(name) {
            Some(existing) => existing,
            None => state.predicates.filter(name, accept),
        }
    }

    /// Subscribes to every event.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Ev) + Send + Sync + 'static,
    {
        self.subscribe_where(TypedPredicate::Always, listener)
    }

    /// Subscribes to events accepted by `predicate`.
    pub fn subscribe_where<F>(&self, predicate: TypedPredicate<Ev>, listener: F) -> Subscription
    where
        F: Fn(&Ev) + Send + Sync + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let key = {
            let mut state = self.inner.state.lock();
            let key = SubscriptionKey(state.next_key);
            state.next_key += 1;
            state.routes.add(&predicate, [key]);
            state.slots.insert(
                key,
                Slot {
                    listener: Arc::new(listener),
                    predicate,
                    active: active.clone(),
                },
            );
            key
        };
        let weak: Weak<FeedInner<Ev>> = Arc::downgrade(&self.inner);
        let feed: Weak<dyn Detach> = weak;
        Subscription {
            feed: Some(feed),
            key,
            active,
        }
    }

    /// Delivers `event` to every matching listener, in subscription order.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, event: &Ev) -> usize {
        let targets: Vec<(Arc<Listener<Ev>>, Arc<AtomicBool>)> = {
            let state = self.inner.state.lock();
            let mut keys: Vec<SubscriptionKey> =
                state.routes.values_for(event).into_iter().copied().collect();
            keys.sort_unstable();
            keys.dedup();
            keys.iter()
                .filter_map(|key| state.slots.get(key))
                .map(|slot| (slot.listener.clone(), slot.active.clone()))
                .collect()
        };
        let mut delivered = 0;
        for (listener, active) in targets {
            if active.load(Ordering::Acquire) {
                listener(event);
                delivered += 1;
            }
        }
        delivered
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().slots.len()
    }
}

impl<E: Clone + Send + Sync + 'static> ChangeFeed<StyleChange<E>> {
    /// Subscribes to changes of a single attribute.
    pub fn subscribe_attribute<F>(&self, attribute: impl Into<AttributeId>, listener: F) -> Subscription
    where
        F: Fn(&StyleChange<E>) + Send + Sync + 'static,
    {
        let attribute = attribute.into();
        let predicate = self.predicate(&format!("attribute {attribute}"), move |change| {
            change.attribute == attribute
        });
        self.subscribe_where(predicate, listener)
    }
}

impl<Ev> fmt::Debug for ChangeFeed<Ev> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ChangeFeed")
            .field("listeners", &state.slots.len())
            .field("nodes", &state.routes.node_count())
            .finish()
    }
}

/// An owned subscription. Dropping it unsubscribes the listener.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    feed: Option<Weak<dyn Detach>>,
    key: SubscriptionKey,
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Returns `true` while the listener can still be invoked.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && self.feed.as_ref().is_some_and(|f| f.strong_count() > 0)
    }

    /// Unsubscribes now. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}

    /// Keeps the listener subscribed for as long as the feed lives.
    pub fn forget(mut self) {
        self.feed = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(feed) = self.feed.take() else {
            return;
        };
        self.active.store(false, Ordering::Release);
        if let Some(feed) = feed.upgrade() {
            feed.detach(self.key);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key.0)
            .field("active", &self.is_active())
            .finish()
    }
}
