// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conditional style storage.
//!
//! [`ConditionalStyle`] is the storage layer shared by every style flavor:
//! per attribute, a map from optional expression to value, plus a lazily
//! built precedence order. It validates writes against the
//! [`AttributeRegistry`], supports sealing, and reports every effective
//! write through its [`ChangeFeed`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hashbrown::HashMap;
use log::{debug, trace, warn};
use parking_lot::{Mutex, RwLock};
use understory_attribute::{Attribute, AttributeId, AttributeRegistry, CheckError, ErasedValue};

use crate::error::StyleError;
use crate::expression::{StyleExpression, sort_by_precedence};
use crate::feed::{ChangeFeed, StyleChange, StyleId, Subscription};

/// One declared value and its guard.
#[derive(Clone, Debug)]
pub struct Declaration<E> {
    /// The guard, `None` for the unconditional declaration.
    pub expression: Option<E>,
    /// The declared value.
    pub value: ErasedValue,
}

impl<E> Declaration<E> {
    /// Returns the value as `T`, if it has that type.
    #[must_use]
    pub fn value_as<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

/// Declarations of one attribute, highest precedence first.
pub type Declarations<E> = Arc<[Declaration<E>]>;

/// The winning declaration for an attribute, and where it came from.
#[derive(Clone, Debug)]
pub struct Resolved<E> {
    /// The effective value.
    pub value: ErasedValue,
    /// The guard of the winning declaration.
    pub expression: Option<E>,
    /// The style that declared it.
    pub source: StyleId,
}

impl<E: PartialEq> Resolved<E> {
    /// Returns the value as `T`, if it has that type.
    #[must_use]
    pub fn value_as<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Returns `true` if both name the same declaration.
    #[must_use]
    pub fn same_declaration(&self, other: &Self) -> bool {
        self.source == other.source && self.expression == other.expression
    }
}

struct Entry<E> {
    locals: HashMap<Option<E>, ErasedValue>,
    sorted: Mutex<Option<Declarations<E>>>,
}

impl<E: StyleExpression> Entry<E> {
    fn new() -> Self {
        Self {
            locals: HashMap::new(),
            sorted: Mutex::new(None),
        }
    }

    fn sorted(&self) -> Declarations<E> {
        let mut cache = self.sorted.lock();
        if let Some(sorted) = &*cache {
            return sorted.clone();
        }
        let mut list: Vec<(Option<E>, ErasedValue)> = self
            .locals
            .iter()
            .map(|(e, v)| (e.clone(), v.clone()))
            .collect();
        sort_by_precedence(&mut list);
        let sorted: Declarations<E> = list
            .into_iter()
            .map(|(expression, value)| Declaration { expression, value })
            .collect();
        *cache = Some(sorted.clone());
        sorted
    }
}

/// Per-attribute conditional values.
///
/// All methods take `&self`; the style can be shared between threads.
///
/// ```rust
/// use std::sync::Arc;
/// use understory_attribute::{AttributeMetadata, AttributeRegistry};
/// use understory_cascade::{ConditionalStyle, StateExpression, StateId, StateSet};
///
/// let mut registry = AttributeRegistry::new();
/// let width = registry.register("Width", AttributeMetadata::new(0.0_f64));
/// let style = ConditionalStyle::<StateExpression>::new(Arc::new(registry));
///
/// let hover = StateExpression::state(StateId(0));
/// style.set_local(width, None, 10.0).unwrap();
/// style.set_local(width, Some(hover), 12.0).unwrap();
///
/// let hovering = StateSet::from_ids([StateId(0)]);
/// let winner = style.matching_local(width, &hovering).unwrap();
/// assert_eq!(winner.value_as::<f64>(), Some(&12.0));
/// let idle = style.matching_local(width, &StateSet::empty()).unwrap();
/// assert_eq!(idle.value_as::<f64>(), Some(&10.0));
/// ```
pub struct ConditionalStyle<E: StyleExpression> {
    id: StyleId,
    registry: Arc<AttributeRegistry>,
    entries: RwLock<HashMap<AttributeId, Entry<E>>>,
    sealed: AtomicBool,
    feed: ChangeFeed<StyleChange<E>>,
}

impl<E: StyleExpression> ConditionalStyle<E> {
    /// Creates an empty style over `registry`.
    #[must_use]
    pub fn new(registry: Arc<AttributeRegistry>) -> Self {
        Self {
            id: StyleId::next(),
            registry,
            entries: RwLock::new(HashMap::new()),
            sealed: AtomicBool::new(false),
            feed: ChangeFeed::new(),
        }
    }

    /// Returns this style's identity.
    #[must_use]
    #[inline]
    pub fn id(&self) -> StyleId {
        self.id
    }

    /// Returns the attribute registry.
    #[must_use]
    #[inline]
    pub fn registry(&self) -> &Arc<AttributeRegistry> {
        &self.registry
    }

    /// Declares `value` for `attribute` under `expression`.
    ///
    /// Replaces any value declared under an equal expression.
    pub fn set_local<T: Clone + Send + Sync + 'static>(
        &self,
        attribute: Attribute<T>,
        expression: Option<E>,
        value: T,
    ) -> Result<(), StyleError> {
        self.registry
            .validate(attribute, &value)
            .map_err(|err| self.invalid(attribute.id(), err))?;
        self.write(attribute.id(), expression, ErasedValue::new(value))
            .map(drop)
    }

    /// Declares an already-erased value. The value's type is checked.
    pub fn set_local_erased(
        &self,
        attribute: AttributeId,
        expression: Option<E>,
        value: ErasedValue,
    ) -> Result<(), StyleError> {
        self.registry
            .check(attribute, &value)
            .map_err(|err| self.invalid(attribute, err))?;
        self.write(attribute, expression, value).map(drop)
    }

    /// Removes the declaration of `attribute` under `expression`.
    ///
    /// Returns `true` if something was removed. Clearing an absent
    /// declaration succeeds without notifying.
    pub fn clear_local(
        &self,
        attribute: impl Into<AttributeId>,
        expression: Option<&E>,
    ) -> Result<bool, StyleError> {
        self.remove(attribute.into(), expression).map(|c| c.is_some())
    }

    /// Stores a value without checking it and notifies listeners.
    pub(crate) fn write(
        &self,
        attribute: AttributeId,
        expression: Option<E>,
        value: ErasedValue,
    ) -> Result<StyleChange<E>, StyleError> {
        let old_value = {
            let mut entries = self.entries.write();
            if self.is_sealed() {
                return Err(StyleError::Sealed(self.id));
            }
            let entry = entries.entry(attribute).or_insert_with(Entry::new);
            *entry.sorted.get_mut() = None;
            entry.locals.insert(expression.clone(), value.clone())
        };
        trace!("{} set {} under {expression:?}", self.id, self.name(attribute));
        let change = StyleChange {
            attribute,
            expression,
            old_value,
            new_value: Some(value),
            source: self.id,
        };
        self.feed.emit(&change);
        Ok(change)
    }

    /// Removes a declaration and notifies listeners if it existed.
    pub(crate) fn remove(
        &self,
        attribute: AttributeId,
        expression: Option<&E>,
    ) -> Result<Option<StyleChange<E>>, StyleError> {
        let old_value = {
            let mut entries = self.entries.write();
            if self.is_sealed() {
                return Err(StyleError::Sealed(self.id));
            }
            let Some(entry) = entries.get_mut(&attribute) else {
                return Ok(None);
            };
            let Some(old) = entry.locals.remove(&expression.cloned()) else {
                return Ok(None);
            };
            if entry.locals.is_empty() {
                entries.remove(&attribute);
            } else {
                *entry.sorted.get_mut() = None;
            }
            old
        };
        trace!("{} cleared {} under {expression:?}", self.id, self.name(attribute));
        let change = StyleChange {
            attribute,
            expression: expression.cloned(),
            old_value: Some(old_value),
            new_value: None,
            source: self.id,
        };
        self.feed.emit(&change);
        Ok(Some(change))
    }

    /// Returns the value declared under exactly `expression`.
    #[must_use]
    pub fn local_value(
        &self,
        attribute: impl Into<AttributeId>,
        expression: Option<&E>,
    ) -> Option<ErasedValue> {
        let entries = self.entries.read();
        entries
            .get(&attribute.into())?
            .locals
            .get(&expression.cloned())
            .cloned()
    }

    /// Returns `true` if any declaration exists for `attribute`.
    #[must_use]
    pub fn has_local(&self, attribute: impl Into<AttributeId>) -> bool {
        self.entries.read().contains_key(&attribute.into())
    }

    /// Returns the declarations of `attribute`, highest precedence first.
    ///
    /// The order is cached until the attribute is next written.
    #[must_use]
    pub fn local_expressions(&self, attribute: impl Into<AttributeId>) -> Declarations<E> {
        let entries = self.entries.read();
        match entries.get(&attribute.into()) {
            Some(entry) => entry.sorted(),
            None => Arc::from([]),
        }
    }

    /// Returns the highest-precedence declaration that holds in `cx`.
    #[must_use]
    pub fn matching_local(
        &self,
        attribute: impl Into<AttributeId>,
        cx: &E::Context<'_>,
    ) -> Option<Declaration<E>> {
        self.local_expressions(attribute)
            .iter()
            .find(|d| d.expression.as_ref().is_none_or(|e| e.matches(cx)))
            .cloned()
    }

    /// Returns every attribute with at least one declaration, in ID order.
    #[must_use]
    pub fn attributes(&self) -> Vec<AttributeId> {
        let mut out: Vec<AttributeId> = self.entries.read().keys().copied().collect();
        out.sort_unstable();
        out
    }

    /// Makes the style immutable. Later writes fail with [`StyleError::Sealed`].
    pub fn seal(&self) {
        let _entries = self.entries.write();
        if !self.sealed.swap(true, Ordering::AcqRel) {
            debug!("{} sealed", self.id);
        }
    }

    /// Returns `true` once [`seal`](Self::seal) has been called.
    #[must_use]
    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Returns the change feed.
    #[must_use]
    #[inline]
    pub fn feed(&self) -> &ChangeFeed<StyleChange<E>> {
        &self.feed
    }

    /// Subscribes to every change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StyleChange<E>) + Send + Sync + 'static,
    {
        self.feed.subscribe(listener)
    }

    /// Subscribes to changes of one attribute.
    pub fn subscribe_attribute<F>(&self, attribute: impl Into<AttributeId>, listener: F) -> Subscription
    where
        F: Fn(&StyleChange<E>) + Send + Sync + 'static,
    {
        self.feed.subscribe_attribute(attribute, listener)
    }

    pub(crate) fn name(&self, attribute: AttributeId) -> &'static str {
        self.registry.name(attribute).unwrap_or("<unregistered>")
    }

    pub(crate) fn invalid(&self, attribute: AttributeId, source: CheckError) -> StyleError {
        let name = self.name(attribute);
        warn!("{} rejected value for `{name}`: {source}", self.id);
        StyleError::Invalid {
            attribute,
            name,
            source,
        }
    }
}

impl<E: StyleExpression> fmt::Debug for ConditionalStyle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        f.debug_struct("ConditionalStyle")
            .field("id", &self.id)
            .field("attributes", &entries.len())
            .field("sealed", &self.is_sealed())
            .finish_non_exhaustive()
    }
}
