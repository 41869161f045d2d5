// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Style sheets: declarations selected by state, group, type, and template.

use std::fmt;
use std::sync::{Arc, Weak};

use log::{debug, trace};
use parking_lot::RwLock;
use understory_attribute::{Attribute, AttributeId, AttributeRegistry, ErasedValue};

use crate::conditional::{ConditionalStyle, Declaration, Declarations, Resolved};
use crate::dependency::{self, CascadeNode, DependencyList};
use crate::error::StyleError;
use crate::feed::{ChangeFeed, StyleChange, StyleId, Subscription};
use crate::selector::{StateGroupTypeExpression, StyleQuery};

type Change = StyleChange<StateGroupTypeExpression>;

struct SheetInner {
    local: ConditionalStyle<StateGroupTypeExpression>,
    upstream: ChangeFeed<Change>,
    dependencies: RwLock<DependencyList<StyleSheet>>,
}

/// A shared set of declarations guarded by [`StateGroupTypeExpression`]s.
///
/// A sheet has no state of its own; every lookup takes a [`StyleQuery`]
/// describing the element. Like [`StatefulStyle`](crate::StatefulStyle), a
/// sheet consults its own declarations by precedence, then its dependencies
/// in list order. Changes in a dependency are relayed to the sheet's
/// listeners unchanged. Editing the dependency list reports, per selector,
/// every declaration that starts or stops being the one the sheet would use.
///
/// ```rust
/// use std::sync::Arc;
/// use understory_attribute::{AttributeMetadata, AttributeRegistry};
/// use understory_cascade::{
///     StateExpression, StateGroupTypeExpression, StateSet, StyleQuery, StyleSheet, Symbols,
///     TypeHierarchy, TypeRegistry,
/// };
///
/// let mut registry = AttributeRegistry::new();
/// let padding = registry.register("Padding", AttributeMetadata::new(0.0_f64));
/// let mut types = TypeRegistry::new();
/// let control = types.register("Control", None);
/// let button = types.register("Button", Some(control));
/// let mut symbols = Symbols::new();
/// let hover = symbols.state("hover");
///
/// let sheet = StyleSheet::new(Arc::new(registry));
/// let on_control = StateGroupTypeExpression::new().with_type(types.element_type(control));
/// let on_hovered_button = StateGroupTypeExpression::new()
///     .with_type(types.element_type(button))
///     .with_states(StateExpression::state(hover));
/// sheet.set(padding, Some(on_control), 4.0).unwrap();
/// sheet.set(padding, Some(on_hovered_button), 6.0).unwrap();
///
/// let button_ty = types.element_type(button);
/// let idle = StateSet::empty();
/// let hovering = symbols.state_set(["hover"]);
/// assert_eq!(sheet.get(padding, &StyleQuery::new(&button_ty, &idle)), Some(4.0));
/// assert_eq!(sheet.get(padding, &StyleQuery::new(&button_ty, &hovering)), Some(6.0));
/// ```
#[derive(Clone)]
pub struct StyleSheet {
    inner: Arc<SheetInner>,
}

impl StyleSheet {
    /// Creates an empty sheet.
    #[must_use]
    pub fn new(registry: Arc<AttributeRegistry>) -> Self {
        Self {
            inner: Arc::new(SheetInner {
                local: ConditionalStyle::new(registry),
                upstream: ChangeFeed::new(),
                dependencies: RwLock::new(DependencyList::default()),
            }),
        }
    }

    /// Returns this sheet's identity.
    #[must_use]
    pub fn id(&self) -> StyleId {
        self.inner.local.id()
    }

    /// Returns the attribute registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<AttributeRegistry> {
        self.inner.local.registry()
    }

    /// Declares a value under `expression`.
    pub fn set<T: Clone + Send + Sync + 'static>(
        &self,
        attribute: Attribute<T>,
        expression: Option<StateGroupTypeExpression>,
        value: T,
    ) -> Result<(), StyleError> {
        self.registry()
            .validate(attribute, &value)
            .map_err(|err| self.inner.local.invalid(attribute.id(), err))?;
        self.set_unchecked(attribute.id(), expression, ErasedValue::new(value))
    }

    /// Declares an already-erased value.
    pub fn set_erased(
        &self,
        attribute: AttributeId,
        expression: Option<StateGroupTypeExpression>,
        value: ErasedValue,
    ) -> Result<(), StyleError> {
        self.registry()
            .check(attribute, &value)
            .map_err(|err| self.inner.local.invalid(attribute, err))?;
        self.set_unchecked(attribute, expression, value)
    }

    /// Stores a value without the registry check.
    pub(crate) fn set_unchecked(
        &self,
        attribute: AttributeId,
        expression: Option<StateGroupTypeExpression>,
        value: ErasedValue,
    ) -> Result<(), StyleError> {
        let change = self.inner.local.write(attribute, expression, value)?;
        self.inner.upstream.emit(&change);
        Ok(())
    }

    /// Removes a declaration. Returns `true` if one was removed.
    pub fn clear(
        &self,
        attribute: impl Into<AttributeId>,
        expression: Option<&StateGroupTypeExpression>,
    ) -> Result<bool, StyleError> {
        match self.inner.local.remove(attribute.into(), expression)? {
            Some(change) => {
                self.inner.upstream.emit(&change);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Notifies listeners and dependents without changing any declaration.
    pub(crate) fn refire(&self, change: &Change) {
        self.inner.local.feed().emit(change);
        self.inner.upstream.emit(change);
    }

    /// Returns the value declared locally under exactly `expression`.
    #[must_use]
    pub fn local_value(
        &self,
        attribute: impl Into<AttributeId>,
        expression: Option<&StateGroupTypeExpression>,
    ) -> Option<ErasedValue> {
        self.inner.local.local_value(attribute, expression)
    }

    /// Returns the local declarations of `attribute`, highest precedence first.
    #[must_use]
    pub fn local_expressions(
        &self,
        attribute: impl Into<AttributeId>,
    ) -> Declarations<StateGroupTypeExpression> {
        self.inner.local.local_expressions(attribute)
    }

    /// Returns the attributes declared locally, in ID order.
    #[must_use]
    pub fn local_attributes(&self) -> Vec<AttributeId> {
        self.inner.local.attributes()
    }

    /// Returns every attribute declared here or in a dependency, in ID order.
    #[must_use]
    pub fn attributes(&self) -> Vec<AttributeId> {
        let mut out = self.local_attributes();
        for dep in self.dependencies() {
            out.extend(dep.attributes());
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Returns every declaration of `attribute` in resolution order: local
    /// ones by precedence, then each dependency's.
    #[must_use]
    pub fn declarations(
        &self,
        attribute: impl Into<AttributeId>,
    ) -> Vec<(StyleId, Declaration<StateGroupTypeExpression>)> {
        let attribute = attribute.into();
        let mut out: Vec<_> = self
            .local_expressions(attribute)
            .iter()
            .map(|d| (self.id(), d.clone()))
            .collect();
        for dep in self.dependencies() {
            out.extend(dep.declarations(attribute));
        }
        out
    }

    /// Returns `true` if `attribute` resolves for `query`.
    #[must_use]
    pub fn is_set(&self, attribute: impl Into<AttributeId>, query: &StyleQuery<'_>) -> bool {
        self.resolve(attribute, query).is_some()
    }

    /// Resolves `attribute` for `query`.
    #[must_use]
    pub fn resolve(
        &self,
        attribute: impl Into<AttributeId>,
        query: &StyleQuery<'_>,
    ) -> Option<Resolved<StateGroupTypeExpression>> {
        let attribute = attribute.into();
        if let Some(decl) = self.inner.local.matching_local(attribute, query) {
            return Some(Resolved {
                value: decl.value,
                expression: decl.expression,
                source: self.id(),
            });
        }
        self.dependencies()
            .iter()
            .find_map(|dep| dep.resolve(attribute, query))
    }

    /// Returns the effective value for `query`, erased.
    #[must_use]
    pub fn get_erased(
        &self,
        attribute: impl Into<AttributeId>,
        query: &StyleQuery<'_>,
    ) -> Option<ErasedValue> {
        self.resolve(attribute, query).map(|r| r.value)
    }

    /// Returns the effective value for `query`.
    #[must_use]
    pub fn get<T: Clone + 'static>(&self, attribute: Attribute<T>, query: &StyleQuery<'_>) -> Option<T> {
        self.resolve(attribute, query)?.value_as::<T>().cloned()
    }

    /// Returns the effective value, or the attribute's registered default.
    #[must_use]
    pub fn get_or_default<T: Clone + 'static>(
        &self,
        attribute: Attribute<T>,
        query: &StyleQuery<'_>,
    ) -> Option<T> {
        self.get(attribute, query)
            .or_else(|| self.registry().default_value(attribute).cloned())
    }

    /// Returns the dependencies in resolution order.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Self> {
        self.inner.dependencies.read().styles()
    }

    /// Appends a dependency.
    pub fn add_dependency(&self, dependency: &Self) -> Result<(), StyleError> {
        let owner = self.id();
        let relay = self.relay();
        self.rewire(Some(dependency), |deps| {
            let index = deps.len();
            deps.insert(owner, index, dependency.clone(), relay)
        })?;
        debug!("{owner} depends on {}", dependency.id());
        Ok(())
    }

    /// Inserts a dependency at `index`.
    pub fn insert_dependency(&self, index: usize, dependency: &Self) -> Result<(), StyleError> {
        let owner = self.id();
        let relay = self.relay();
        self.rewire(Some(dependency), |deps| {
            deps.insert(owner, index, dependency.clone(), relay)
        })?;
        debug!("{owner} depends on {} at {index}", dependency.id());
        Ok(())
    }

    /// Replaces the dependency at `index`, returning the previous one.
    pub fn replace_dependency(&self, index: usize, dependency: &Self) -> Result<Self, StyleError> {
        let owner = self.id();
        let relay = self.relay();
        let old = self.rewire(Some(dependency), |deps| {
            deps.replace(owner, index, dependency.clone(), relay)
        })?;
        debug!("{owner} replaced {} with {}", old.id(), dependency.id());
        Ok(old)
    }

    /// Removes a dependency. Returns `false` if it was not in the list.
    pub fn remove_dependency(&self, dependency: &Self) -> Result<bool, StyleError> {
        let removed = self.rewire(None, |deps| Ok(deps.remove(dependency.id())))?;
        Ok(removed.is_some())
    }

    /// Edits the dependency list and re-fires every selector whose winning
    /// declaration moved.
    fn rewire<R>(
        &self,
        incoming: Option<&Self>,
        edit: impl FnOnce(&mut DependencyList<Self>) -> Result<R, StyleError>,
    ) -> Result<R, StyleError> {
        self.ensure_unsealed()?;
        let mut attributes = self.attributes();
        if let Some(dep) = incoming {
            attributes.extend(dep.attributes());
            attributes.sort_unstable();
            attributes.dedup();
        }
        let before: Vec<_> = attributes
            .into_iter()
            .map(|attribute| (attribute, self.declarations(attribute)))
            .collect();
        let out = {
            let _wiring = dependency::wiring();
            let mut deps = self.inner.dependencies.write();
            edit(&mut *deps)?
        };
        let mut sent = 0_usize;
        for (attribute, old) in before {
            for change in selector_changes(attribute, &old, &self.declarations(attribute)) {
                self.refire(&change);
                sent += 1;
            }
        }
        trace!("{} dependency edit re-fired {sent} selectors", self.id());
        Ok(out)
    }

    /// Subscribes to every change of this sheet and its dependencies.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.inner.local.subscribe(listener)
    }

    /// Subscribes to changes of one attribute.
    pub fn subscribe_attribute<F>(&self, attribute: impl Into<AttributeId>, listener: F) -> Subscription
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.inner.local.subscribe_attribute(attribute, listener)
    }

    /// Seals the sheet.
    pub fn seal(&self) {
        self.inner.local.seal();
    }

    /// Returns `true` once sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.inner.local.is_sealed()
    }

    pub(crate) fn ensure_unsealed(&self) -> Result<(), StyleError> {
        if self.is_sealed() {
            Err(StyleError::Sealed(self.id()))
        } else {
            Ok(())
        }
    }

    pub(crate) fn attribute_name(&self, attribute: AttributeId) -> &'static str {
        self.inner.local.name(attribute)
    }

    fn relay(&self) -> impl FnOnce(&Self) -> Subscription + use<> {
        let weak: Weak<SheetInner> = Arc::downgrade(&self.inner);
        move |dep: &Self| {
            dep.inner.upstream.subscribe(move |change| {
                if let Some(inner) = weak.upgrade() {
                    Self { inner }.refire(change);
                }
            })
        }
    }
}

type Listed = Vec<(StyleId, Declaration<StateGroupTypeExpression>)>;

/// Compares two resolution-ordered declaration lists selector by selector.
///
/// For each expression, the first declaration carrying it is the one the
/// sheet uses; a change is produced wherever that differs.
fn selector_changes(attribute: AttributeId, old: &Listed, new: &Listed) -> Vec<Change> {
    let mut keys: Vec<&Option<StateGroupTypeExpression>> = Vec::new();
    for (_, decl) in old.iter().chain(new) {
        if !keys.contains(&&decl.expression) {
            keys.push(&decl.expression);
        }
    }
    let winner = |list: &Listed, key: &Option<StateGroupTypeExpression>| {
        list.iter()
            .find(|(_, d)| d.expression == *key)
            .map(|(source, d)| (*source, d.value.clone()))
    };
    keys.into_iter()
        .filter_map(|key| {
            let before = winner(old, key);
            let after = winner(new, key);
            let source = match (&before, &after) {
                (Some((a, x)), Some((b, y))) if a == b && x.ptr_eq(y) => return None,
                (_, Some((id, _))) | (Some((id, _)), None) => *id,
                (None, None) => return None,
            };
            Some(StyleChange {
                attribute,
                expression: key.clone(),
                old_value: before.map(|(_, v)| v),
                new_value: after.map(|(_, v)| v),
                source,
            })
        })
        .collect()
}

impl CascadeNode for StyleSheet {
    fn style_id(&self) -> StyleId {
        self.id()
    }

    fn dependency_snapshot(&self) -> Vec<Self> {
        self.dependencies()
    }
}

impl fmt::Debug for StyleSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyleSheet")
            .field("id", &self.id())
            .field("attributes", &self.inner.local.attributes().len())
            .field("dependencies", &self.inner.dependencies.read().len())
            .finish()
    }
}
