// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Styles resolved against a live state set.

use std::fmt;
use std::sync::{Arc, Weak};

use log::{debug, trace};
use parking_lot::RwLock;
use understory_attribute::{Attribute, AttributeId, AttributeRegistry, ErasedValue};

use crate::conditional::{ConditionalStyle, Declarations, Resolved};
use crate::dependency::{self, CascadeNode, DependencyList};
use crate::error::StyleError;
use crate::expression::StyleExpression;
use crate::feed::{ChangeFeed, StyleChange, StyleId, Subscription};
use crate::ids::StateSet;
use crate::state::StateExpression;

type Change = StyleChange<StateExpression>;

/// Declarations of one attribute per style, in resolution order.
type Sections = Vec<(StyleId, Declarations<StateExpression>)>;

/// A change somewhere in a dependency chain.
///
/// Carries the origin's sections from just before the change, so every
/// dependent can resolve its old value by splicing them in.
#[derive(Clone)]
struct Upstream {
    origin: StyleId,
    before: Arc<[(AttributeId, Sections)]>,
}

struct StatefulInner {
    local: ConditionalStyle<StateExpression>,
    // Changes of this style and everything it depends on.
    upstream: ChangeFeed<Upstream>,
    dependencies: RwLock<DependencyList<StatefulStyle>>,
    state: RwLock<StateSet>,
}

/// A conditional style over [`StateExpression`]s with ordered dependencies
/// and a current state set.
///
/// Resolution is two-tiered. The highest-precedence local declaration that
/// holds in the state set wins; if there is none, the dependencies are asked
/// in list order and the first that resolves the attribute wins. Dependency
/// order is never mixed with expression priority.
///
/// Cloning yields another handle to the same style.
///
/// ```rust
/// use std::sync::Arc;
/// use understory_attribute::{AttributeMetadata, AttributeRegistry};
/// use understory_cascade::{StateExpression, StatefulStyle, Symbols};
///
/// let mut registry = AttributeRegistry::new();
/// let color = registry.register("Color", AttributeMetadata::new("black"));
/// let registry = Arc::new(registry);
/// let mut symbols = Symbols::new();
/// let hover = symbols.state("hover");
///
/// let theme = StatefulStyle::new(registry.clone());
/// theme.set(color, None, "blue").unwrap();
///
/// let button = StatefulStyle::new(registry);
/// button.add_dependency(&theme).unwrap();
/// button.set(color, Some(StateExpression::state(hover)), "red").unwrap();
///
/// assert_eq!(button.get(color), Some("blue"));
/// button.set_state(symbols.state_set(["hover"]));
/// assert_eq!(button.get(color), Some("red"));
/// ```
#[derive(Clone)]
pub struct StatefulStyle {
    inner: Arc<StatefulInner>,
}

impl StatefulStyle {
    /// Creates an empty style in the empty state set.
    #[must_use]
    pub fn new(registry: Arc<AttributeRegistry>) -> Self {
        Self {
            inner: Arc::new(StatefulInner {
                local: ConditionalStyle::new(registry),
                upstream: ChangeFeed::new(),
                dependencies: RwLock::new(DependencyList::default()),
                state: RwLock::new(StateSet::empty()),
            }),
        }
    }

    /// Returns this style's identity.
    #[must_use]
    pub fn id(&self) -> StyleId {
        self.inner.local.id()
    }

    /// Returns the attribute registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<AttributeRegistry> {
        self.inner.local.registry()
    }

    /// Declares a local value.
    pub fn set<T: Clone + Send + Sync + 'static>(
        &self,
        attribute: Attribute<T>,
        expression: Option<StateExpression>,
        value: T,
    ) -> Result<(), StyleError> {
        self.inner
            .local
            .registry()
            .validate(attribute, &value)
            .map_err(|err| self.inner.local.invalid(attribute.id(), err))?;
        self.set_unchecked(attribute.id(), expression, ErasedValue::new(value))
    }

    /// Declares an already-erased local value.
    pub fn set_erased(
        &self,
        attribute: AttributeId,
        expression: Option<StateExpression>,
        value: ErasedValue,
    ) -> Result<(), StyleError> {
        self.inner
            .local
            .registry()
            .check(attribute, &value)
            .map_err(|err| self.inner.local.invalid(attribute, err))?;
        self.set_unchecked(attribute, expression, value)
    }

    fn set_unchecked(
        &self,
        attribute: AttributeId,
        expression: Option<StateExpression>,
        value: ErasedValue,
    ) -> Result<(), StyleError> {
        let before = self.sections(attribute);
        self.inner.local.write(attribute, expression, value)?;
        self.propagate(vec![(attribute, before)].into());
        Ok(())
    }

    /// Removes a local declaration. Returns `true` if one was removed.
    pub fn clear(
        &self,
        attribute: impl Into<AttributeId>,
        expression: Option<&StateExpression>,
    ) -> Result<bool, StyleError> {
        let attribute = attribute.into();
        let before = self.sections(attribute);
        if self.inner.local.remove(attribute, expression)?.is_none() {
            return Ok(false);
        }
        self.propagate(vec![(attribute, before)].into());
        Ok(true)
    }

    /// Returns the value declared locally under exactly `expression`.
    #[must_use]
    pub fn local_value(
        &self,
        attribute: impl Into<AttributeId>,
        expression: Option<&StateExpression>,
    ) -> Option<ErasedValue> {
        self.inner.local.local_value(attribute, expression)
    }

    /// Returns the local declarations of `attribute`, highest precedence first.
    #[must_use]
    pub fn local_expressions(&self, attribute: impl Into<AttributeId>) -> Declarations<StateExpression> {
        self.inner.local.local_expressions(attribute)
    }

    /// Returns every attribute declared here or in a dependency, in ID order.
    #[must_use]
    pub fn attributes(&self) -> Vec<AttributeId> {
        let mut out = self.inner.local.attributes();
        for dep in self.dependencies() {
            out.extend(dep.attributes());
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Returns the current state set.
    #[must_use]
    pub fn state(&self) -> StateSet {
        self.inner.state.read().clone()
    }

    /// Moves the style into `states`.
    ///
    /// For every attribute whose winning declaration differs between the old
    /// and new state sets, listeners receive the new effective value. All
    /// notifications are delivered before this returns. Returns how many
    /// were sent.
    pub fn set_state(&self, states: StateSet) -> usize {
        let old = {
            let mut current = self.inner.state.write();
            if *current == states {
                return 0;
            }
            core::mem::replace(&mut *current, states.clone())
        };
        trace!(
            "{} state change toggles {:?}",
            self.id(),
            old.symmetric_difference(&states)
        );

        let changes: Vec<Change> = self
            .attributes()
            .into_iter()
            .filter_map(|attribute| {
                let before = self.resolve_in(attribute, &old);
                let after = self.resolve_in(attribute, &states);
                let same = match (&before, &after) {
                    (Some(a), Some(b)) => a.same_declaration(b),
                    (None, None) => true,
                    _ => false,
                };
                (!same).then(|| StyleChange {
                    attribute,
                    expression: after.as_ref().and_then(|r| r.expression.clone()),
                    old_value: before.map(|r| r.value),
                    new_value: after.map(|r| r.value),
                    source: self.id(),
                })
            })
            .collect();

        for change in &changes {
            self.inner.local.feed().emit(change);
        }
        changes.len()
    }

    /// Returns `true` if `attribute` resolves in the current state set.
    #[must_use]
    pub fn is_set(&self, attribute: impl Into<AttributeId>) -> bool {
        self.is_set_in(attribute, &self.state())
    }

    /// Returns `true` if `attribute` resolves in `states`.
    #[must_use]
    pub fn is_set_in(&self, attribute: impl Into<AttributeId>, states: &StateSet) -> bool {
        self.resolve_in(attribute, states).is_some()
    }

    /// Resolves `attribute` in the current state set.
    #[must_use]
    pub fn resolve(&self, attribute: impl Into<AttributeId>) -> Option<Resolved<StateExpression>> {
        self.resolve_in(attribute, &self.state())
    }

    /// Resolves `attribute` in `states`: local declarations by precedence,
    /// then dependencies in list order.
    #[must_use]
    pub fn resolve_in(
        &self,
        attribute: impl Into<AttributeId>,
        states: &StateSet,
    ) -> Option<Resolved<StateExpression>> {
        let attribute = attribute.into();
        if let Some(decl) = self.inner.local.matching_local(attribute, states) {
            return Some(Resolved {
                value: decl.value,
                expression: decl.expression,
                source: self.id(),
            });
        }
        self.dependencies()
            .iter()
            .find_map(|dep| dep.resolve_in(attribute, states))
    }

    /// Returns the effective value of `attribute`, erased.
    #[must_use]
    pub fn get_erased(&self, attribute: impl Into<AttributeId>) -> Option<ErasedValue> {
        self.resolve(attribute).map(|r| r.value)
    }

    /// Returns the effective value of `attribute`.
    #[must_use]
    pub fn get<T: Clone + 'static>(&self, attribute: Attribute<T>) -> Option<T> {
        self.resolve(attribute)?.value_as::<T>().cloned()
    }

    /// Returns the effective value, or the attribute's registered default.
    ///
    /// `None` only if `attribute` is not registered with type `T`.
    #[must_use]
    pub fn get_or_default<T: Clone + 'static>(&self, attribute: Attribute<T>) -> Option<T> {
        self.get(attribute)
            .or_else(|| self.registry().default_value(attribute).cloned())
    }

    /// Returns the dependencies in resolution order.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Self> {
        self.inner.dependencies.read().styles()
    }

    /// Appends a dependency.
    ///
    /// Listeners are told about every attribute whose effective value the
    /// new dependency changes.
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

    /// Inserts a dependency at `index`; earlier entries shadow later ones.
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

    /// Edits the dependency list, then reports every attribute whose
    /// effective value moved, here and in every dependent.
    ///
    /// Attributes are taken from the old list plus `incoming`, so entries
    /// after an insertion point are compared too.
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
        let before: Arc<[(AttributeId, Sections)]> = attributes
            .into_iter()
            .map(|attribute| (attribute, self.sections(attribute)))
            .collect();
        let out = {
            let _wiring = dependency::wiring();
            let mut deps = self.inner.dependencies.write();
            edit(&mut *deps)?
        };
        let sent = self.notify(self.id(), &before);
        trace!("{} dependency edit sent {sent} changes", self.id());
        self.propagate(before);
        Ok(out)
    }

    /// Hands a change that originated here to dependents.
    ///
    /// Local writes reach this style's own listeners through the
    /// declaration feed.
    fn propagate(&self, before: Arc<[(AttributeId, Sections)]>) {
        self.inner.upstream.emit(&Upstream {
            origin: self.id(),
            before,
        });
    }

    /// Subscribes to every change of this style.
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

    /// Seals the style: declarations and dependencies become immutable.
    ///
    /// The state set can still change.
    pub fn seal(&self) {
        self.inner.local.seal();
    }

    /// Returns `true` once sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.inner.local.is_sealed()
    }

    fn ensure_unsealed(&self) -> Result<(), StyleError> {
        if self.is_sealed() {
            Err(StyleError::Sealed(self.id()))
        } else {
            Ok(())
        }
    }

    /// Builds the closure that subscribes to a new dependency's changes.
    fn relay(&self) -> impl FnOnce(&Self) -> Subscription + use<> {
        let weak: Weak<StatefulInner> = Arc::downgrade(&self.inner);
        move |dep: &Self| {
            dep.inner.upstream.subscribe(move |event| {
                if let Some(inner) = weak.upgrade() {
                    Self { inner }.on_dependency_change(event);
                }
            })
        }
    }

    fn on_dependency_change(&self, event: &Upstream) {
        self.inner.upstream.emit(event);
        self.notify(event.origin, &event.before);
    }

    /// Compares each attribute's resolution with `origin` as it was against
    /// the current one, in the current state set, and notifies listeners of
    /// every difference. Returns how many were sent.
    fn notify(&self, origin: StyleId, before: &[(AttributeId, Sections)]) -> usize {
        let states = self.state();
        let mut sent = 0;
        for (attribute, snapshot) in before {
            let spliced = self.sections_with(*attribute, Some((origin, snapshot)));
            let old = first_match(&spliced, &states);
            let new = first_match(&self.sections(*attribute), &states);
            if let Some(change) = effective_change(*attribute, old, new) {
                self.inner.local.feed().emit(&change);
                sent += 1;
            }
        }
        sent
    }

    fn sections(&self, attribute: AttributeId) -> Sections {
        self.sections_with(attribute, None)
    }

    /// Flattens the declarations of `attribute` in resolution order,
    /// substituting `swap`'s sections wherever its style appears.
    fn sections_with(&self, attribute: AttributeId, swap: Option<(StyleId, &Sections)>) -> Sections {
        let mut out = Vec::new();
        self.collect_sections(attribute, swap, &mut out);
        out
    }

    fn collect_sections(
        &self,
        attribute: AttributeId,
        swap: Option<(StyleId, &Sections)>,
        out: &mut Sections,
    ) {
        if let Some((_, snapshot)) = swap.filter(|(id, _)| *id == self.id()) {
            out.extend(snapshot.iter().cloned());
            return;
        }
        out.push((self.id(), self.inner.local.local_expressions(attribute)));
        for dep in self.dependencies() {
            dep.collect_sections(attribute, swap, out);
        }
    }
}

fn first_match(sections: &Sections, states: &StateSet) -> Option<Resolved<StateExpression>> {
    sections.iter().find_map(|(source, decls)| {
        decls
            .iter()
            .find(|d| d.expression.as_ref().is_none_or(|e| e.matches(states)))
            .map(|d| Resolved {
                value: d.value.clone(),
                expression: d.expression.clone(),
                source: *source,
            })
    })
}

/// The change event between two resolutions, `None` if they agree.
fn effective_change(
    attribute: AttributeId,
    old: Option<Resolved<StateExpression>>,
    new: Option<Resolved<StateExpression>>,
) -> Option<Change> {
    let winner = match (&old, &new) {
        (Some(a), Some(b)) if a.same_declaration(b) && a.value.ptr_eq(&b.value) => return None,
        (_, Some(w)) | (Some(w), None) => w,
        (None, None) => return None,
    };
    let expression = winner.expression.clone();
    let source = winner.source;
    Some(StyleChange {
        attribute,
        expression,
        old_value: old.map(|r| r.value),
        new_value: new.map(|r| r.value),
        source,
    })
}

impl CascadeNode for StatefulStyle {
    fn style_id(&self) -> StyleId {
        self.id()
    }

    fn dependency_snapshot(&self) -> Vec<Self> {
        self.dependencies()
    }
}

impl fmt::Debug for StatefulStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatefulStyle")
            .field("id", &self.id())
            .field("state", &*self.inner.state.read())
            .field("attributes", &self.inner.local.attributes().len())
            .field("dependencies", &self.inner.dependencies.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::StateId;
    use parking_lot::Mutex;
    use understory_attribute::AttributeMetadata;

    struct Fixture {
        registry: Arc<AttributeRegistry>,
        color: Attribute<&'static str>,
        width: Attribute<f64>,
    }

    fn fixture() -> Fixture {
        let mut registry = AttributeRegistry::new();
        let color = registry.register("Color", AttributeMetadata::new("black"));
        let width = registry.register("Width", AttributeMetadata::new(0.0_f64));
        Fixture {
            registry: Arc::new(registry),
            color,
            width,
        }
    }

    fn s(id: u32) -> StateExpression {
        StateExpression::state(StateId(id))
    }

    fn states(ids: &[u32]) -> StateSet {
        ids.iter().map(|&i| StateId(i)).collect()
    }

    fn record(style: &StatefulStyle) -> (Arc<Mutex<Vec<Change>>>, Subscription) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let sub = style.subscribe(move |c| sink.lock().push(c.clone()));
        (log, sub)
    }

    #[test]
    fn local_beats_dependencies() {
        let f = fixture();
        let base = StatefulStyle::new(f.registry.clone());
        let style = StatefulStyle::new(f.registry.clone());
        style.add_dependency(&base).unwrap();

        base.set(f.color, None, "blue").unwrap();
        assert_eq!(style.get(f.color), Some("blue"));
        style.set(f.color, Some(s(0)), "red").unwrap();
        assert_eq!(style.get(f.color), Some("blue"));
        assert_eq!(style.resolve(f.color).unwrap().source, base.id());

        style.set_state(states(&[0]));
        assert_eq!(style.get(f.color), Some("red"));
        assert_eq!(style.resolve(f.color).unwrap().source, style.id());
    }

    #[test]
    fn dependency_order_shadows_priority() {
        let f = fixture();
        let d1 = StatefulStyle::new(f.registry.clone());
        let d2 = StatefulStyle::new(f.registry.clone());
        let style = StatefulStyle::new(f.registry.clone());
        style.add_dependency(&d1).unwrap();
        style.add_dependency(&d2).unwrap();

        d1.set(f.width, None, 1.0).unwrap();
        // Higher priority, but in a later dependency.
        d2.set(f.width, Some(s(0) & s(1)), 2.0).unwrap();
        style.set_state(states(&[0, 1]));
        assert_eq!(style.get(f.width), Some(1.0));

        d1.clear(f.width, None).unwrap();
        assert_eq!(style.get(f.width), Some(2.0));
    }

    #[test]
    fn set_state_fires_for_changed_winners_only() {
        let f = fixture();
        let style = StatefulStyle::new(f.registry.clone());
        style.set(f.color, None, "blue").unwrap();
        style.set(f.color, Some(s(0)), "red").unwrap();
        style.set(f.width, None, 3.0).unwrap();

        let (log, _sub) = record(&style);
        assert_eq!(style.set_state(states(&[0])), 1);
        assert_eq!(style.set_state(states(&[0])), 0);
        assert_eq!(style.set_state(states(&[0, 5])), 0);
        assert_eq!(style.set_state(states(&[])), 1);

        let log = log.lock();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].attribute, f.color.id());
        assert_eq!(log[0].new_as::<&str>(), Some(&"red"));
        assert_eq!(log[0].old_as::<&str>(), Some(&"blue"));
        assert_eq!(log[0].expression, Some(s(0)));
        assert_eq!(log[1].new_as::<&str>(), Some(&"blue"));
        assert_eq!(log[1].expression, None);
    }

    #[test]
    fn set_state_reaches_dependency_values() {
        let f = fixture();
        let base = StatefulStyle::new(f.registry.clone());
        base.set(f.width, Some(s(2)), 8.0).unwrap();
        let style = StatefulStyle::new(f.registry.clone());
        style.add_dependency(&base).unwrap();

        let (log, _sub) = record(&style);
        assert_eq!(style.set_state(states(&[2])), 1);
        assert_eq!(log.lock()[0].new_as::<f64>(), Some(&8.0));
        assert_eq!(log.lock()[0].source, style.id());
    }

    #[test]
    fn dependency_changes_refire_unless_shadowed() {
        let f = fixture();
        let d1 = StatefulStyle::new(f.registry.clone());
        let d2 = StatefulStyle::new(f.registry.clone());
        let style = StatefulStyle::new(f.registry.clone());
        style.add_dependency(&d1).unwrap();
        style.add_dependency(&d2).unwrap();
        let (log, _sub) = record(&style);

        d2.set(f.width, None, 2.0).unwrap();
        assert_eq!(log.lock().len(), 1);
        assert_eq!(log.lock()[0].source, d2.id());

        d1.set(f.width, None, 1.0).unwrap();
        assert_eq!(log.lock().len(), 2);
        assert_eq!(log.lock()[1].new_as::<f64>(), Some(&1.0));

        // Shadowed by d1.
        d2.set(f.width, None, 3.0).unwrap();
        assert_eq!(log.lock().len(), 2);

        // Not active in the current state.
        d1.set(f.width, Some(s(4)), 9.0).unwrap();
        assert_eq!(log.lock().len(), 2);

        // Shadowed locally.
        style.set(f.width, None, 0.5).unwrap();
        assert_eq!(log.lock().len(), 3);
        d1.set(f.width, None, 1.5).unwrap();
        assert_eq!(log.lock().len(), 3);
    }

    #[test]
    fn transitive_dependency_changes() {
        let f = fixture();
        let root = StatefulStyle::new(f.registry.clone());
        let middle = StatefulStyle::new(f.registry.clone());
        let leaf = StatefulStyle::new(f.registry.clone());
        middle.add_dependency(&root).unwrap();
        leaf.add_dependency(&middle).unwrap();
        // The middle style's own state must not hide changes from the leaf.
        middle.set(f.color, Some(s(0)), "green").unwrap();
        middle.set_state(states(&[0]));

        let (log, _sub) = record(&leaf);
        root.set(f.color, None, "blue").unwrap();
        assert_eq!(log.lock().len(), 1);
        assert_eq!(log.lock()[0].new_as::<&str>(), Some(&"blue"));
        assert_eq!(leaf.get(f.color), Some("blue"));
    }

    #[test]
    fn splicing_dependencies() {
        let f = fixture();
        let (a, b, c) = (
            StatefulStyle::new(f.registry.clone()),
            StatefulStyle::new(f.registry.clone()),
            StatefulStyle::new(f.registry.clone()),
        );
        a.set(f.width, None, 1.0).unwrap();
        b.set(f.width, None, 2.0).unwrap();
        c.set(f.width, None, 3.0).unwrap();

        let style = StatefulStyle::new(f.registry.clone());
        style.add_dependency(&a).unwrap();
        style.insert_dependency(0, &b).unwrap();
        assert_eq!(style.get(f.width), Some(2.0));

        let old = style.replace_dependency(0, &c).unwrap();
        assert_eq!(old.id(), b.id());
        assert_eq!(style.get(f.width), Some(3.0));

        assert_eq!(style.remove_dependency(&c), Ok(true));
        assert_eq!(style.remove_dependency(&c), Ok(false));
        assert_eq!(style.get(f.width), Some(1.0));

        // The removed relay no longer forwards.
        let (log, _sub) = record(&style);
        c.set(f.width, None, 4.0).unwrap();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn dependency_edits_notify() {
        let f = fixture();
        let theme = StatefulStyle::new(f.registry.clone());
        theme.set(f.color, None, "blue").unwrap();
        let accent = StatefulStyle::new(f.registry.clone());
        accent.set(f.color, None, "green").unwrap();
        let warning = StatefulStyle::new(f.registry.clone());
        warning.set(f.color, None, "red").unwrap();

        let style = StatefulStyle::new(f.registry.clone());
        let (log, _sub) = record(&style);
        let seen = |i: usize| {
            let log = log.lock();
            (
                log[i].old_as::<&str>().copied(),
                log[i].new_as::<&str>().copied(),
                log[i].source,
            )
        };

        style.add_dependency(&theme).unwrap();
        assert_eq!(style.get(f.color), Some("blue"));
        assert_eq!(seen(0), (None, Some("blue"), theme.id()));

        style.insert_dependency(0, &accent).unwrap();
        assert_eq!(style.get(f.color), Some("green"));
        assert_eq!(seen(1), (Some("blue"), Some("green"), accent.id()));

        style.replace_dependency(0, &warning).unwrap();
        assert_eq!(seen(2), (Some("green"), Some("red"), warning.id()));

        style.remove_dependency(&warning).unwrap();
        assert_eq!(style.get(f.color), Some("blue"));
        assert_eq!(seen(3), (Some("red"), Some("blue"), theme.id()));

        style.remove_dependency(&theme).unwrap();
        assert_eq!(seen(4), (Some("blue"), None, theme.id()));
        assert_eq!(log.lock().len(), 5);
    }

    #[test]
    fn dependency_edits_without_effect_stay_quiet() {
        let f = fixture();
        let base = StatefulStyle::new(f.registry.clone());
        base.set(f.width, None, 1.0).unwrap();
        let hover_only = StatefulStyle::new(f.registry.clone());
        hover_only.set(f.width, Some(s(0)), 2.0).unwrap();
        let style = StatefulStyle::new(f.registry.clone());
        style.add_dependency(&base).unwrap();
        style.set(f.color, None, "black").unwrap();

        let (log, _sub) = record(&style);
        // Inactive in the current state, so the later entry still wins.
        style.insert_dependency(0, &hover_only).unwrap();
        assert!(log.lock().is_empty());
        assert_eq!(style.get(f.width), Some(1.0));

        style.set_state(states(&[0]));
        assert_eq!(log.lock().len(), 1);
        assert_eq!(log.lock()[0].new_as::<f64>(), Some(&2.0));
    }

    #[test]
    fn dependency_edits_reach_dependents() {
        let f = fixture();
        let root = StatefulStyle::new(f.registry.clone());
        root.set(f.color, None, "blue").unwrap();
        let middle = StatefulStyle::new(f.registry.clone());
        let leaf = StatefulStyle::new(f.registry.clone());
        leaf.add_dependency(&middle).unwrap();

        let (log, _sub) = record(&leaf);
        middle.add_dependency(&root).unwrap();
        assert_eq!(leaf.get(f.color), Some("blue"));
        assert_eq!(log.lock().len(), 1);
        assert_eq!(log.lock()[0].new_as::<&str>(), Some(&"blue"));
        assert_eq!(log.lock()[0].old_value, None);

        middle.remove_dependency(&root).unwrap();
        assert_eq!(log.lock().len(), 2);
        assert_eq!(log.lock()[1].old_as::<&str>(), Some(&"blue"));
        assert_eq!(log.lock()[1].new_value, None);
    }

    #[test]
    fn cleared_dependency_falls_through_to_the_next() {
        let f = fixture();
        let d1 = StatefulStyle::new(f.registry.clone());
        let d2 = StatefulStyle::new(f.registry.clone());
        d1.set(f.width, None, 1.0).unwrap();
        d2.set(f.width, None, 2.0).unwrap();
        let style = StatefulStyle::new(f.registry.clone());
        style.add_dependency(&d1).unwrap();
        style.add_dependency(&d2).unwrap();

        let (log, _sub) = record(&style);
        d1.clear(f.width, None).unwrap();
        assert_eq!(style.get(f.width), Some(2.0));
        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].old_as::<f64>(), Some(&1.0));
        assert_eq!(log[0].new_as::<f64>(), Some(&2.0));
        assert_eq!(log[0].source, d2.id());
    }

    #[test]
    fn relayed_changes_carry_old_value() {
        let f = fixture();
        let base = StatefulStyle::new(f.registry.clone());
        base.set(f.width, None, 1.0).unwrap();
        let style = StatefulStyle::new(f.registry.clone());
        style.add_dependency(&base).unwrap();

        let (log, _sub) = record(&style);
        base.set(f.width, None, 5.0).unwrap();
        base.set(f.width, Some(s(1)), 6.0).unwrap();
        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].old_as::<f64>(), Some(&1.0));
        assert_eq!(log[0].new_as::<f64>(), Some(&5.0));
    }

    #[test]
    fn opposing_edits_on_two_threads() {
        use std::sync::Barrier;

        let f = fixture();
        for _ in 0..50 {
            let a = StatefulStyle::new(f.registry.clone());
            let b = StatefulStyle::new(f.registry.clone());
            let barrier = Barrier::new(2);
            let (ab, ba) = std::thread::scope(|scope| {
                let ab = scope.spawn(|| {
                    barrier.wait();
                    a.add_dependency(&b)
                });
                let ba = scope.spawn(|| {
                    barrier.wait();
                    b.add_dependency(&a)
                });
                (ab.join().unwrap(), ba.join().unwrap())
            });
            assert!(ab.is_ok() != ba.is_ok(), "{ab:?} {ba:?}");
            let total = a.dependencies().len() + b.dependencies().len();
            assert_eq!(total, 1);
        }
    }

    #[test]
    fn dependency_errors() {
        let f = fixture();
        let a = StatefulStyle::new(f.registry.clone());
        let b = StatefulStyle::new(f.registry.clone());
        a.add_dependency(&b).unwrap();
        assert_eq!(a.add_dependency(&b), Err(StyleError::DuplicateDependency(b.id())));
        assert_eq!(b.add_dependency(&a), Err(StyleError::DependencyCycle(a.id())));
        assert_eq!(a.add_dependency(&a), Err(StyleError::SelfDependency(a.id())));
        assert_eq!(
            a.replace_dependency(3, &b).unwrap_err(),
            StyleError::DependencyIndex { index: 3, len: 1 }
        );
    }

    #[test]
    fn sealed_style_keeps_state_changes() {
        let f = fixture();
        let style = StatefulStyle::new(f.registry.clone());
        style.set(f.color, Some(s(0)), "red").unwrap();
        style.seal();
        assert_eq!(style.set(f.color, None, "x"), Err(StyleError::Sealed(style.id())));
        let other = StatefulStyle::new(f.registry.clone());
        assert_eq!(style.add_dependency(&other), Err(StyleError::Sealed(style.id())));
        style.set_state(states(&[0]));
        assert_eq!(style.get(f.color), Some("red"));
    }

    #[test]
    fn defaults() {
        let f = fixture();
        let style = StatefulStyle::new(f.registry.clone());
        assert!(!style.is_set(f.width));
        assert_eq!(style.get(f.width), None);
        assert_eq!(style.get_or_default(f.width), Some(0.0));
    }
}
