// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A style sheet as seen by one kind of element.
//!
//! [`FilteredStyleSheet`] narrows a [`StyleSheet`] to the declarations that
//! can apply to elements of a given type and group while they play one of
//! the roles in a [`LiveTemplateRoles`] set. The view stays live: changes to
//! the sheet and to the role set are reported to its listeners.

use std::fmt;
use std::sync::Arc;

use log::trace;
use parking_lot::{Mutex, RwLock};
use understory_attribute::{Attribute, AttributeId, ErasedValue};

use crate::conditional::{Declaration, Resolved};
use crate::feed::{ChangeFeed, StyleChange, StyleId, Subscription};
use crate::ids::{GroupId, StateSet};
use crate::selector::{StateGroupTypeExpression, StyleQuery};
use crate::sheet::StyleSheet;
use crate::template::TemplateRole;
use crate::types::ElementType;

type Change = StyleChange<StateGroupTypeExpression>;

/// A change to a [`LiveTemplateRoles`] set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RolesChanged {
    /// Roles that joined the set.
    pub added: Vec<TemplateRole>,
    /// Roles that left the set.
    pub removed: Vec<TemplateRole>,
}

/// An observable set of template roles, controlled by the embedder.
///
/// Cloning yields another handle to the same set.
#[derive(Clone, Default)]
pub struct LiveTemplateRoles {
    roles: Arc<RwLock<Arc<[TemplateRole]>>>,
    feed: ChangeFeed<RolesChanged>,
}

impl LiveTemplateRoles {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current roles.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[TemplateRole]> {
        self.roles.read().clone()
    }

    /// Adds a role. Returns `false` if it was already present.
    pub fn insert(&self, role: TemplateRole) -> bool {
        {
            let mut roles = self.roles.write();
            if roles.contains(&role) {
                return false;
            }
            let mut next = roles.to_vec();
            next.push(role.clone());
            *roles = next.into();
        }
        self.feed.emit(&RolesChanged {
            added: vec![role],
            removed: Vec::new(),
        });
        true
    }

    /// Removes a role. Returns `false` if it was not present.
    pub fn remove(&self, role: &TemplateRole) -> bool {
        {
            let mut roles = self.roles.write();
            if !roles.contains(role) {
                return false;
            }
            let next: Vec<TemplateRole> = roles.iter().filter(|r| *r != role).cloned().collect();
            *roles = next.into();
        }
        self.feed.emit(&RolesChanged {
            added: Vec::new(),
            removed: vec![role.clone()],
        });
        true
    }

    /// Replaces the whole set, notifying once with the difference.
    pub fn replace_all(&self, roles: impl IntoIterator<Item = TemplateRole>) {
        let mut next: Vec<TemplateRole> = Vec::new();
        for role in roles {
            if !next.contains(&role) {
                next.push(role);
            }
        }
        let change = {
            let mut current = self.roles.write();
            let change = RolesChanged {
                added: next.iter().filter(|r| !current.contains(r)).cloned().collect(),
                removed: current.iter().filter(|r| !next.contains(r)).cloned().collect(),
            };
            *current = next.into();
            change
        };
        if !change.added.is_empty() || !change.removed.is_empty() {
            self.feed.emit(&change);
        }
    }

    /// Subscribes to changes of the set.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&RolesChanged) + Send + Sync + 'static,
    {
        self.feed.subscribe(listener)
    }
}

impl fmt::Debug for LiveTemplateRoles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.roles.read().iter()).finish()
    }
}

struct ViewScope {
    element_type: ElementType,
    group: Option<GroupId>,
    roles: LiveTemplateRoles,
}

impl ViewScope {
    fn admits(&self, expression: &StateGroupTypeExpression, roles: &[TemplateRole]) -> bool {
        expression.matches_structure(Some(&self.element_type), self.group, roles)
    }
}

struct FilteredInner {
    sheet: StyleSheet,
    scope: Arc<ViewScope>,
    feed: ChangeFeed<Change>,
    relays: Mutex<Vec<Subscription>>,
}

/// A live, filtered view of a [`StyleSheet`].
///
/// Only declarations whose group, type, and template parts can match the
/// view's element are visible; state parts are evaluated per lookup.
///
/// ```rust
/// use std::sync::Arc;
/// use understory_attribute::{AttributeMetadata, AttributeRegistry};
/// use understory_cascade::{
///     AttachPoint, ElementType, FilteredStyleSheet, LiveTemplateRoles, StateGroupTypeExpression,
///     StateSet, StyleSheet, TemplateRole, TypeTag,
/// };
///
/// let mut registry = AttributeRegistry::new();
/// let width = registry.register("Width", AttributeMetadata::new(0.0_f64));
/// let sheet = StyleSheet::new(Arc::new(registry));
/// let thumb = TemplateRole::new(AttachPoint(0));
/// sheet.set(width, None, 1.0).unwrap();
/// sheet.set(width, Some(StateGroupTypeExpression::new().with_template(thumb.clone())), 2.0).unwrap();
///
/// let roles = LiveTemplateRoles::new();
/// let view = FilteredStyleSheet::new(&sheet, ElementType::root(TypeTag(0)), None, roles.clone());
/// assert_eq!(view.get(width, &StateSet::empty()), Some(1.0));
///
/// roles.insert(thumb);
/// assert_eq!(view.get(width, &StateSet::empty()), Some(2.0));
/// ```
#[derive(Clone)]
pub struct FilteredStyleSheet {
    inner: Arc<FilteredInner>,
}

impl FilteredStyleSheet {
    /// Creates a view of `sheet` for elements of `element_type` in `group`.
    #[must_use]
    pub fn new(
        sheet: &StyleSheet,
        element_type: ElementType,
        group: Option<GroupId>,
        roles: LiveTemplateRoles,
    ) -> Self {
        let scope = Arc::new(ViewScope {
            element_type,
            group,
            roles,
        });
        let feed = ChangeFeed::new();

        let sheet_relay = {
            let feed = feed.clone();
            let scope = scope.clone();
            sheet.subscribe(move |change: &Change| {
                let roles = scope.roles.snapshot();
                if change
                    .expression
                    .as_ref()
                    .is_none_or(|e| scope.admits(e, &roles))
                {
                    feed.emit(change);
                }
            })
        };

        let roles_relay = {
            let feed = feed.clone();
            let scope = scope.clone();
            let sheet = sheet.clone();
            let roles = scope.roles.clone();
            roles.subscribe(move |change: &RolesChanged| {
                refire_for_roles(&sheet, &scope, &feed, change);
            })
        };

        Self {
            inner: Arc::new(FilteredInner {
                sheet: sheet.clone(),
                scope,
                feed,
                relays: Mutex::new(vec![sheet_relay, roles_relay]),
            }),
        }
    }

    /// Returns the underlying sheet.
    #[must_use]
    pub fn sheet(&self) -> &StyleSheet {
        &self.inner.sheet
    }

    /// Returns the element type this view is for.
    #[must_use]
    pub fn element_type(&self) -> &ElementType {
        &self.inner.scope.element_type
    }

    /// Returns the element group this view is for.
    #[must_use]
    pub fn group(&self) -> Option<GroupId> {
        self.inner.scope.group
    }

    /// Returns the live role set.
    #[must_use]
    pub fn roles(&self) -> &LiveTemplateRoles {
        &self.inner.scope.roles
    }

    /// Returns the visible declarations of `attribute`, in resolution order.
    #[must_use]
    pub fn declarations(
        &self,
        attribute: impl Into<AttributeId>,
    ) -> Vec<(StyleId, Declaration<StateGroupTypeExpression>)> {
        let roles = self.inner.scope.roles.snapshot();
        self.inner
            .sheet
            .declarations(attribute)
            .into_iter()
            .filter(|(_, d)| {
                d.expression
                    .as_ref()
                    .is_none_or(|e| self.inner.scope.admits(e, &roles))
            })
            .collect()
    }

    /// Returns the attributes with at least one visible declaration.
    #[must_use]
    pub fn attributes(&self) -> Vec<AttributeId> {
        self.inner
            .sheet
            .attributes()
            .into_iter()
            .filter(|a| !self.declarations(*a).is_empty())
            .collect()
    }

    /// Resolves `attribute` for an element of this view in `states`.
    #[must_use]
    pub fn resolve(
        &self,
        attribute: impl Into<AttributeId>,
        states: &StateSet,
    ) -> Option<Resolved<StateGroupTypeExpression>> {
        let roles = self.inner.scope.roles.snapshot();
        let query = StyleQuery {
            element_type: Some(&self.inner.scope.element_type),
            states,
            group: self.inner.scope.group,
            roles: &roles,
        };
        self.inner.sheet.resolve(attribute, &query)
    }

    /// Returns `true` if `attribute` resolves in `states`.
    #[must_use]
    pub fn is_set(&self, attribute: impl Into<AttributeId>, states: &StateSet) -> bool {
        self.resolve(attribute, states).is_some()
    }

    /// Returns the effective value in `states`, erased.
    #[must_use]
    pub fn get_erased(&self, attribute: impl Into<AttributeId>, states: &StateSet) -> Option<ErasedValue> {
        self.resolve(attribute, states).map(|r| r.value)
    }

    /// Returns the effective value in `states`.
    #[must_use]
    pub fn get<T: Clone + 'static>(&self, attribute: Attribute<T>, states: &StateSet) -> Option<T> {
        self.resolve(attribute, states)?.value_as::<T>().cloned()
    }

    /// Subscribes to visible changes.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.inner.feed.subscribe(listener)
    }

    /// Subscribes to visible changes of one attribute.
    pub fn subscribe_attribute<F>(&self, attribute: impl Into<AttributeId>, listener: F) -> Subscription
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.inner.feed.subscribe_attribute(attribute, listener)
    }

    /// Stops following the sheet and the role set.
    pub fn detach(&self) {
        self.inner.relays.lock().clear();
    }
}

/// Re-fires every declaration whose visibility flipped with the role change.
fn refire_for_roles(
    sheet: &StyleSheet,
    scope: &ViewScope,
    feed: &ChangeFeed<Change>,
    change: &RolesChanged,
) {
    let roles = scope.roles.snapshot();
    let previous: Vec<TemplateRole> = roles
        .iter()
        .filter(|r| !change.added.contains(r))
        .chain(&change.removed)
        .cloned()
        .collect();
    let mut fired = 0_usize;
    for attribute in sheet.attributes() {
        for (source, decl) in sheet.declarations(attribute) {
            let Some(expression) = decl.expression else {
                continue;
            };
            if expression.template().is_none() {
                continue;
            }
            let was_visible = scope.admits(&expression, &previous);
            let visible = scope.admits(&expression, &roles);
            if was_visible == visible {
                continue;
            }
            feed.emit(&StyleChange {
                attribute,
                old_value: was_visible.then(|| decl.value.clone()),
                new_value: visible.then_some(decl.value),
                expression: Some(expression),
                source,
            });
            fired += 1;
        }
    }
    trace!("role change re-fired {fired} declarations");
}

impl fmt::Debug for FilteredStyleSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilteredStyleSheet")
            .field("sheet", &self.inner.sheet.id())
            .field("element_type", &self.inner.scope.element_type)
            .field("group", &self.inner.scope.group)
            .finish_non_exhaustive()
    }
}
