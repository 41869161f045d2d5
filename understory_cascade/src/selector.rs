// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Style sheet selectors: state, group, type, and template role.

use std::fmt;

use crate::expression::StyleExpression;
use crate::ids::{GroupId, StateSet};
use crate::state::StateExpression;
use crate::template::TemplateRole;
use crate::types::ElementType;

/// Bucketed selector specificity.
///
/// The fields are ordered highest-weight-first so that derived `Ord`
/// ranks template depth above type depth, type depth above state
/// specificity, and state specificity above group presence.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity {
    /// Nesting depth of the template role, 0 when unconstrained.
    pub template: u32,
    /// One more than the type's depth in the hierarchy, 0 when unconstrained.
    pub element_type: u32,
    /// [`StateExpression::specificity`], 0 when unconstrained.
    pub states: u32,
    /// 1 if a group is required.
    pub group: u32,
}

/// A snapshot of the facts a [`StateGroupTypeExpression`] is matched against.
#[derive(Copy, Clone, Debug)]
pub struct StyleQuery<'a> {
    /// The element's resolved type.
    pub element_type: Option<&'a ElementType>,
    /// The element's current states.
    pub states: &'a StateSet,
    /// The element's group, if it has one.
    pub group: Option<GroupId>,
    /// Live template roles; a declared role matches if any of them contains it.
    pub roles: &'a [TemplateRole],
}

impl<'a> StyleQuery<'a> {
    /// A query for an element of the given type in the given states.
    #[must_use]
    pub fn new(element_type: &'a ElementType, states: &'a StateSet) -> Self {
        Self {
            element_type: Some(element_type),
            states,
            group: None,
            roles: &[],
        }
    }

    /// Sets the element's group.
    #[must_use]
    pub fn with_group(mut self, group: GroupId) -> Self {
        self.group = Some(group);
        self
    }

    /// Sets the live template roles.
    #[must_use]
    pub fn with_roles(mut self, roles: &'a [TemplateRole]) -> Self {
        self.roles = roles;
        self
    }
}

/// A style sheet selector.
///
/// Every part is optional; an unconstrained part matches anything. An
/// expression with no parts at all matches every query, but is still a
/// conditional entry and ranks above the unconditional one.
///
/// ```rust
/// use understory_cascade::{
///     ElementType, StateExpression, StateGroupTypeExpression, StateId, StateSet, StyleExpression,
///     StyleQuery, TypeTag,
/// };
///
/// let button = ElementType::root(TypeTag(1));
/// let hover = StateId(0);
/// let selector = StateGroupTypeExpression::new()
///     .with_type(button.clone())
///     .with_states(StateExpression::state(hover));
///
/// let states = StateSet::from_ids([hover]);
/// assert!(selector.matches(&StyleQuery::new(&button, &states)));
/// assert!(!selector.matches(&StyleQuery::new(&button, &StateSet::empty())));
/// ```
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateGroupTypeExpression {
    template: Option<TemplateRole>,
    element_type: Option<ElementType>,
    states: Option<StateExpression>,
    group: Option<GroupId>,
}

impl StateGroupTypeExpression {
    /// An expression with no constraints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the states to satisfy `states`.
    #[must_use]
    pub fn with_states(mut self, states: StateExpression) -> Self {
        self.states = Some(states);
        self
    }

    /// Requires the element to be in `group`.
    #[must_use]
    pub fn with_group(mut self, group: GroupId) -> Self {
        self.group = Some(group);
        self
    }

    /// Requires the element to be assignable to `element_type`.
    #[must_use]
    pub fn with_type(mut self, element_type: ElementType) -> Self {
        self.element_type = Some(element_type);
        self
    }

    /// Requires the element to play `role` in a template.
    #[must_use]
    pub fn with_template(mut self, role: TemplateRole) -> Self {
        self.template = Some(role);
        self
    }

    /// Returns the state constraint.
    #[must_use]
    pub fn states(&self) -> Option<&StateExpression> {
        self.states.as_ref()
    }

    /// Returns the group constraint.
    #[must_use]
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    /// Returns the type constraint.
    #[must_use]
    pub fn element_type(&self) -> Option<&ElementType> {
        self.element_type.as_ref()
    }

    /// Returns the template role constraint.
    #[must_use]
    pub fn template(&self) -> Option<&TemplateRole> {
        self.template.as_ref()
    }

    /// Returns `true` if no part is constrained.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.states.is_none()
            && self.group.is_none()
            && self.element_type.is_none()
            && self.template.is_none()
    }

    /// Returns `true` if only the state part is constrained.
    fn is_state_only(&self) -> bool {
        self.group.is_none() && self.element_type.is_none() && self.template.is_none()
    }

    /// Returns the selector's specificity.
    #[must_use]
    pub fn specificity(&self) -> Specificity {
        Specificity {
            template: self.template.as_ref().map_or(0, TemplateRole::depth),
            element_type: self
                .element_type
                .as_ref()
                .map_or(0, |t| t.depth().saturating_add(1)),
            states: self.states.as_ref().map_or(0, StateExpression::specificity),
            group: u32::from(self.group.is_some()),
        }
    }

    /// Matches everything except the states.
    pub(crate) fn matches_structure(
        &self,
        element_type: Option<&ElementType>,
        group: Option<GroupId>,
        roles: &[TemplateRole],
    ) -> bool {
        if let Some(want) = self.group
            && group != Some(want)
        {
            return false;
        }
        if let Some(want) = &self.element_type {
            match element_type {
                Some(have) if want.is_assignable_from(have) => {}
                _ => return false,
            }
        }
        if let Some(want) = &self.template
            && !roles.iter().any(|live| live.contains(want))
        {
            return false;
        }
        true
    }

    /// Returns `true` if every part constrained by `other` is implied by `self`.
    fn implies(&self, other: &Self) -> bool {
        let states = match (&self.states, &other.states) {
            (_, None) => true,
            (Some(a), Some(b)) => a.implies(b),
            (None, Some(_)) => false,
        };
        let group = other.group.is_none() || self.group == other.group;
        let element_type = match (&self.element_type, &other.element_type) {
            (_, None) => true,
            (Some(a), Some(b)) => b.is_assignable_from(a),
            (None, Some(_)) => false,
        };
        let template = match (&self.template, &other.template) {
            (_, None) => true,
            (Some(a), Some(b)) => a.contains(b),
            (None, Some(_)) => false,
        };
        states && group && element_type && template
    }

    fn constrained_parts(&self) -> u32 {
        u32::from(self.states.is_some())
            + u32::from(self.group.is_some())
            + u32::from(self.element_type.is_some())
            + u32::from(self.template.is_some())
    }
}

impl StyleExpression for StateGroupTypeExpression {
    type Context<'a> = StyleQuery<'a>;
    type Priority = Specificity;

    fn matches(&self, query: &StyleQuery<'_>) -> bool {
        self.matches_structure(query.element_type, query.group, query.roles)
            && self.states.as_ref().is_none_or(|s| s.eval(query.states))
    }

    fn implies_when_true(&self, other: &Self) -> u32 {
        if self.implies(other) {
            1 + self
                .constrained_parts()
                .saturating_sub(other.constrained_parts())
        } else {
            0
        }
    }

    fn implies_when_false(&self, other: &Self) -> u32 {
        if other.is_unconstrained() {
            return 1;
        }
        match (&self.states, &other.states) {
            (Some(a), Some(b)) if self.is_state_only() && other.is_state_only() => {
                a.implies_when_false(b)
            }
            _ => 0,
        }
    }

    fn priority(&self) -> Specificity {
        self.specificity()
    }
}

impl fmt::Debug for StateGroupTypeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("StateGroupTypeExpression");
        if let Some(states) = &self.states {
            s.field("states", states);
        }
        if let Some(group) = &self.group {
            s.field("group", group);
        }
        if let Some(ty) = &self.element_type {
            s.field("type", ty);
        }
        if let Some(role) = &self.template {
            s.field("template", &role.attach_point());
        }
        s.finish()
    }
}
