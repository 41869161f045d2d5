// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Template roles.
//!
//! A control's template instantiates child elements at named attach points.
//! A [`TemplateRole`] describes such a placement: the attach point, what the
//! owning parent must look like, and optionally the role the parent itself
//! plays in an outer template.

use std::sync::Arc;

use crate::ids::{AttachPoint, GroupId, IdSet};
use crate::types::ElementType;

/// A position within a (possibly nested) template.
///
/// Roles serve two purposes. Declared in a style sheet expression, a role is
/// a pattern. Attached to an element, it is a concrete description, and
/// [`contains`](Self::contains) tests it against patterns.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TemplateRole {
    attach_point: AttachPoint,
    parent_type: Option<ElementType>,
    parent_groups: IdSet<GroupId>,
    parent_role: Option<Arc<TemplateRole>>,
}

impl TemplateRole {
    /// A role at `attach_point` with no constraints on the parent.
    #[must_use]
    pub fn new(attach_point: AttachPoint) -> Self {
        Self {
            attach_point,
            parent_type: None,
            parent_groups: IdSet::default(),
            parent_role: None,
        }
    }

    /// Sets the type of the template's owner.
    #[must_use]
    pub fn with_parent_type(mut self, parent_type: ElementType) -> Self {
        self.parent_type = Some(parent_type);
        self
    }

    /// Sets the groups of the template's owner.
    #[must_use]
    pub fn with_parent_groups(mut self, groups: IdSet<GroupId>) -> Self {
        self.parent_groups = groups;
        self
    }

    /// Nests this role inside the role the owner plays in an outer template.
    #[must_use]
    pub fn nested_in(mut self, parent_role: Self) -> Self {
        self.parent_role = Some(Arc::new(parent_role));
        self
    }

    /// Returns the attach point.
    #[must_use]
    pub fn attach_point(&self) -> AttachPoint {
        self.attach_point
    }

    /// Returns the owner's type, if constrained.
    #[must_use]
    pub fn parent_type(&self) -> Option<&ElementType> {
        self.parent_type.as_ref()
    }

    /// Returns the owner's groups.
    #[must_use]
    pub fn parent_groups(&self) -> &IdSet<GroupId> {
        &self.parent_groups
    }

    /// Returns the enclosing role, if any.
    #[must_use]
    pub fn parent_role(&self) -> Option<&Self> {
        self.parent_role.as_deref()
    }

    /// Returns the nesting depth: 1 for a role with no enclosing role.
    #[must_use]
    pub fn depth(&self) -> u32 {
        let mut depth = 1_u32;
        let mut current = self;
        while let Some(parent) = current.parent_role.as_deref() {
            depth = depth.saturating_add(1);
            current = parent;
        }
        depth
    }

    /// Returns `true` if `self`, a live role, satisfies the `declared` pattern.
    ///
    /// The attach points must be equal. A declared parent type accepts any
    /// live parent type assignable to it, declared parent groups must all be
    /// present on the live parent, and a declared enclosing role must in turn
    /// be satisfied by the live enclosing role.
    #[must_use]
    pub fn contains(&self, declared: &Self) -> bool {
        if self.attach_point != declared.attach_point {
            return false;
        }
        if let Some(want) = &declared.parent_type {
            match &self.parent_type {
                Some(have) if want.is_assignable_from(have) => {}
                _ => return false,
            }
        }
        if !declared.parent_groups.is_subset(&self.parent_groups) {
            return false;
        }
        match (&declared.parent_role, &self.parent_role) {
            (None, _) => true,
            (Some(want), Some(have)) => have.contains(want),
            (Some(_), None) => false,
        }
    }
}
