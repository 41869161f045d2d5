// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element types and assignability.
//!
//! Style sheets select on the runtime type of an element. Type identity is a
//! [`TypeTag`]; the is-a relation comes from a [`TypeHierarchy`] supplied by
//! the embedder. [`TypeRegistry`] is a ready-made single-inheritance
//! hierarchy.
//!
//! An [`ElementType`] is a tag resolved against a hierarchy: it carries its
//! ancestor chain so that assignability checks during matching do not need
//! the hierarchy again.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use hashbrown::HashMap;

/// A stable identifier for an element type (e.g. `Button`, `Text`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeTag(pub u32);

/// An is-subtype-of relation over [`TypeTag`]s.
pub trait TypeHierarchy {
    /// Returns the direct supertype of `tag`, or `None` for a root type.
    fn parent(&self, tag: TypeTag) -> Option<TypeTag>;

    /// Returns `true` if `sub` is `sup` or one of its descendants.
    fn is_subtype(&self, sub: TypeTag, sup: TypeTag) -> bool {
        self.element_type(sub).ancestors().contains(&sup)
    }

    /// Resolves `tag` into an [`ElementType`] with its ancestor chain.
    ///
    /// The walk stops if a hierarchy reports a cycle.
    fn element_type(&self, tag: TypeTag) -> ElementType {
        let mut chain = vec![tag];
        let mut current = tag;
        while let Some(parent) = self.parent(current) {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        ElementType {
            ancestors: chain.into(),
        }
    }
}

/// A type tag together with its ancestor chain.
///
/// Equality, ordering, and hashing only consider the tag itself.
#[derive(Clone)]
pub struct ElementType {
    // Self first, root last. Never empty.
    ancestors: Arc<[TypeTag]>,
}

impl ElementType {
    /// Creates a root type with no supertypes.
    #[must_use]
    pub fn root(tag: TypeTag) -> Self {
        Self {
            ancestors: Arc::from([tag]),
        }
    }

    /// Returns the type's tag.
    #[must_use]
    #[inline]
    pub fn tag(&self) -> TypeTag {
        self.ancestors[0]
    }

    /// Returns the tag followed by every supertype, root last.
    #[must_use]
    #[inline]
    pub fn ancestors(&self) -> &[TypeTag] {
        &self.ancestors
    }

    /// Returns the number of supertypes above this type.
    #[must_use]
    pub fn depth(&self) -> u32 {
        u32::try_from(self.ancestors.len() - 1).unwrap_or(u32::MAX)
    }

    /// Returns `true` if a value of type `other` is an instance of `self`.
    #[must_use]
    pub fn is_assignable_from(&self, other: &Self) -> bool {
        other.ancestors.contains(&self.tag())
    }
}

impl PartialEq for ElementType {
    fn eq(&self, other: &Self) -> bool {
        self.tag() == other.tag()
    }
}

impl Eq for ElementType {}

impl PartialOrd for ElementType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ElementType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tag().cmp(&other.tag())
    }
}

impl Hash for ElementType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag().hash(state);
    }
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ElementType").field(&self.tag().0).finish()
    }
}

/// A registry of named types with single inheritance.
///
/// ```rust
/// use understory_cascade::{TypeHierarchy, TypeRegistry};
///
/// let mut types = TypeRegistry::new();
/// let control = types.register("Control", None);
/// let button = types.register("Button", Some(control));
///
/// assert!(types.is_subtype(button, control));
/// assert!(!types.is_subtype(control, button));
/// assert_eq!(types.element_type(button).depth(), 1);
/// ```
#[derive(Default)]
pub struct TypeRegistry {
    names: Vec<Arc<str>>,
    parents: Vec<Option<TypeTag>>,
    by_name: HashMap<Arc<str>, TypeTag>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type under `name` with an optional supertype.
    ///
    /// # Panics
    ///
    /// Panics if the name is taken, if `parent` is not registered, or if more
    /// than `u32::MAX` types are registered.
    pub fn register(&mut self, name: &str, parent: Option<TypeTag>) -> TypeTag {
        assert!(
            !self.by_name.contains_key(name),
            "Type '{name}' is already registered"
        );
        if let Some(parent) = parent {
            assert!(
                (parent.0 as usize) < self.names.len(),
                "Parent of '{name}' is not registered"
            );
        }
        assert!(
            self.names.len() < u32::MAX as usize,
            "Too many types registered (max {})",
            u32::MAX
        );
        #[expect(clippy::cast_possible_truncation, reason = "checked above")]
        let tag = TypeTag(self.names.len() as u32);
        let name: Arc<str> = Arc::from(name);
        self.names.push(name.clone());
        self.parents.push(parent);
        self.by_name.insert(name, tag);
        tag
    }

    /// Looks up a type by name.
    #[must_use]
    pub fn tag(&self, name: &str) -> Option<TypeTag> {
        self.by_name.get(name).copied()
    }

    /// Returns the name of a registered type.
    #[must_use]
    pub fn name(&self, tag: TypeTag) -> Option<&str> {
        self.names.get(tag.0 as usize).map(|n| &**n)
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl TypeHierarchy for TypeRegistry {
    fn parent(&self, tag: TypeTag) -> Option<TypeTag> {
        self.parents.get(tag.0 as usize).copied().flatten()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("count", &self.names.len())
            .finish_non_exhaustive()
    }
}
