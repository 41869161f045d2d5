// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Cascade: conditional style resolution.
//!
//! A style holds, per attribute, a set of *declarations*: values guarded by
//! an expression. Reading an attribute picks the highest-precedence
//! declaration whose expression matches the current context, falling back
//! to the style's dependencies in order and finally to the attribute's
//! registered default. Every change that can alter an answer is published
//! on a change feed, so consumers stay live as state, dependencies, or time
//! move.
//!
//! The layers build on each other:
//!
//! - [`StyleExpression`]: what an expression must provide. Precedence comes
//!   from a priority plus implication strength, see [`ConditionalStyle`].
//! - [`StateExpression`]: boolean combinations of states, used by
//!   [`StatefulStyle`], which carries its own [`StateSet`] and re-fires
//!   changes when the winner for an attribute changes.
//! - [`StateGroupTypeExpression`]: states plus a group, an element type, and
//!   a [`TemplateRole`]. [`StyleSheet`] stores these and resolves against a
//!   [`StyleQuery`]; [`FilteredStyleSheet`] is a live view of a sheet for
//!   one element.
//! - [`AnimatedStyleSheet`]: declarations are [`ValueExpr`] sources over
//!   [`AnimatedVariable`]s, evaluated at the current animation time.
//!
//! Names are interned through [`Symbols`] and element types through a
//! [`TypeRegistry`]; attribute identity and validation live in
//! [`understory_attribute`].
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use understory_attribute::{AttributeMetadata, AttributeRegistry};
//! use understory_cascade::{StateExpression, StatefulStyle, Symbols};
//!
//! #[derive(Clone, Copy, Debug, PartialEq)]
//! enum Color {
//!     Black,
//!     Blue,
//!     Red,
//! }
//!
//! let mut registry = AttributeRegistry::new();
//! let color = registry.register("Color", AttributeMetadata::new(Color::Black));
//! let registry = Arc::new(registry);
//! let mut symbols = Symbols::new();
//! let hover = symbols.state("hover");
//!
//! let theme = StatefulStyle::new(registry.clone());
//! theme.set(color, None, Color::Blue).unwrap();
//!
//! let button = StatefulStyle::new(registry);
//! button.add_dependency(&theme).unwrap();
//! button.set(color, Some(StateExpression::state(hover)), Color::Red).unwrap();
//!
//! assert_eq!(button.get(color), Some(Color::Blue));
//! button.set_state(symbols.state_set(["hover"]));
//! assert_eq!(button.get(color), Some(Color::Red));
//! ```
//!
//! ## Threading
//!
//! Style handles are `Arc`-backed, `Send + Sync` and cheap to clone.
//! Mutations and notifications run synchronously on the caller's thread;
//! listeners see a snapshot, so they may subscribe or unsubscribe while a
//! notification is in flight. Only animation ticks arrive from elsewhere,
//! through an [`AnimationScheduler`].
//!
//! This crate requires `std`.

mod animated;
mod conditional;
mod dependency;
mod diagnostics;
mod error;
mod expression;
mod feed;
mod filter;
mod ids;
mod scheduler;
mod selector;
mod sheet;
mod state;
mod stateful;
mod template;
mod types;
mod value_expr;
mod variable;

pub use animated::{AnimatedStyleSheet, AnimationConfig, FromAnimated};
pub use conditional::{ConditionalStyle, Declaration, Declarations, Resolved};
pub use diagnostics::{CollectDiagnostics, Diagnostics, EvalReport, LogDiagnostics};
pub use error::{EvalError, StyleError};
pub use expression::StyleExpression;
pub use feed::{ChangeFeed, Listener, StyleChange, StyleId, Subscription};
pub use filter::{FilteredStyleSheet, LiveTemplateRoles, RolesChanged};
pub use ids::{AttachPoint, GroupId, IdSet, NameTable, StateId, StateSet, SymbolId, Symbols};
pub use scheduler::{AnimationScheduler, ManualScheduler, TickFn};
pub use selector::{Specificity, StateGroupTypeExpression, StyleQuery};
pub use sheet::StyleSheet;
pub use state::StateExpression;
pub use stateful::StatefulStyle;
pub use template::TemplateRole;
pub use types::{ElementType, TypeHierarchy, TypeRegistry, TypeTag};
pub use value_expr::{BinaryOp, Function, ValueExpr};
pub use variable::{AnimatedVariable, Segment};
