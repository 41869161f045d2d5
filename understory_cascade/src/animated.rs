// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Time-parameterized style sheets.

use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hashbrown::HashMap;
use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use understory_attribute::{Attribute, AttributeId, AttributeRegistry, CheckError, ErasedValue};

use crate::conditional::Resolved;
use crate::diagnostics::{Diagnostics, EvalReport, LogDiagnostics};
use crate::error::{EvalError, StyleError};
use crate::feed::{ChangeFeed, StyleChange, StyleId, Subscription};
use crate::scheduler::AnimationScheduler;
use crate::selector::{StateGroupTypeExpression, StyleQuery};
use crate::sheet::StyleSheet;
use crate::value_expr::ValueExpr;
use crate::variable::AnimatedVariable;

type Change = StyleChange<StateGroupTypeExpression>;
type DeclarationKey = (AttributeId, Option<StateGroupTypeExpression>);

/// Conversion from an evaluated number to an attribute's value type.
///
/// Integers round to the nearest value and reject anything out of range;
/// `bool` is `true` for any nonzero number.
pub trait FromAnimated: Sized {
    /// Converts `value`, or returns `None` if it does not fit.
    fn from_animated(value: f64) -> Option<Self>;
}

impl FromAnimated for f64 {
    fn from_animated(value: f64) -> Option<Self> {
        Some(value)
    }
}

impl FromAnimated for f32 {
    fn from_animated(value: f64) -> Option<Self> {
        #[expect(clippy::cast_possible_truncation, reason = "overflow checked below")]
        let narrowed = value as Self;
        narrowed.is_finite().then_some(narrowed)
    }
}

impl FromAnimated for bool {
    fn from_animated(value: f64) -> Option<Self> {
        Some(value != 0.0)
    }
}

macro_rules! from_animated_int {
    ($($ty:ty),*) => {$(
        impl FromAnimated for $ty {
            fn from_animated(value: f64) -> Option<Self> {
                let rounded = value.round();
                if rounded < Self::MIN as f64 || rounded > Self::MAX as f64 {
                    return None;
                }
                #[expect(clippy::cast_possible_truncation, reason = "range checked above")]
                let narrowed = rounded as Self;
                Some(narrowed)
            }
        }
    )*};
}

from_animated_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

/// A stored value expression, evaluated on read.
struct DeferredValue {
    source: Arc<str>,
    parsed: Result<Arc<ValueExpr>, EvalError>,
    cast: fn(f64) -> Option<ErasedValue>,
    type_name: &'static str,
}

impl DeferredValue {
    fn new<T: FromAnimated + Send + Sync + 'static>(source: &str) -> Self {
        Self {
            source: source.into(),
            parsed: ValueExpr::parse(source).map(Arc::new),
            cast: cast_to::<T>,
            type_name: type_name::<T>(),
        }
    }

    fn is_variable_dependent(&self) -> bool {
        self.parsed
            .as_ref()
            .is_ok_and(|expr| expr.is_variable_dependent())
    }
}

fn cast_to<T: FromAnimated + Send + Sync + 'static>(value: f64) -> Option<ErasedValue> {
    T::from_animated(value).map(ErasedValue::new)
}

impl fmt::Debug for DeferredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredValue")
            .field("source", &self.source)
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Settings for an [`AnimatedStyleSheet`].
#[derive(Clone)]
pub struct AnimationConfig {
    /// Upper bound on ticks per second. Zero is treated as one.
    pub max_frequency_hz: u32,
    /// Receives evaluation failures.
    pub diagnostics: Arc<dyn Diagnostics>,
}

impl AnimationConfig {
    /// The shortest interval between two ticks.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(1) / self.max_frequency_hz.max(1)
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            max_frequency_hz: 60,
            diagnostics: Arc::new(LogDiagnostics),
        }
    }
}

impl fmt::Debug for AnimationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationConfig")
            .field("max_frequency_hz", &self.max_frequency_hz)
            .finish_non_exhaustive()
    }
}

struct AnimatedInner {
    sheet: StyleSheet,
    feed: ChangeFeed<Change>,
    relay: Mutex<Option<Subscription>>,
    variables: RwLock<Vec<AnimatedVariable>>,
    bindings: RwLock<HashMap<Arc<str>, f64>>,
    time: Mutex<Duration>,
    running: AtomicBool,
    scheduler: Arc<dyn AnimationScheduler>,
    config: AnimationConfig,
    last_good: Mutex<HashMap<DeclarationKey, ErasedValue>>,
}

impl Drop for AnimatedInner {
    fn drop(&mut self) {
        if *self.running.get_mut() {
            self.scheduler.cancel(self.sheet.id());
        }
    }
}

/// A style sheet whose values are expressions over animated variables.
///
/// Each declaration stores the source of a [`ValueExpr`]; it is parsed
/// when set but only evaluated on read, against the variables' values at
/// the current animation time, then converted with [`FromAnimated`] and
/// checked against the attribute registry. A declaration that fails to
/// evaluate keeps its last good value and the failure goes to the
/// configured [`Diagnostics`].
///
/// [`set_animation_time`](Self::set_animation_time) moves the clock and
/// re-fires every declaration that references a variable. Between
/// [`start_animation`](Self::start_animation) and
/// [`stop_animation`](Self::stop_animation) the sheet's
/// [`AnimationScheduler`] calls it periodically.
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use understory_attribute::{AttributeMetadata, AttributeRegistry};
/// use understory_cascade::{AnimatedStyleSheet, AnimatedVariable, ManualScheduler, Segment};
///
/// let mut registry = AttributeRegistry::new();
/// let width = registry.register("Width", AttributeMetadata::new(0.0_f64));
/// let scheduler = Arc::new(ManualScheduler::new());
/// let sheet = AnimatedStyleSheet::new(Arc::new(registry), scheduler.clone());
///
/// let grow = Segment::new(100.0, 0.0, Duration::from_secs(1));
/// sheet.add_variable(AnimatedVariable::new("w", 0.0, vec![grow], false).unwrap()).unwrap();
/// sheet.set(width, None, "w + 20").unwrap();
///
/// sheet.start_animation().unwrap();
/// scheduler.advance(Duration::from_millis(500));
/// assert_eq!(sheet.value_at(width, None), Some(70.0));
/// ```
#[derive(Clone)]
pub struct AnimatedStyleSheet {
    inner: Arc<AnimatedInner>,
}

impl AnimatedStyleSheet {
    /// Creates an empty sheet driven by `scheduler`, with default settings.
    #[must_use]
    pub fn new(registry: Arc<AttributeRegistry>, scheduler: Arc<dyn AnimationScheduler>) -> Self {
        Self::with_config(registry, scheduler, AnimationConfig::default())
    }

    /// Creates an empty sheet with explicit settings.
    #[must_use]
    pub fn with_config(
        registry: Arc<AttributeRegistry>,
        scheduler: Arc<dyn AnimationScheduler>,
        config: AnimationConfig,
    ) -> Self {
        let inner = Arc::new(AnimatedInner {
            sheet: StyleSheet::new(registry),
            feed: ChangeFeed::new(),
            relay: Mutex::new(None),
            variables: RwLock::new(Vec::new()),
            bindings: RwLock::new(HashMap::new()),
            time: Mutex::new(Duration::ZERO),
            running: AtomicBool::new(false),
            scheduler,
            config,
            last_good: Mutex::new(HashMap::new()),
        });
        let weak = Arc::downgrade(&inner);
        let relay = inner.sheet.subscribe(move |change| {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.forward(change);
            }
        });
        *inner.relay.lock() = Some(relay);
        Self { inner }
    }

    /// Returns this sheet's identity.
    #[must_use]
    pub fn id(&self) -> StyleId {
        self.inner.sheet.id()
    }

    /// Returns the attribute registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<AttributeRegistry> {
        self.inner.sheet.registry()
    }

    /// Returns the settings.
    #[must_use]
    pub fn config(&self) -> &AnimationConfig {
        &self.inner.config
    }

    /// Declares `source` as the value expression under `expression`.
    ///
    /// The attribute must be registered with value type `T`. Syntax errors
    /// do not fail the call; they surface when the value is read.
    pub fn set<T: FromAnimated + Send + Sync + 'static>(
        &self,
        attribute: Attribute<T>,
        expression: Option<StateGroupTypeExpression>,
        source: &str,
    ) -> Result<(), StyleError> {
        let id = attribute.id();
        let check = match self.registry().get(id) {
            None => Err(CheckError::Unknown(id)),
            Some(reg) if reg.type_id() != TypeId::of::<T>() => Err(CheckError::TypeMismatch {
                expected: reg.type_name(),
                found: type_name::<T>(),
            }),
            Some(_) => Ok(()),
        };
        check.map_err(|source| StyleError::Invalid {
            attribute: id,
            name: self.inner.sheet.attribute_name(id),
            source,
        })?;
        let deferred = DeferredValue::new::<T>(source);
        if let Err(err) = &deferred.parsed {
            debug!("{}: `{source}` will not evaluate: {err}", self.id());
        }
        self.inner
            .sheet
            .set_unchecked(id, expression, ErasedValue::new(deferred))
    }

    /// Declares a constant value, validated immediately.
    pub fn set_value<T: Clone + Send + Sync + 'static>(
        &self,
        attribute: Attribute<T>,
        expression: Option<StateGroupTypeExpression>,
        value: T,
    ) -> Result<(), StyleError> {
        self.inner.sheet.set(attribute, expression, value)
    }

    /// Removes a declaration. Returns `true` if one was removed.
    pub fn clear(
        &self,
        attribute: impl Into<AttributeId>,
        expression: Option<&StateGroupTypeExpression>,
    ) -> Result<bool, StyleError> {
        self.inner.sheet.clear(attribute, expression)
    }

    /// Returns the expression source declared under exactly `expression`.
    ///
    /// Constant declarations have no source and return `None`.
    #[must_use]
    pub fn source(
        &self,
        attribute: impl Into<AttributeId>,
        expression: Option<&StateGroupTypeExpression>,
    ) -> Option<Arc<str>> {
        let value = self.inner.sheet.local_value(attribute, expression)?;
        Some(value.downcast_ref::<DeferredValue>()?.source.clone())
    }

    /// Returns the attributes declared locally, in ID order.
    #[must_use]
    pub fn attributes(&self) -> Vec<AttributeId> {
        self.inner.sheet.local_attributes()
    }

    /// Registers a variable, bound to its value at the current time.
    pub fn add_variable(&self, variable: AnimatedVariable) -> Result<(), StyleError> {
        self.inner.sheet.ensure_unsealed()?;
        let mut variables = self.inner.variables.write();
        if variables.iter().any(|v| v.name() == variable.name()) {
            return Err(StyleError::DuplicateVariable(variable.shared_name()));
        }
        let time = self.animation_time();
        self.inner
            .bindings
            .write()
            .insert(variable.shared_name(), variable.value_at(time));
        debug!("{}: variable `{}` added", self.id(), variable.name());
        variables.push(variable);
        Ok(())
    }

    /// Unregisters a variable and returns it.
    pub fn remove_variable(&self, name: &str) -> Result<AnimatedVariable, StyleError> {
        self.inner.sheet.ensure_unsealed()?;
        let mut variables = self.inner.variables.write();
        let index = variables
            .iter()
            .position(|v| v.name() == name)
            .ok_or_else(|| StyleError::UnknownVariable(name.into()))?;
        let removed = variables.remove(index);
        self.inner.bindings.write().remove(name);
        debug!("{}: variable `{name}` removed", self.id());
        Ok(removed)
    }

    /// Returns the registered variables in registration order.
    #[must_use]
    pub fn variables(&self) -> Vec<AnimatedVariable> {
        self.inner.variables.read().clone()
    }

    /// Returns the bound value of a variable at the current time.
    #[must_use]
    pub fn variable_value(&self, name: &str) -> Option<f64> {
        self.inner.bindings.read().get(name).copied()
    }

    /// Starts driving the sheet from its scheduler.
    ///
    /// Animation time restarts from zero. Does nothing if already running.
    pub fn start_animation(&self) -> Result<(), StyleError> {
        self.inner.sheet.ensure_unsealed()?;
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let weak = Arc::downgrade(&self.inner);
        self.inner.scheduler.schedule(
            self.id(),
            self.inner.config.min_interval(),
            Arc::new(move |elapsed| {
                if let Some(inner) = weak.upgrade() {
                    Self { inner }.set_animation_time(elapsed);
                }
            }),
        );
        debug!("{}: animation started", self.id());
        Ok(())
    }

    /// Stops driving the sheet. Does nothing if not running.
    pub fn stop_animation(&self) -> Result<(), StyleError> {
        self.inner.sheet.ensure_unsealed()?;
        if self.inner.running.swap(false, Ordering::AcqRel) {
            self.inner.scheduler.cancel(self.id());
            debug!("{}: animation stopped", self.id());
        }
        Ok(())
    }

    /// Returns `true` while the scheduler drives the sheet.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Returns the current animation time.
    #[must_use]
    pub fn animation_time(&self) -> Duration {
        *self.inner.time.lock()
    }

    /// Moves the clock to `time`.
    ///
    /// Rebinds every variable, then re-fires each declaration that
    /// references a variable with its newly evaluated value. Declarations
    /// that fail to evaluate are reported and skipped. Returns the number of
    /// changes fired.
    pub fn set_animation_time(&self, time: Duration) -> usize {
        *self.inner.time.lock() = time;
        let bound: HashMap<Arc<str>, f64> = self
            .inner
            .variables
            .read()
            .iter()
            .map(|v| (v.shared_name(), v.value_at(time)))
            .collect();
        *self.inner.bindings.write() = bound;

        let mut fired = 0;
        for attribute in self.attributes() {
            for decl in self.inner.sheet.local_expressions(attribute).iter() {
                let Some(deferred) = decl.value.downcast_ref::<DeferredValue>() else {
                    continue;
                };
                if !deferred.is_variable_dependent() {
                    continue;
                }
                let expression = decl.expression.as_ref();
                match self.evaluate(attribute, deferred) {
                    Ok(value) => {
                        let old = self
                            .inner
                            .last_good
                            .lock()
                            .insert((attribute, expression.cloned()), value.clone());
                        self.inner.feed.emit(&Change {
                            attribute,
                            expression: expression.cloned(),
                            old_value: old,
                            new_value: Some(value),
                            source: self.id(),
                        });
                        fired += 1;
                    }
                    Err(error) => self.report(attribute, expression, deferred, error),
                }
            }
        }
        trace!("{}: time {time:?}, {fired} changes", self.id());
        fired
    }

    /// Evaluates the declaration under exactly `expression` at the current
    /// time.
    ///
    /// On failure the failure is reported and the last good value, if any,
    /// is returned.
    #[must_use]
    pub fn value_at_erased(
        &self,
        attribute: impl Into<AttributeId>,
        expression: Option<&StateGroupTypeExpression>,
    ) -> Option<ErasedValue> {
        let attribute = attribute.into();
        let value = self.inner.sheet.local_value(attribute, expression)?;
        self.realize(attribute, expression, &value)
    }

    /// Typed form of [`value_at_erased`](Self::value_at_erased).
    #[must_use]
    pub fn value_at<T: Clone + 'static>(
        &self,
        attribute: Attribute<T>,
        expression: Option<&StateGroupTypeExpression>,
    ) -> Option<T> {
        self.value_at_erased(attribute, expression)?
            .downcast_ref::<T>()
            .cloned()
    }

    /// Evaluates the declaration under exactly `expression` without
    /// reporting or falling back.
    ///
    /// Returns `None` if nothing is declared there.
    #[must_use]
    pub fn try_value_at(
        &self,
        attribute: impl Into<AttributeId>,
        expression: Option<&StateGroupTypeExpression>,
    ) -> Option<Result<ErasedValue, EvalError>> {
        let attribute = attribute.into();
        let value = self.inner.sheet.local_value(attribute, expression)?;
        Some(match value.downcast_ref::<DeferredValue>() {
            Some(deferred) => self.evaluate(attribute, deferred),
            None => Ok(value),
        })
    }

    /// Resolves `attribute` for `query` and evaluates the winner.
    #[must_use]
    pub fn resolve(
        &self,
        attribute: impl Into<AttributeId>,
        query: &StyleQuery<'_>,
    ) -> Option<Resolved<StateGroupTypeExpression>> {
        let attribute = attribute.into();
        let resolved = self.inner.sheet.resolve(attribute, query)?;
        let value = self.realize(attribute, resolved.expression.as_ref(), &resolved.value)?;
        Some(Resolved { value, ..resolved })
    }

    /// Returns `true` if `attribute` resolves for `query`.
    #[must_use]
    pub fn is_set(&self, attribute: impl Into<AttributeId>, query: &StyleQuery<'_>) -> bool {
        self.inner.sheet.is_set(attribute, query)
    }

    /// Returns the evaluated value for `query`.
    #[must_use]
    pub fn get<T: Clone + 'static>(&self, attribute: Attribute<T>, query: &StyleQuery<'_>) -> Option<T> {
        self.resolve(attribute, query)?.value_as::<T>().cloned()
    }

    /// Returns the evaluated value, or the attribute's registered default.
    #[must_use]
    pub fn get_or_default<T: Clone + 'static>(
        &self,
        attribute: Attribute<T>,
        query: &StyleQuery<'_>,
    ) -> Option<T> {
        self.get(attribute, query)
            .or_else(|| self.registry().default_value(attribute).cloned())
    }

    /// Appends a plain sheet consulted after the local declarations.
    pub fn add_dependency(&self, dependency: &StyleSheet) -> Result<(), StyleError> {
        self.inner.sheet.add_dependency(dependency)
    }

    /// Removes a dependency. Returns `false` if it was not in the list.
    pub fn remove_dependency(&self, dependency: &StyleSheet) -> Result<bool, StyleError> {
        self.inner.sheet.remove_dependency(dependency)
    }

    /// Returns the dependencies in resolution order.
    #[must_use]
    pub fn dependencies(&self) -> Vec<StyleSheet> {
        self.inner.sheet.dependencies()
    }

    /// Subscribes to every change, with values already evaluated.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.inner.feed.subscribe(listener)
    }

    /// Subscribes to changes of one attribute.
    pub fn subscribe_attribute<F>(&self, attribute: impl Into<AttributeId>, listener: F) -> Subscription
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.inner.feed.subscribe_attribute(attribute, listener)
    }

    /// Seals the sheet. The clock keeps its current running state.
    pub fn seal(&self) {
        self.inner.sheet.seal();
    }

    /// Returns `true` once sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.inner.sheet.is_sealed()
    }

    fn evaluate(&self, attribute: AttributeId, deferred: &DeferredValue) -> Result<ErasedValue, EvalError> {
        let expr = deferred.parsed.as_ref().map_err(Clone::clone)?;
        let number = {
            let bindings = self.inner.bindings.read();
            expr.evaluate(|name| bindings.get(name).copied())?
        };
        let value = (deferred.cast)(number).ok_or(EvalError::Cast {
            value: number,
            type_name: deferred.type_name,
        })?;
        self.registry()
            .check(attribute, &value)
            .map_err(EvalError::Rejected)?;
        Ok(value)
    }

    /// Turns a stored value into the value a reader sees.
    fn realize(
        &self,
        attribute: AttributeId,
        expression: Option<&StateGroupTypeExpression>,
        value: &ErasedValue,
    ) -> Option<ErasedValue> {
        let Some(deferred) = value.downcast_ref::<DeferredValue>() else {
            return Some(value.clone());
        };
        let key = (attribute, expression.cloned());
        match self.evaluate(attribute, deferred) {
            Ok(value) => {
                self.inner.last_good.lock().insert(key, value.clone());
                Some(value)
            }
            Err(error) => {
                self.report(attribute, expression, deferred, error);
                self.inner.last_good.lock().get(&key).cloned()
            }
        }
    }

    fn report(
        &self,
        attribute: AttributeId,
        expression: Option<&StateGroupTypeExpression>,
        deferred: &DeferredValue,
        error: EvalError,
    ) {
        self.inner.config.diagnostics.report(&EvalReport {
            style: self.id(),
            attribute,
            attribute_name: self.inner.sheet.attribute_name(attribute),
            expression: expression.cloned(),
            source: deferred.source.clone(),
            error,
        });
    }

    /// Re-emits a change of the underlying sheet with evaluated values.
    fn forward(&self, change: &Change) {
        let key = (change.attribute, change.expression.clone());
        let was_deferred = |value: &Option<ErasedValue>| {
            value
                .as_ref()
                .is_some_and(ErasedValue::is::<DeferredValue>)
        };
        let old_value = if was_deferred(&change.old_value) {
            let mut last_good = self.inner.last_good.lock();
            if change.new_value.is_none() {
                last_good.remove(&key)
            } else {
                last_good.get(&key).cloned()
            }
        } else {
            change.old_value.clone()
        };
        let new_value = change.new_value.as_ref().and_then(|value| {
            self.realize(change.attribute, change.expression.as_ref(), value)
        });
        self.inner.feed.emit(&Change {
            attribute: change.attribute,
            expression: change.expression.clone(),
            old_value,
            new_value,
            source: change.source,
        });
    }
}

impl fmt::Debug for AnimatedStyleSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimatedStyleSheet")
            .field("id", &self.id())
            .field("variables", &self.inner.variables.read().len())
            .field("time", &self.animation_time())
            .field("animating", &self.is_animating())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectDiagnostics;
    use crate::ids::{StateId, StateSet};
    use crate::scheduler::ManualScheduler;
    use crate::state::StateExpression;
    use crate::types::{TypeHierarchy, TypeRegistry};
    use crate::variable::Segment;
    use understory_attribute::{AttributeMetadata, AttributeMetadataBuilder, ValidationError};

    struct Fixture {
        sheet: AnimatedStyleSheet,
        scheduler: Arc<ManualScheduler>,
        diagnostics: Arc<CollectDiagnostics>,
        width: Attribute<f64>,
        count: Attribute<u8>,
        visible: Attribute<bool>,
    }

    fn fixture() -> Fixture {
        let mut registry = AttributeRegistry::new();
        let width = registry.register("Width", AttributeMetadata::new(0.0_f64));
        let count = registry.register(
            "Count",
            AttributeMetadataBuilder::new(0_u8)
                .validate(|v| {
                    if *v <= 10 {
                        Ok(())
                    } else {
                        Err(ValidationError::new("at most 10"))
                    }
                })
                .build(),
        );
        let visible = registry.register("Visible", AttributeMetadata::new(true));
        let scheduler = Arc::new(ManualScheduler::new());
        let diagnostics = Arc::new(CollectDiagnostics::new());
        let config = AnimationConfig {
            max_frequency_hz: 100,
            diagnostics: diagnostics.clone(),
        };
        let sheet = AnimatedStyleSheet::with_config(Arc::new(registry), scheduler.clone(), config);
        Fixture {
            sheet,
            scheduler,
            diagnostics,
            width,
            count,
            visible,
        }
    }

    fn ramp(name: &str, end: f64, repeating: bool) -> AnimatedVariable {
        let segment = Segment::new(end, 0.0, Duration::from_millis(1000));
        AnimatedVariable::new(name, 0.0, vec![segment], repeating).unwrap()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn expressions_follow_the_clock() {
        let f = fixture();
        f.sheet.add_variable(ramp("x", 10.0, false)).unwrap();
        f.sheet.set(f.width, None, "x * 2").unwrap();

        for (t, expected) in [(0, 0.0), (500, 10.0), (1000, 20.0), (1500, 20.0)] {
            f.sheet.set_animation_time(ms(t));
            assert_eq!(f.sheet.value_at(f.width, None), Some(expected), "at {t}ms");
        }
        assert_eq!(f.sheet.variable_value("x"), Some(10.0));
        assert_eq!(f.sheet.source(f.width, None).as_deref(), Some("x * 2"));
    }

    #[test]
    fn casts_and_validation() {
        let f = fixture();
        f.sheet.add_variable(ramp("x", 20.0, false)).unwrap();
        f.sheet.set(f.count, None, "x").unwrap();
        f.sheet.set(f.visible, None, "x - 10").unwrap();

        f.sheet.set_animation_time(ms(260));
        assert_eq!(f.sheet.value_at(f.count, None), Some(5));
        assert_eq!(f.sheet.value_at(f.visible, None), Some(true));

        f.sheet.set_animation_time(ms(500));
        assert_eq!(f.sheet.value_at(f.visible, None), Some(false));

        // 16 fails the validator; the last good value is kept.
        f.diagnostics.take();
        f.sheet.set_animation_time(ms(800));
        assert_eq!(f.sheet.value_at(f.count, None), Some(10));
        let reports = f.diagnostics.take();
        assert!(!reports.is_empty());
        assert!(
            reports
                .iter()
                .all(|r| r.attribute == f.count.id() && matches!(r.error, EvalError::Rejected(_)))
        );
        assert!(matches!(
            f.sheet.try_value_at(f.count, None),
            Some(Err(EvalError::Rejected(_)))
        ));
    }

    #[test]
    fn out_of_range_cast_is_reported() {
        let f = fixture();
        // The write itself is forwarded, which evaluates once.
        f.sheet.set(f.count, None, "-3").unwrap();
        assert_eq!(f.diagnostics.len(), 1);
        assert_eq!(f.sheet.value_at(f.count, None), None);
        let reports = f.diagnostics.take();
        assert_eq!(reports.len(), 2);
        assert!(matches!(reports[0].error, EvalError::Cast { value, .. } if value == -3.0));
    }

    #[test]
    fn set_checks_the_attribute_type() {
        let f = fixture();
        let wrong: Attribute<f32> = Attribute::from_id(f.width.id());
        let err = f.sheet.set(wrong, None, "1").unwrap_err();
        assert!(matches!(
            err,
            StyleError::Invalid {
                source: CheckError::TypeMismatch { .. },
                ..
            }
        ));
        assert!(f.sheet.attributes().is_empty());
    }

    #[test]
    fn syntax_errors_surface_on_read() {
        let f = fixture();
        f.sheet.set(f.width, None, "1 +").unwrap();
        f.diagnostics.take();
        assert_eq!(f.sheet.value_at(f.width, None), None);
        let reports = f.diagnostics.take();
        assert_eq!(reports.len(), 1);
        assert_eq!(&*reports[0].source, "1 +");
        assert!(matches!(reports[0].error, EvalError::Parse { .. }));
    }

    #[test]
    fn ticks_refire_variable_dependent_declarations() {
        let f = fixture();
        f.sheet.add_variable(ramp("x", 10.0, false)).unwrap();
        f.sheet.set(f.width, None, "x").unwrap();
        f.sheet.set(f.count, None, "3").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = f.sheet.subscribe(move |c: &Change| {
            sink.lock().push((c.attribute, c.new_as::<f64>().copied()));
        });

        assert_eq!(f.sheet.set_animation_time(ms(300)), 1);
        assert_eq!(*seen.lock(), [(f.width.id(), Some(3.0))]);
    }

    #[test]
    fn writes_are_forwarded_evaluated() {
        let f = fixture();
        f.sheet.add_variable(ramp("x", 10.0, false)).unwrap();
        f.sheet.set_animation_time(ms(500));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = f.sheet.subscribe_attribute(f.width, move |c: &Change| {
            sink.lock()
                .push((c.old_as::<f64>().copied(), c.new_as::<f64>().copied()));
        });

        f.sheet.set(f.width, None, "x + 1").unwrap();
        f.sheet.set(f.width, None, "x + 2").unwrap();
        f.sheet.clear(f.width, None).unwrap();
        assert_eq!(
            *seen.lock(),
            [(None, Some(6.0)), (Some(6.0), Some(7.0)), (Some(7.0), None)]
        );
    }

    #[test]
    fn variables_are_unique() {
        let f = fixture();
        f.sheet.add_variable(ramp("x", 1.0, false)).unwrap();
        assert_eq!(
            f.sheet.add_variable(ramp("x", 2.0, false)),
            Err(StyleError::DuplicateVariable("x".into()))
        );
        assert_eq!(
            f.sheet.remove_variable("y").unwrap_err(),
            StyleError::UnknownVariable("y".into())
        );
        assert_eq!(f.sheet.remove_variable("x").unwrap().name(), "x");
        assert!(f.sheet.variables().is_empty());
        assert_eq!(f.sheet.variable_value("x"), None);
    }

    #[test]
    fn scheduler_drives_the_clock() {
        let f = fixture();
        f.sheet.add_variable(ramp("x", 10.0, true)).unwrap();
        f.sheet.set(f.width, None, "x").unwrap();

        f.sheet.start_animation().unwrap();
        f.sheet.start_animation().unwrap();
        assert!(f.sheet.is_animating());
        assert_eq!(f.scheduler.len(), 1);

        // 100 Hz: nothing before 10ms.
        f.scheduler.advance(ms(5));
        assert_eq!(f.sheet.animation_time(), Duration::ZERO);
        f.scheduler.advance(ms(1495));
        assert_eq!(f.sheet.animation_time(), ms(1500));
        assert_eq!(f.sheet.value_at(f.width, None), Some(5.0));

        f.sheet.stop_animation().unwrap();
        assert!(!f.sheet.is_animating());
        assert!(f.scheduler.is_empty());
        f.scheduler.advance(ms(100));
        assert_eq!(f.sheet.animation_time(), ms(1500));
    }

    #[test]
    fn dropping_the_sheet_cancels_its_ticks() {
        let f = fixture();
        f.sheet.start_animation().unwrap();
        assert_eq!(f.scheduler.len(), 1);
        drop(f.sheet);
        assert!(f.scheduler.is_empty());
    }

    #[test]
    fn sealed_sheet_rejects_mutation() {
        let f = fixture();
        f.sheet.add_variable(ramp("x", 10.0, false)).unwrap();
        f.sheet.set(f.width, None, "x").unwrap();
        f.sheet.seal();
        let sealed = StyleError::Sealed(f.sheet.id());

        assert_eq!(f.sheet.set(f.width, None, "1"), Err(sealed.clone()));
        assert_eq!(f.sheet.clear(f.width, None), Err(sealed.clone()));
        assert_eq!(f.sheet.add_variable(ramp("y", 1.0, false)), Err(sealed.clone()));
        assert_eq!(f.sheet.remove_variable("x").unwrap_err(), sealed.clone());
        assert_eq!(f.sheet.start_animation(), Err(sealed.clone()));
        assert_eq!(f.sheet.stop_animation(), Err(sealed));

        assert_eq!(f.sheet.variables().len(), 1);
        assert_eq!(f.sheet.source(f.width, None).as_deref(), Some("x"));
        f.sheet.set_animation_time(ms(1000));
        assert_eq!(f.sheet.value_at(f.width, None), Some(10.0));
    }

    #[test]
    fn selectors_pick_the_expression() {
        let f = fixture();
        let hover = StateId(0);
        let hovered = StateGroupTypeExpression::new().with_states(StateExpression::state(hover));
        f.sheet.add_variable(ramp("x", 10.0, false)).unwrap();
        f.sheet.set(f.width, None, "1").unwrap();
        f.sheet.set(f.width, Some(hovered), "x * 10").unwrap();
        f.sheet.set_animation_time(ms(500));

        let mut types = TypeRegistry::new();
        let any = types.register("Any", None);
        let ty = types.element_type(any);
        let idle = StateSet::empty();
        let hovering = StateSet::from_ids([hover]);
        assert_eq!(f.sheet.get(f.width, &StyleQuery::new(&ty, &idle)), Some(1.0));
        assert_eq!(f.sheet.get(f.width, &StyleQuery::new(&ty, &hovering)), Some(50.0));
    }

    #[test]
    fn constants_and_dependencies() {
        let f = fixture();
        let base = StyleSheet::new(f.sheet.registry().clone());
        base.set(f.width, None, 42.0).unwrap();
        f.sheet.add_dependency(&base).unwrap();

        let mut types = TypeRegistry::new();
        let any = types.register("Any", None);
        let ty = types.element_type(any);
        let idle = StateSet::empty();
        let query = StyleQuery::new(&ty, &idle);
        assert_eq!(f.sheet.get(f.width, &query), Some(42.0));

        f.sheet.set_value(f.width, None, 7.0).unwrap();
        assert_eq!(f.sheet.get(f.width, &query), Some(7.0));
        assert_eq!(f.sheet.source(f.width, None), None);
        assert_eq!(f.sheet.dependencies().len(), 1);
    }

    #[test]
    fn integer_and_float_casts() {
        assert_eq!(u8::from_animated(255.6), None);
        assert_eq!(u8::from_animated(254.4), Some(254));
        assert_eq!(i32::from_animated(-2.5), Some(-3));
        assert_eq!(f32::from_animated(1e300), None);
        assert_eq!(bool::from_animated(0.0), Some(false));
    }
}
