// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The clock that drives animated sheets.
//!
//! The cascade never owns a timer. An [`AnimationScheduler`] is handed a
//! tick callback per animated sheet and calls it with the time elapsed since
//! the sheet was scheduled, no more often than the sheet's minimum interval.
//! [`ManualScheduler`] is advanced by hand, which makes animation
//! deterministic in tests and lets an embedder drive it from its own frame
//! loop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;
use log::trace;
use parking_lot::Mutex;

use crate::feed::StyleId;

/// Callback invoked with the elapsed animation time.
pub type TickFn = Arc<dyn Fn(Duration) + Send + Sync>;

/// A shared driver for animation ticks.
pub trait AnimationScheduler: Send + Sync {
    /// Starts ticking `style`, replacing any previous registration.
    fn schedule(&self, style: StyleId, min_interval: Duration, tick: TickFn);

    /// Stops ticking `style`. Unknown ids are ignored.
    fn cancel(&self, style: StyleId);
}

struct Entry {
    min_interval: Duration,
    elapsed: Duration,
    since_last: Duration,
    tick: TickFn,
}

/// A scheduler whose clock only moves when [`advance`](Self::advance) is called.
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
/// use understory_cascade::{AnimationScheduler, ManualScheduler, StyleSheet};
/// # use understory_attribute::AttributeRegistry;
/// # let id = StyleSheet::new(Arc::new(AttributeRegistry::new())).id();
///
/// let scheduler = ManualScheduler::new();
/// let ticks = Arc::new(AtomicUsize::new(0));
/// let counter = ticks.clone();
/// scheduler.schedule(id, Duration::from_millis(10), Arc::new(move |_| {
///     counter.fetch_add(1, Ordering::Relaxed);
/// }));
///
/// scheduler.advance(Duration::from_millis(4));
/// scheduler.advance(Duration::from_millis(4));
/// assert_eq!(ticks.load(Ordering::Relaxed), 0);
/// scheduler.advance(Duration::from_millis(4));
/// assert_eq!(ticks.load(Ordering::Relaxed), 1);
/// ```
#[derive(Default)]
pub struct ManualScheduler {
    entries: Mutex<HashMap<StyleId, Entry>>,
}

impl ManualScheduler {
    /// Creates a scheduler with nothing scheduled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `dt` and delivers the ticks that are due.
    ///
    /// Ticks run after the internal lock is released, in style id order, so
    /// a tick may schedule or cancel. Returns the number of ticks delivered.
    pub fn advance(&self, dt: Duration) -> usize {
        let mut due: Vec<(StyleId, Duration, TickFn)> = {
            let mut entries = self.entries.lock();
            entries
                .iter_mut()
                .filter_map(|(id, entry)| {
                    entry.elapsed += dt;
                    entry.since_last += dt;
                    (entry.since_last >= entry.min_interval).then(|| {
                        entry.since_last = Duration::ZERO;
                        (*id, entry.elapsed, entry.tick.clone())
                    })
                })
                .collect()
        };
        due.sort_unstable_by_key(|(id, ..)| *id);
        for (id, elapsed, tick) in &due {
            trace!("tick {id} at {elapsed:?}");
            tick(*elapsed);
        }
        due.len()
    }

    /// Returns `true` if `style` is scheduled.
    #[must_use]
    pub fn is_scheduled(&self, style: StyleId) -> bool {
        self.entries.lock().contains_key(&style)
    }

    /// Returns the number of scheduled styles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl AnimationScheduler for ManualScheduler {
    fn schedule(&self, style: StyleId, min_interval: Duration, tick: TickFn) {
        self.entries.lock().insert(
            style,
            Entry {
                min_interval,
                elapsed: Duration::ZERO,
                since_last: Duration::ZERO,
                tick,
            },
        );
    }

    fn cancel(&self, style: StyleId) {
        self.entries.lock().remove(&style);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        let mut ids: Vec<_> = entries.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("ManualScheduler")
            .field("scheduled", &ids)
            .finish()
    }
}
