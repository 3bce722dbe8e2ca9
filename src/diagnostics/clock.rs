//! Named lifecycle stages on a monotonic timeline.
//!
//! A [`StageClock`] is created at handler entry, marked as the request moves
//! through its stages and handed to the report builder at the end. It is
//! append-only: stages are never removed or re-timed.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime};

use tracing::trace;

use crate::core::{Error, Result};

/// Source of monotonic instants for a [`StageClock`].
pub trait MonotonicSource {
    fn now(&self) -> Instant;
}

/// The process monotonic clock (`Instant::now`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMonotonic;

impl MonotonicSource for SystemMonotonic {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-driven time source for tests; production code uses
/// [`SystemMonotonic`].
///
/// Clones share the same offset, so a test can keep one handle and
/// advance the clock it gave to a [`StageClock`]. Not `Send`.
#[derive(Debug, Clone)]
pub struct ManualSource {
    base: Instant,
    offset: Rc<Cell<Duration>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    /// Move time forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    /// Jump to `offset` past the base instant. Going backwards is allowed
    /// here; the clock clamps it.
    pub fn set(&self, offset: Duration) {
        self.offset.set(offset);
    }
}

impl Default for ManualSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicSource for ManualSource {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }
}

/// A named instant on the request timeline.
#[derive(Debug, Clone)]
pub struct Stage {
    name: String,
    at: Instant,
}

impl Stage {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn at(&self) -> Instant {
        self.at
    }
}

/// Append-only log of named stages for one request.
///
/// Marking takes `&mut self`; the clock is meant to be driven by the single
/// task handling the request.
#[derive(Debug)]
pub struct StageClock<S: MonotonicSource = SystemMonotonic> {
    source: S,
    stages: Vec<Stage>,
    anchor: SystemTime,
}

impl StageClock<SystemMonotonic> {
    /// Create a clock backed by `Instant::now`.
    pub fn new() -> Self {
        Self::with_source(SystemMonotonic)
    }
}

impl Default for StageClock<SystemMonotonic> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MonotonicSource> StageClock<S> {
    /// Create a clock backed by a custom time source.
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            stages: Vec::with_capacity(8),
            anchor: SystemTime::now(),
        }
    }

    /// Record `name` at the current instant.
    ///
    /// Fails with [`Error::DuplicateStage`] when `name` is already recorded,
    /// in which case the clock is left untouched.
    pub fn mark(&mut self, name: impl Into<String>) -> Result<Instant> {
        let name = name.into();
        if self.contains(&name) {
            return Err(Error::DuplicateStage { name });
        }

        // Timestamps must never go backwards in insertion order.
        let now = self.source.now();
        let at = match self.stages.last() {
            Some(last) if now < last.at => last.at,
            _ => now,
        };

        trace!(stage = %name, index = self.stages.len(), "stage marked");
        self.stages.push(Stage { name, at });
        Ok(at)
    }

    /// Time between two recorded stages.
    pub fn elapsed(&self, from: &str, to: &str) -> Result<Duration> {
        let from_idx = self.position(from)?;
        let to_idx = self.position(to)?;

        if to_idx < from_idx {
            return Err(Error::InvalidOrder {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        Ok(self.stages[to_idx]
            .at
            .saturating_duration_since(self.stages[from_idx].at))
    }

    /// Durations between consecutive stages, named after the later stage.
    ///
    /// Each call starts a fresh pass, and the iterator itself is `Clone`.
    pub fn durations(&self) -> Durations<'_> {
        Durations {
            pairs: self.stages.windows(2),
        }
    }

    /// Span between the first and the last stage (zero with fewer than two).
    pub fn total(&self) -> Duration {
        match (self.stages.first(), self.stages.last()) {
            (Some(first), Some(last)) => last.at.saturating_duration_since(first.at),
            _ => Duration::ZERO,
        }
    }

    /// Wall-clock time at which the clock was created.
    ///
    /// Only used to estimate time spent before the handler ran.
    #[inline]
    pub fn anchor(&self) -> SystemTime {
        self.anchor
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.iter().any(|s| s.name == name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.stages
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| Error::UnknownStage {
                name: name.to_string(),
            })
    }
}

/// Iterator over `(stage, duration since previous stage)`.
#[derive(Debug, Clone)]
pub struct Durations<'a> {
    pairs: std::slice::Windows<'a, Stage>,
}

impl<'a> Iterator for Durations<'a> {
    type Item = (&'a str, Duration);

    fn next(&mut self) -> Option<Self::Item> {
        self.pairs.next().map(|pair| {
            let (prev, cur) = (&pair[0], &pair[1]);
            (cur.name.as_str(), cur.at.saturating_duration_since(prev.at))
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pairs.size_hint()
    }
}

impl ExactSizeIterator for Durations<'_> {}
