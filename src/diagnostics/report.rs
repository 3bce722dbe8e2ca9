//! Report assembly.
//!
//! [`ReportBuilder::build`] consumes a [`StageClock`] and reads a
//! [`RequestSnapshot`]; the result depends only on those inputs and the
//! builder's rules, so identical input yields an identical report.

use std::time::Duration;

use serde::{Serialize, Serializer};
use tracing::debug;

use super::clock::{MonotonicSource, StageClock};
use super::recommender::{Recommendation, RuleSet, Severity};
use super::snapshot::RequestSnapshot;
use crate::core::Result;
use crate::timestamp::Iso8601Timestamp;

/// A timing that cannot be measured from inside the handler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TimingFigure {
    /// Derived from two wall-clock readings; not an exact measurement.
    Estimated {
        #[serde(rename = "ms", serialize_with = "serialize_ms")]
        value: Duration,
    },
    Unknown,
}

impl TimingFigure {
    pub fn estimate(&self) -> Option<Duration> {
        match self {
            TimingFigure::Estimated { value } => Some(*value),
            TimingFigure::Unknown => None,
        }
    }
}

/// Time from the previous stage to `name`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub name: String,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_ms")]
    pub elapsed: Duration,
}

/// Time between two named stages, under a label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanTiming {
    pub label: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_ms")]
    pub elapsed: Duration,
}

/// Diagnostics for one request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    generated_at: String,
    stages: Vec<StageTiming>,
    spans: Vec<SpanTiming>,
    #[serde(rename = "total_ms", serialize_with = "serialize_ms")]
    total: Duration,
    pre_handler: TimingFigure,
    snapshot: RequestSnapshot,
    recommendations: Vec<Recommendation>,
}

impl Report {
    /// ISO 8601 time at which the clock was started.
    pub fn generated_at(&self) -> &str {
        &self.generated_at
    }

    pub fn stages(&self) -> &[StageTiming] {
        &self.stages
    }

    pub fn spans(&self) -> &[SpanTiming] {
        &self.spans
    }

    /// Elapsed time of a configured span.
    pub fn span(&self, label: &str) -> Option<Duration> {
        self.spans
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.elapsed)
    }

    /// First to last stage.
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Time before the handler got control, when the host reported an
    /// arrival time.
    pub fn pre_handler(&self) -> TimingFigure {
        self.pre_handler
    }

    pub fn snapshot(&self) -> &RequestSnapshot {
        &self.snapshot
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    /// Highest severity among the recommendations.
    pub fn worst_severity(&self) -> Option<Severity> {
        self.recommendations.iter().map(|r| r.severity).max()
    }

    /// No warning or critical recommendation.
    pub fn is_healthy(&self) -> bool {
        self.worst_severity().map_or(true, |s| s == Severity::Info)
    }
}

#[derive(Debug, Clone)]
struct SpanSpec {
    label: String,
    from: String,
    to: String,
}

/// Combines a clock and a snapshot into a [`Report`].
#[derive(Debug, Default)]
pub struct ReportBuilder {
    rules: RuleSet,
    spans: Vec<SpanSpec>,
}

impl ReportBuilder {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            spans: Vec::new(),
        }
    }

    /// Add a labelled span from stage `from` to stage `to`.
    ///
    /// Both stages must exist on every clock passed to [`build`](Self::build).
    pub fn span(
        mut self,
        label: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.spans.push(SpanSpec {
            label: label.into(),
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Build the report, consuming the clock.
    ///
    /// Fails on the first span that names an unknown stage or runs backwards;
    /// no partial report is returned.
    pub fn build<S: MonotonicSource>(
        &self,
        clock: StageClock<S>,
        snapshot: &RequestSnapshot,
    ) -> Result<Report> {
        let spans = self
            .spans
            .iter()
            .map(|spec| {
                clock.elapsed(&spec.from, &spec.to).map(|elapsed| SpanTiming {
                    label: spec.label.clone(),
                    from: spec.from.clone(),
                    to: spec.to.clone(),
                    elapsed,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let stages: Vec<StageTiming> = clock
            .durations()
            .map(|(name, elapsed)| StageTiming {
                name: name.to_string(),
                elapsed,
            })
            .collect();

        let pre_handler = match snapshot.since_received(clock.anchor()) {
            Some(value) => TimingFigure::Estimated { value },
            None => TimingFigure::Unknown,
        };

        let recommendations = self.rules.evaluate(snapshot);
        let total = clock.total();

        debug!(
            stages = stages.len(),
            recommendations = recommendations.len(),
            total_us = total.as_micros() as u64,
            "report built"
        );

        Ok(Report {
            generated_at: Iso8601Timestamp::from_system_time(clock.anchor()).to_string(),
            stages,
            spans,
            total,
            pre_handler,
            snapshot: snapshot.clone(),
            recommendations,
        })
    }
}

/// Durations are reported as fractional milliseconds.
fn serialize_ms<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}
