//! Per-request diagnostics: stage timing, request facts and advice.
//!
//! The pipeline is synchronous and owns nothing beyond the current request:
//!
//! 1. [`StageClock`] records named stages on a monotonic timeline.
//! 2. [`RequestSnapshot`] captures the facts the host gathered at handler entry.
//! 3. [`ReportBuilder`] joins both and runs the advisory [`RuleSet`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use request_diagnostics::diagnostics::{fields, RawFacts, ReportBuilder, RequestSnapshot, RuleSet, StageClock};
//!
//! let mut clock = StageClock::new();
//! clock.mark("start")?;
//!
//! let facts = RawFacts::new()
//!     .with(fields::METHOD, "GET")
//!     .with(fields::URI, "/")
//!     .with(fields::PROTOCOL_VERSION, "HTTP/1.1")
//!     .with(fields::LOAD_AVERAGE, 0.7);
//! let snapshot = RequestSnapshot::from_facts(facts)?;
//!
//! // ... application work ...
//! clock.mark("end")?;
//!
//! let report = ReportBuilder::new(RuleSet::with_load_threshold(2.0)).build(clock, &snapshot)?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

pub mod bench;
pub mod clock;
pub mod fields;
pub mod recommender;
pub mod report;
pub mod snapshot;

pub use bench::BenchResult;
pub use clock::{ManualSource, MonotonicSource, Stage, StageClock, SystemMonotonic};
pub use fields::Category;
pub use recommender::{
    AdvisoryRule, Recommendation, RecommendationCode, RuleSet, Severity, DEFAULT_LOAD_THRESHOLD,
};
pub use report::{Report, ReportBuilder, SpanTiming, StageTiming, TimingFigure};
pub use snapshot::{FieldValue, RawFacts, RequestSnapshot};
