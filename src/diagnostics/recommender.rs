//! Advisory rules that turn a snapshot into recommendations.
//!
//! A [`RuleSet`] is an ordered list of rules. Each rule looks at the snapshot
//! and either stays quiet or returns one [`Recommendation`]. Rules run in
//! declaration order and their outputs are concatenated, so the same input
//! always produces the same list in the same order.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use super::fields;
use super::snapshot::RequestSnapshot;

/// Default system load threshold for [`HighLoadRule`].
pub const DEFAULT_LOAD_THRESHOLD: f64 = 2.0;

/// Encodings that count as compression support.
const COMPRESSION_CODINGS: [&str; 4] = ["gzip", "br", "deflate", "zstd"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// What a recommendation is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecommendationCode {
    MissingKeepAlive,
    CompressionUnsupported,
    BytecodeCacheDisabled,
    HighSystemLoad,
    /// Raised by a caller-supplied rule.
    Custom(String),
}

impl RecommendationCode {
    pub fn as_str(&self) -> &str {
        match self {
            RecommendationCode::MissingKeepAlive => "missing_keep_alive",
            RecommendationCode::CompressionUnsupported => "compression_unsupported",
            RecommendationCode::BytecodeCacheDisabled => "bytecode_cache_disabled",
            RecommendationCode::HighSystemLoad => "high_system_load",
            RecommendationCode::Custom(code) => code,
        }
    }
}

impl Serialize for RecommendationCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for RecommendationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub code: RecommendationCode,
    pub message: String,
    pub severity: Severity,
}

impl Recommendation {
    pub fn new(code: RecommendationCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity,
        }
    }
}

/// A single advisory check over a snapshot.
pub trait AdvisoryRule: Send + Sync {
    fn evaluate(&self, snapshot: &RequestSnapshot) -> Option<Recommendation>;
}

impl<F> AdvisoryRule for F
where
    F: Fn(&RequestSnapshot) -> Option<Recommendation> + Send + Sync,
{
    fn evaluate(&self, snapshot: &RequestSnapshot) -> Option<Recommendation> {
        self(snapshot)
    }
}

/// Flags requests that do not ask for a persistent connection.
///
/// HTTP/2 and HTTP/3 are exempt: their connections are persistent and the
/// `Connection` header is not allowed there.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAliveRule;

impl AdvisoryRule for KeepAliveRule {
    fn evaluate(&self, snapshot: &RequestSnapshot) -> Option<Recommendation> {
        let version = snapshot.protocol_version();
        if version.starts_with("HTTP/2") || version.starts_with("HTTP/3") {
            return None;
        }

        let keep_alive = snapshot
            .text(fields::HEADER_CONNECTION)
            .map(|v| has_token(v, "keep-alive"))
            .unwrap_or(false);
        if keep_alive {
            return None;
        }

        Some(Recommendation::new(
            RecommendationCode::MissingKeepAlive,
            Severity::Warning,
            "Enable HTTP keep-alive so clients can reuse connections",
        ))
    }
}

/// Flags clients that advertise no compression coding.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressionRule;

impl AdvisoryRule for CompressionRule {
    fn evaluate(&self, snapshot: &RequestSnapshot) -> Option<Recommendation> {
        let supported = snapshot
            .text(fields::HEADER_ACCEPT_ENCODING)
            .map(|v| COMPRESSION_CODINGS.iter().any(|c| has_token(v, c)))
            .unwrap_or(false);
        if supported {
            return None;
        }

        Some(Recommendation::new(
            RecommendationCode::CompressionUnsupported,
            Severity::Info,
            "Enable response compression (gzip or brotli)",
        ))
    }
}

/// Flags runtimes without a bytecode cache. An absent flag counts as off.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytecodeCacheRule;

impl AdvisoryRule for BytecodeCacheRule {
    fn evaluate(&self, snapshot: &RequestSnapshot) -> Option<Recommendation> {
        if snapshot.flag(fields::BYTECODE_CACHE) == Some(true) {
            return None;
        }

        Some(Recommendation::new(
            RecommendationCode::BytecodeCacheDisabled,
            Severity::Critical,
            "Enable the bytecode cache; every request is recompiling scripts",
        ))
    }
}

/// Flags a 1-minute load average above `threshold`.
///
/// Warning above the threshold, critical above twice the threshold.
/// An unknown load average produces nothing.
#[derive(Debug, Clone, Copy)]
pub struct HighLoadRule {
    threshold: f64,
}

impl HighLoadRule {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for HighLoadRule {
    fn default() -> Self {
        Self::new(DEFAULT_LOAD_THRESHOLD)
    }
}

impl AdvisoryRule for HighLoadRule {
    fn evaluate(&self, snapshot: &RequestSnapshot) -> Option<Recommendation> {
        let load = snapshot.float(fields::LOAD_AVERAGE)?;
        if load.is_nan() || load <= self.threshold {
            return None;
        }

        let severity = if load > self.threshold * 2.0 {
            Severity::Critical
        } else {
            Severity::Warning
        };

        Some(Recommendation::new(
            RecommendationCode::HighSystemLoad,
            severity,
            format!(
                "System load {:.2} exceeds {:.2}; review capacity or add resources",
                load, self.threshold
            ),
        ))
    }
}

/// Ordered collection of advisory rules.
pub struct RuleSet {
    rules: Vec<Box<dyn AdvisoryRule>>,
}

impl RuleSet {
    /// An empty rule set.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in rules: keep-alive, compression, bytecode cache, load.
    pub fn with_load_threshold(threshold: f64) -> Self {
        Self::empty()
            .rule(KeepAliveRule)
            .rule(CompressionRule)
            .rule(BytecodeCacheRule)
            .rule(HighLoadRule::new(threshold))
    }

    /// Append a rule; it runs after every rule added before it.
    pub fn rule(mut self, rule: impl AdvisoryRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Run every rule in order and collect what they report.
    pub fn evaluate(&self, snapshot: &RequestSnapshot) -> Vec<Recommendation> {
        let recommendations: Vec<Recommendation> = self
            .rules
            .iter()
            .filter_map(|rule| rule.evaluate(snapshot))
            .collect();

        debug!(
            rules = self.rules.len(),
            hits = recommendations.len(),
            "advisory rules evaluated"
        );

        recommendations
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::with_load_threshold(DEFAULT_LOAD_THRESHOLD)
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("rules", &self.rules.len())
            .finish()
    }
}

/// Case-insensitive membership test on a comma-separated header value.
/// A token whose quality value is zero (`gzip;q=0.000`) is refused.
fn has_token(value: &str, token: &str) -> bool {
    value.split(',').any(|part| {
        let mut pieces = part.split(';');
        let name = pieces.next().unwrap_or_default().trim();
        name.eq_ignore_ascii_case(token) && !pieces.any(is_zero_quality)
    })
}

fn is_zero_quality(param: &str) -> bool {
    let Some((key, value)) = param.split_once('=') else {
        return false;
    };
    key.trim().eq_ignore_ascii_case("q")
        && value
            .trim()
            .parse::<f32>()
            .map_or(false, |q| q <= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::snapshot::{FieldValue, RawFacts};

    fn snapshot(extra: &[(&str, FieldValue)]) -> RequestSnapshot {
        let mut facts = RawFacts::new()
            .with(fields::METHOD, "GET")
            .with(fields::URI, "/")
            .with(fields::PROTOCOL_VERSION, "HTTP/1.1");
        for (k, v) in extra {
            facts.insert(*k, v.clone());
        }
        RequestSnapshot::from_facts(facts).unwrap()
    }

    fn healthy() -> Vec<(&'static str, FieldValue)> {
        vec![
            (fields::HEADER_CONNECTION, "keep-alive".into()),
            (fields::HEADER_ACCEPT_ENCODING, "gzip, deflate, br".into()),
            (fields::BYTECODE_CACHE, true.into()),
            (fields::LOAD_AVERAGE, FieldValue::Float(0.5)),
        ]
    }

    #[test]
    fn test_healthy_request_has_no_recommendations() {
        let rules = RuleSet::default();
        assert!(rules.evaluate(&snapshot(&healthy())).is_empty());
    }

    #[test]
    fn test_default_rules_order_is_stable() {
        let input = snapshot(&[
            (fields::HEADER_ACCEPT_ENCODING, "gzip".into()),
            (fields::LOAD_AVERAGE, FieldValue::Float(3.0)),
            (fields::BYTECODE_CACHE, false.into()),
        ]);
        let rules = RuleSet::default();

        let first = rules.evaluate(&input);
        let codes: Vec<&RecommendationCode> = first.iter().map(|r| &r.code).collect();
        assert_eq!(
            codes,
            vec![
                &RecommendationCode::MissingKeepAlive,
                &RecommendationCode::BytecodeCacheDisabled,
                &RecommendationCode::HighSystemLoad,
            ]
        );

        for _ in 0..10 {
            assert_eq!(rules.evaluate(&input), first);
        }
    }

    #[test]
    fn test_high_load_threshold() {
        let rule = HighLoadRule::new(2.0);

        let rec = rule
            .evaluate(&snapshot(&[(fields::LOAD_AVERAGE, FieldValue::Float(3.5))]))
            .unwrap();
        assert_eq!(rec.code, RecommendationCode::HighSystemLoad);
        assert!(matches!(rec.severity, Severity::Warning | Severity::Critical));

        assert!(rule
            .evaluate(&snapshot(&[(fields::LOAD_AVERAGE, FieldValue::Float(1.0))]))
            .is_none());
        assert!(rule
            .evaluate(&snapshot(&[(fields::LOAD_AVERAGE, FieldValue::Float(2.0))]))
            .is_none());
        assert!(rule.evaluate(&snapshot(&[])).is_none());
    }

    #[test]
    fn test_high_load_critical_above_double() {
        let rule = HighLoadRule::new(2.0);
        let rec = rule
            .evaluate(&snapshot(&[(fields::LOAD_AVERAGE, FieldValue::Float(4.5))]))
            .unwrap();
        assert_eq!(rec.severity, Severity::Critical);
    }

    #[test]
    fn test_keep_alive_rule() {
        let rule = KeepAliveRule;
        assert!(rule
            .evaluate(&snapshot(&[(fields::HEADER_CONNECTION, "Keep-Alive".into())]))
            .is_none());
        assert!(rule
            .evaluate(&snapshot(&[(fields::HEADER_CONNECTION, "Upgrade, keep-alive".into())]))
            .is_none());
        assert!(rule
            .evaluate(&snapshot(&[(fields::HEADER_CONNECTION, "close".into())]))
            .is_some());
        assert!(rule.evaluate(&snapshot(&[])).is_some());

        let h2 = snapshot(&[(fields::PROTOCOL_VERSION, "HTTP/2.0".into())]);
        assert!(rule.evaluate(&h2).is_none());
    }

    #[test]
    fn test_compression_rule() {
        let rule = CompressionRule;
        assert!(rule
            .evaluate(&snapshot(&[(fields::HEADER_ACCEPT_ENCODING, "br;q=1.0".into())]))
            .is_none());
        assert!(rule
            .evaluate(&snapshot(&[(fields::HEADER_ACCEPT_ENCODING, "identity".into())]))
            .is_some());
        assert!(rule
            .evaluate(&snapshot(&[(fields::HEADER_ACCEPT_ENCODING, "gzip;q=0".into())]))
            .is_some());
        assert!(rule
            .evaluate(&snapshot(&[(
                fields::HEADER_ACCEPT_ENCODING,
                "gzip;q=0.000, identity".into()
            )]))
            .is_some());
        assert!(rule
            .evaluate(&snapshot(&[(
                fields::HEADER_ACCEPT_ENCODING,
                "gzip; Q=0.00, br;q=0.001".into()
            )]))
            .is_none());
        assert!(rule.evaluate(&snapshot(&[])).is_some());
    }

    #[test]
    fn test_bytecode_cache_rule() {
        let rule = BytecodeCacheRule;
        assert!(rule
            .evaluate(&snapshot(&[(fields::BYTECODE_CACHE, "On".into())]))
            .is_none());
        let rec = rule.evaluate(&snapshot(&[])).unwrap();
        assert_eq!(rec.severity, Severity::Critical);
    }

    #[test]
    fn test_closure_rule_runs_after_builtins() {
        let rules = RuleSet::default().rule(|s: &RequestSnapshot| {
            (s.method() == "TRACE").then(|| {
                Recommendation::new(
                    RecommendationCode::Custom("trace_enabled".to_string()),
                    Severity::Warning,
                    "Disable TRACE",
                )
            })
        });

        let mut input = healthy();
        input.push((fields::METHOD, "TRACE".into()));
        let recs = rules.evaluate(&snapshot(&input));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].code.as_str(), "trace_enabled");
        assert_eq!(rules.len(), 5);
    }

    #[test]
    fn test_serialize_recommendation() {
        let rec = Recommendation::new(
            RecommendationCode::MissingKeepAlive,
            Severity::Warning,
            "msg",
        );
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["code"], "missing_keep_alive");
        assert_eq!(json["severity"], "warning");
    }
}
