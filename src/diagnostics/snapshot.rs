//! Immutable capture of request, connection and runtime facts.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::fields::{self, Category};
use crate::core::{Error, Result};

/// Value of a single snapshot field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// The field is absent. Never stored, only returned.
    Unknown,
}

impl FieldValue {
    #[inline]
    pub fn is_unknown(&self) -> bool {
        matches!(self, FieldValue::Unknown)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Flag interpretation: booleans, 0/1 and the usual ini-style words.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Integer(0) => Some(false),
            FieldValue::Integer(1) => Some(true),
            FieldValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => Some(true),
                "0" | "false" | "off" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Non-blank text. Required fields must satisfy this.
    fn is_present_text(&self) -> bool {
        self.as_str().map_or(false, |s| !s.trim().is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Unknown => f.write_str("unknown"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        FieldValue::Integer(v.into())
    }
}

impl From<usize> for FieldValue {
    fn from(v: usize) -> Self {
        FieldValue::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Unknown)
    }
}

/// Flat name/value facts gathered by the host before a snapshot is taken.
#[derive(Debug, Clone, Default)]
pub struct RawFacts {
    values: BTreeMap<String, FieldValue>,
}

impl RawFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a fact.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.values.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for RawFacts {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut facts = RawFacts::new();
        for (k, v) in iter {
            facts.insert(k, v);
        }
        facts
    }
}

static UNKNOWN: FieldValue = FieldValue::Unknown;

/// Read-only view of the facts known about a request at handler entry.
///
/// Built once from [`RawFacts`]; there is no way to change a field after
/// construction. The report keeps its own clone.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSnapshot {
    fields: BTreeMap<String, FieldValue>,
}

impl RequestSnapshot {
    /// Capture a snapshot.
    ///
    /// `method`, `uri` and `protocol_version` must be present as non-blank
    /// text; the first one that is not is reported as
    /// [`Error::MissingRequiredField`].
    /// Facts whose value is `Unknown` are dropped.
    pub fn from_facts(facts: RawFacts) -> Result<Self> {
        for field in fields::REQUIRED {
            if !facts.get(field).map_or(false, FieldValue::is_present_text) {
                return Err(Error::MissingRequiredField { field });
            }
        }

        let fields = facts
            .values
            .into_iter()
            .filter(|(_, v)| !v.is_unknown())
            .collect();

        Ok(Self { fields })
    }

    /// Value of `name`, or [`FieldValue::Unknown`] when absent.
    pub fn field(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&UNKNOWN)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).as_str()
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.field(name).as_f64()
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.field(name).as_i64()
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.field(name).as_bool()
    }

    /// Request header by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&fields::header_key(name))
            .and_then(FieldValue::as_str)
    }

    pub fn method(&self) -> &str {
        self.text(fields::METHOD).unwrap_or_default()
    }

    pub fn uri(&self) -> &str {
        self.text(fields::URI).unwrap_or_default()
    }

    pub fn protocol_version(&self) -> &str {
        self.text(fields::PROTOCOL_VERSION).unwrap_or_default()
    }

    /// Client endpoint as `addr:port` (or just `addr`).
    pub fn client(&self) -> Option<String> {
        self.endpoint(fields::CLIENT_ADDR, fields::CLIENT_PORT)
    }

    /// Server endpoint as `addr:port` (or just `addr`).
    pub fn server(&self) -> Option<String> {
        self.endpoint(fields::SERVER_ADDR, fields::SERVER_PORT)
    }

    /// Host-reported arrival time of the request, if any.
    pub fn request_received(&self) -> Option<SystemTime> {
        let secs = self.float(fields::REQUEST_RECEIVED)?;
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        UNIX_EPOCH.checked_add(Duration::try_from_secs_f64(secs).ok()?)
    }

    /// Time from host-reported arrival until `now`, clamped at zero.
    ///
    /// Mixes two wall-clock readings, so it is only ever an estimate.
    pub fn since_received(&self, now: SystemTime) -> Option<Duration> {
        let received = self.request_received()?;
        Some(now.duration_since(received).unwrap_or(Duration::ZERO))
    }

    /// Fields of one category, ordered by name.
    pub fn fields_in(&self, category: Category) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .filter(move |(k, _)| Category::of(k) == category)
            .map(|(k, v)| (k.as_str(), v))
    }

    /// All fields, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn endpoint(&self, addr_key: &str, port_key: &str) -> Option<String> {
        let addr = self.text(addr_key)?;
        let addr = if addr.contains(':') && !addr.starts_with('[') {
            format!("[{}]", addr)
        } else {
            addr.to_string()
        };
        match self.integer(port_key) {
            Some(port) => Some(format!("{}:{}", addr, port)),
            None => Some(addr),
        }
    }
}

/// Serialized as `{category: {field: value}}`, empty categories omitted.
impl Serialize for RequestSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut sections: BTreeMap<Category, BTreeMap<&str, &FieldValue>> = BTreeMap::new();
        for (name, value) in &self.fields {
            sections
                .entry(Category::of(name))
                .or_default()
                .insert(name.as_str(), value);
        }

        let mut map = serializer.serialize_map(Some(sections.len()))?;
        for (category, fields) in &sections {
            map.serialize_entry(category.as_str(), fields)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> RawFacts {
        RawFacts::new()
            .with(fields::METHOD, "GET")
            .with(fields::URI, "/week_1/network-analyzer")
            .with(fields::PROTOCOL_VERSION, "HTTP/1.1")
    }

    #[test]
    fn test_missing_field_is_unknown() {
        let snapshot = RequestSnapshot::from_facts(required()).unwrap();
        assert_eq!(snapshot.field("nonexistent"), &FieldValue::Unknown);
        assert!(snapshot.header("Connection").is_none());
        assert!(snapshot.float(fields::LOAD_AVERAGE).is_none());
    }

    #[test]
    fn test_missing_method_fails() {
        let mut facts = required();
        facts.remove(fields::METHOD);
        assert_eq!(
            RequestSnapshot::from_facts(facts).unwrap_err(),
            Error::MissingRequiredField { field: "method" }
        );
    }

    #[test]
    fn test_blank_or_unknown_required_field_fails() {
        let facts = required().with(fields::URI, "   ");
        assert_eq!(
            RequestSnapshot::from_facts(facts).unwrap_err(),
            Error::MissingRequiredField { field: "uri" }
        );

        let facts = required().with(fields::PROTOCOL_VERSION, None::<String>);
        assert_eq!(
            RequestSnapshot::from_facts(facts).unwrap_err(),
            Error::MissingRequiredField {
                field: "protocol_version"
            }
        );
    }

    #[test]
    fn test_non_text_required_field_fails() {
        let facts = required().with(fields::METHOD, true);
        assert_eq!(
            RequestSnapshot::from_facts(facts).unwrap_err(),
            Error::MissingRequiredField { field: "method" }
        );

        let facts = required().with(fields::URI, 42i64);
        assert_eq!(
            RequestSnapshot::from_facts(facts).unwrap_err(),
            Error::MissingRequiredField { field: "uri" }
        );
    }

    #[test]
    fn test_required_checked_in_order() {
        assert_eq!(
            RequestSnapshot::from_facts(RawFacts::new()).unwrap_err(),
            Error::MissingRequiredField { field: "method" }
        );
    }

    #[test]
    fn test_optional_fields_accepted() {
        let facts = required()
            .with(fields::CLIENT_ADDR, "10.0.0.7")
            .with(fields::CLIENT_PORT, 53_211u16)
            .with(fields::LOAD_AVERAGE, 0.42)
            .with(fields::BYTECODE_CACHE, true)
            .with(fields::header_key("Connection"), "keep-alive")
            .with("deploy_region", "eu-west")
            .with(fields::MEMORY_LIMIT, None::<String>);

        let snapshot = RequestSnapshot::from_facts(facts).unwrap();
        assert_eq!(snapshot.method(), "GET");
        assert_eq!(snapshot.client().as_deref(), Some("10.0.0.7:53211"));
        assert_eq!(snapshot.float(fields::LOAD_AVERAGE), Some(0.42));
        assert_eq!(snapshot.flag(fields::BYTECODE_CACHE), Some(true));
        assert_eq!(snapshot.header("connection"), Some("keep-alive"));
        assert_eq!(snapshot.text("deploy_region"), Some("eu-west"));
        // Unknown facts are not stored.
        assert_eq!(snapshot.len(), 9);
    }

    #[test]
    fn test_ipv6_endpoint() {
        let facts = required()
            .with(fields::SERVER_ADDR, "::1")
            .with(fields::SERVER_PORT, 8080u16);
        let snapshot = RequestSnapshot::from_facts(facts).unwrap();
        assert_eq!(snapshot.server().as_deref(), Some("[::1]:8080"));
    }

    #[test]
    fn test_flag_parsing() {
        assert_eq!(FieldValue::from("On").as_bool(), Some(true));
        assert_eq!(FieldValue::from("0").as_bool(), Some(false));
        assert_eq!(FieldValue::Integer(1).as_bool(), Some(true));
        assert_eq!(FieldValue::from("maybe").as_bool(), None);
    }

    #[test]
    fn test_since_received() {
        let facts = required().with(fields::REQUEST_RECEIVED, 1_700_000_000.25);
        let snapshot = RequestSnapshot::from_facts(facts).unwrap();

        let now = UNIX_EPOCH + Duration::from_secs_f64(1_700_000_000.75);
        let since = snapshot.since_received(now).unwrap();
        assert!((since.as_secs_f64() - 0.5).abs() < 1e-3);

        // Host clock ahead of ours clamps to zero.
        let earlier = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        assert_eq!(snapshot.since_received(earlier), Some(Duration::ZERO));
    }

    #[test]
    fn test_out_of_range_arrival_is_unknown() {
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        let values = [
            FieldValue::Float(1e20),
            FieldValue::from("1e20"),
            FieldValue::Float(-1.0),
        ];
        for value in values {
            let facts = required().with(fields::REQUEST_RECEIVED, value);
            let snapshot = RequestSnapshot::from_facts(facts).unwrap();
            assert!(snapshot.request_received().is_none());
            assert!(snapshot.since_received(now).is_none());
        }
    }

    #[test]
    fn test_serialize_groups_by_category() {
        let facts = required()
            .with(fields::CLIENT_ADDR, "127.0.0.1")
            .with(fields::header_key("Host"), "localhost:8080")
            .with(fields::BYTECODE_CACHE, false);
        let snapshot = RequestSnapshot::from_facts(facts).unwrap();

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["connection"]["client_addr"], "127.0.0.1");
        assert_eq!(json["protocol"]["method"], "GET");
        assert_eq!(json["protocol"]["header.host"], "localhost:8080");
        assert_eq!(json["runtime"]["bytecode_cache"], false);
        assert!(json.get("timing").is_none());
    }

    #[test]
    fn test_fields_in_category() {
        let facts = required()
            .with(fields::CLIENT_ADDR, "127.0.0.1")
            .with(fields::CLIENT_PORT, 4000u16);
        let snapshot = RequestSnapshot::from_facts(facts).unwrap();

        let names: Vec<&str> = snapshot
            .fields_in(Category::Connection)
            .map(|(k, _)| k)
            .collect();
        assert_eq!(names, vec!["client_addr", "client_port"]);
    }
}
