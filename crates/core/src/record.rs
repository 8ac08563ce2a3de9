//! Store records.
//!
//! A record is an opaque attribute map. Only two attributes carry meaning for
//! the sweep: the creation time (`reportTime`, epoch milliseconds) and the
//! expiry instant (`ttl`, epoch seconds). Everything else is carried through
//! untouched.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute holding the record's creation time, in epoch milliseconds.
pub const REPORT_TIME_ATTR: &str = "reportTime";

/// Attribute holding the record's expiry instant, in epoch seconds.
pub const TTL_ATTR: &str = "ttl";

/// An attribute name → value mapping as returned by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Whether the attribute is present at all, regardless of its value.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Copy of this record with one attribute set; all other attributes are kept.
    pub fn with_attribute(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut copy = self.clone();
        copy.insert(name, value);
        copy
    }

    /// Integer view of a numeric attribute.
    ///
    /// Stores hand numbers back as decimals, so integral floats are accepted.
    pub fn integer(&self, name: &str) -> Option<i64> {
        let value = self.0.get(name)?;
        value.as_i64().or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        })
    }

    pub fn report_time_ms(&self) -> Option<i64> {
        self.integer(REPORT_TIME_ATTR)
    }

    pub fn ttl(&self) -> Option<i64> {
        self.integer(TTL_ATTR)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl TryFrom<Value> for Record {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Record {
        Record::try_from(json!({
            "id": "imp-1",
            "reportTime": 1_700_000_000_000_i64,
            "campaign": {"name": "spring", "slots": [1, 2]}
        }))
        .unwrap()
    }

    #[test]
    fn with_attribute_preserves_everything_else() {
        let original = sample();
        let tagged = original.with_attribute(TTL_ATTR, 1_800_000_000_i64);

        assert_eq!(tagged.ttl(), Some(1_800_000_000));
        assert_eq!(tagged.get("campaign"), original.get("campaign"));
        assert_eq!(tagged.get("id"), original.get("id"));
        assert_eq!(tagged.len(), original.len() + 1);
        assert!(!original.contains(TTL_ATTR));
    }

    #[test]
    fn integer_accepts_integral_decimals_only() {
        let record: Record = [("a", json!(42.0)), ("b", json!(4.5)), ("c", json!("7"))]
            .into_iter()
            .collect();

        assert_eq!(record.integer("a"), Some(42));
        assert_eq!(record.integer("b"), None);
        assert_eq!(record.integer("c"), None);
        assert_eq!(record.integer("missing"), None);
    }

    #[test]
    fn zero_ttl_still_counts_as_present() {
        let record = sample().with_attribute(TTL_ATTR, 0);
        assert!(record.contains(TTL_ATTR));
        assert_eq!(record.ttl(), Some(0));
    }

    #[test]
    fn non_objects_are_not_records() {
        assert!(Record::try_from(json!([1, 2])).is_err());
    }
}
