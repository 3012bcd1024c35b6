use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single scalar parameter value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Empty strings are rendered as a bare key in tracking URLs.
    pub fn is_empty(&self) -> bool {
        matches!(self, ParamValue::Text(s) if s.is_empty())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Integer(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Integer(i)
    }
}

impl From<f64> for ParamValue {
    fn from(x: f64) -> Self {
        ParamValue::Float(x)
    }
}

/// Measurement Protocol hit parameters, keyed by their short protocol name
/// (`tid`, `cid`, `t`, `el`, ...). Iteration follows insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    params: IndexMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        ParameterSet {
            params: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Sets `key`, replacing any existing value in place.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> Option<ParamValue>
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        self.params.insert(key.into(), value.into())
    }

    /// Sets `key` only if it is absent. Returns true if the value was inserted.
    pub fn insert_if_absent<K, V>(&mut self, key: K, value: V) -> bool
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let key = key.into();
        if self.params.contains_key(&key) {
            return false;
        }
        self.params.insert(key, value.into());
        true
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Key/value pairs with values rendered as strings, in insertion order.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterSet
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ParameterSet::from_pairs(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let mut params = ParameterSet::from_pairs([("ec", "Installed"), ("ea", "en-US")]);
        params.insert("t", "event");
        params.insert("ec", "Updated");

        let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["ec", "ea", "t"]);
        assert_eq!(params.get("ec"), Some(&ParamValue::from("Updated")));
    }

    #[test]
    fn insert_if_absent_keeps_existing() {
        let mut params = ParameterSet::from_pairs([("ds", "web")]);
        assert!(!params.insert_if_absent("ds", "urlFetch"));
        assert!(params.insert_if_absent("aip", "1"));
        assert_eq!(params.get("ds").and_then(ParamValue::as_str), Some("web"));
    }

    #[test]
    fn value_rendering() {
        assert_eq!(ParamValue::from(42_i64).to_string(), "42");
        assert_eq!(ParamValue::from(1.5).to_string(), "1.5");
        assert!(ParamValue::from("").is_empty());
        assert!(!ParamValue::from(0_i64).is_empty());
    }

    #[test]
    fn deserializes_mixed_scalars() {
        let params: ParameterSet =
            serde_json::from_str(r#"{"ev": 3, "ec": "Installed", "pr": 9.5}"#).unwrap();
        assert_eq!(params.get("ev"), Some(&ParamValue::Integer(3)));
        assert_eq!(params.get("pr"), Some(&ParamValue::Float(9.5)));
        assert_eq!(params.to_pairs()[1], ("ec".to_string(), "Installed".to_string()));
    }
}
