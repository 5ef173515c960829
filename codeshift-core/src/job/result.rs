//! Step results
//!
//! A step's agent returns a JSON document. Three shapes matter to the
//! pipeline: a report (`{"relatorio": ...}`), the refactor stage's complete
//! change list, and the grouping stage's branch plan. Everything else is
//! carried as-is.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::changeset::{CHANGES_KEY, SUMMARY_KEY};

/// Key holding report text in a report-shaped result
pub const REPORT_KEY: &str = "relatorio";

/// Parsed output of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum StepResult {
    /// `{"relatorio": "<text>", ...}`
    Report(Value),
    /// `{"conjunto_de_mudancas": [FileChange...], ...}`
    Refactor(Value),
    /// `{"resumo_geral": ..., "<branch>": {"conjunto_de_mudancas": [...]}, ...}`
    Grouping(Value),
    /// Any other document
    Generic(Value),
}

impl StepResult {
    /// The empty object used when no previous result exists
    pub fn empty() -> Self {
        StepResult::Generic(Value::Object(Map::new()))
    }

    /// Wrap a report text in the report shape
    pub fn report(text: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(REPORT_KEY.to_string(), Value::String(text.into()));
        StepResult::Report(Value::Object(map))
    }

    /// Classify a JSON document by shape
    pub fn from_value(value: Value) -> Self {
        let Some(map) = value.as_object() else {
            return StepResult::Generic(value);
        };

        if map.get(REPORT_KEY).is_some_and(Value::is_string) {
            StepResult::Report(value)
        } else if map.get(CHANGES_KEY).is_some_and(Value::is_array) {
            StepResult::Refactor(value)
        } else if map
            .iter()
            .any(|(key, group)| key != SUMMARY_KEY && is_group(group))
        {
            StepResult::Grouping(value)
        } else {
            StepResult::Generic(value)
        }
    }

    /// Borrow the underlying document
    pub fn value(&self) -> &Value {
        match self {
            StepResult::Report(v)
            | StepResult::Refactor(v)
            | StepResult::Grouping(v)
            | StepResult::Generic(v) => v,
        }
    }

    /// Take the underlying document
    pub fn into_value(self) -> Value {
        match self {
            StepResult::Report(v)
            | StepResult::Refactor(v)
            | StepResult::Grouping(v)
            | StepResult::Generic(v) => v,
        }
    }

    /// Get the name of this result's shape
    pub fn shape(&self) -> &'static str {
        match self {
            StepResult::Report(_) => "report",
            StepResult::Refactor(_) => "refactor",
            StepResult::Grouping(_) => "grouping",
            StepResult::Generic(_) => "generic",
        }
    }

    /// Null, empty objects, empty arrays and empty strings count as empty
    pub fn is_empty(&self) -> bool {
        match self.value() {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Report text, if this is a report-shaped result
    pub fn report_text(&self) -> Option<&str> {
        match self {
            StepResult::Report(v) => v.get(REPORT_KEY).and_then(Value::as_str),
            _ => None,
        }
    }

    /// Report text, falling back to the pretty-printed document
    pub fn report_or_pretty(&self) -> String {
        match self.report_text() {
            Some(text) => text.to_string(),
            None => serde_json::to_string_pretty(self.value())
                .unwrap_or_else(|_| self.value().to_string()),
        }
    }
}

fn is_group(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|group| group.get(CHANGES_KEY))
        .is_some_and(Value::is_array)
}

impl From<Value> for StepResult {
    fn from(value: Value) -> Self {
        StepResult::from_value(value)
    }
}

impl From<StepResult> for Value {
    fn from(result: StepResult) -> Self {
        result.into_value()
    }
}

impl Default for StepResult {
    fn default() -> Self {
        Self::empty()
    }
}

/// Per-step result snapshots, persisted as `step_<i>_result` keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepResults(BTreeMap<usize, StepResult>);

impl StepResults {
    /// Storage key for a step index
    pub fn key(index: usize) -> String {
        format!("step_{}_result", index)
    }

    fn parse_key(key: &str) -> Option<usize> {
        key.strip_prefix("step_")?
            .strip_suffix("_result")?
            .parse()
            .ok()
    }

    pub fn get(&self, index: usize) -> Option<&StepResult> {
        self.0.get(&index)
    }

    pub fn insert(&mut self, index: usize, result: StepResult) {
        self.0.insert(index, result);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &StepResult)> {
        self.0.iter().map(|(i, r)| (*i, r))
    }
}

impl Serialize for StepResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (index, result) in &self.0 {
            map.serialize_entry(&Self::key(*index), result)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StepResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StepResultsVisitor;

        impl<'de> Visitor<'de> for StepResultsVisitor {
            type Value = StepResults;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a map of step_<i>_result keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut results = BTreeMap::new();
                while let Some((key, value)) = access.next_entry::<String, Value>()? {
                    let index = StepResults::parse_key(&key).ok_or_else(|| {
                        de::Error::custom(format!("invalid step result key: {}", key))
                    })?;
                    results.insert(index, StepResult::from_value(value));
                }
                Ok(StepResults(results))
            }
        }

        deserializer.deserialize_map(StepResultsVisitor)
    }
}
