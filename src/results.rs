//! Order-preserving key/value collector with duplicate-key promotion.
//!
//! The first `add` for a key stores a single value; a second `add` turns the
//! slot into a list holding both values; later adds append. No key is ever
//! dropped, which matters for archives that legally repeat entry names.

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// A value stored in a [`ResultSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Text(String),
    Nested(ResultSet),
}

impl ResultValue {
    fn to_json(&self) -> Value {
        match self {
            ResultValue::Text(text) => Value::String(text.clone()),
            ResultValue::Nested(set) => Value::Object(set.snapshot()),
        }
    }
}

impl From<String> for ResultValue {
    fn from(value: String) -> Self {
        ResultValue::Text(value)
    }
}

impl From<&str> for ResultValue {
    fn from(value: &str) -> Self {
        ResultValue::Text(value.to_string())
    }
}

impl From<ResultSet> for ResultValue {
    fn from(value: ResultSet) -> Self {
        ResultValue::Nested(value)
    }
}

/// Aggregated record tree, built fresh per logical record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    entries: Vec<(String, Vec<ResultValue>)>,
    index: HashMap<String, usize>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` under `key`, promoting the slot to a list on repeats.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<ResultValue>) {
        let key = key.into();
        let value = value.into();

        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1.push(value),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, vec![value]));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// The accumulated mapping, in insertion order, ready for serialization.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(key, values)| (key.clone(), slot_to_json(values)))
            .collect()
    }
}

/// A single value stays scalar; repeats become an ordered list.
fn slot_to_json(values: &[ResultValue]) -> Value {
    match values {
        [single] => single.to_json(),
        many => Value::Array(many.iter().map(ResultValue::to_json).collect()),
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, values) in &self.entries {
            map.serialize_entry(key, &slot_to_json(values))?;
        }
        map.end()
    }
}
