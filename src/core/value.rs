//! Schema-Agnostic State Tree
//!
//! Session state payloads carry whatever shape the game defines, so the
//! engine models them as a closed tagged tree instead of assuming a
//! schema. Maps are `BTreeMap` for sorted iteration, which makes the
//! canonical serialization (and therefore every checksum) independent of
//! insertion order at every nesting level.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A dynamically-typed state value.
///
/// Maps merge field-by-field on update; every other variant (including
/// lists) replaces wholesale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    /// Absent / explicit null.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Numeric value. All numbers are f64, as in the wire formats the
    /// engine exchanges with clients.
    Number(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list. Replaced wholesale on merge.
    List(Vec<StateValue>),
    /// String-keyed map, sorted for canonical serialization.
    Map(BTreeMap<String, StateValue>),
}

impl StateValue {
    /// Empty map constructor.
    pub fn map() -> Self {
        StateValue::Map(BTreeMap::new())
    }

    /// Build a map from key/value pairs.
    pub fn map_from<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, StateValue)>,
        K: Into<String>,
    {
        StateValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        )
    }

    /// True if this value is a map.
    pub fn is_map(&self) -> bool {
        matches!(self, StateValue::Map(_))
    }

    /// Borrow the map entries, or None for non-map values.
    pub fn as_map(&self) -> Option<&BTreeMap<String, StateValue>> {
        match self {
            StateValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Get a top-level entry by key (None for non-maps).
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Insert a top-level entry. No-op on non-map values.
    pub fn insert(&mut self, key: impl Into<String>, value: StateValue) {
        if let StateValue::Map(entries) = self {
            entries.insert(key.into(), value);
        }
    }

    /// Canonical serialization: JSON with map keys sorted at every level.
    ///
    /// Two trees holding the same key/value pairs always produce the same
    /// string regardless of how they were built, so this is the checksum
    /// input.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("state tree serialization cannot fail")
    }

    /// Recursively merge `updates` into this value.
    ///
    /// Map entries merge field-by-field; any other pairing replaces the
    /// current value with the update.
    pub fn deep_merge(&mut self, updates: StateValue) {
        match (self, updates) {
            (StateValue::Map(current), StateValue::Map(incoming)) => {
                for (key, value) in incoming {
                    if value.is_map() {
                        if let Some(existing) = current.get_mut(&key) {
                            if existing.is_map() {
                                existing.deep_merge(value);
                                continue;
                            }
                        }
                    }
                    current.insert(key, value);
                }
            }
            (slot, incoming) => *slot = incoming,
        }
    }
}

impl Default for StateValue {
    fn default() -> Self {
        StateValue::Null
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        StateValue::Bool(v)
    }
}

impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        StateValue::Number(v)
    }
}

impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        StateValue::Number(v as f64)
    }
}

impl From<u32> for StateValue {
    fn from(v: u32) -> Self {
        StateValue::Number(f64::from(v))
    }
}

impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        StateValue::String(v.to_string())
    }
}

impl From<String> for StateValue {
    fn from(v: String) -> Self {
        StateValue::String(v)
    }
}

impl From<Vec<StateValue>> for StateValue {
    fn from(v: Vec<StateValue>) -> Self {
        StateValue::List(v)
    }
}

/// A modified top-level entry: the value before and after.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModifiedEntry {
    /// Value in the older tree.
    pub from: StateValue,
    /// Value in the newer tree.
    pub to: StateValue,
}

/// Structural diff between two state trees, classified by top-level key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueDiff {
    /// Keys present only in the newer tree.
    pub added: BTreeMap<String, StateValue>,
    /// Keys present in both trees with structurally different values.
    pub modified: BTreeMap<String, ModifiedEntry>,
    /// Keys present only in the older tree.
    pub removed: BTreeMap<String, StateValue>,
}

impl ValueDiff {
    /// Compute the diff between two trees.
    ///
    /// Classification applies to map entries; non-map roots contribute no
    /// keys, matching how clients consume diffs (whole-payload resync).
    pub fn between(from: &StateValue, to: &StateValue) -> Self {
        let empty = BTreeMap::new();
        let from_map = from.as_map().unwrap_or(&empty);
        let to_map = to.as_map().unwrap_or(&empty);

        let mut diff = ValueDiff::default();

        for (key, value) in to_map {
            match from_map.get(key) {
                None => {
                    diff.added.insert(key.clone(), value.clone());
                }
                Some(previous) if previous != value => {
                    diff.modified.insert(
                        key.clone(),
                        ModifiedEntry {
                            from: previous.clone(),
                            to: value.clone(),
                        },
                    );
                }
                Some(_) => {}
            }
        }

        for (key, value) in from_map {
            if !to_map.contains_key(key) {
                diff.removed.insert(key.clone(), value.clone());
            }
        }

        diff
    }

    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}
