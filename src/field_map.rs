//! Per-document accumulation of extracted fields under canonical keys.
//!
//! A [`FieldMap`] is owned by whoever processes one document. Every observed
//! label is normalized and either folded into an existing canonical key
//! (fuzzy match) or appended as a new one. Nothing carries over between
//! documents.

use serde_json::{Map, Value};

use crate::config::FormTemplate;
use crate::keys;

/// Outcome of observing one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Folded into an existing canonical key; the previous value was replaced.
    Matched { key: String, distance: usize },
    /// Adopted as a new canonical key.
    New { key: String },
}

impl Resolution {
    pub fn key(&self) -> &str {
        match self {
            Resolution::Matched { key, .. } | Resolution::New { key } => key,
        }
    }
}

/// Fields of one document after every label has been resolved.
#[derive(Debug, Clone, Default)]
pub struct FinishedFields {
    pub fields: Map<String, Value>,
    /// Seeded template labels that never received a value.
    pub missing: Vec<String>,
}

/// Canonical keys and their values for a single document.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    /// Canonical keys, first-seen order. Unique.
    keys: Vec<String>,
    values: Map<String, Value>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the template's labels as canonical keys (no values yet).
    ///
    /// Labels that normalize to an already seeded label are dropped.
    pub fn with_template(template: &FormTemplate) -> Self {
        let mut map = Self::new();
        for label in &template.fields {
            let normalized = keys::normalize(label);
            if map.position_of(&normalized).is_none() {
                map.keys.push(label.trim().to_string());
            }
        }
        map
    }

    /// Index of the key whose normalized form equals `normalized`.
    fn position_of(&self, normalized: &str) -> Option<usize> {
        self.keys.iter().position(|k| keys::normalize(k) == normalized)
    }

    /// Record `value` under the canonical key `raw_label` resolves to.
    pub fn observe(&mut self, raw_label: &str, value: Value) -> Resolution {
        let label = keys::normalize(raw_label);

        let found = keys::closest_key(&label, self.keys.iter().map(String::as_str))
            .map(|m| (m.key.to_string(), m.distance));

        let resolution = match found {
            Some((key, distance)) => Resolution::Matched { key, distance },
            // Only the empty label can miss the fuzzy pass yet already exist
            None => match self.position_of(&label) {
                Some(idx) => Resolution::Matched {
                    key: self.keys[idx].clone(),
                    distance: 0,
                },
                None => {
                    self.keys.push(label.clone());
                    Resolution::New { key: label }
                }
            },
        };

        self.values.insert(resolution.key().to_string(), value);
        resolution
    }

    /// Canonical keys in first-seen order, including unfilled template labels.
    pub fn canonical_keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Number of canonical keys holding a value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Finalize into values ordered by canonical key, plus unfilled labels.
    pub fn finish(mut self) -> FinishedFields {
        let mut finished = FinishedFields::default();
        for key in self.keys {
            match self.values.remove(&key) {
                Some(value) => {
                    finished.fields.insert(key, value);
                }
                None => finished.missing.push(key),
            }
        }
        finished
    }
}
