//! Training records
//!
//! Historical rows arrive as loosely-typed documents (imported CSV rows or
//! whatever was inserted into the `grades` collection). Only rows that carry
//! every categorical column and every subject score of the active profile are
//! used.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::preprocessing::{FeatureSpec, MissingNumeric, RequestFields};

/// Alternate spellings seen in the public student-performance dataset
const COLUMN_ALIASES: [(&str, &str); 1] = [("race/ethnicity", "race")];

/// One complete, normalized historical student record
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRecord {
    /// Categorical column -> normalized value
    pub attributes: BTreeMap<String, String>,
    /// Subject -> score
    pub scores: BTreeMap<String, f64>,
}

impl TrainingRecord {
    /// Build a record from a document, or `None` if a configured column is
    /// missing or unparseable.
    pub fn from_document(doc: &Map<String, Value>, spec: &FeatureSpec) -> Option<Self> {
        let fields = RequestFields::new(canonical_keys(doc));

        let mut attributes = BTreeMap::new();
        for column in &spec.categorical {
            let raw = fields.categorical(&column.name).ok()?;
            attributes.insert(column.name.clone(), column.normalize(&raw));
        }

        let mut scores = BTreeMap::new();
        for subject in &spec.subjects {
            let score = fields.numeric(subject, MissingNumeric::Required).ok()?;
            scores.insert(subject.clone(), score);
        }

        Some(Self { attributes, scores })
    }

    pub fn attribute(&self, column: &str) -> Option<&str> {
        self.attributes.get(column).map(String::as_str)
    }

    pub fn score(&self, subject: &str) -> Option<f64> {
        self.scores.get(subject).copied()
    }
}

/// Trim keys and apply column aliases; an explicit canonical key wins over
/// an alias.
fn canonical_keys(doc: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(doc.len());
    for (key, value) in doc {
        let key = key.trim();
        let canonical = COLUMN_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, name)| *name)
            .unwrap_or(key);
        if canonical != key && doc.contains_key(canonical) {
            continue;
        }
        out.insert(canonical.to_string(), value.clone());
    }
    out
}

/// Convert documents into records, returning the records and the number of
/// documents dropped as incomplete.
pub fn clean_documents<'a, I>(docs: I, spec: &FeatureSpec) -> (Vec<TrainingRecord>, usize)
where
    I: IntoIterator<Item = &'a Map<String, Value>>,
{
    let mut records = Vec::new();
    let mut dropped = 0usize;
    for doc in docs {
        match TrainingRecord::from_document(doc, spec) {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!(dropped, kept = records.len(), "Dropped incomplete training rows");
    }
    (records, dropped)
}
