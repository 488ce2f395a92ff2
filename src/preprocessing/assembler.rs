//! Feature vector assembly
//!
//! Turns a loosely-typed request object into the exact vector a head was
//! trained on: encoded categoricals first, then numeric scores, in the
//! frozen feature order.

use serde_json::{Map, Value};

use super::config::{underscored, FeatureSpec, HeadSpec, MissingNumeric};
use super::encoder::CategoricalEncoder;
use crate::error::{GradeError, Result};

/// Request fields addressed by canonical (spaced) name
///
/// Every lookup checks the underscored spelling first and falls back to the
/// spaced one. JSON `null` counts as absent.
#[derive(Debug, Clone, Default)]
pub struct RequestFields {
    fields: Map<String, Value>,
}

impl RequestFields {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(GradeError::InvalidField {
                field: "body".to_string(),
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let underscore = underscored(name);
        self.fields
            .get(&underscore)
            .filter(|v| !v.is_null())
            .or_else(|| self.fields.get(name).filter(|v| !v.is_null()))
    }

    /// Non-blank text value, or `None`
    pub fn text(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Required categorical value
    pub fn categorical(&self, name: &str) -> Result<String> {
        match self.get(name) {
            None => Err(GradeError::MissingField(name.to_string())),
            Some(Value::String(s)) if s.trim().is_empty() => {
                Err(GradeError::MissingField(name.to_string()))
            }
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(other) => Err(GradeError::InvalidField {
                field: name.to_string(),
                reason: format!("expected a string, got {}", json_kind(other)),
            }),
        }
    }

    /// Numeric value; numbers and numeric strings are accepted
    pub fn numeric(&self, name: &str, policy: MissingNumeric) -> Result<f64> {
        let value = match self.get(name) {
            None => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v) => Some(v),
        };
        let Some(value) = value else {
            return match policy {
                MissingNumeric::Zero => Ok(0.0),
                MissingNumeric::Required => Err(GradeError::MissingField(name.to_string())),
            };
        };

        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(GradeError::InvalidField {
                field: name.to_string(),
                reason: format!("expected a number, got {}", value),
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Unscaled feature vector plus the columns whose values were not in the
/// fitted vocabulary
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledVector {
    pub values: Vec<f64>,
    pub unseen: Vec<String>,
}

/// Builds feature vectors for a fitted encoder
pub struct FeatureAssembler<'a> {
    spec: &'a FeatureSpec,
    encoder: &'a CategoricalEncoder,
}

impl<'a> FeatureAssembler<'a> {
    pub fn new(spec: &'a FeatureSpec, encoder: &'a CategoricalEncoder) -> Self {
        Self { spec, encoder }
    }

    /// Names of the vector positions produced for `head`
    pub fn feature_order(&self, head: &HeadSpec) -> Vec<String> {
        let mut order = self.encoder.feature_names();
        order.extend(head.numeric_features.iter().cloned());
        order
    }

    pub fn width(&self, head: &HeadSpec) -> usize {
        self.encoder.width() + head.numeric_features.len()
    }

    /// Assemble the vector for `head`.
    ///
    /// All categorical columns are checked for presence before any numeric
    /// column, so the first reported `MissingField` is stable.
    pub fn assemble(&self, fields: &RequestFields, head: &HeadSpec) -> Result<AssembledVector> {
        let mut values = Vec::with_capacity(self.width(head));
        let mut unseen = Vec::new();

        for column in &self.spec.categorical {
            let raw = fields.categorical(&column.name)?;
            let normalized = column.normalize(&raw);
            let encoded = self.encoder.encode(&normalized, &column.name)?;
            if !encoded.seen {
                unseen.push(column.name.clone());
            }
            encoded.encoded.extend_into(&mut values);
        }

        for name in &head.numeric_features {
            debug_assert!(
                self.spec.profile == super::config::Profile::Fixed || !head.targets.contains(name),
                "target '{}' leaked into features",
                name
            );
            values.push(fields.numeric(name, self.spec.missing_numeric)?);
        }

        let expected = self.width(head);
        if values.len() != expected {
            return Err(GradeError::DimensionMismatch { expected, actual: values.len() });
        }

        Ok(AssembledVector { values, unseen })
    }
}
