//! Categorical encoding implementations
//!
//! Two strategies are supported and they are not interchangeable: a model
//! fitted on label codes cannot be served with one-hot blocks, so the
//! strategy travels with the artifacts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::config::EncodingStrategy;
use crate::error::{GradeError, Result};

/// Result of encoding a single raw value
#[derive(Debug, Clone, PartialEq)]
pub enum Encoded {
    /// Integer class code
    Label(u32),
    /// Indicator block for the value's column
    OneHot(Vec<f64>),
}

impl Encoded {
    /// Append the numeric representation to a feature vector
    pub fn extend_into(&self, out: &mut Vec<f64>) {
        match self {
            Encoded::Label(code) => out.push(*code as f64),
            Encoded::OneHot(block) => out.extend_from_slice(block),
        }
    }
}

/// An encoded value plus whether it was part of the fitted vocabulary
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedValue {
    pub encoded: Encoded,
    pub seen: bool,
}

/// Label encoder for a single column
///
/// Classes are sorted, so codes do not depend on row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a, I>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: Vec<String> = values
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        if classes.is_empty() {
            return Err(GradeError::Data("cannot fit label encoder on an empty column".into()));
        }
        Ok(Self { classes })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn transform(&self, value: &str) -> Option<u32> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
            .map(|i| i as u32)
    }

    /// Encode, aliasing unseen values to the first class.
    pub fn transform_or_first(&self, value: &str) -> (u32, bool) {
        match self.transform(value) {
            Some(code) => (code, true),
            None => (0, false),
        }
    }

    pub fn inverse_transform(&self, code: u32) -> Option<&str> {
        self.classes.get(code as usize).map(String::as_str)
    }
}

/// One-hot encoder shared across all categorical columns
///
/// Output layout is one block per column, in fit order, each block holding
/// one indicator per sorted category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<(String, Vec<String>)>,
}

impl OneHotEncoder {
    pub fn fit(data: &[(String, Vec<String>)]) -> Result<Self> {
        let mut columns = Vec::with_capacity(data.len());
        for (name, values) in data {
            let categories: Vec<String> = values
                .iter()
                .map(String::as_str)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(str::to_string)
                .collect();
            if categories.is_empty() {
                return Err(GradeError::Data(format!(
                    "cannot fit one-hot encoder on empty column '{}'",
                    name
                )));
            }
            columns.push((name.clone(), categories));
        }
        Ok(Self { columns })
    }

    fn categories(&self, column: &str) -> Result<&[String]> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cats)| cats.as_slice())
            .ok_or_else(|| GradeError::UnknownColumn(column.to_string()))
    }

    pub fn width(&self) -> usize {
        self.columns.iter().map(|(_, cats)| cats.len()).sum()
    }

    /// Indicator block for `value`; all zeros when unseen.
    pub fn transform(&self, value: &str, column: &str) -> Result<(Vec<f64>, bool)> {
        let categories = self.categories(column)?;
        let mut block = vec![0.0; categories.len()];
        let position = categories.binary_search_by(|c| c.as_str().cmp(value)).ok();
        if let Some(i) = position {
            block[i] = 1.0;
        }
        Ok((block, position.is_some()))
    }

    /// Category whose indicator is set, if exactly one is.
    pub fn inverse_transform(&self, block: &[f64], column: &str) -> Result<Option<&str>> {
        let categories = self.categories(column)?;
        if block.len() != categories.len() {
            return Err(GradeError::DimensionMismatch {
                expected: categories.len(),
                actual: block.len(),
            });
        }
        let hot: Vec<usize> = block
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == 1.0)
            .map(|(i, _)| i)
            .collect();
        Ok(match hot.as_slice() {
            [i] => Some(categories[*i].as_str()),
            _ => None,
        })
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|(name, cats)| cats.iter().map(move |c| format!("{}={}", name, c)))
            .collect()
    }
}

/// Fitted categorical encoder for every categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum CategoricalEncoder {
    Label { columns: Vec<(String, LabelEncoder)> },
    OneHot { encoder: OneHotEncoder },
}

impl CategoricalEncoder {
    /// Fit on `(column, values)` pairs; column order is preserved.
    pub fn fit(strategy: EncodingStrategy, data: &[(String, Vec<String>)]) -> Result<Self> {
        match strategy {
            EncodingStrategy::Label => {
                let columns = data
                    .iter()
                    .map(|(name, values)| {
                        LabelEncoder::fit(values.iter().map(String::as_str))
                            .map(|enc| (name.clone(), enc))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(CategoricalEncoder::Label { columns })
            }
            EncodingStrategy::OneHot => Ok(CategoricalEncoder::OneHot {
                encoder: OneHotEncoder::fit(data)?,
            }),
        }
    }

    pub fn strategy(&self) -> EncodingStrategy {
        match self {
            CategoricalEncoder::Label { .. } => EncodingStrategy::Label,
            CategoricalEncoder::OneHot { .. } => EncodingStrategy::OneHot,
        }
    }

    /// Fitted column names, in encoding order
    pub fn columns(&self) -> Vec<&str> {
        match self {
            CategoricalEncoder::Label { columns } => {
                columns.iter().map(|(name, _)| name.as_str()).collect()
            }
            CategoricalEncoder::OneHot { encoder } => {
                encoder.columns.iter().map(|(name, _)| name.as_str()).collect()
            }
        }
    }

    /// Known categories of a column, in code order
    pub fn vocabulary(&self, column: &str) -> Result<&[String]> {
        match self {
            CategoricalEncoder::Label { columns } => columns
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, enc)| enc.classes())
                .ok_or_else(|| GradeError::UnknownColumn(column.to_string())),
            CategoricalEncoder::OneHot { encoder } => encoder.categories(column),
        }
    }

    /// Number of vector positions produced by all categorical columns
    pub fn width(&self) -> usize {
        match self {
            CategoricalEncoder::Label { columns } => columns.len(),
            CategoricalEncoder::OneHot { encoder } => encoder.width(),
        }
    }

    pub fn feature_names(&self) -> Vec<String> {
        match self {
            CategoricalEncoder::Label { columns } => {
                columns.iter().map(|(name, _)| name.clone()).collect()
            }
            CategoricalEncoder::OneHot { encoder } => encoder.feature_names(),
        }
    }

    pub fn encode(&self, value: &str, column: &str) -> Result<EncodedValue> {
        match self {
            CategoricalEncoder::Label { columns } => {
                let (_, enc) = columns
                    .iter()
                    .find(|(name, _)| name == column)
                    .ok_or_else(|| GradeError::UnknownColumn(column.to_string()))?;
                let (code, seen) = enc.transform_or_first(value);
                Ok(EncodedValue { encoded: Encoded::Label(code), seen })
            }
            CategoricalEncoder::OneHot { encoder } => {
                let (block, seen) = encoder.transform(value, column)?;
                Ok(EncodedValue { encoded: Encoded::OneHot(block), seen })
            }
        }
    }

    pub fn decode(&self, encoded: &Encoded, column: &str) -> Result<Option<String>> {
        match (self, encoded) {
            (CategoricalEncoder::Label { columns }, Encoded::Label(code)) => {
                let (_, enc) = columns
                    .iter()
                    .find(|(name, _)| name == column)
                    .ok_or_else(|| GradeError::UnknownColumn(column.to_string()))?;
                Ok(enc.inverse_transform(*code).map(str::to_string))
            }
            (CategoricalEncoder::OneHot { encoder }, Encoded::OneHot(block)) => {
                Ok(encoder.inverse_transform(block, column)?.map(str::to_string))
            }
            _ => Err(GradeError::Data(format!(
                "encoded value for '{}' does not match the {:?} strategy",
                column,
                self.strategy()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> Vec<(String, Vec<String>)> {
        vec![
            (
                "gender".to_string(),
                vec!["male".into(), "female".into(), "female".into()],
            ),
            (
                "lunch".to_string(),
                vec!["standard".into(), "free/reduced".into(), "standard".into()],
            ),
        ]
    }

    #[test]
    fn test_label_encoder_sorted_classes() {
        let enc = LabelEncoder::fit(["group C", "group A", "group B", "group A"]).unwrap();
        assert_eq!(enc.classes(), &["group A", "group B", "group C"]);
        assert_eq!(enc.transform("group B"), Some(1));
        assert_eq!(enc.transform("group Z"), None);
    }

    #[test]
    fn test_label_fallback_to_first_class() {
        let encoder = CategoricalEncoder::fit(EncodingStrategy::Label, &sample_data()).unwrap();
        let value = encoder.encode("nonbinary", "gender").unwrap();
        assert_eq!(value.encoded, Encoded::Label(0));
        assert!(!value.seen);
        assert_eq!(
            encoder.decode(&value.encoded, "gender").unwrap().as_deref(),
            Some("female")
        );
    }

    #[test]
    fn test_label_round_trip() {
        let encoder = CategoricalEncoder::fit(EncodingStrategy::Label, &sample_data()).unwrap();
        for value in ["male", "female"] {
            let first = encoder.encode(value, "gender").unwrap();
            let second = encoder.encode(value, "gender").unwrap();
            assert_eq!(first, second);
            assert!(first.seen);
            assert_eq!(encoder.decode(&first.encoded, "gender").unwrap().as_deref(), Some(value));
        }
    }

    #[test]
    fn test_onehot_layout_and_unseen() {
        let encoder = CategoricalEncoder::fit(EncodingStrategy::OneHot, &sample_data()).unwrap();
        assert_eq!(encoder.width(), 4);
        assert_eq!(
            encoder.feature_names(),
            vec!["gender=female", "gender=male", "lunch=free/reduced", "lunch=standard"]
        );

        let known = encoder.encode("standard", "lunch").unwrap();
        assert_eq!(known.encoded, Encoded::OneHot(vec![0.0, 1.0]));
        assert_eq!(encoder.decode(&known.encoded, "lunch").unwrap().as_deref(), Some("standard"));

        let unseen = encoder.encode("catered", "lunch").unwrap();
        assert_eq!(unseen.encoded, Encoded::OneHot(vec![0.0, 0.0]));
        assert!(!unseen.seen);
        assert_eq!(encoder.decode(&unseen.encoded, "lunch").unwrap(), None);
    }

    #[test]
    fn test_unknown_column() {
        for strategy in [EncodingStrategy::Label, EncodingStrategy::OneHot] {
            let encoder = CategoricalEncoder::fit(strategy, &sample_data()).unwrap();
            let err = encoder.encode("x", "race").unwrap_err();
            assert!(matches!(err, GradeError::UnknownColumn(ref c) if c == "race"));
        }
    }

    #[test]
    fn test_extend_into() {
        let mut out = vec![1.0];
        Encoded::Label(3).extend_into(&mut out);
        Encoded::OneHot(vec![0.0, 1.0]).extend_into(&mut out);
        assert_eq!(out, vec![1.0, 3.0, 0.0, 1.0]);
    }
}
