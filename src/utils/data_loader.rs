//! Data loading utilities

use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use serde_json::{Map, Number, Value};

use crate::error::{GradeError, Result};

/// CSV loader for historical grade data
pub struct DataLoader {
    /// Rows used to infer column types
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self { infer_schema_length: 100 }
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| GradeError::Data(format!("cannot open {}: {}", path.display(), e)))?;

        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(file);

        reader.finish().map_err(|e| GradeError::Data(e.to_string()))
    }

    /// Load a CSV file straight into documents
    pub fn load_documents(&self, path: impl AsRef<Path>) -> Result<Vec<Map<String, Value>>> {
        dataframe_to_documents(&self.load_csv(path)?)
    }
}

/// One JSON object per row, keyed by trimmed column name.
///
/// Numeric columns become JSON numbers, nulls become `null`, anything else
/// is rendered as a string.
pub fn dataframe_to_documents(df: &DataFrame) -> Result<Vec<Map<String, Value>>> {
    let names: Vec<String> = df.get_column_names().into_iter().map(|s| s.to_string()).collect();
    let mut docs: Vec<Map<String, Value>> = (0..df.height()).map(|_| Map::new()).collect();

    for name in &names {
        let column = df.column(name)?.as_materialized_series();
        let key = name.trim().to_string();
        let dtype = column.dtype().clone();

        let values: Vec<Value> = if dtype.is_float() || dtype.is_integer() {
            let cast = column.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| v.and_then(Number::from_f64).map(Value::Number).unwrap_or(Value::Null))
                .collect()
        } else if dtype == DataType::Boolean {
            column.bool()?.into_iter().map(|v| v.map(Value::Bool).unwrap_or(Value::Null)).collect()
        } else {
            let cast = column.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| v.map(|s| Value::String(s.to_string())).unwrap_or(Value::Null))
                .collect()
        };

        for (doc, value) in docs.iter_mut().zip(values) {
            doc.insert(key.clone(), value);
        }
    }

    Ok(docs)
}
