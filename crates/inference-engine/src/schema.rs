//! Feature Schema and Labeled Rows

use crate::{read_artifact, InferenceError, LoadError};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// On-disk schema layouts
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SchemaFile {
    Columns(Vec<String>),
    Document {
        columns: Vec<String>,
        #[serde(default)]
        model_sha256: Option<String>,
    },
}

/// Ordered column names the model was trained on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Vec<String>,
    model_sha256: Option<String>,
}

impl FeatureSchema {
    /// Build a schema from column names.
    ///
    /// Columns must be non-empty, non-blank and unique.
    pub fn new(columns: Vec<String>) -> Result<Self, LoadError> {
        if columns.is_empty() {
            return Err(LoadError::InvalidSchema("schema has no columns".to_string()));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            if column.trim().is_empty() {
                return Err(LoadError::InvalidSchema(format!("column {} is blank", index)));
            }
            if !seen.insert(column.as_str()) {
                return Err(LoadError::InvalidSchema(format!(
                    "duplicate column '{}' at position {}",
                    column, index
                )));
            }
        }

        Ok(Self {
            columns,
            model_sha256: None,
        })
    }

    /// Attach the expected SHA-256 of the paired model artifact
    pub fn with_model_sha256(mut self, digest: impl Into<String>) -> Self {
        self.model_sha256 = Some(digest.into());
        self
    }

    /// Parse a schema document
    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        let file: SchemaFile = serde_json::from_str(text)
            .map_err(|e| LoadError::InvalidSchema(format!("not a column list: {}", e)))?;

        let schema = match file {
            SchemaFile::Columns(columns) => Self::new(columns)?,
            SchemaFile::Document {
                columns,
                model_sha256,
            } => {
                let schema = Self::new(columns)?;
                match model_sha256 {
                    Some(digest) => schema.with_model_sha256(digest),
                    None => schema,
                }
            }
        };

        debug!("Parsed feature schema with {} columns", schema.len());
        Ok(schema)
    }

    /// Load a schema file from disk
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let bytes = read_artifact("feature schema", path)?;
        let text = String::from_utf8(bytes)
            .map_err(|_| LoadError::InvalidSchema(format!("{} is not UTF-8", path.display())))?;
        Self::from_json(&text)
    }

    /// Column names in training order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false for a constructed schema
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Expected model digest, if the schema pins one
    pub fn model_sha256(&self) -> Option<&str> {
        self.model_sha256.as_deref()
    }

    /// Pair a value slice with the column names, position by position
    pub fn label<'a>(&'a self, values: &'a [f64]) -> Result<FeatureRow<'a>, InferenceError> {
        if values.len() != self.columns.len() {
            return Err(InferenceError::InvalidInputShape {
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        Ok(FeatureRow {
            columns: &self.columns,
            values,
        })
    }
}

/// One labeled input row in schema order
#[derive(Debug, Clone, Copy)]
pub struct FeatureRow<'a> {
    columns: &'a [String],
    values: &'a [f64],
}

impl<'a> FeatureRow<'a> {
    /// Raw values in schema order
    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    /// Column names in schema order
    pub fn columns(&self) -> &'a [String] {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value for a named column
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|index| self.values[index])
    }

    /// `(column, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}
