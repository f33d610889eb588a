//! Categorical string to integer-code mapping.
//!
//! Codes are assigned in lexicographic order of the category strings, so the
//! same vocabulary always yields the same codes regardless of row order.

use crate::error::{AppError, Result};
use crate::ml::dataset::{CleanDataset, Column};
use crate::ml::schema::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Bijection between the observed categories of one field and `0..k`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalMapping {
    field: String,
    /// Sorted, unique; the index of a class is its code
    classes: Vec<String>,
}

impl CategoricalMapping {
    /// Learn the mapping from observed values
    pub fn fit<'a>(field: impl Into<String>, values: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let field = field.into();
        let classes: BTreeSet<&str> = values.into_iter().collect();
        if classes.is_empty() {
            return Err(AppError::Fit(format!(
                "No categories observed for field '{}'",
                field
            )));
        }
        Ok(Self {
            field,
            classes: classes.into_iter().map(str::to_string).collect(),
        })
    }

    /// Rebuild a mapping from a stored class list; must be sorted and unique
    pub fn from_classes(field: impl Into<String>, classes: Vec<String>) -> Result<Self> {
        let field = field.into();
        if classes.is_empty() {
            return Err(AppError::Artifact(format!(
                "Mapping for field '{}' has no classes",
                field
            )));
        }
        if !classes.windows(2).all(|w| w[0] < w[1]) {
            return Err(AppError::Artifact(format!(
                "Mapping for field '{}' is not sorted and unique",
                field
            )));
        }
        Ok(Self { field, classes })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn encode(&self, value: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map_err(|_| AppError::UnknownCategory {
                field: self.field.clone(),
                value: value.to_string(),
            })
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

/// One mapping per categorical field of the schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    mappings: BTreeMap<String, CategoricalMapping>,
}

impl CategoricalEncoder {
    /// Fit a mapping for every categorical field in the schema
    pub fn fit(schema: &FeatureSchema, dataset: &CleanDataset) -> Result<Self> {
        let mut mappings = BTreeMap::new();
        for field in schema.categorical_fields() {
            let values = match dataset.column(field.name) {
                Some(Column::Categorical(values)) => values,
                Some(Column::Numeric(_)) => {
                    return Err(AppError::Fit(format!(
                        "Field '{}' is categorical but the column is numeric",
                        field.name
                    )))
                }
                None => {
                    return Err(AppError::Fit(format!(
                        "Field '{}' missing from cleaned dataset",
                        field.name
                    )))
                }
            };
            let mapping = CategoricalMapping::fit(field.name, values.iter().map(String::as_str))?;
            tracing::debug!(field = field.name, classes = ?mapping.classes(), "Fitted categorical mapping");
            mappings.insert(field.name.to_string(), mapping);
        }
        Ok(Self { mappings })
    }

    pub fn from_mappings(mappings: impl IntoIterator<Item = CategoricalMapping>) -> Self {
        Self {
            mappings: mappings
                .into_iter()
                .map(|m| (m.field.clone(), m))
                .collect(),
        }
    }

    pub fn mapping(&self, field: &str) -> Option<&CategoricalMapping> {
        self.mappings.get(field)
    }

    pub fn mappings(&self) -> impl Iterator<Item = &CategoricalMapping> {
        self.mappings.values()
    }

    pub fn encode(&self, field: &str, value: &str) -> Result<usize> {
        self.mappings
            .get(field)
            .ok_or_else(|| {
                AppError::Internal(format!("No categorical mapping for field '{}'", field))
            })?
            .encode(value)
    }

    /// Every categorical field of the schema has a mapping and no extra ones exist
    pub fn covers(&self, schema: &FeatureSchema) -> Result<()> {
        let expected: BTreeSet<&str> = schema.categorical_fields().map(|f| f.name).collect();
        let actual: BTreeSet<&str> = self.mappings.keys().map(String::as_str).collect();
        if expected != actual {
            return Err(AppError::Artifact(format!(
                "Encoder covers fields {:?}, schema expects {:?}",
                actual, expected
            )));
        }
        Ok(())
    }
}
