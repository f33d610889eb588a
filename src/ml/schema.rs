//! Ordered feature contract shared by training and inference.
//!
//! The encoder, the scaler and the classifier are all fitted against the
//! column order declared here. Rows travel between components as
//! [`FeatureRow`]s keyed by field name and are only laid out positionally by
//! the codec, using this schema.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// How a field is represented before encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Already numeric; scaled directly
    Numeric,
    /// String category; mapped to an integer code, then scaled
    Categorical,
}

/// One named column of the feature schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

impl FieldSpec {
    pub const fn numeric(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Numeric,
            description,
        }
    }

    pub const fn categorical(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Categorical,
            description,
        }
    }
}

/// The 13 heart-disease features, in model column order
pub const HEART_DISEASE_FIELDS: [FieldSpec; 13] = [
    FieldSpec::numeric("age", "Age in years"),
    FieldSpec::categorical("sex", "Sex"),
    FieldSpec::categorical("cp", "Chest pain type"),
    FieldSpec::numeric("trestbps", "Resting blood pressure (mm Hg)"),
    FieldSpec::numeric("chol", "Serum cholesterol (mg/dl)"),
    FieldSpec::categorical("fbs", "Fasting blood sugar > 120 mg/dl"),
    FieldSpec::categorical("restecg", "Resting electrocardiographic result"),
    FieldSpec::numeric("thalch", "Maximum heart rate achieved"),
    FieldSpec::categorical("exang", "Exercise induced angina"),
    FieldSpec::numeric("oldpeak", "ST depression induced by exercise"),
    FieldSpec::categorical("slope", "Slope of the peak exercise ST segment"),
    FieldSpec::numeric("ca", "Major vessels colored by fluoroscopy (0-3)"),
    FieldSpec::categorical("thal", "Thalassemia test result"),
];

/// Explicit, ordered field schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    fields: Vec<FieldSpec>,
}

impl FeatureSchema {
    /// Build a schema from an ordered field list; names must be unique
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self> {
        if fields.is_empty() {
            return Err(AppError::Internal("Feature schema has no fields".to_string()));
        }
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(AppError::Internal(format!(
                    "Duplicate field '{}' in feature schema",
                    field.name
                )));
            }
        }
        Ok(Self { fields })
    }

    /// The heart-disease schema used by both pipelines
    pub fn heart_disease() -> Self {
        Self {
            fields: HEART_DISEASE_FIELDS.to_vec(),
        }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in column order
    pub fn names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn categorical_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Categorical)
    }

    pub fn numeric_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.kind == FieldKind::Numeric)
    }

    /// SHA-256 over the ordered `name:kind` pairs.
    ///
    /// Stored in every artifact so a reordered or renamed schema is rejected at load.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for field in &self.fields {
            let kind = match field.kind {
                FieldKind::Numeric => "numeric",
                FieldKind::Categorical => "categorical",
            };
            hasher.update(field.name.as_bytes());
            hasher.update(b":");
            hasher.update(kind.as_bytes());
            hasher.update(b";");
        }
        hex::encode(hasher.finalize())
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::heart_disease()
    }
}

/// A single field value before encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Category(String),
}

impl FeatureValue {
    /// Text form used by the prediction log
    pub fn to_log_string(&self) -> String {
        match self {
            FeatureValue::Number(n) => n.to_string(),
            FeatureValue::Category(c) => c.clone(),
        }
    }
}

/// One record keyed by field name; insertion order is irrelevant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    values: HashMap<String, FeatureValue>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FeatureValue) {
        self.values.insert(name.into(), value);
    }

    pub fn with_number(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, FeatureValue::Number(value));
        self
    }

    pub fn with_category(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, FeatureValue::Category(value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
