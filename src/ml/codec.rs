//! Schema-driven preprocessing shared by training and inference.
//!
//! Both pipelines go through [`PreprocessingCodec`], so a record is laid out,
//! encoded and scaled identically whether it comes from the training CSV or
//! from a prediction request.

use crate::error::{AppError, Result};
use crate::ml::dataset::{CleanDataset, Column};
use crate::ml::encoder::CategoricalEncoder;
use crate::ml::scaler::StandardScaler;
use crate::ml::schema::{FeatureRow, FeatureSchema, FeatureValue, FieldKind};
use ndarray::{Array1, Array2};

/// Lay out a cleaned dataset positionally and replace categories with their codes.
///
/// Only rows listed in `rows` are emitted, in that order.
pub fn encode_dataset(
    schema: &FeatureSchema,
    encoder: &CategoricalEncoder,
    dataset: &CleanDataset,
    rows: &[usize],
) -> Result<Array2<f64>> {
    let mut matrix = Array2::<f64>::zeros((rows.len(), schema.len()));

    for (col, field) in schema.fields().iter().enumerate() {
        let column = dataset.column(field.name).ok_or_else(|| {
            AppError::Data(format!("Field '{}' missing from cleaned dataset", field.name))
        })?;

        for (out_row, &src_row) in rows.iter().enumerate() {
            if src_row >= dataset.n_rows() {
                return Err(AppError::Internal(format!(
                    "Row index {} out of bounds for {} rows",
                    src_row,
                    dataset.n_rows()
                )));
            }
            matrix[[out_row, col]] = match (field.kind, column) {
                (FieldKind::Numeric, Column::Numeric(values)) => values[src_row],
                (FieldKind::Categorical, Column::Categorical(values)) => {
                    encoder.encode(field.name, &values[src_row])? as f64
                }
                _ => {
                    return Err(AppError::Data(format!(
                        "Column '{}' does not match its declared kind",
                        field.name
                    )))
                }
            };
        }
    }

    Ok(matrix)
}

/// Fitted encoder and scaler bound to one feature schema
#[derive(Debug, Clone)]
pub struct PreprocessingCodec {
    schema: FeatureSchema,
    encoder: CategoricalEncoder,
    scaler: StandardScaler,
}

impl PreprocessingCodec {
    pub fn new(schema: FeatureSchema, encoder: CategoricalEncoder, scaler: StandardScaler) -> Result<Self> {
        encoder.covers(&schema)?;
        if scaler.n_features() != schema.len() {
            return Err(AppError::Artifact(format!(
                "Scaler has {} columns, schema has {}",
                scaler.n_features(),
                schema.len()
            )));
        }
        Ok(Self {
            schema,
            encoder,
            scaler,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn encoder(&self) -> &CategoricalEncoder {
        &self.encoder
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Encoded but unscaled vector in schema order
    pub fn encode_row(&self, row: &FeatureRow) -> Result<Array1<f64>> {
        let mut values = Vec::with_capacity(self.schema.len());
        for field in self.schema.fields() {
            let value = row.get(field.name).ok_or_else(|| {
                AppError::Validation(format!("missing field '{}'", field.name))
            })?;
            let encoded = match (field.kind, value) {
                (FieldKind::Numeric, FeatureValue::Number(n)) if n.is_finite() => *n,
                (FieldKind::Numeric, other) => {
                    return Err(AppError::Validation(format!(
                        "field '{}' must be a finite number, got {:?}",
                        field.name, other
                    )))
                }
                (FieldKind::Categorical, FeatureValue::Category(c)) => {
                    self.encoder.encode(field.name, c)? as f64
                }
                (FieldKind::Categorical, FeatureValue::Number(n)) => {
                    return Err(AppError::Validation(format!(
                        "field '{}' expects a category, got {}",
                        field.name, n
                    )))
                }
            };
            values.push(encoded);
        }
        Ok(Array1::from(values))
    }

    /// Encoded and standardized vector in schema order
    pub fn transform_row(&self, row: &FeatureRow) -> Result<Array1<f64>> {
        let encoded = self.encode_row(row)?;
        self.scaler.transform_row(encoded.view())
    }

    /// Matrix of transformed rows in schema order
    pub fn transform_matrix(&self, rows: &[FeatureRow]) -> Result<Array2<f64>> {
        let mut matrix = Array2::<f64>::zeros((rows.len(), self.schema.len()));
        for (i, row) in rows.iter().enumerate() {
            matrix.row_mut(i).assign(&self.transform_row(row)?);
        }
        Ok(matrix)
    }
}
