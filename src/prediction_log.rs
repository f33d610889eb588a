//! Append-only record of completed predictions.

use crate::error::{AppError, Result};
use crate::ml::schema::FeatureSchema;
use crate::models::PredictionLogRecord;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Destination for prediction log records
pub trait PredictionLogSink: Send + Sync {
    fn append(&self, record: &PredictionLogRecord) -> Result<()>;
}

/// Column names of the CSV log: the features, then the outcome columns
pub fn log_columns(schema: &FeatureSchema) -> Vec<String> {
    schema
        .names()
        .into_iter()
        .map(str::to_string)
        .chain(
            ["username", "prediction", "probability", "timestamp"]
                .into_iter()
                .map(str::to_string),
        )
        .collect()
}

fn log_fields(schema: &FeatureSchema, record: &PredictionLogRecord) -> Result<Vec<String>> {
    let row = record.record.to_feature_row();
    let mut fields = Vec::with_capacity(schema.len() + 4);
    for name in schema.names() {
        let value = row.get(name).ok_or_else(|| {
            AppError::Internal(format!("Patient record has no field '{}'", name))
        })?;
        fields.push(value.to_log_string());
    }
    fields.push(record.username.clone());
    fields.push(record.prediction.to_string());
    fields.push(record.probability.to_string());
    fields.push(record.timestamp.to_rfc3339());
    Ok(fields)
}

/// CSV file sink; appends are serialized through a mutex and flushed per record
pub struct CsvPredictionLog {
    path: PathBuf,
    schema: FeatureSchema,
    lock: Mutex<()>,
}

impl CsvPredictionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            schema: FeatureSchema::heart_disease(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PredictionLogSink for CsvPredictionLog {
    fn append(&self, record: &PredictionLogRecord) -> Result<()> {
        let fields = log_fields(&self.schema, record)?;

        let _guard = self.lock.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if needs_header {
            writer.write_record(log_columns(&self.schema))?;
        }
        writer.write_record(&fields)?;
        let buffer = writer
            .into_inner()
            .map_err(|e| AppError::Internal(format!("Cannot encode log record: {}", e)))?;

        file.write_all(&buffer)?;
        file.flush()?;

        tracing::debug!(path = %self.path.display(), username = %record.username, "Prediction logged");
        Ok(())
    }
}

/// Collects records in memory (for tests)
#[derive(Default)]
pub struct InMemoryPredictionLog {
    records: Mutex<Vec<PredictionLogRecord>>,
}

impl InMemoryPredictionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PredictionLogRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl PredictionLogSink for InMemoryPredictionLog {
    fn append(&self, record: &PredictionLogRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}
