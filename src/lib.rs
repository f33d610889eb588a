//! Heart-disease risk classification.
//!
//! An offline [`ml::TrainingPipeline`] fits a categorical encoder, a standard
//! scaler and a bagged decision-tree classifier from a CSV dataset and commits
//! them as one versioned [`artifacts::ArtifactSet`]. The
//! [`ml::InferencePipeline`] loads that set once, scores validated patient
//! records, maps the disease probability onto a risk band and appends every
//! completed prediction to a [`prediction_log::PredictionLogSink`].

pub mod api;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod ml;
pub mod models;
pub mod prediction_log;
pub mod telemetry;

pub use error::{AppError, Result};
