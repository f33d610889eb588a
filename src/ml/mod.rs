/// Machine Learning module for heart-disease risk classification
///
/// This module provides:
/// - The ordered feature schema shared by training and inference
/// - Dataset loading, cleaning and stratified splitting
/// - Categorical encoding and standard scaling
/// - A bagged decision-tree classifier
/// - The offline training pipeline and the serving pipeline

pub mod classifier;
pub mod codec;
pub mod dataset;
pub mod encoder;
pub mod inference;
pub mod models;
pub mod risk;
pub mod scaler;
pub mod schema;
pub mod training;

pub use classifier::{Classifier, ForestClassifier};
pub use codec::PreprocessingCodec;
pub use dataset::{stratified_split, Cleaner, RawTable};
pub use encoder::{CategoricalEncoder, CategoricalMapping};
pub use inference::{InferencePipeline, Score};
pub use models::{
    ClassMetrics, ForestConfig, ModelMetadata, ModelMetrics, ModelType, TrainingConfig,
};
pub use risk::RiskPolicy;
pub use scaler::{ScalerParameters, StandardScaler};
pub use schema::{FeatureRow, FeatureSchema, FeatureValue, FieldKind, FieldSpec};
pub use training::{TrainedModel, TrainingPipeline, TrainingReport};
