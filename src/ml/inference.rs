use crate::artifacts::{ArtifactSet, ArtifactStore};
use crate::error::{AppError, Result};
use crate::ml::classifier::Classifier;
use crate::ml::codec::PreprocessingCodec;
use crate::ml::models::ModelMetadata;
use crate::ml::risk::RiskPolicy;
use crate::ml::schema::FeatureSchema;
use crate::models::{
    identifier_or_anonymous, ClassProbabilities, PatientInput, PatientRecord, PredictionLogRecord,
    PredictionOutcome, RiskAssessment,
};
use crate::prediction_log::PredictionLogSink;
use chrono::Utc;
use ndarray::Array2;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Scored record before logging
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub predicted_label: usize,
    pub probabilities: ClassProbabilities,
    pub assessment: RiskAssessment,
}

/// Serving pipeline over one loaded artifact set.
///
/// Everything it holds is read-only after construction; the prediction log
/// sink is the only shared resource written to.
pub struct InferencePipeline {
    codec: PreprocessingCodec,
    classifier: Box<dyn Classifier>,
    log: Arc<dyn PredictionLogSink>,
    policy: RiskPolicy,
    run_id: Option<Uuid>,
}

impl InferencePipeline {
    pub fn new(
        codec: PreprocessingCodec,
        classifier: Box<dyn Classifier>,
        log: Arc<dyn PredictionLogSink>,
    ) -> Result<Self> {
        if classifier.n_features() != codec.schema().len() {
            return Err(AppError::Artifact(format!(
                "Classifier expects {} features, schema has {}",
                classifier.n_features(),
                codec.schema().len()
            )));
        }
        Ok(Self {
            codec,
            classifier,
            log,
            policy: RiskPolicy::default(),
            run_id: None,
        })
    }

    /// Load the three artifacts from `store`; fails if any is missing or inconsistent
    pub fn load(store: &dyn ArtifactStore, log: Arc<dyn PredictionLogSink>) -> Result<Self> {
        let artifacts = ArtifactSet::load(store, &FeatureSchema::heart_disease())?;
        Self::from_artifacts(artifacts, log)
    }

    pub fn from_artifacts(artifacts: ArtifactSet, log: Arc<dyn PredictionLogSink>) -> Result<Self> {
        let run_id = artifacts.run_id;
        let mut pipeline = Self::new(artifacts.codec, Box::new(artifacts.classifier), log)?;
        pipeline.run_id = Some(run_id);
        Ok(pipeline)
    }

    pub fn with_policy(mut self, policy: RiskPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    pub fn metadata(&self) -> &ModelMetadata {
        self.classifier.metadata()
    }

    pub fn codec(&self) -> &PreprocessingCodec {
        &self.codec
    }

    /// Transformed feature vector for a record, in schema order
    pub fn transform(&self, record: &PatientRecord) -> Result<Array2<f64>> {
        self.codec
            .transform_matrix(&[record.to_feature_row()])
            .map_err(AppError::prediction)
    }

    /// Score a validated record without touching the prediction log
    pub fn score(&self, record: &PatientRecord) -> Result<Score> {
        let features = self.transform(record)?;
        let proba = self
            .classifier
            .predict_proba(&features)
            .map_err(AppError::prediction)?;
        if proba.dim() != (1, 2) {
            return Err(AppError::prediction(AppError::Internal(format!(
                "Classifier returned probabilities of shape {:?}",
                proba.dim()
            ))));
        }

        let disease = proba[[0, 1]];
        let assessment = self.policy.assess(disease).map_err(AppError::prediction)?;

        Ok(Score {
            predicted_label: usize::from(disease > crate::ml::classifier::DECISION_THRESHOLD),
            probabilities: ClassProbabilities {
                no_disease: proba[[0, 0]],
                disease,
            },
            assessment,
        })
    }

    /// Validate, score and log one patient.
    ///
    /// Validation and scoring failures are returned before anything is logged.
    pub fn predict(&self, input: &PatientInput, identifier: Option<&str>) -> Result<PredictionOutcome> {
        let record = input.validate().map_err(AppError::prediction)?;

        let advisories = record.advisories();
        for note in &advisories {
            warn!(advisory = %note, "Input outside expected range");
        }

        let score = self.score(&record)?;
        let identifier = identifier_or_anonymous(identifier);
        let timestamp = Utc::now();

        debug!(
            identifier = %identifier,
            band = %score.assessment.band,
            probability = score.probabilities.disease,
            "Prediction computed"
        );

        let log_record = PredictionLogRecord {
            record,
            username: identifier.clone(),
            prediction: score.predicted_label,
            probability: score.probabilities.disease,
            timestamp,
        };
        let logged = match self.log.append(&log_record) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, identifier = %identifier, "Failed to append prediction log");
                false
            }
        };

        Ok(PredictionOutcome {
            identifier,
            predicted_label: score.predicted_label,
            probabilities: score.probabilities,
            assessment: score.assessment,
            advisories,
            logged,
            timestamp,
        })
    }
}
