//! Versioned persistence of the three fitted components.
//!
//! Stores only move opaque bytes by key. [`ArtifactSet`] owns the envelope
//! format and the consistency checks between the encoder, the scaler and the
//! model of one training run.

pub mod file_store;
pub mod memory_store;

pub use file_store::FileArtifactStore;
pub use memory_store::InMemoryArtifactStore;

use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, ForestClassifier};
use crate::ml::codec::PreprocessingCodec;
use crate::ml::encoder::{CategoricalEncoder, CategoricalMapping};
use crate::ml::scaler::{ScalerParameters, StandardScaler};
use crate::ml::schema::FeatureSchema;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

/// Envelope layout version written by this build
pub const FORMAT_VERSION: u32 = 1;

pub const ENCODERS_KEY: &str = "encoders";
pub const SCALER_KEY: &str = "scaler";
pub const MODEL_KEY: &str = "heart_model";

/// Trait for artifact persistence
pub trait ArtifactStore: Send + Sync {
    /// Read the blob stored under `key`; a missing key is an artifact error
    fn load(&self, key: &str) -> Result<Vec<u8>>;

    /// Replace the blob under `key` in one step
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()>;

    fn exists(&self, key: &str) -> bool;

    /// Persist several blobs; stores that can stage writes override this
    fn save_all(&self, blobs: &[(&str, Vec<u8>)]) -> Result<()> {
        for (key, bytes) in blobs {
            self.save(key, bytes)?;
        }
        Ok(())
    }
}

/// Which component an envelope carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactKind {
    Encoders,
    Scaler,
    Model,
}

impl ArtifactKind {
    pub fn key(&self) -> &'static str {
        match self {
            ArtifactKind::Encoders => ENCODERS_KEY,
            ArtifactKind::Scaler => SCALER_KEY,
            ArtifactKind::Model => MODEL_KEY,
        }
    }
}

/// Metadata wrapper written around every persisted component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEnvelope<T> {
    pub kind: ArtifactKind,
    pub format_version: u32,
    /// Shared by the three artifacts of one training run
    pub run_id: Uuid,
    pub schema_fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub payload: T,
}

impl<T> ArtifactEnvelope<T> {
    /// Reject envelopes that do not belong to this schema or this build
    fn check(&self, expected: ArtifactKind, schema: &FeatureSchema) -> Result<()> {
        if self.kind != expected {
            return Err(AppError::Artifact(format!(
                "Artifact '{}' holds a {} payload, expected {}",
                expected.key(),
                self.kind,
                expected
            )));
        }
        if self.format_version != FORMAT_VERSION {
            return Err(AppError::Artifact(format!(
                "Artifact '{}' has format version {}, supported version is {}",
                expected.key(),
                self.format_version,
                FORMAT_VERSION
            )));
        }
        if self.schema_fingerprint != schema.fingerprint() {
            return Err(AppError::Artifact(format!(
                "Artifact '{}' was fitted against a different feature schema",
                expected.key()
            )));
        }
        Ok(())
    }
}

/// Sorted class list per categorical field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderPayload {
    pub mappings: BTreeMap<String, Vec<String>>,
}

impl From<&CategoricalEncoder> for EncoderPayload {
    fn from(encoder: &CategoricalEncoder) -> Self {
        Self {
            mappings: encoder
                .mappings()
                .map(|m| (m.field().to_string(), m.classes().to_vec()))
                .collect(),
        }
    }
}

impl EncoderPayload {
    fn into_encoder(self) -> Result<CategoricalEncoder> {
        let mappings = self
            .mappings
            .into_iter()
            .map(|(field, classes)| CategoricalMapping::from_classes(field, classes))
            .collect::<Result<Vec<_>>>()?;
        Ok(CategoricalEncoder::from_mappings(mappings))
    }
}

/// Scaler parameters together with the column names they were fitted on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerPayload {
    pub feature_names: Vec<String>,
    pub parameters: ScalerParameters,
}

/// Codec and classifier from one training run
#[derive(Debug)]
pub struct ArtifactSet {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub codec: PreprocessingCodec,
    pub classifier: ForestClassifier,
}

/// Serialized blobs of an [`ArtifactSet`], not yet written anywhere
#[derive(Debug, Clone)]
pub struct StagedArtifacts {
    pub run_id: Uuid,
    blobs: Vec<(&'static str, Vec<u8>)>,
}

impl StagedArtifacts {
    pub fn keys(&self) -> Vec<&'static str> {
        self.blobs.iter().map(|(k, _)| *k).collect()
    }

    /// Total serialized size in bytes
    pub fn size(&self) -> usize {
        self.blobs.iter().map(|(_, b)| b.len()).sum()
    }

    /// Write all three blobs to the store
    pub fn commit(self, store: &dyn ArtifactStore) -> Result<Uuid> {
        let blobs: Vec<(&str, Vec<u8>)> = self.blobs.into_iter().collect();
        store.save_all(&blobs)?;
        info!(run_id = %self.run_id, artifacts = blobs.len(), "💾 Artifacts committed");
        Ok(self.run_id)
    }
}

impl ArtifactSet {
    pub fn new(codec: PreprocessingCodec, classifier: ForestClassifier) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            codec,
            classifier,
        }
    }

    fn envelope<T>(&self, kind: ArtifactKind, payload: T) -> ArtifactEnvelope<T> {
        ArtifactEnvelope {
            kind,
            format_version: FORMAT_VERSION,
            run_id: self.run_id,
            schema_fingerprint: self.codec.schema().fingerprint(),
            created_at: self.created_at,
            payload,
        }
    }

    /// Serialize all three components in memory
    pub fn stage(&self) -> Result<StagedArtifacts> {
        let encoders = self.envelope(
            ArtifactKind::Encoders,
            EncoderPayload::from(self.codec.encoder()),
        );
        let scaler = self.envelope(
            ArtifactKind::Scaler,
            ScalerPayload {
                feature_names: self
                    .codec
                    .schema()
                    .names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                parameters: self.codec.scaler().parameters(),
            },
        );
        let model = self.envelope(ArtifactKind::Model, &self.classifier);

        Ok(StagedArtifacts {
            run_id: self.run_id,
            blobs: vec![
                (ENCODERS_KEY, serde_json::to_vec_pretty(&encoders)?),
                (SCALER_KEY, serde_json::to_vec_pretty(&scaler)?),
                (MODEL_KEY, bincode::serialize(&model)?),
            ],
        })
    }

    /// Stage and commit in one call
    pub fn save(&self, store: &dyn ArtifactStore) -> Result<Uuid> {
        self.stage()?.commit(store)
    }

    /// Load and cross-check the three artifacts against `schema`
    pub fn load(store: &dyn ArtifactStore, schema: &FeatureSchema) -> Result<Self> {
        let encoders: ArtifactEnvelope<EncoderPayload> =
            decode_json(store, ArtifactKind::Encoders)?;
        encoders.check(ArtifactKind::Encoders, schema)?;

        let scaler: ArtifactEnvelope<ScalerPayload> = decode_json(store, ArtifactKind::Scaler)?;
        scaler.check(ArtifactKind::Scaler, schema)?;

        let model: ArtifactEnvelope<ForestClassifier> = decode_bincode(store, ArtifactKind::Model)?;
        model.check(ArtifactKind::Model, schema)?;

        if encoders.run_id != scaler.run_id || encoders.run_id != model.run_id {
            return Err(AppError::Artifact(format!(
                "Artifacts come from different training runs (encoders {}, scaler {}, model {})",
                encoders.run_id, scaler.run_id, model.run_id
            )));
        }

        let names: Vec<String> = schema.names().into_iter().map(str::to_string).collect();
        if scaler.payload.feature_names != names {
            return Err(AppError::Artifact(
                "Scaler columns do not match the feature schema".to_string(),
            ));
        }
        if model.payload.metadata().feature_names != names {
            return Err(AppError::Artifact(
                "Model columns do not match the feature schema".to_string(),
            ));
        }

        let encoder = encoders.payload.into_encoder()?;
        let scaler_model = StandardScaler::from_parameters(scaler.payload.parameters)?;
        let codec = PreprocessingCodec::new(schema.clone(), encoder, scaler_model)?;

        info!(run_id = %model.run_id, created_at = %model.created_at, "📦 Artifacts loaded");

        Ok(Self {
            run_id: model.run_id,
            created_at: model.created_at,
            codec,
            classifier: model.payload,
        })
    }
}

fn decode_json<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    kind: ArtifactKind,
) -> Result<ArtifactEnvelope<T>> {
    let bytes = store.load(kind.key())?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::Artifact(format!("Artifact '{}' is corrupt: {}", kind.key(), e))
    })
}

fn decode_bincode<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    kind: ArtifactKind,
) -> Result<ArtifactEnvelope<T>> {
    let bytes = store.load(kind.key())?;
    bincode::deserialize(&bytes).map_err(|e| {
        AppError::Artifact(format!("Artifact '{}' is corrupt: {}", kind.key(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_keys() {
        assert_eq!(ArtifactKind::Encoders.key(), "encoders");
        assert_eq!(ArtifactKind::Scaler.key(), "scaler");
        assert_eq!(ArtifactKind::Model.key(), "heart_model");
        assert_eq!(ArtifactKind::Model.to_string(), "model");
    }

    #[test]
    fn test_envelope_checks() {
        let schema = FeatureSchema::heart_disease();
        let envelope = ArtifactEnvelope {
            kind: ArtifactKind::Scaler,
            format_version: FORMAT_VERSION,
            run_id: Uuid::new_v4(),
            schema_fingerprint: schema.fingerprint(),
            created_at: Utc::now(),
            payload: (),
        };
        assert!(envelope.check(ArtifactKind::Scaler, &schema).is_ok());
        assert!(envelope.check(ArtifactKind::Encoders, &schema).is_err());

        let mut future = envelope.clone();
        future.format_version = FORMAT_VERSION + 1;
        assert!(future.check(ArtifactKind::Scaler, &schema).is_err());

        let mut foreign = envelope;
        foreign.schema_fingerprint = "0".repeat(64);
        assert!(matches!(
            foreign.check(ArtifactKind::Scaler, &schema),
            Err(AppError::Artifact(_))
        ));
    }

    #[test]
    fn test_scaler_payload_json_keeps_exact_bits() {
        let values = vec![
            1.5406250000000001,
            10.307657480454763,
            0.42840718346422485,
            1.1282234635008037,
            0.48412291827592707,
            0.1 + 0.2,
        ];
        let payload = ScalerPayload {
            feature_names: (0..values.len()).map(|i| format!("f{}", i)).collect(),
            parameters: ScalerParameters {
                mean: values.clone(),
                scale: values.iter().map(|v| v * 3.0).collect(),
            },
        };

        let bytes = serde_json::to_vec_pretty(&payload).unwrap();
        let restored: ScalerPayload = serde_json::from_slice(&bytes).unwrap();

        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&restored.parameters.mean), bits(&payload.parameters.mean));
        assert_eq!(bits(&restored.parameters.scale), bits(&payload.parameters.scale));
    }

    #[test]
    fn test_encoder_payload_rejects_unsorted_classes() {
        let mut mappings = BTreeMap::new();
        mappings.insert(
            "sex".to_string(),
            vec!["Male".to_string(), "Female".to_string()],
        );
        assert!(EncoderPayload { mappings }.into_encoder().is_err());
    }
}
