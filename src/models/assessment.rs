use crate::models::patient::PatientRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Ordinal risk tier derived from the disease-class probability
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Moderate,
    High,
}

impl RiskBand {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            RiskBand::Low => "Low Risk",
            RiskBand::Moderate => "Moderate Risk",
            RiskBand::High => "High Risk",
        }
    }

    /// Guidance shown alongside the label
    pub fn guidance(&self) -> &'static str {
        match self {
            RiskBand::Low => {
                "Your heart health indicators look excellent! Continue maintaining a healthy \
                 lifestyle with regular exercise and a balanced diet."
            }
            RiskBand::Moderate => {
                "Some risk factors detected. Consider consulting with a healthcare provider for \
                 preventive measures and lifestyle modifications."
            }
            RiskBand::High => {
                "Significant risk factors detected. Please consult a cardiologist as soon as \
                 possible for a comprehensive evaluation."
            }
        }
    }
}

/// Risk derived from one prediction; computed per request, never persisted as model state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Probability of the disease class (0.0 - 1.0)
    pub probability: f64,
    pub band: RiskBand,
    pub label: String,
    pub guidance: String,
}

/// Per-class probability pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub no_disease: f64,
    pub disease: f64,
}

/// Everything returned to the caller for one prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub identifier: String,
    /// 1 = disease present, 0 = absent
    pub predicted_label: usize,
    pub probabilities: ClassProbabilities,
    pub assessment: RiskAssessment,
    /// Notes for inputs outside their usual clinical range
    pub advisories: Vec<String>,
    /// Whether the prediction log accepted the record
    pub logged: bool,
    pub timestamp: DateTime<Utc>,
}

/// Append-only record of one completed prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionLogRecord {
    pub record: PatientRecord,
    pub username: String,
    pub prediction: usize,
    pub probability: f64,
    pub timestamp: DateTime<Utc>,
}

pub const ANONYMOUS: &str = "Anonymous";

/// Identifier recorded for a prediction; blank or absent names become `Anonymous`
pub fn identifier_or_anonymous(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => ANONYMOUS.to_string(),
    }
}
