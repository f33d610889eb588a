use crate::error::{AppError, Result};
use crate::models::{RiskAssessment, RiskBand};

/// Lower bound (inclusive) of the moderate band
pub const MODERATE_THRESHOLD: f64 = 0.30;

/// Lower bound (inclusive) of the high band
pub const HIGH_THRESHOLD: f64 = 0.60;

/// Maps a disease probability onto a risk band.
///
/// Bands are half-open on the right: `[0, 0.30)`, `[0.30, 0.60)`, `[0.60, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskPolicy {
    moderate_threshold: f64,
    high_threshold: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            moderate_threshold: MODERATE_THRESHOLD,
            high_threshold: HIGH_THRESHOLD,
        }
    }
}

impl RiskPolicy {
    pub fn band(&self, probability: f64) -> RiskBand {
        if probability < self.moderate_threshold {
            RiskBand::Low
        } else if probability < self.high_threshold {
            RiskBand::Moderate
        } else {
            RiskBand::High
        }
    }

    /// Build the assessment for a probability in `[0, 1]`
    pub fn assess(&self, probability: f64) -> Result<RiskAssessment> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(AppError::Internal(format!(
                "Probability {} is outside [0, 1]",
                probability
            )));
        }

        let band = self.band(probability);
        Ok(RiskAssessment {
            probability,
            band,
            label: band.label().to_string(),
            guidance: band.guidance().to_string(),
        })
    }
}
