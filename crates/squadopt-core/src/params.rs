// Tunable optimizer constants.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("`{field}` must be a finite, non-negative number, got {value}")]
    NegativeWeight { field: &'static str, value: f64 },

    #[error("score_weight and cost_weight cannot both be zero")]
    ZeroWeights,

    #[error("improvement_threshold must be between 0.0 and 1.0 inclusive, got {0}")]
    ThresholdOutOfRange(f64),
}

/// Heuristic constants for the exact objective and the fallback's local
/// search. The defaults are starting points, not derived values.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct OptimizerParams {
    /// Weight on each player's score share (score / pool max score).
    pub score_weight: f64,
    /// Weight on each player's cost share (cost / pool max cost). Rewards
    /// spending budget that pure score maximization would leave idle.
    pub cost_weight: f64,
    /// The fallback stops swapping once total cost reaches this fraction of
    /// the budget.
    pub improvement_threshold: f64,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        OptimizerParams {
            score_weight: 0.9,
            cost_weight: 0.1,
            improvement_threshold: 0.95,
        }
    }
}

impl OptimizerParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        for (field, value) in [
            ("score_weight", self.score_weight),
            ("cost_weight", self.cost_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ParamsError::NegativeWeight { field, value });
            }
        }
        if self.score_weight == 0.0 && self.cost_weight == 0.0 {
            return Err(ParamsError::ZeroWeights);
        }
        if !(0.0..=1.0).contains(&self.improvement_threshold) {
            return Err(ParamsError::ThresholdOutOfRange(self.improvement_threshold));
        }
        Ok(())
    }
}
