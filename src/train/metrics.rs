use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::loss::mse::MseLoss;
use crate::math::matrix::Matrix;

/// Quality measures reported by `Model::evaluate` and the training log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Fraction of samples whose arg-max one-hot prediction equals the target.
    Accuracy,
    MeanSquaredError,
}

impl Metric {
    /// Score of a single prediction; averaged over a dataset by [`Metric::mean`].
    pub fn score(&self, output: &Matrix, target: &Matrix) -> Result<f64> {
        match self {
            Metric::Accuracy => Ok(if output.to_one_hot_argmax() == *target { 1.0 } else { 0.0 }),
            Metric::MeanSquaredError => MseLoss::loss(output, target),
        }
    }

    /// Mean score over paired outputs and targets, `0.0` when empty.
    pub fn mean(&self, outputs: &[Matrix], targets: &[Matrix]) -> Result<f64> {
        if outputs.is_empty() {
            return Ok(0.0);
        }
        let mut total = 0.0;
        for (output, target) in outputs.iter().zip(targets) {
            total += self.score(output, target)?;
        }
        Ok(total / outputs.len() as f64)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Accuracy => write!(f, "accuracy"),
            Metric::MeanSquaredError => write!(f, "mean squared error"),
        }
    }
}
