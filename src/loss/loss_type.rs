use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::loss::bce::BceLoss;
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::loss::mse::MseLoss;
use crate::math::matrix::Matrix;

/// Selects which loss function the model trains against.
///
/// - `MeanSquaredError`        — pair with Identity or Sigmoid output.
/// - `BinaryCrossEntropy`      — pair with Sigmoid output, targets in [0, 1].
/// - `CategoricalCrossEntropy` — loss only; its gradient is unsupported, so a
///   model compiled with it can predict and evaluate but not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFunction {
    MeanSquaredError,
    BinaryCrossEntropy,
    CategoricalCrossEntropy,
}

impl LossFunction {
    /// Scalar loss for one sample.
    pub fn loss(&self, output: &Matrix, target: &Matrix) -> Result<f64> {
        match self {
            LossFunction::MeanSquaredError => MseLoss::loss(output, target),
            LossFunction::BinaryCrossEntropy => BceLoss::loss(output, target),
            LossFunction::CategoricalCrossEntropy => CrossEntropyLoss::loss(output, target),
        }
    }

    /// dLoss/dOutput for one sample, same shape as `output`.
    pub fn derivative(&self, output: &Matrix, target: &Matrix) -> Result<Matrix> {
        match self {
            LossFunction::MeanSquaredError => MseLoss::derivative(output, target),
            LossFunction::BinaryCrossEntropy => BceLoss::derivative(output, target),
            LossFunction::CategoricalCrossEntropy => CrossEntropyLoss::derivative(output, target),
        }
    }
}
