use crate::error::{NnError, Result};
use crate::loss::ensure_same_shape;
use crate::math::matrix::Matrix;

/// Categorical cross-entropy over one-hot (or soft) targets.
pub struct CrossEntropyLoss;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-6;

impl CrossEntropyLoss {
    /// L = -mean(target[i] · log(output[i] + ε))
    pub fn loss(output: &Matrix, target: &Matrix) -> Result<f64> {
        ensure_same_shape(output, target, "categorical cross-entropy")?;
        let n = output.data().len() as f64;
        Ok(-output.data().iter().zip(target.data())
            .map(|(o, t)| t * (o + EPS).ln())
            .sum::<f64>() / n)
    }

    /// The gradient is not implemented; training against this loss fails
    /// at the first backward pass.
    pub fn derivative(_output: &Matrix, _target: &Matrix) -> Result<Matrix> {
        Err(NnError::Unsupported("categorical cross-entropy gradient"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn loss_reads_the_target_class() {
        let o = Matrix::column(&[0.7, 0.2, 0.1]);
        let t = Matrix::column(&[1.0, 0.0, 0.0]);
        assert_abs_diff_eq!(CrossEntropyLoss::loss(&o, &t).unwrap(), -(0.7f64 + EPS).ln() / 3.0);
    }

    #[test]
    fn gradient_is_unsupported() {
        let o = Matrix::column(&[1.0]);
        assert!(matches!(CrossEntropyLoss::derivative(&o, &o), Err(NnError::Unsupported(_))));
    }
}
