use crate::error::Result;
use crate::loss::ensure_same_shape;
use crate::math::matrix::Matrix;

pub struct BceLoss;

/// Added inside every log() and to the gradient denominator.
const EPS: f64 = 1e-6;

impl BceLoss {
    /// Scalar BCE: -mean(t·log(o+ε) + (1-t)·log(1-o+ε))
    ///
    /// Targets are expected in [0, 1].
    pub fn loss(output: &Matrix, target: &Matrix) -> Result<f64> {
        ensure_same_shape(output, target, "binary cross-entropy")?;
        let n = output.data().len() as f64;
        Ok(output.data().iter().zip(target.data())
            .map(|(o, t)| -(t * (o + EPS).ln() + (1.0 - t) * (1.0 - o + EPS).ln()))
            .sum::<f64>() / n)
    }

    /// Per-output gradient: (o - t) / (o·(1 - o) + ε), divided by n to match
    /// the mean in `loss`.
    pub fn derivative(output: &Matrix, target: &Matrix) -> Result<Matrix> {
        ensure_same_shape(output, target, "binary cross-entropy derivative")?;
        let n = output.data().len() as f64;
        let data = output.data().iter().zip(target.data())
            .map(|(o, t)| (o - t) / (o * (1.0 - o) + EPS) / n)
            .collect();
        Matrix::new(output.rows(), output.cols(), data)
    }
}
