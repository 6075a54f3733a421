use crate::error::Result;
use crate::loss::ensure_same_shape;
use crate::math::matrix::Matrix;

pub struct MseLoss;

impl MseLoss {
    /// Scalar MSE: mean((output - target)²)
    pub fn loss(output: &Matrix, target: &Matrix) -> Result<f64> {
        ensure_same_shape(output, target, "mean squared error")?;
        let n = output.data().len() as f64;
        Ok(output.data().iter().zip(target.data())
            .map(|(o, t)| (o - t).powi(2))
            .sum::<f64>() / n)
    }

    /// Gradient w.r.t. the output: 2·(output - target) / n
    pub fn derivative(output: &Matrix, target: &Matrix) -> Result<Matrix> {
        let n = output.data().len() as f64;
        Ok(output.sub(target)?.scale(2.0 / n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NnError;
    use approx::assert_abs_diff_eq;

    #[test]
    fn loss_and_gradient() {
        let o = Matrix::column(&[1.0, 2.0]);
        let t = Matrix::column(&[0.0, 4.0]);
        assert_abs_diff_eq!(MseLoss::loss(&o, &t).unwrap(), 2.5);
        assert_eq!(MseLoss::derivative(&o, &t).unwrap(), Matrix::column(&[1.0, -2.0]));
    }

    #[test]
    fn mismatched_shapes_fail() {
        let o = Matrix::column(&[1.0, 2.0]);
        let t = Matrix::column(&[1.0, 2.0, 3.0]);
        assert!(matches!(MseLoss::loss(&o, &t), Err(NnError::ShapeMismatch(_))));
        assert!(matches!(MseLoss::derivative(&o, &t), Err(NnError::ShapeMismatch(_))));
    }
}
