use serde::{Serialize, Deserialize};
use std::f64::consts::E;

use crate::math::matrix::Matrix;

/// Activation tag stored on a layer. Both the function and its derivative are
/// resolved from the tag, so layers never hold closures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    Sigmoid,
    /// Plain `tanh(x)`, output in (-1, 1).
    Tanh,
    #[serde(rename = "relu")]
    ReLU,
    /// No activation: `f(x) = x`.
    #[default]
    Identity,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity => x,
        }
    }

    /// Derivative with respect to the pre-activation input `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            }
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Identity => 1.0,
        }
    }

    pub fn apply(&self, z: &Matrix) -> Matrix {
        z.map(|x| self.function(x))
    }

    pub fn apply_derivative(&self, z: &Matrix) -> Matrix {
        z.map(|x| self.derivative(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ALL: [ActivationFunction; 4] = [
        ActivationFunction::Sigmoid,
        ActivationFunction::Tanh,
        ActivationFunction::ReLU,
        ActivationFunction::Identity,
    ];

    #[test]
    fn known_values() {
        assert_abs_diff_eq!(ActivationFunction::Sigmoid.function(0.0), 0.5);
        assert_abs_diff_eq!(ActivationFunction::Sigmoid.derivative(0.0), 0.25);
        assert_abs_diff_eq!(ActivationFunction::Tanh.function(0.0), 0.0);
        assert_abs_diff_eq!(ActivationFunction::Tanh.derivative(0.0), 1.0);
        assert_eq!(ActivationFunction::ReLU.function(-3.0), 0.0);
        assert_eq!(ActivationFunction::ReLU.function(3.0), 3.0);
        assert_eq!(ActivationFunction::ReLU.derivative(0.0), 0.0);
        assert_eq!(ActivationFunction::Identity.derivative(-8.0), 1.0);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let h = 1e-6;
        for f in ALL {
            for x in [-2.3, -0.7, 0.4, 1.9] {
                let numeric = (f.function(x + h) - f.function(x - h)) / (2.0 * h);
                assert_abs_diff_eq!(f.derivative(x), numeric, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn apply_works_element_wise() {
        let z = Matrix::column(&[-1.0, 2.0]);
        assert_eq!(ActivationFunction::ReLU.apply(&z), Matrix::column(&[0.0, 2.0]));
        assert_eq!(ActivationFunction::ReLU.apply_derivative(&z), Matrix::column(&[0.0, 1.0]));
    }

    #[test]
    fn tags_serialize_as_snake_case() {
        let json = serde_json::to_string(&ActivationFunction::ReLU).unwrap();
        assert_eq!(json, "\"relu\"");
        let back: ActivationFunction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ActivationFunction::ReLU);
    }
}
