use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::error::Result;
use crate::layers::convolution::{Convolution2D, ConvolutionConfig};
use crate::layers::dense::Dense;
use crate::layers::dropout::Dropout;
use crate::layers::layer::{Layer, Shape};
use crate::loss::loss_type::LossFunction;
use crate::math::matrix::Matrix;
use crate::train::metrics::Metric;

/// Version written by `Model::save_json`.
pub const FORMAT_VERSION: u32 = 1;

/// Everything needed to rebuild a compiled model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub format_version: u32,
    pub layers: Vec<LayerSnapshot>,
    pub loss: LossFunction,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    pub optimizer: OptimizerSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSnapshot {
    Dense {
        input_shape: Shape,
        output_shape: Shape,
        activation: ActivationFunction,
        weights: Matrix,
        biases: Matrix,
    },
    Dropout {
        shape: Shape,
        rate: f64,
    },
    #[serde(rename = "convolution_2d")]
    Convolution2D {
        input_shape: Shape,
        config: ConvolutionConfig,
        activation: ActivationFunction,
    },
}

impl LayerSnapshot {
    pub fn into_layer(self) -> Result<Box<dyn Layer>> {
        Ok(match self {
            LayerSnapshot::Dense { input_shape, output_shape, activation, weights, biases } => {
                Box::new(Dense::from_parts(input_shape, output_shape, activation, weights, biases)?)
            }
            LayerSnapshot::Dropout { shape, rate } => Box::new(Dropout::build(shape, rate)?),
            LayerSnapshot::Convolution2D { input_shape, config, activation } => {
                Box::new(Convolution2D::build(input_shape, config, activation)?)
            }
        })
    }
}

/// Optimizer hyper-parameters and momentum state. Velocity lists hold one
/// entry per layer, `null` where the layer has no parameters or momentum is
/// off.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerSnapshot {
    Sgd {
        alpha: f64,
        beta: f64,
        momentum: f64,
        nesterov: bool,
        #[serde(default)]
        weight_velocity: Vec<Option<Matrix>>,
        #[serde(default)]
        bias_velocity: Vec<Option<Matrix>>,
    },
}
