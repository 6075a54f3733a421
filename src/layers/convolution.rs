use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{NnError, Result};
use crate::layers::layer::{Layer, LayerKind, Shape};
use crate::math::matrix::Matrix;
use crate::network::initializers::Initializer;
use crate::network::snapshot::LayerSnapshot;

/// Hyper-parameters of a 2-D convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvolutionConfig {
    pub filters: usize,
    pub kernel_size: (usize, usize),
    pub stride: usize,
    pub padding: usize,
    pub dilation: usize,
    pub bias: bool,
}

/// 2-D convolution layer.
///
/// Only construction, shape wiring and persistence exist. Every compute entry
/// point fails with [`NnError::Unsupported`], so a model containing this
/// layer can be built and saved but not compiled or trained.
#[derive(Debug, Clone)]
pub struct Convolution2D {
    input_shape: Shape,
    output_shape: Shape,
    config: ConvolutionConfig,
    activation: ActivationFunction,
    neurons: Matrix,
    gradient: Matrix,
}

impl Convolution2D {
    pub fn new(config: ConvolutionConfig, activation: ActivationFunction) -> Result<Convolution2D> {
        Convolution2D::build(Shape::default(), config, activation)
    }

    pub fn with_input(
        input_shape: Shape,
        config: ConvolutionConfig,
        activation: ActivationFunction,
    ) -> Result<Convolution2D> {
        Convolution2D::build(input_shape, config, activation)
    }

    pub(crate) fn build(
        input_shape: Shape,
        config: ConvolutionConfig,
        activation: ActivationFunction,
    ) -> Result<Convolution2D> {
        let (k0, k1) = config.kernel_size;
        if k0 < 1 || k1 < 1 {
            return Err(NnError::InvalidModelArgument(format!(
                "invalid convolution layer shape (kernel = {k0}, {k1})"
            )));
        }
        Ok(Convolution2D {
            input_shape,
            output_shape: Shape::new(k0, k1, 1),
            config,
            activation,
            neurons: Matrix::default(),
            gradient: Matrix::default(),
        })
    }

    pub fn config(&self) -> ConvolutionConfig {
        self.config
    }

    pub fn activation(&self) -> ActivationFunction {
        self.activation
    }
}

impl Layer for Convolution2D {
    fn kind(&self) -> LayerKind {
        LayerKind::Convolution2D
    }

    fn input_shape(&self) -> Shape {
        self.input_shape
    }

    fn output_shape(&self) -> Shape {
        self.output_shape
    }

    fn connect(&mut self, previous_output: Shape) {
        self.input_shape = previous_output;
    }

    fn initialize(&mut self, _initializer: Initializer, _rng: &mut StdRng) -> Result<()> {
        Err(NnError::Unsupported("convolution layer initialization"))
    }

    fn feed_forward(&mut self, _input: &Matrix, _rng: &mut StdRng) -> Result<()> {
        Err(NnError::Unsupported("convolution layer forward pass"))
    }

    fn back_propagate_as_output(&mut self, _d_loss: &Matrix, _previous_neurons: &Matrix) -> Result<()> {
        Err(NnError::Unsupported("convolution layer backward pass"))
    }

    fn back_propagate_as_hidden(&mut self, _next: &dyn Layer, _previous_neurons: &Matrix) -> Result<()> {
        Err(NnError::Unsupported("convolution layer backward pass"))
    }

    fn input_gradient(&self) -> Result<Matrix> {
        Err(NnError::Unsupported("convolution layer input gradient"))
    }

    fn reset_gradients(&mut self) {}

    fn neurons(&self) -> &Matrix {
        &self.neurons
    }

    fn gradient(&self) -> &Matrix {
        &self.gradient
    }

    fn snapshot(&self) -> LayerSnapshot {
        LayerSnapshot::Convolution2D {
            input_shape: self.input_shape,
            config: self.config,
            activation: self.activation,
        }
    }
}
