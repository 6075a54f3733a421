use std::fmt;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;
use crate::network::initializers::Initializer;
use crate::network::snapshot::LayerSnapshot;

/// `(rows, cols, depth)` shape of a layer's input or output.
///
/// Dense and dropout layers work on column vectors, shape `(n, 1, 1)`.
/// The all-zero default means "not declared yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
    pub depth: usize,
}

impl Shape {
    pub const fn new(rows: usize, cols: usize, depth: usize) -> Shape {
        Shape { rows, cols, depth }
    }

    pub const fn column(n: usize) -> Shape {
        Shape::new(n, 1, 1)
    }

    /// True when every dimension is at least one.
    pub fn is_valid(&self) -> bool {
        self.rows >= 1 && self.cols >= 1 && self.depth >= 1
    }

    /// The `(rows, cols)` a matrix fed to this shape must have.
    pub fn matrix_shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.rows, self.cols, self.depth)
    }
}

/// Variant tag, used for validation and reporting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Dense,
    Dropout,
    Convolution2D,
}

/// Trainable parameters of a layer plus their batch-scoped gradient sums.
///
/// `delta_weight` / `delta_bias` have the shapes of `weights` / `biases`.
/// They are zeroed in place at every batch start and summed into by each
/// backward pass; the optimizer reads them once per batch.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    pub weights: Matrix,
    pub biases: Matrix,
    pub delta_weight: Matrix,
    pub delta_bias: Matrix,
}

impl Parameters {
    pub fn new(weights: Matrix, biases: Matrix) -> Parameters {
        let delta_weight = Matrix::zeros(weights.rows(), weights.cols());
        let delta_bias = Matrix::zeros(biases.rows(), biases.cols());
        Parameters { weights, biases, delta_weight, delta_bias }
    }

    pub fn reset_deltas(&mut self) {
        self.delta_weight.fill(0.0);
        self.delta_bias.fill(0.0);
    }

    /// `(weights shape, biases shape)`.
    pub fn shapes(&self) -> ((usize, usize), (usize, usize)) {
        (self.weights.shape(), self.biases.shape())
    }
}

/// What a model needs from each layer.
///
/// The model and optimizer only talk to layers through this interface: a layer
/// that follows another one is asked for the gradient with respect to its own
/// input (`input_gradient`), and parameter updates go through `parameters_mut`.
/// Neither loop needs to know the concrete variant.
pub trait Layer: fmt::Debug {
    fn kind(&self) -> LayerKind;

    fn input_shape(&self) -> Shape;

    fn output_shape(&self) -> Shape;

    /// Takes `previous_output` as this layer's input shape.
    fn connect(&mut self, previous_output: Shape);

    /// Allocates parameters and scratch buffers for the connected shapes.
    fn initialize(&mut self, initializer: Initializer, rng: &mut StdRng) -> Result<()>;

    /// Computes and stores `neurons` for `input`.
    fn feed_forward(&mut self, input: &Matrix, rng: &mut StdRng) -> Result<()>;

    /// Backward step for the last layer, starting from dLoss/dOutput.
    fn back_propagate_as_output(&mut self, d_loss: &Matrix, previous_neurons: &Matrix) -> Result<()>;

    /// Backward step for any other layer, continuing from `next`.
    fn back_propagate_as_hidden(&mut self, next: &dyn Layer, previous_neurons: &Matrix) -> Result<()>;

    /// dLoss with respect to this layer's input, valid after a backward step.
    fn input_gradient(&self) -> Result<Matrix>;

    fn reset_gradients(&mut self);

    /// Last activation computed by `feed_forward`.
    fn neurons(&self) -> &Matrix;

    fn gradient(&self) -> &Matrix;

    fn parameters(&self) -> Option<&Parameters> {
        None
    }

    fn parameters_mut(&mut self) -> Option<&mut Parameters> {
        None
    }

    fn has_parameters(&self) -> bool {
        self.parameters().is_some()
    }

    /// Training-only layers are skipped at inference time.
    fn is_training_only(&self) -> bool {
        false
    }

    fn snapshot(&self) -> LayerSnapshot;
}

/// Fails with `ShapeMismatch` unless `input` fits `expected`.
pub(crate) fn check_input(input: &Matrix, expected: Shape, layer: &str) -> Result<()> {
    if input.shape() != expected.matrix_shape() {
        return Err(NnError::ShapeMismatch(format!(
            "{layer} layer expects input {expected}, got a {}x{} matrix",
            input.rows(),
            input.cols()
        )));
    }
    Ok(())
}
