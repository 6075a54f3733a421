use rand::rngs::StdRng;

use crate::activation::activation::ActivationFunction;
use crate::error::{NnError, Result};
use crate::layers::layer::{check_input, Layer, LayerKind, Parameters, Shape};
use crate::math::matrix::Matrix;
use crate::network::initializers::Initializer;
use crate::network::snapshot::LayerSnapshot;

/// Fully connected layer: `neurons = activation(weights * input + biases)`.
#[derive(Debug, Clone)]
pub struct Dense {
    input_shape: Shape,
    output_shape: Shape,
    activation: ActivationFunction,
    params: Parameters,
    neurons: Matrix,
    pre_neurons: Matrix, // pre-activation values (z = Wx + b) needed for correct derivative
    gradient: Matrix,
}

impl Dense {
    /// Hidden or output layer; the input shape comes from `Model::compile`.
    pub fn new(units: usize, activation: ActivationFunction) -> Result<Dense> {
        if units < 1 {
            return Err(NnError::InvalidModelArgument(format!(
                "invalid dense layer shape (units = {units})"
            )));
        }
        Ok(Dense::unchecked(Shape::default(), Shape::column(units), activation))
    }

    /// First layer of a model, which must declare its input size.
    pub fn with_input(inputs: usize, units: usize, activation: ActivationFunction) -> Result<Dense> {
        if inputs < 1 || units < 1 {
            return Err(NnError::InvalidModelArgument(format!(
                "invalid dense layer shape (inputs = {inputs}, units = {units})"
            )));
        }
        Ok(Dense::unchecked(Shape::column(inputs), Shape::column(units), activation))
    }

    /// Rebuilds a trained layer. `weights` must be `units x inputs` and
    /// `biases` `units x 1`.
    pub fn from_parts(
        input_shape: Shape,
        output_shape: Shape,
        activation: ActivationFunction,
        weights: Matrix,
        biases: Matrix,
    ) -> Result<Dense> {
        if weights.shape() != (output_shape.rows, input_shape.rows)
            || biases.shape() != (output_shape.rows, 1)
        {
            return Err(NnError::ShapeMismatch(format!(
                "dense layer {input_shape} -> {output_shape} cannot take {}x{} weights and {}x{} biases",
                weights.rows(),
                weights.cols(),
                biases.rows(),
                biases.cols()
            )));
        }
        let mut layer = Dense::unchecked(input_shape, output_shape, activation);
        layer.params = Parameters::new(weights, biases);
        Ok(layer)
    }

    fn unchecked(input_shape: Shape, output_shape: Shape, activation: ActivationFunction) -> Dense {
        let (rows, cols) = output_shape.matrix_shape();
        Dense {
            input_shape,
            output_shape,
            activation,
            params: Parameters::default(),
            neurons: Matrix::zeros(rows, cols),
            pre_neurons: Matrix::zeros(rows, cols),
            gradient: Matrix::zeros(rows, cols),
        }
    }

    pub fn activation(&self) -> ActivationFunction {
        self.activation
    }

    pub fn weights(&self) -> &Matrix {
        &self.params.weights
    }

    pub fn biases(&self) -> &Matrix {
        &self.params.biases
    }

    pub fn delta_weight(&self) -> &Matrix {
        &self.params.delta_weight
    }

    pub fn delta_bias(&self) -> &Matrix {
        &self.params.delta_bias
    }

    fn is_initialized(&self) -> bool {
        self.params.weights.shape() == (self.output_shape.rows, self.input_shape.rows)
            && !self.params.weights.data().is_empty()
    }

    /// δ = upstream ⊙ σ'(z), then sums this sample's weight and bias gradients.
    ///
    /// Both are written straight into the layer's own buffers; nothing is
    /// allocated per sample.
    fn finish_backward(&mut self, upstream: &Matrix, previous_neurons: &Matrix) -> Result<()> {
        if !self.is_initialized() {
            return Err(NnError::InvalidOperation(
                "dense layer parameters are not initialized".to_string(),
            ));
        }
        if upstream.shape() != self.gradient.shape() {
            return Err(NnError::ShapeMismatch(format!(
                "dense layer expected an upstream gradient of shape {}x{}, got {}x{}",
                self.gradient.rows(),
                self.gradient.cols(),
                upstream.rows(),
                upstream.cols()
            )));
        }
        check_input(previous_neurons, self.input_shape, "dense")?;

        // Use pre-activation z so that derivative(z) = σ'(z) is computed correctly
        for ((g, &u), &z) in self
            .gradient
            .data_mut()
            .iter_mut()
            .zip(upstream.data())
            .zip(self.pre_neurons.data())
        {
            *g = u * self.activation.derivative(z);
        }

        // weights[j][i] connects input i to neuron j, so dW[j][i] += δ[j] * a[i].
        let inputs = previous_neurons.data();
        let params = &mut self.params;
        for (row, &delta) in params
            .delta_weight
            .data_mut()
            .chunks_exact_mut(inputs.len())
            .zip(self.gradient.data())
        {
            for (dw, &a) in row.iter_mut().zip(inputs) {
                *dw += delta * a;
            }
        }
        params.delta_bias.accumulate(&self.gradient)?;
        Ok(())
    }
}

impl Layer for Dense {
    fn kind(&self) -> LayerKind {
        LayerKind::Dense
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

    fn initialize(&mut self, initializer: Initializer, rng: &mut StdRng) -> Result<()> {
        if !self.input_shape.is_valid() || !self.output_shape.is_valid() {
            return Err(NnError::InvalidOperation(format!(
                "cannot initialize a dense layer with shapes {} -> {}",
                self.input_shape, self.output_shape
            )));
        }

        let fan_in = self.input_shape.rows;
        let fan_out = self.output_shape.rows;
        let range = initializer.range(fan_in, fan_out);
        self.params = Parameters::new(
            Matrix::random_uniform(fan_out, fan_in, range, rng),
            Matrix::zeros(fan_out, 1),
        );
        self.neurons = Matrix::zeros(fan_out, 1);
        self.pre_neurons = Matrix::zeros(fan_out, 1);
        self.gradient = Matrix::zeros(fan_out, 1);
        Ok(())
    }

    fn feed_forward(&mut self, input: &Matrix, _rng: &mut StdRng) -> Result<()> {
        check_input(input, self.input_shape, "dense")?;
        if !self.is_initialized() {
            return Err(NnError::InvalidOperation(
                "dense layer parameters are not initialized".to_string(),
            ));
        }

        let z = self.params.weights.matmul(input)?.add(&self.params.biases)?;
        self.neurons = self.activation.apply(&z);
        self.pre_neurons = z;
        Ok(())
    }

    fn back_propagate_as_output(&mut self, d_loss: &Matrix, previous_neurons: &Matrix) -> Result<()> {
        self.finish_backward(d_loss, previous_neurons)
    }

    fn back_propagate_as_hidden(&mut self, next: &dyn Layer, previous_neurons: &Matrix) -> Result<()> {
        let upstream = next.input_gradient()?;
        self.finish_backward(&upstream, previous_neurons)
    }

    fn input_gradient(&self) -> Result<Matrix> {
        self.params.weights.transpose().matmul(&self.gradient)
    }

    fn reset_gradients(&mut self) {
        self.gradient.fill(0.0);
        self.params.reset_deltas();
    }

    fn neurons(&self) -> &Matrix {
        &self.neurons
    }

    fn gradient(&self) -> &Matrix {
        &self.gradient
    }

    fn parameters(&self) -> Option<&Parameters> {
        Some(&self.params)
    }

    fn parameters_mut(&mut self) -> Option<&mut Parameters> {
        Some(&mut self.params)
    }

    fn snapshot(&self) -> LayerSnapshot {
        LayerSnapshot::Dense {
            input_shape: self.input_shape,
            output_shape: self.output_shape,
            activation: self.activation,
            weights: self.params.weights.clone(),
            biases: self.params.biases.clone(),
        }
    }
}
