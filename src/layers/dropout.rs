use rand::rngs::StdRng;

use crate::error::{NnError, Result};
use crate::layers::layer::{check_input, Layer, LayerKind, Shape};
use crate::math::matrix::Matrix;
use crate::math::sampling::bernoulli_mask;
use crate::network::initializers::Initializer;
use crate::network::snapshot::LayerSnapshot;

/// Zeroes a random subset of its input while training.
///
/// Each forward pass keeps exactly `round((1 - rate) * n)` of the `n` inputs
/// and scales them by `1 / (1 - rate)`, so the expected output equals the
/// input. The same mask and scale are applied on the way back. The layer has
/// no parameters and is skipped by `Model::predict`.
#[derive(Debug, Clone)]
pub struct Dropout {
    shape: Shape,
    rate: f64,
    mask: Matrix,
    neurons: Matrix,
    gradient: Matrix,
}

impl Dropout {
    /// Shape is copied from the previous layer on `Model::compile`.
    pub fn new(rate: f64) -> Result<Dropout> {
        Dropout::build(Shape::default(), rate)
    }

    /// Dropout as the first layer of a model, applied to the raw input.
    pub fn with_shape(units: usize, rate: f64) -> Result<Dropout> {
        if units < 1 {
            return Err(NnError::InvalidModelArgument(format!(
                "invalid dropout layer shape (units = {units})"
            )));
        }
        Dropout::build(Shape::column(units), rate)
    }

    pub(crate) fn build(shape: Shape, rate: f64) -> Result<Dropout> {
        if !(0.0..1.0).contains(&rate) {
            return Err(NnError::InvalidModelArgument(format!(
                "dropout rate must be in [0, 1), got {rate}"
            )));
        }
        let mut layer = Dropout {
            shape,
            rate,
            mask: Matrix::default(),
            neurons: Matrix::default(),
            gradient: Matrix::default(),
        };
        layer.allocate();
        Ok(layer)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Mask drawn by the last forward pass (1.0 = kept).
    pub fn mask(&self) -> &Matrix {
        &self.mask
    }

    fn scale(&self) -> f64 {
        1.0 / (1.0 - self.rate)
    }

    fn allocate(&mut self) {
        let (rows, cols) = self.shape.matrix_shape();
        self.mask = Matrix::full(rows, cols, 1.0);
        self.neurons = Matrix::zeros(rows, cols);
        self.gradient = Matrix::zeros(rows, cols);
    }

    fn pass_back(&mut self, upstream: &Matrix) -> Result<()> {
        check_input(upstream, self.shape, "dropout")?;
        let scale = self.scale();
        for ((g, &u), &m) in self.gradient.data_mut().iter_mut().zip(upstream.data()).zip(self.mask.data()) {
            *g = u * m * scale;
        }
        Ok(())
    }
}

impl Layer for Dropout {
    fn kind(&self) -> LayerKind {
        LayerKind::Dropout
    }

    fn input_shape(&self) -> Shape {
        self.shape
    }

    fn output_shape(&self) -> Shape {
        self.shape
    }

    // Output shape always follows the input.
    fn connect(&mut self, previous_output: Shape) {
        self.shape = previous_output;
    }

    fn initialize(&mut self, _initializer: Initializer, _rng: &mut StdRng) -> Result<()> {
        if !self.shape.is_valid() {
            return Err(NnError::InvalidOperation(format!(
                "cannot initialize a dropout layer with shape {}",
                self.shape
            )));
        }
        self.allocate();
        Ok(())
    }

    fn feed_forward(&mut self, input: &Matrix, rng: &mut StdRng) -> Result<()> {
        check_input(input, self.shape, "dropout")?;
        self.mask = bernoulli_mask(1.0 - self.rate, input.rows(), input.cols(), rng);
        self.neurons = input.hadamard(&self.mask)?.scale(self.scale());
        Ok(())
    }

    fn back_propagate_as_output(&mut self, d_loss: &Matrix, _previous_neurons: &Matrix) -> Result<()> {
        self.pass_back(d_loss)
    }

    fn back_propagate_as_hidden(&mut self, next: &dyn Layer, _previous_neurons: &Matrix) -> Result<()> {
        let upstream = next.input_gradient()?;
        self.pass_back(&upstream)
    }

    fn input_gradient(&self) -> Result<Matrix> {
        Ok(self.gradient.clone())
    }

    // Nothing is accumulated across a batch.
    fn reset_gradients(&mut self) {}

    fn neurons(&self) -> &Matrix {
        &self.neurons
    }

    fn gradient(&self) -> &Matrix {
        &self.gradient
    }

    fn is_training_only(&self) -> bool {
        true
    }

    fn snapshot(&self) -> LayerSnapshot {
        LayerSnapshot::Dropout {
            shape: self.shape,
            rate: self.rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;

    #[test]
    fn rate_must_be_a_probability_below_one() {
        assert!(Dropout::new(0.0).is_ok());
        assert!(Dropout::new(0.99).is_ok());
        for bad in [-0.1, 1.0, 1.5, f64::NAN] {
            assert!(matches!(Dropout::new(bad), Err(NnError::InvalidModelArgument(_))));
        }
        assert!(Dropout::with_shape(0, 0.5).is_err());
    }

    #[test]
    fn keeps_an_exact_count_and_rescales() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut layer = Dropout::with_shape(10, 0.3).unwrap();
        let input = Matrix::full(10, 1, 2.0);
        for _ in 0..25 {
            layer.feed_forward(&input, &mut rng).unwrap();
            assert_eq!(layer.mask().sum(), 7.0);
            for (&n, &m) in layer.neurons().data().iter().zip(layer.mask().data()) {
                assert_abs_diff_eq!(n, m * 2.0 / 0.7, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn backward_reuses_the_forward_mask() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut layer = Dropout::with_shape(6, 0.5).unwrap();
        let input = Matrix::full(6, 1, 1.0);
        layer.feed_forward(&input, &mut rng).unwrap();
        layer.back_propagate_as_output(&Matrix::full(6, 1, 1.0), &input).unwrap();
        assert_eq!(layer.gradient(), &layer.mask().scale(2.0));
        assert_eq!(layer.input_gradient().unwrap(), layer.mask().scale(2.0));
    }

    #[test]
    fn connect_copies_the_previous_shape() {
        let mut layer = Dropout::new(0.2).unwrap();
        assert!(!layer.output_shape().is_valid());
        layer.connect(Shape::column(5));
        assert_eq!(layer.input_shape(), Shape::column(5));
        assert_eq!(layer.output_shape(), Shape::column(5));
        assert!(!layer.has_parameters());
        assert!(layer.is_training_only());
    }

    #[test]
    fn rejects_mismatched_input() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut layer = Dropout::with_shape(3, 0.5).unwrap();
        let err = layer.feed_forward(&Matrix::column(&[1.0]), &mut rng).unwrap_err();
        assert!(matches!(err, NnError::ShapeMismatch(_)));
    }
}
