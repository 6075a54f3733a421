use std::fmt;

use crate::error::{NnError, Result};
use crate::layers::layer::Layer;
use crate::network::model::Model;
use crate::network::snapshot::OptimizerSnapshot;

/// `(weights shape, biases shape)` of one parameterized layer.
pub type ParameterShapes = ((usize, usize), (usize, usize));

/// Parameter shapes of every layer of the bound model, `None` for layers
/// without parameters. Captured by `Optimizer::connect_to_model`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterLayout {
    shapes: Vec<Option<ParameterShapes>>,
}

impl ParameterLayout {
    pub fn of(layers: &[Box<dyn Layer>]) -> ParameterLayout {
        let shapes = layers
            .iter()
            .map(|layer| layer.parameters().map(|p| p.shapes()))
            .collect();
        ParameterLayout { shapes }
    }

    pub fn shapes(&self) -> &[Option<ParameterShapes>] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Fails with `InvalidOperation` if `layers` no longer has this layout.
    pub fn check(&self, layers: &[Box<dyn Layer>]) -> Result<()> {
        if ParameterLayout::of(layers) != *self {
            return Err(NnError::InvalidOperation(
                "optimizer is bound to a model with a different layout".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameter-update rule applied once per mini-batch.
///
/// Lifecycle: construct, `connect_to_model`, `initialize`, then
/// `update_parameters` after every batch. `Model::compile` runs the first
/// two steps.
pub trait Optimizer: fmt::Debug {
    /// Binds the optimizer to `model`'s current parameter layout.
    fn connect_to_model(&mut self, model: &Model);

    /// Allocates optimizer state. Fails with `InvalidOperation` when not
    /// connected.
    fn initialize(&mut self) -> Result<()>;

    /// Applies the accumulated `delta_weight` / `delta_bias` of every
    /// parameterized layer, averaged over `batch_size` samples.
    fn update_parameters(&mut self, layers: &mut [Box<dyn Layer>], batch_size: usize) -> Result<()>;

    /// Replaces the weight (`alpha`) and/or bias (`beta`) learning rate.
    fn set_learning_rates(&mut self, alpha: Option<f64>, beta: Option<f64>);

    fn snapshot(&self) -> OptimizerSnapshot;
}
