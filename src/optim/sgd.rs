use tracing::{debug, trace};

use crate::error::{NnError, Result};
use crate::layers::layer::Layer;
use crate::math::matrix::Matrix;
use crate::network::model::Model;
use crate::network::snapshot::OptimizerSnapshot;
use crate::optim::optimizer::{Optimizer, ParameterLayout};

/// Stochastic gradient descent with optional (Nesterov) momentum.
///
/// Layers accumulate raw per-sample gradients; the division by the batch
/// size happens once, here:
///
/// - plain:    `w -= alpha / n * dW`
/// - momentum: `v = m * v - alpha * dW`, then `w += v / n`
/// - nesterov: same `v`, then `w += (m * v - alpha * dW) / n`
///
/// Biases follow the same rules with `beta`.
#[derive(Debug, Clone)]
pub struct Sgd {
    alpha: f64,
    beta: f64,
    momentum: f64,
    nesterov: bool,
    layout: Option<ParameterLayout>,
    weight_velocity: Vec<Option<Matrix>>,
    bias_velocity: Vec<Option<Matrix>>,
    // Velocities read back from a snapshot, installed by `initialize`.
    restored: Option<(Vec<Option<Matrix>>, Vec<Option<Matrix>>)>,
}

impl Sgd {
    /// `alpha` is the weight learning rate, `beta` the bias learning rate.
    pub fn new(alpha: f64, beta: f64) -> Sgd {
        Sgd {
            alpha,
            beta,
            momentum: 0.0,
            nesterov: false,
            layout: None,
            weight_velocity: Vec::new(),
            bias_velocity: Vec::new(),
            restored: None,
        }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Sgd {
        self.momentum = momentum;
        self
    }

    /// Nesterov lookahead; only has an effect with non-zero momentum.
    pub fn with_nesterov(mut self, nesterov: bool) -> Sgd {
        self.nesterov = nesterov;
        self
    }

    pub fn from_snapshot(snapshot: OptimizerSnapshot) -> Sgd {
        let OptimizerSnapshot::Sgd {
            alpha,
            beta,
            momentum,
            nesterov,
            weight_velocity,
            bias_velocity,
        } = snapshot;
        let mut sgd = Sgd::new(alpha, beta).with_momentum(momentum).with_nesterov(nesterov);
        sgd.restored = Some((weight_velocity, bias_velocity));
        sgd
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn momentum(&self) -> f64 {
        self.momentum
    }

    pub fn nesterov(&self) -> bool {
        self.nesterov
    }

    /// Weight velocity of layer `index`, if momentum state exists for it.
    pub fn weight_velocity(&self, index: usize) -> Option<&Matrix> {
        self.weight_velocity.get(index).and_then(Option::as_ref)
    }

    pub fn bias_velocity(&self, index: usize) -> Option<&Matrix> {
        self.bias_velocity.get(index).and_then(Option::as_ref)
    }

    fn uses_momentum(&self) -> bool {
        self.momentum != 0.0
    }

    fn step(
        &self,
        param: &mut Matrix,
        delta: &Matrix,
        velocity: Option<&mut Matrix>,
        rate: f64,
        batch_size: f64,
    ) -> Result<()> {
        let change = match velocity {
            None => delta.scale(-rate),
            Some(v) => {
                *v = v.scale(self.momentum).sub(&delta.scale(rate))?;
                if self.nesterov {
                    v.scale(self.momentum).sub(&delta.scale(rate))?
                } else {
                    v.clone()
                }
            }
        };
        param.accumulate(&change.scale(1.0 / batch_size))
    }
}

fn restore_matching(
    saved: Vec<Option<Matrix>>,
    fresh: &[Option<Matrix>],
) -> Option<Vec<Option<Matrix>>> {
    if saved.len() != fresh.len() {
        return None;
    }
    let same = saved.iter().zip(fresh).all(|(s, f)| match (s, f) {
        (Some(s), Some(f)) => s.shape() == f.shape(),
        (None, None) => true,
        _ => false,
    });
    same.then_some(saved)
}

impl Optimizer for Sgd {
    fn connect_to_model(&mut self, model: &Model) {
        self.layout = Some(ParameterLayout::of(model.layers()));
    }

    fn initialize(&mut self) -> Result<()> {
        let layout = self.layout.as_ref().ok_or_else(|| {
            NnError::InvalidOperation("optimizer must be connected to a model before initializing".to_string())
        })?;

        if !self.uses_momentum() {
            self.weight_velocity.clear();
            self.bias_velocity.clear();
            self.restored = None;
            return Ok(());
        }

        let (weights, biases): (Vec<_>, Vec<_>) = layout
            .shapes()
            .iter()
            .map(|shapes| match shapes {
                Some(((wr, wc), (br, bc))) => (Some(Matrix::zeros(*wr, *wc)), Some(Matrix::zeros(*br, *bc))),
                None => (None, None),
            })
            .unzip();

        match self.restored.take() {
            Some((saved_w, saved_b)) => {
                self.weight_velocity = restore_matching(saved_w, &weights).unwrap_or(weights);
                self.bias_velocity = restore_matching(saved_b, &biases).unwrap_or(biases);
            }
            None => {
                self.weight_velocity = weights;
                self.bias_velocity = biases;
            }
        }

        debug!(
            momentum = self.momentum,
            nesterov = self.nesterov,
            layers = layout.len(),
            "allocated sgd velocity buffers"
        );
        Ok(())
    }

    fn update_parameters(&mut self, layers: &mut [Box<dyn Layer>], batch_size: usize) -> Result<()> {
        let layout = self.layout.as_ref().ok_or_else(|| {
            NnError::InvalidOperation("optimizer is not connected to a model".to_string())
        })?;
        layout.check(layers)?;
        if batch_size == 0 {
            return Err(NnError::InvalidModelArgument("batch size must be at least 1".to_string()));
        }
        if self.uses_momentum() && self.weight_velocity.len() != layers.len() {
            return Err(NnError::InvalidOperation("optimizer has not been initialized".to_string()));
        }

        let n = batch_size as f64;
        let (alpha, beta) = (self.alpha, self.beta);
        let mut weight_velocity = std::mem::take(&mut self.weight_velocity);
        let mut bias_velocity = std::mem::take(&mut self.bias_velocity);

        let mut outcome = Ok(());
        for (i, layer) in layers.iter_mut().enumerate() {
            let Some(params) = layer.parameters_mut() else {
                continue;
            };
            let wv = weight_velocity.get_mut(i).and_then(Option::as_mut);
            let bv = bias_velocity.get_mut(i).and_then(Option::as_mut);
            outcome = self
                .step(&mut params.weights, &params.delta_weight, wv, alpha, n)
                .and_then(|_| self.step(&mut params.biases, &params.delta_bias, bv, beta, n));
            if outcome.is_err() {
                break;
            }
        }

        self.weight_velocity = weight_velocity;
        self.bias_velocity = bias_velocity;
        trace!(batch_size, "applied sgd update");
        outcome
    }

    fn set_learning_rates(&mut self, alpha: Option<f64>, beta: Option<f64>) {
        if let Some(alpha) = alpha {
            self.alpha = alpha;
        }
        if let Some(beta) = beta {
            self.beta = beta;
        }
    }

    fn snapshot(&self) -> OptimizerSnapshot {
        OptimizerSnapshot::Sgd {
            alpha: self.alpha,
            beta: self.beta,
            momentum: self.momentum,
            nesterov: self.nesterov,
            weight_velocity: self.weight_velocity.clone(),
            bias_velocity: self.bias_velocity.clone(),
        }
    }
}
