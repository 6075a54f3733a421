use std::time::Instant;

use tracing::{info, trace};

use crate::error::{NnError, Result};
use crate::loss::loss_type::LossFunction;
use crate::math::matrix::Matrix;
use crate::math::sampling::{shuffle_in_unison, train_val_split, Split};
use crate::network::model::Model;
use crate::train::epoch_stats::EpochStats;
use crate::train::metrics::Metric;
use crate::train::train_config::FitConfig;
use crate::train::train_log::TrainLog;

impl Model {
    /// Trains on `x`/`y` with mini-batch gradient descent.
    ///
    /// With `config.validation_frac > 0` exactly `round(len * frac)` samples
    /// are held out and scored after every epoch. The caller's slices are never
    /// modified. Returns the per-epoch log, also kept on the model.
    ///
    /// Learning-rate overrides in `config` replace the optimizer's own rates
    /// for good, not just for this call.
    ///
    /// # Errors
    /// - `InvalidOperation` if the model has not been compiled
    /// - `InvalidModelArgument` for mismatched lengths or bad `config` values
    /// - `ArgumentNull` if `x` is empty
    /// - `Unsupported` if the loss has no gradient
    pub fn fit(&mut self, x: &[Matrix], y: &[Matrix], config: &FitConfig) -> Result<&TrainLog> {
        self.ensure_compiled()?;
        config.validate()?;
        check_samples(x, y, "x")?;

        if config.validation_frac > 0.0 {
            let Split { x_train, y_train, x_val, y_val } =
                train_val_split(x, y, config.validation_frac, &mut self.rng)?;
            self.train(x_train, y_train, Some((x_val.as_slice(), y_val.as_slice())), config)?;
        } else {
            self.train(x.to_vec(), y.to_vec(), None, config)?;
        }
        Ok(&self.log)
    }

    /// Same as [`Model::fit`] but scores a caller-provided validation set;
    /// `config.validation_frac` is ignored.
    pub fn fit_with_validation(
        &mut self,
        x: &[Matrix],
        y: &[Matrix],
        val_x: &[Matrix],
        val_y: &[Matrix],
        config: &FitConfig,
    ) -> Result<&TrainLog> {
        self.ensure_compiled()?;
        let config = FitConfig { validation_frac: 0.0, ..config.clone() };
        config.validate()?;
        check_samples(x, y, "x")?;
        check_samples(val_x, val_y, "val_x")?;

        self.train(x.to_vec(), y.to_vec(), Some((val_x, val_y)), &config)?;
        Ok(&self.log)
    }

    fn train(
        &mut self,
        mut train_x: Vec<Matrix>,
        mut train_y: Vec<Matrix>,
        validation: Option<(&[Matrix], &[Matrix])>,
        config: &FitConfig,
    ) -> Result<()> {
        if train_x.is_empty() {
            return Err(NnError::InvalidModelArgument(
                "the validation split left no training samples".to_string(),
            ));
        }
        let loss = self.ensure_compiled()?;
        if let Some(optimizer) = self.optimizer.as_mut() {
            optimizer.set_learning_rates(config.alpha, config.gamma);
        }

        let track_accuracy = self.metrics.contains(&Metric::Accuracy);
        self.log = TrainLog::new(self.metrics.clone());

        for epoch in 1..=config.epochs {
            let started = Instant::now();

            if config.shuffle {
                shuffle_in_unison(&mut train_x, &mut train_y, &mut self.rng)?;
            }

            for (batch, (xs, ys)) in train_x
                .chunks(config.batch_size)
                .zip(train_y.chunks(config.batch_size))
                .enumerate()
            {
                self.train_batch(xs, ys, loss)?;
                trace!(epoch, batch, size = xs.len(), "batch done");
            }

            // ── Epoch statistics, in inference mode ───────────────────────
            let (train_loss, train_accuracy) = self.score(&train_x, &train_y, loss, track_accuracy)?;
            let (val_loss, val_accuracy) = match validation {
                Some((vx, vy)) if !vx.is_empty() => {
                    let (l, a) = self.score(vx, vy, loss, track_accuracy)?;
                    (Some(l), a)
                }
                _ => (None, None),
            };

            let stats = EpochStats {
                epoch,
                total_epochs: config.epochs,
                train_loss,
                val_loss,
                train_accuracy,
                val_accuracy,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
            if config.verbose {
                info!(
                    epoch,
                    total = config.epochs,
                    train_loss,
                    val_loss = ?stats.val_loss,
                    train_accuracy = ?stats.train_accuracy,
                    val_accuracy = ?stats.val_accuracy,
                    elapsed_ms = stats.elapsed_ms,
                    "epoch finished"
                );
            }
            self.log.log_epoch(stats);
        }

        Ok(())
    }

    /// Resets the deltas, accumulates every sample's gradients, then applies a
    /// single optimizer step scaled by the batch's actual size.
    fn train_batch(&mut self, xs: &[Matrix], ys: &[Matrix], loss: LossFunction) -> Result<()> {
        self.reset_gradients();
        for (x, y) in xs.iter().zip(ys) {
            let output = self.forward_pass(x)?;
            let d_loss = loss.derivative(output, y)?;
            self.backward_pass(&d_loss, x)?;
        }
        let optimizer = self
            .optimizer
            .as_mut()
            .ok_or_else(|| NnError::InvalidOperation("the model has not been compiled".to_string()))?;
        optimizer.update_parameters(&mut self.layers, xs.len())
    }

    /// Mean loss (and accuracy when tracked) over a dataset via `predict`.
    fn score(
        &mut self,
        xs: &[Matrix],
        ys: &[Matrix],
        loss: LossFunction,
        track_accuracy: bool,
    ) -> Result<(f64, Option<f64>)> {
        let mut total = 0.0;
        let mut correct = 0.0;
        for (x, y) in xs.iter().zip(ys) {
            let output = self.predict(x)?;
            total += loss.loss(&output, y)?;
            if track_accuracy {
                correct += Metric::Accuracy.score(&output, y)?;
            }
        }
        let n = xs.len() as f64;
        Ok((total / n, track_accuracy.then(|| correct / n)))
    }
}

fn check_samples(x: &[Matrix], y: &[Matrix], name: &'static str) -> Result<()> {
    if x.len() != y.len() {
        return Err(NnError::InvalidModelArgument(format!(
            "{name} has {} samples but its labels have {}",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(NnError::ArgumentNull(name));
    }
    Ok(())
}
