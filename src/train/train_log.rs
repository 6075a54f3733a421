use serde::{Serialize, Deserialize};

use crate::train::epoch_stats::EpochStats;
use crate::train::metrics::Metric;

/// Per-epoch history of the last `fit` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainLog {
    metrics: Vec<Metric>,
    epochs: Vec<EpochStats>,
}

impl TrainLog {
    pub fn new(metrics: Vec<Metric>) -> TrainLog {
        TrainLog { metrics, epochs: Vec::new() }
    }

    pub fn log_epoch(&mut self, stats: EpochStats) {
        self.epochs.push(stats);
    }

    /// Metrics the model was compiled with.
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn epochs(&self) -> &[EpochStats] {
        &self.epochs
    }

    pub fn last(&self) -> Option<&EpochStats> {
        self.epochs.last()
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn train_losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.train_loss).collect()
    }

    pub fn val_losses(&self) -> Vec<f64> {
        self.epochs.iter().filter_map(|e| e.val_loss).collect()
    }
}
