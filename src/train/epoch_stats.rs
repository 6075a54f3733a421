use serde::{Serialize, Deserialize};

/// Statistics recorded at the end of every epoch of `Model::fit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    pub total_epochs: usize,
    /// Mean loss over the training set, measured in inference mode.
    pub train_loss: f64,
    /// Mean validation loss, if a validation set was used.
    pub val_loss: Option<f64>,
    /// Only set when the model was compiled with `Metric::Accuracy`.
    pub train_accuracy: Option<f64>,
    pub val_accuracy: Option<f64>,
    /// Wall-clock duration of this epoch in milliseconds.
    pub elapsed_ms: u64,
}
