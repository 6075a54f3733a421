use crate::error::{NnError, Result};

/// Hyper-parameters of a `Model::fit` run.
///
/// # Fields
/// - `batch_size`      — samples per mini-batch; `1` for online SGD
/// - `epochs`          — full passes over the training set
/// - `alpha`           — overrides the optimizer's weight learning rate when set
/// - `gamma`           — overrides the optimizer's bias learning rate when set
///
/// An override is written into the optimizer, so it stays in effect for later
/// `fit` calls that leave it unset and is saved with the model.
///
/// - `validation_frac` — share of the samples held out for validation, in `[0, 1)`
/// - `shuffle`         — reshuffle the training set at the start of every epoch
/// - `verbose`         — log one `info` line per epoch
#[derive(Debug, Clone, PartialEq)]
pub struct FitConfig {
    pub batch_size: usize,
    pub epochs: usize,
    pub alpha: Option<f64>,
    pub gamma: Option<f64>,
    pub validation_frac: f64,
    pub shuffle: bool,
    pub verbose: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            batch_size: 1,
            epochs: 1,
            alpha: None,
            gamma: None,
            validation_frac: 0.0,
            shuffle: false,
            verbose: true,
        }
    }
}

impl FitConfig {
    pub fn new(epochs: usize, batch_size: usize) -> Self {
        FitConfig { epochs, batch_size, ..FitConfig::default() }
    }

    pub fn with_learning_rates(mut self, alpha: f64, gamma: f64) -> Self {
        self.alpha = Some(alpha);
        self.gamma = Some(gamma);
        self
    }

    pub fn with_validation_frac(mut self, validation_frac: f64) -> Self {
        self.validation_frac = validation_frac;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(NnError::InvalidModelArgument("batch size must be at least 1".to_string()));
        }
        if !(0.0..1.0).contains(&self.validation_frac) {
            return Err(NnError::InvalidModelArgument(format!(
                "validation fraction must be in [0, 1), got {}",
                self.validation_frac
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_builders() {
        let config = FitConfig::default();
        assert_eq!((config.batch_size, config.epochs), (1, 1));
        assert!(config.verbose && !config.shuffle);

        let config = FitConfig::new(10, 4).with_learning_rates(0.1, 0.2).with_shuffle(true);
        assert_eq!(config.alpha, Some(0.1));
        assert_eq!(config.gamma, Some(0.2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(FitConfig::new(1, 0).validate().is_err());
        assert!(FitConfig::default().with_validation_frac(-0.1).validate().is_err());
        assert!(FitConfig::default().with_validation_frac(1.0).validate().is_err());
    }
}
