use serde::{Deserialize, Serialize};

/// How dense-layer weights are drawn on compile.
///
/// Every scheme samples uniformly from `[-range, range]`; biases start at zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initializer {
    /// Fixed `range` regardless of fan-in/fan-out.
    Uniform { range: f64 },
    /// `sqrt(6 / (fan_in + fan_out))`.
    #[default]
    Xavier,
    /// `sqrt(2 / fan_in)`.
    He,
}

impl Initializer {
    pub fn range(&self, fan_in: usize, fan_out: usize) -> f64 {
        match self {
            Initializer::Uniform { range } => range.abs(),
            Initializer::Xavier => (6.0 / (fan_in + fan_out) as f64).sqrt(),
            Initializer::He => (2.0 / fan_in as f64).sqrt(),
        }
    }
}
