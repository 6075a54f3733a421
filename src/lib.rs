pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod loss;
pub mod network;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use error::{NnError, Result};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::{Convolution2D, ConvolutionConfig, Dense, Dropout, Layer, LayerKind, Shape};
pub use loss::loss_type::LossFunction;
pub use network::{Initializer, Model};
pub use optim::{Optimizer, Sgd};
pub use train::{EpochStats, FitConfig, Metric, TrainLog};
