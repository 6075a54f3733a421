pub mod optimizer;
pub mod sgd;

pub use optimizer::{Optimizer, ParameterLayout};
pub use sgd::Sgd;
