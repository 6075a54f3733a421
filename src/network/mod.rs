pub mod initializers;
pub mod model;
pub mod snapshot;

pub use initializers::Initializer;
pub use model::Model;
pub use snapshot::{LayerSnapshot, ModelSnapshot, OptimizerSnapshot};
