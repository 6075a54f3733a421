pub mod matrix;
pub mod sampling;

pub use matrix::Matrix;
