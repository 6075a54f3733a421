pub mod layer;
pub mod dense;
pub mod dropout;
pub mod convolution;

pub use layer::{Layer, LayerKind, Parameters, Shape};
pub use dense::Dense;
pub use dropout::Dropout;
pub use convolution::{Convolution2D, ConvolutionConfig};
