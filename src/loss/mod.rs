pub mod mse;
pub mod bce;
pub mod cross_entropy;
pub mod loss_type;

pub use mse::MseLoss;
pub use bce::BceLoss;
pub use cross_entropy::CrossEntropyLoss;
pub use loss_type::LossFunction;

use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;

fn ensure_same_shape(output: &Matrix, target: &Matrix, what: &str) -> Result<()> {
    if output.shape() != target.shape() {
        return Err(NnError::ShapeMismatch(format!(
            "{what} needs equal shapes, got {:?} and {:?}",
            output.shape(),
            target.shape()
        )));
    }
    Ok(())
}
