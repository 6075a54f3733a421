use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;

/// Picks exactly `k` of `n` positions in one pass.
///
/// Position `i` is selected with probability `needed / available`, which
/// forces the count to come out exact: once `needed == available` every
/// remaining position is taken, and once `needed == 0` none are.
pub fn select_exact<R: Rng>(n: usize, k: usize, rng: &mut R) -> Vec<bool> {
    let mut needed = k.min(n);
    let mut available = n;
    let mut selected = Vec::with_capacity(n);

    for _ in 0..n {
        let take = needed > 0 && rng.gen::<f64>() < needed as f64 / available as f64;
        if take {
            needed -= 1;
        }
        selected.push(take);
        available -= 1;
    }

    selected
}

/// 0/1 matrix with exactly `round(keep_frac * rows * cols)` ones.
pub fn bernoulli_mask<R: Rng>(keep_frac: f64, rows: usize, cols: usize, rng: &mut R) -> Matrix {
    let n = rows * cols;
    let k = (keep_frac.clamp(0.0, 1.0) * n as f64).round() as usize;
    let mut mask = Matrix::zeros(rows, cols);
    for (x, keep) in mask.data_mut().iter_mut().zip(select_exact(n, k, rng)) {
        if keep {
            *x = 1.0;
        }
    }
    mask
}

/// Shuffles `x` and `y` with one shared random permutation.
pub fn shuffle_in_unison<T, U, R: Rng>(x: &mut [T], y: &mut [U], rng: &mut R) -> Result<()> {
    if x.len() != y.len() {
        return Err(NnError::InvalidModelArgument(format!(
            "cannot shuffle {} features against {} labels",
            x.len(),
            y.len()
        )));
    }

    let mut order: Vec<usize> = (0..x.len()).collect();
    order.shuffle(rng);
    permute(x, &order);
    permute(y, &order);

    Ok(())
}

/// Rearranges `items` in place so that `items[i]` becomes the old
/// `items[order[i]]`, walking each cycle of the permutation once.
fn permute<T>(items: &mut [T], order: &[usize]) {
    let mut placed = vec![false; order.len()];
    for start in 0..order.len() {
        if placed[start] {
            continue;
        }
        placed[start] = true;
        let mut i = start;
        while order[i] != start {
            let j = order[i];
            items.swap(i, j);
            placed[j] = true;
            i = j;
        }
    }
}

/// Train and validation partitions of a labelled sample set.
#[derive(Debug, Clone, Default)]
pub struct Split<T> {
    pub x_train: Vec<T>,
    pub y_train: Vec<T>,
    pub x_val: Vec<T>,
    pub y_val: Vec<T>,
}

/// Splits `x`/`y` so that exactly `round(len * validation_frac)` pairs land in
/// the validation set. Relative order is preserved inside each partition and
/// the inputs are left untouched.
pub fn train_val_split<T: Clone, R: Rng>(
    x: &[T],
    y: &[T],
    validation_frac: f64,
    rng: &mut R,
) -> Result<Split<T>> {
    if x.len() != y.len() {
        return Err(NnError::InvalidModelArgument(format!(
            "x has {} samples but y has {}",
            x.len(),
            y.len()
        )));
    }
    if !(0.0..=1.0).contains(&validation_frac) {
        return Err(NnError::InvalidModelArgument(format!(
            "validation fraction must be in [0, 1], got {validation_frac}"
        )));
    }

    let n_val = (x.len() as f64 * validation_frac).round() as usize;
    let mut split = Split {
        x_train: Vec::with_capacity(x.len() - n_val),
        y_train: Vec::with_capacity(x.len() - n_val),
        x_val: Vec::with_capacity(n_val),
        y_val: Vec::with_capacity(n_val),
    };

    for ((xi, yi), to_val) in x.iter().zip(y).zip(select_exact(x.len(), n_val, rng)) {
        if to_val {
            split.x_val.push(xi.clone());
            split.y_val.push(yi.clone());
        } else {
            split.x_train.push(xi.clone());
            split.y_train.push(yi.clone());
        }
    }

    Ok(split)
}
