use std::fmt;
use std::ops::{Mul, Neg};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};

/// Dense row-major matrix of `f64`.
///
/// The shape is fixed at construction; only the contents can change.
/// `data.len() == rows * cols` holds for every value of this type,
/// including deserialized ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct RawMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl TryFrom<RawMatrix> for Matrix {
    type Error = NnError;

    fn try_from(raw: RawMatrix) -> Result<Self> {
        Matrix::new(raw.rows, raw.cols, raw.data)
    }
}

impl Matrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Matrix> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(NnError::ShapeMismatch(format!(
                "{} elements cannot fill a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Matrix { rows, cols, data })
    }

    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix::full(rows, cols, 0.0)
    }

    pub fn full(rows: usize, cols: usize, value: f64) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Column vector (`n x 1`) holding `values`.
    pub fn column(values: &[f64]) -> Matrix {
        Matrix {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    /// Builds a matrix from nested rows. Ragged input is rejected.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Matrix> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(NnError::ShapeMismatch(format!(
                    "row {i} has {} columns, expected {n_cols}",
                    row.len()
                )));
            }
            data.extend(row);
        }
        Matrix::new(n_rows, n_cols, data)
    }

    /// Samples every element uniformly from `[-range, range]`.
    pub fn random_uniform<R: Rng>(rows: usize, cols: usize, range: f64, rng: &mut R) -> Matrix {
        let data = (0..rows * cols)
            .map(|_| if range > 0.0 { rng.gen_range(-range..=range) } else { 0.0 })
            .collect();
        Matrix { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Flat row-major view of the elements.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.check_index(row, col)?;
        Ok(self.at(row, col))
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.check_index(row, col)?;
        self.data[row * self.cols + col] = value;
        Ok(())
    }

    fn check_index(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.rows || col >= self.cols {
            return Err(NnError::IndexOutOfRange {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }

    #[inline]
    fn at(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);

        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[j * self.rows + i] = self.at(i, j);
            }
        }

        res
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        self.map(|x| x * factor)
    }

    pub fn add(&self, rhs: &Matrix) -> Result<Matrix> {
        self.zip_with(rhs, "add", |a, b| a + b)
    }

    pub fn sub(&self, rhs: &Matrix) -> Result<Matrix> {
        self.zip_with(rhs, "subtract", |a, b| a - b)
    }

    /// Element-wise (Hadamard) product.
    pub fn hadamard(&self, rhs: &Matrix) -> Result<Matrix> {
        self.zip_with(rhs, "multiply element-wise", |a, b| a * b)
    }

    /// In-place `self += rhs`, without reallocating.
    pub fn accumulate(&mut self, rhs: &Matrix) -> Result<()> {
        self.ensure_same_shape(rhs, "accumulate")?;
        for (a, b) in self.data.iter_mut().zip(&rhs.data) {
            *a += b;
        }
        Ok(())
    }

    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    fn zip_with<F>(&self, rhs: &Matrix, op: &str, f: F) -> Result<Matrix>
    where
        F: Fn(f64, f64) -> f64,
    {
        self.ensure_same_shape(rhs, op)?;
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&rhs.data).map(|(&a, &b)| f(a, b)).collect(),
        })
    }

    fn ensure_same_shape(&self, rhs: &Matrix, op: &str) -> Result<()> {
        if self.shape() != rhs.shape() {
            return Err(NnError::ShapeMismatch(format!(
                "cannot {op} a {}x{} matrix and a {}x{} matrix",
                self.rows, self.cols, rhs.rows, rhs.cols
            )));
        }
        Ok(())
    }

    /// Standard matrix product `self * rhs`.
    pub fn matmul(&self, rhs: &Matrix) -> Result<Matrix> {
        if self.cols != rhs.rows {
            return Err(NnError::ShapeMismatch(format!(
                "cannot multiply a {}x{} matrix by a {}x{} matrix",
                self.rows, self.cols, rhs.rows, rhs.cols
            )));
        }

        let mut res = Matrix::zeros(self.rows, rhs.cols);

        for i in 0..res.rows {
            for j in 0..res.cols {
                let mut sum = 0.0;

                for k in 0..self.cols {
                    sum += self.at(i, k) * rhs.at(k, j);
                }

                res.data[i * res.cols + j] = sum;
            }
        }

        Ok(res)
    }

    /// Product of a row vector and a column vector: `res[i][j] = row[0][i] * col[j][0]`.
    ///
    /// Row `i` of the result is `row[0][i]` times `col` transposed.
    pub fn kronecker_vector_mult(row: &Matrix, col: &Matrix) -> Result<Matrix> {
        if row.rows != 1 || col.cols != 1 {
            return Err(NnError::ShapeMismatch(format!(
                "kronecker product needs a row vector and a column vector, got {}x{} and {}x{}",
                row.rows, row.cols, col.rows, col.cols
            )));
        }

        let mut res = Matrix::zeros(row.cols, col.rows);
        for i in 0..row.cols {
            for j in 0..col.rows {
                res.data[i * res.cols + j] = row.data[i] * col.data[j];
            }
        }

        Ok(res)
    }

    pub fn horizontal_concat(a: &Matrix, b: &Matrix) -> Result<Matrix> {
        if a.rows != b.rows {
            return Err(NnError::ShapeMismatch(format!(
                "cannot concatenate matrices with {} and {} rows",
                a.rows, b.rows
            )));
        }

        let mut data = Vec::with_capacity(a.data.len() + b.data.len());
        for i in 0..a.rows {
            data.extend_from_slice(&a.data[i * a.cols..(i + 1) * a.cols]);
            data.extend_from_slice(&b.data[i * b.cols..(i + 1) * b.cols]);
        }

        Ok(Matrix {
            rows: a.rows,
            cols: a.cols + b.cols,
            data,
        })
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Flat index of the largest element; the first one wins ties.
    pub fn argmax(&self) -> Option<usize> {
        self.data
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &x)| match best {
                Some((_, b)) if b >= x => best,
                _ => Some((i, x)),
            })
            .map(|(i, _)| i)
    }

    /// Same shape, 1.0 at the argmax and 0.0 elsewhere.
    pub fn to_one_hot_argmax(&self) -> Matrix {
        let mut res = Matrix::zeros(self.rows, self.cols);
        if let Some(i) = self.argmax() {
            res.data[i] = 1.0;
        }
        res
    }

    /// Shape equality plus element-wise `|a - b| <= tolerance`.
    pub fn approx_eq(&self, other: &Matrix, tolerance: f64) -> bool {
        self.shape() == other.shape()
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

impl Neg for &Matrix {
    type Output = Matrix;

    fn neg(self) -> Matrix {
        self.scale(-1.0)
    }
}

impl Neg for Matrix {
    type Output = Matrix;

    fn neg(self) -> Matrix {
        -&self
    }
}

impl Mul<f64> for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: f64) -> Matrix {
        self.scale(rhs)
    }
}

impl Mul<&Matrix> for f64 {
    type Output = Matrix;

    fn mul(self, rhs: &Matrix) -> Matrix {
        rhs.scale(self)
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for i in 0..self.rows {
            if i > 0 {
                write!(f, ",\n ")?;
            }
            write!(f, "[")?;
            for j in 0..self.cols {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", self.at(i, j))?;
            }
            write!(f, "]")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn m(rows: usize, cols: usize, data: &[f64]) -> Matrix {
        Matrix::new(rows, cols, data.to_vec()).unwrap()
    }

    #[test]
    fn new_rejects_wrong_element_count() {
        let err = Matrix::new(2, 2, vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, NnError::ShapeMismatch(_)));
    }

    #[test]
    fn get_and_set_are_bounds_checked() {
        let mut a = Matrix::zeros(2, 3);
        a.set(1, 2, 5.0).unwrap();
        assert_eq!(a.get(1, 2).unwrap(), 5.0);
        assert_eq!(a.data()[5], 5.0);
        assert!(matches!(a.get(2, 0), Err(NnError::IndexOutOfRange { .. })));
        assert!(matches!(a.set(0, 3, 1.0), Err(NnError::IndexOutOfRange { .. })));
    }

    #[test]
    fn transpose_swaps_shape_and_is_an_involution() {
        let a = m(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let t = a.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.get(2, 1).unwrap(), 6.0);
        assert_eq!(t.get(0, 1).unwrap(), 4.0);
        assert_eq!(t.transpose(), a);

        let mut rng = StdRng::seed_from_u64(3);
        for (rows, cols) in [(1, 1), (1, 7), (5, 1), (4, 6)] {
            let r = Matrix::random_uniform(rows, cols, 10.0, &mut rng);
            assert_eq!(r.transpose().transpose(), r);
        }
    }

    #[test]
    fn matmul_follows_the_shape_law() {
        let a = m(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = m(3, 2, &[7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        let c = a.matmul(&b).unwrap();
        assert_eq!(c, m(2, 2, &[58.0, 64.0, 139.0, 154.0]));

        for (r1, c1, r2, c2) in [(2, 3, 2, 3), (1, 4, 3, 1), (3, 1, 3, 1)] {
            let err = Matrix::zeros(r1, c1).matmul(&Matrix::zeros(r2, c2)).unwrap_err();
            assert!(matches!(err, NnError::ShapeMismatch(_)));
        }
        for (r1, inner, c2) in [(1, 1, 1), (4, 2, 5), (3, 3, 1)] {
            let p = Matrix::zeros(r1, inner).matmul(&Matrix::zeros(inner, c2)).unwrap();
            assert_eq!(p.shape(), (r1, c2));
        }
    }

    #[test]
    fn elementwise_ops_require_equal_shapes() {
        let a = m(1, 2, &[1.0, 2.0]);
        let b = m(1, 2, &[3.0, 5.0]);
        assert_eq!(a.add(&b).unwrap(), m(1, 2, &[4.0, 7.0]));
        assert_eq!(b.sub(&a).unwrap(), m(1, 2, &[2.0, 3.0]));
        assert_eq!(a.hadamard(&b).unwrap(), m(1, 2, &[3.0, 10.0]));
        assert_eq!(&a * 2.0, m(1, 2, &[2.0, 4.0]));
        assert_eq!(-a.clone(), m(1, 2, &[-1.0, -2.0]));

        let col = Matrix::zeros(2, 1);
        assert!(matches!(a.add(&col), Err(NnError::ShapeMismatch(_))));
        assert!(matches!(a.sub(&col), Err(NnError::ShapeMismatch(_))));
        assert!(matches!(a.hadamard(&col), Err(NnError::ShapeMismatch(_))));
    }

    #[test]
    fn accumulate_adds_in_place() {
        let mut acc = Matrix::zeros(2, 1);
        acc.accumulate(&Matrix::column(&[1.0, 2.0])).unwrap();
        acc.accumulate(&Matrix::column(&[0.5, 0.5])).unwrap();
        assert_eq!(acc, Matrix::column(&[1.5, 2.5]));
        acc.fill(0.0);
        assert_eq!(acc, Matrix::zeros(2, 1));
        assert!(acc.accumulate(&Matrix::zeros(1, 2)).is_err());
    }

    #[test]
    fn kronecker_vector_mult_builds_the_outer_product() {
        let row = m(1, 3, &[1.0, 2.0, 3.0]);
        let col = Matrix::column(&[10.0, 20.0]);
        let k = Matrix::kronecker_vector_mult(&row, &col).unwrap();
        assert_eq!(k.shape(), (3, 2));
        assert_eq!(k, m(3, 2, &[10.0, 20.0, 20.0, 40.0, 30.0, 60.0]));

        assert!(Matrix::kronecker_vector_mult(&col, &col).is_err());
        assert!(Matrix::kronecker_vector_mult(&row, &row).is_err());
    }

    #[test]
    fn horizontal_concat_joins_columns() {
        let a = m(2, 1, &[1.0, 2.0]);
        let b = m(2, 2, &[3.0, 4.0, 5.0, 6.0]);
        let c = Matrix::horizontal_concat(&a, &b).unwrap();
        assert_eq!(c, m(2, 3, &[1.0, 3.0, 4.0, 2.0, 5.0, 6.0]));
        assert!(Matrix::horizontal_concat(&a, &Matrix::zeros(3, 1)).is_err());
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(a, m(2, 2, &[1.0, 2.0, 3.0, 4.0]));
        assert!(Matrix::from_rows(vec![vec![1.0], vec![2.0, 3.0]]).is_err());
    }

    #[test]
    fn random_uniform_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let r = Matrix::random_uniform(20, 20, 0.3, &mut rng);
        assert!(r.data().iter().all(|x| (-0.3..=0.3).contains(x)));
    }

    #[test]
    fn argmax_one_hot_picks_first_maximum() {
        let a = Matrix::column(&[0.1, 0.7, 0.7, 0.2]);
        assert_eq!(a.argmax(), Some(1));
        assert_eq!(a.to_one_hot_argmax(), Matrix::column(&[0.0, 1.0, 0.0, 0.0]));
        assert_eq!(Matrix::default().argmax(), None);
    }

    #[test]
    fn equality_is_exact_and_approx_eq_takes_a_tolerance() {
        let a = Matrix::column(&[1.0, 2.0]);
        let b = Matrix::column(&[1.0, 2.0 + 1e-9]);
        assert_ne!(a, b);
        assert!(a.approx_eq(&b, 1e-6));
        assert!(!a.approx_eq(&a.transpose(), 1e-6));
    }

    #[test]
    fn deserialization_checks_element_count() {
        let good: Matrix = serde_json::from_str(r#"{"rows":1,"cols":2,"data":[1.0,2.0]}"#).unwrap();
        assert_eq!(good, m(1, 2, &[1.0, 2.0]));
        let bad = serde_json::from_str::<Matrix>(r#"{"rows":2,"cols":2,"data":[1.0]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn overflowing_shapes_are_rejected() {
        assert!(matches!(
            Matrix::new(usize::MAX, 2, Vec::new()),
            Err(NnError::ShapeMismatch(_))
        ));
        let huge = serde_json::from_str::<Matrix>(r#"{"rows":9223372036854775808,"cols":2,"data":[]}"#);
        assert!(huge.is_err());
    }
}
