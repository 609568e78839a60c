use crate::element::Element;
use crate::error::LaneGradError;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Dense row-major storage for the value and gradient buffers of a node.
///
/// A scalar node holds a 1x1 matrix. Shapes are always two-dimensional.
#[derive(Clone, PartialEq)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Element> Matrix<T> {
    /// A 0x0 matrix, the placeholder value of a node that has not been evaluated.
    pub fn empty() -> Self {
        Matrix {
            rows: 0,
            cols: 0,
            data: Vec::new(),
        }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, T::zero())
    }

    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    pub fn scalar(value: T) -> Self {
        Matrix {
            rows: 1,
            cols: 1,
            data: vec![value],
        }
    }

    /// Builds a matrix from row-major data.
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self, LaneGradError> {
        if data.len() != rows * cols {
            return Err(LaneGradError::TensorCreationError {
                data_len: data.len(),
                shape: vec![rows, cols],
            });
        }
        Ok(Matrix { rows, cols, data })
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Matrix { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_scalar(&self) -> bool {
        self.rows == 1 && self.cols == 1
    }

    pub fn same_shape(&self, other: &Matrix<T>) -> bool {
        self.rows == other.rows && self.cols == other.cols
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    /// The single element of a 1x1 matrix.
    pub fn to_scalar(&self) -> Result<T, LaneGradError> {
        if !self.is_scalar() {
            return Err(LaneGradError::ShapeMismatch {
                expected: vec![1, 1],
                actual: self.shape().to_vec(),
                operation: "to_scalar".to_string(),
            });
        }
        Ok(self.data[0])
    }

    pub fn fill(&mut self, value: T) {
        for v in self.data.iter_mut() {
            *v = value;
        }
    }

    pub fn set_zero(&mut self) {
        self.fill(T::zero());
    }

    pub fn map(&self, f: impl Fn(T) -> T) -> Matrix<T> {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|v| f(*v)).collect(),
        }
    }

    /// Elementwise combination of two same-shaped matrices.
    pub fn zip_map(
        &self,
        other: &Matrix<T>,
        operation: &str,
        f: impl Fn(T, T) -> T,
    ) -> Result<Matrix<T>, LaneGradError> {
        self.check_same_shape(other, operation)?;
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(a, b)| f(*a, *b))
                .collect(),
        })
    }

    /// `self += other`, elementwise.
    pub fn add_assign(&mut self, other: &Matrix<T>) -> Result<(), LaneGradError> {
        self.check_same_shape(other, "add_assign")?;
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += *b;
        }
        Ok(())
    }

    /// Adds `value` to every element.
    pub fn add_scalar_assign(&mut self, value: T) {
        for a in self.data.iter_mut() {
            *a += value;
        }
    }

    pub fn sum(&self) -> T {
        self.data.iter().fold(T::zero(), |acc, v| acc + *v)
    }

    /// Elementwise (per lane) maximum over all cells, `None` when empty.
    pub fn max_coeff(&self) -> Option<T> {
        let mut it = self.data.iter();
        let first = *it.next()?;
        Some(it.fold(first, |acc, v| acc.max_elem(*v)))
    }

    pub fn transpose(&self) -> Matrix<T> {
        Matrix::from_fn(self.cols, self.rows, |r, c| self[(c, r)])
    }

    /// Dense matrix product `self * rhs`.
    pub fn matmul(&self, rhs: &Matrix<T>) -> Result<Matrix<T>, LaneGradError> {
        if self.cols != rhs.rows {
            return Err(LaneGradError::ShapeMismatch {
                expected: vec![self.cols, rhs.cols],
                actual: rhs.shape().to_vec(),
                operation: "matmul".to_string(),
            });
        }
        let mut out = Matrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                let rhs_row = &rhs.data[k * rhs.cols..(k + 1) * rhs.cols];
                let out_row = &mut out.data[i * rhs.cols..(i + 1) * rhs.cols];
                for (o, b) in out_row.iter_mut().zip(rhs_row.iter()) {
                    *o += a * *b;
                }
            }
        }
        Ok(out)
    }

    /// Copies out the `height x width` block whose top-left cell is `(row, col)`.
    pub fn block(
        &self,
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    ) -> Result<Matrix<T>, LaneGradError> {
        self.check_block(row, col, height, width)?;
        Ok(Matrix::from_fn(height, width, |r, c| self[(row + r, col + c)]))
    }

    /// Adds `other` into the block whose top-left cell is `(row, col)`.
    pub fn add_to_block(&mut self, row: usize, col: usize, other: &Matrix<T>) -> Result<(), LaneGradError> {
        self.check_block(row, col, other.rows, other.cols)?;
        for r in 0..other.rows {
            for c in 0..other.cols {
                self[(row + r, col + c)] += other[(r, c)];
            }
        }
        Ok(())
    }

    /// Row index of the largest element in `col`, judged on one lane.
    ///
    /// This is the per-example decision routine: lane types need one answer per
    /// lane, so the lane is explicit. The first maximum wins.
    pub fn max_index_of_column(&self, col: usize, lane: usize) -> Result<usize, LaneGradError> {
        if col >= self.cols || self.rows == 0 {
            return Err(LaneGradError::IndexOutOfBounds {
                index: vec![0, col],
                shape: self.shape().to_vec(),
            });
        }
        let mut best_row = 0;
        let mut best = self[(0, col)].lane(lane);
        for r in 1..self.rows {
            let v = self[(r, col)].lane(lane);
            if v > best {
                best = v;
                best_row = r;
            }
        }
        Ok(best_row)
    }

    fn check_same_shape(&self, other: &Matrix<T>, operation: &str) -> Result<(), LaneGradError> {
        if !self.same_shape(other) {
            return Err(LaneGradError::ShapeMismatch {
                expected: self.shape().to_vec(),
                actual: other.shape().to_vec(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    fn check_block(&self, row: usize, col: usize, height: usize, width: usize) -> Result<(), LaneGradError> {
        if row + height > self.rows || col + width > self.cols {
            return Err(LaneGradError::SliceOutOfBounds {
                row,
                col,
                height,
                width,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        &self.data[row * self.cols + col]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        &mut self.data[row * self.cols + col]
    }
}

impl<T: fmt::Debug> fmt::Debug for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("data", &self.data)
            .finish()
    }
}

impl<T: fmt::Display> fmt::Display for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..self.rows {
            for c in 0..self.cols {
                if c > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", self.data[r * self.cols + c])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "matrix_test.rs"]
mod tests;
