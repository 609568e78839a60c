//! Parameter constructors and the in-place mutations a built graph allows.
//!
//! Reassigning a Parameter's value is the only legal mutation of a graph.
//! Dependents keep their memoized values until the graph is invalidated with
//! `zero_grad`.

use super::{Node, NodeData};
use crate::element::Element;
use crate::error::LaneGradError;
use crate::matrix::Matrix;
use rand::Rng;

impl<T: Element> Node<T> {
    /// A `rows x cols` Parameter, initialized to zero.
    pub fn parameter(rows: usize, cols: usize) -> Self {
        Node::new_parameter(Matrix::zeros(rows, cols))
    }

    /// A 1x1 Parameter.
    pub fn scalar(value: T) -> Self {
        Node::new_parameter(Matrix::scalar(value))
    }

    /// A Parameter built from row-major data.
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self, LaneGradError> {
        Ok(Node::new_parameter(Matrix::from_vec(data, rows, cols)?))
    }

    pub fn from_matrix(value: Matrix<T>) -> Self {
        Node::new_parameter(value)
    }

    /// Runs `f` on the value of a Parameter, failing on any other node.
    fn mutate_parameter<R>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut NodeData<T>) -> Result<R, LaneGradError>,
    ) -> Result<R, LaneGradError> {
        let mut guard = self.write_data();
        if !guard.is_parameter() {
            return Err(LaneGradError::NotAParameter {
                operation: operation.to_string(),
            });
        }
        f(&mut guard)
    }

    /// Replaces the value of a Parameter. The shape must not change.
    pub fn set_value(&self, value: Matrix<T>) -> Result<(), LaneGradError> {
        self.mutate_parameter("set_value", |data| {
            if !data.value.same_shape(&value) {
                return Err(LaneGradError::ShapeMismatch {
                    expected: data.value.shape().to_vec(),
                    actual: value.shape().to_vec(),
                    operation: "set_value".to_string(),
                });
            }
            data.value = value;
            Ok(())
        })
    }

    /// Assigns the value of a 1x1 Parameter.
    pub fn assign(&self, value: T) -> Result<(), LaneGradError> {
        self.mutate_parameter("assign", |data| {
            if !data.value.is_scalar() {
                return Err(LaneGradError::ShapeMismatch {
                    expected: vec![1, 1],
                    actual: data.value.shape().to_vec(),
                    operation: "assign".to_string(),
                });
            }
            data.value[(0, 0)] = value;
            Ok(())
        })
    }

    pub fn set_element(&self, row: usize, col: usize, value: T) -> Result<(), LaneGradError> {
        self.mutate_parameter("set_element", |data| {
            check_index(&data.value, row, col)?;
            data.value[(row, col)] = value;
            Ok(())
        })
    }

    /// Sets one lane of one element, leaving the other lanes untouched.
    pub fn set_lane(&self, row: usize, col: usize, lane: usize, value: f32) -> Result<(), LaneGradError> {
        if lane >= T::LANES {
            return Err(LaneGradError::InvalidArgument(format!(
                "lane {} out of range for a {}-lane element",
                lane,
                T::LANES
            )));
        }
        self.mutate_parameter("set_lane", |data| {
            check_index(&data.value, row, col)?;
            let old = data.value[(row, col)];
            data.value[(row, col)] = T::from_lane_fn(|l| if l == lane { value } else { old.lane(l) });
            Ok(())
        })
    }

    /// Fills every lane of every element with values uniform in `[-fact, fact]`.
    pub fn randomize(&self, fact: f32) -> Result<(), LaneGradError> {
        self.randomize_with(&mut rand::thread_rng(), fact)
    }

    pub fn randomize_with<R: Rng>(&self, rng: &mut R, fact: f32) -> Result<(), LaneGradError> {
        self.mutate_parameter("randomize", |data| {
            for v in data.value.as_mut_slice() {
                *v = T::from_lane_fn(|_| rng.gen_range(-1.0f32..=1.0) * fact);
            }
            Ok(())
        })
    }

    pub fn constant(&self, value: f32) -> Result<(), LaneGradError> {
        self.mutate_parameter("constant", |data| {
            data.value.fill(T::splat(value));
            Ok(())
        })
    }

    pub fn zero(&self) -> Result<(), LaneGradError> {
        self.constant(0.0)
    }

    /// Fills the value with `start, start + 1, ...` in row-major order.
    pub fn iota(&self, start: f32) -> Result<(), LaneGradError> {
        self.mutate_parameter("iota", |data| {
            let mut next = start;
            for v in data.value.as_mut_slice() {
                *v = T::splat(next);
                next += 1.0;
            }
            Ok(())
        })
    }

    /// `value` on the diagonal, zero elsewhere. Square Parameters only.
    pub fn identity(&self, value: f32) -> Result<(), LaneGradError> {
        self.mutate_parameter("identity", |data| {
            let [rows, cols] = data.value.shape();
            if rows != cols {
                return Err(LaneGradError::ShapeMismatch {
                    expected: vec![rows, rows],
                    actual: vec![rows, cols],
                    operation: "identity".to_string(),
                });
            }
            data.value = Matrix::from_fn(rows, cols, |r, c| {
                if r == c {
                    T::splat(value)
                } else {
                    T::zero()
                }
            });
            Ok(())
        })
    }

    /// Zeroes the value and puts a one in column `col` of the first row.
    pub fn one_hot_column(&self, col: usize) -> Result<(), LaneGradError> {
        self.mutate_parameter("one_hot_column", |data| {
            check_index(&data.value, 0, col)?;
            data.value.set_zero();
            data.value[(0, col)] = T::one();
            Ok(())
        })
    }

    /// Rescales the value so its mean becomes `mean` and, when given, moves
    /// every element so the standard deviation becomes `stddev`. Computed per
    /// lane. The current mean must be non-zero.
    pub fn normalize(&self, mean: f32, stddev: Option<f32>) -> Result<(), LaneGradError> {
        self.mutate_parameter("normalize", |data| {
            if data.value.is_empty() {
                return Err(LaneGradError::InvalidArgument(
                    "cannot normalize an empty value".to_string(),
                ));
            }
            let count = T::splat(data.value.len() as f32);
            let target = T::splat(mean);
            let scale = target / (data.value.sum() / count);
            data.value = data.value.map(|v| v * scale);
            if let Some(stddev) = stddev {
                let variance = data.value.map(|v| (v - target) * (v - target)).sum() / count;
                let ratio = T::splat(stddev) / variance.sqrt();
                data.value = data.value.map(|v| target + (v - target) * ratio);
            }
            Ok(())
        })
    }

    /// Row holding the largest value of column `col`, judged on lane 0.
    pub fn max_value_index_of_column(&self, col: usize) -> Result<usize, LaneGradError> {
        self.value()?.max_index_of_column(col, 0)
    }
}

fn check_index<T: Element>(m: &Matrix<T>, row: usize, col: usize) -> Result<(), LaneGradError> {
    if row >= m.rows() || col >= m.cols() {
        return Err(LaneGradError::IndexOutOfBounds {
            index: vec![row, col],
            shape: m.shape().to_vec(),
        });
    }
    Ok(())
}
