//! Structured blocks of scalar nodes.
//!
//! A [`NodeArray`] is a `rows x cols` grid where every cell is its own 1x1
//! node. Weight matrices, input images and score vectors of a model built
//! this way are what a compiled program is fed from and read back into, one
//! cell per program slot.

use crate::element::Element;
use crate::error::LaneGradError;
use crate::func::UnaryFunc;
use crate::matrix::Matrix;
use crate::node::Node;
use rand::Rng;
use rand_distr::StandardNormal;
use std::ops::Index;

#[derive(Clone, Debug)]
pub struct NodeArray<T: Element = f32> {
    rows: usize,
    cols: usize,
    nodes: Vec<Node<T>>,
}

impl<T: Element> NodeArray<T> {
    /// A block of zero-valued scalar Parameters.
    pub fn new(rows: usize, cols: usize) -> Self {
        NodeArray {
            rows,
            cols,
            nodes: (0..rows * cols).map(|_| Node::scalar(T::zero())).collect(),
        }
    }

    /// A block of scalar Parameters holding the cells of `values`.
    pub fn from_values(values: &Matrix<T>) -> Self {
        NodeArray {
            rows: values.rows(),
            cols: values.cols(),
            nodes: values.as_slice().iter().map(|v| Node::scalar(*v)).collect(),
        }
    }

    /// Wraps existing 1x1 nodes, in row-major order.
    pub fn from_nodes(nodes: Vec<Node<T>>, rows: usize, cols: usize) -> Result<Self, LaneGradError> {
        if nodes.len() != rows * cols {
            return Err(LaneGradError::TensorCreationError {
                data_len: nodes.len(),
                shape: vec![rows, cols],
            });
        }
        Ok(NodeArray { rows, cols, nodes })
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
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Cells in row-major order.
    pub fn nodes(&self) -> &[Node<T>] {
        &self.nodes
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Node<T>> {
        if row < self.rows && col < self.cols {
            self.nodes.get(row * self.cols + col)
        } else {
            None
        }
    }

    fn cell(&self, row: usize, col: usize) -> Result<&Node<T>, LaneGradError> {
        self.get(row, col).ok_or_else(|| LaneGradError::IndexOutOfBounds {
            index: vec![row, col],
            shape: self.shape().to_vec(),
        })
    }

    pub fn set_value(&self, row: usize, col: usize, value: T) -> Result<(), LaneGradError> {
        self.cell(row, col)?.assign(value)
    }

    /// Sets one lane of one cell: how example `lane` of a lane-parallel
    /// batch is loaded.
    pub fn set_lane(&self, row: usize, col: usize, lane: usize, value: f32) -> Result<(), LaneGradError> {
        self.cell(row, col)?.set_lane(0, 0, lane, value)
    }

    /// Loads every cell from `values`, which must match the block's shape.
    pub fn assign(&self, values: &Matrix<T>) -> Result<(), LaneGradError> {
        self.check_shape(values.shape(), "assign")?;
        for (node, v) in self.nodes.iter().zip(values.as_slice()) {
            node.assign(*v)?;
        }
        Ok(())
    }

    pub fn zero(&self) -> Result<(), LaneGradError> {
        for node in &self.nodes {
            node.zero()?;
        }
        Ok(())
    }

    /// Fills every lane of every cell with standard-normal samples.
    pub fn randomize(&self) -> Result<(), LaneGradError> {
        self.randomize_with(&mut rand::thread_rng())
    }

    pub fn randomize_with<R: Rng>(&self, rng: &mut R) -> Result<(), LaneGradError> {
        for node in &self.nodes {
            node.assign(T::from_lane_fn(|_| rng.sample(StandardNormal)))?;
        }
        Ok(())
    }

    /// Marks every cell as an input rebound between compiled evaluations.
    pub fn set_variable(&self) {
        for node in &self.nodes {
            node.set_variable(true);
        }
    }

    /// Marks every cell as a gradient receiver.
    pub fn set_needs_grad(&self) {
        for node in &self.nodes {
            node.set_needs_grad(true);
        }
    }

    fn check_shape(&self, other: [usize; 2], operation: &str) -> Result<(), LaneGradError> {
        if self.shape() != other {
            return Err(LaneGradError::ShapeMismatch {
                expected: self.shape().to_vec(),
                actual: other.to_vec(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    fn map_nodes(&self, f: impl Fn(&Node<T>) -> Node<T>) -> NodeArray<T> {
        NodeArray {
            rows: self.rows,
            cols: self.cols,
            nodes: self.nodes.iter().map(f).collect(),
        }
    }

    fn zip_nodes(
        &self,
        rhs: &NodeArray<T>,
        operation: &str,
        f: impl Fn(&Node<T>, &Node<T>) -> Node<T>,
    ) -> Result<NodeArray<T>, LaneGradError> {
        self.check_shape(rhs.shape(), operation)?;
        Ok(NodeArray {
            rows: self.rows,
            cols: self.cols,
            nodes: self.nodes.iter().zip(&rhs.nodes).map(|(a, b)| f(a, b)).collect(),
        })
    }

    /// Matrix product built out of scalar multiply and add nodes.
    pub fn matmul(&self, rhs: &NodeArray<T>) -> Result<NodeArray<T>, LaneGradError> {
        if self.cols != rhs.rows || self.cols == 0 {
            return Err(LaneGradError::ShapeMismatch {
                expected: vec![self.cols, rhs.cols],
                actual: rhs.shape().to_vec(),
                operation: "matmul".to_string(),
            });
        }
        let mut nodes = Vec::with_capacity(self.rows * rhs.cols);
        for r in 0..self.rows {
            for c in 0..rhs.cols {
                let mut acc = &self[(r, 0)] * &rhs[(0, c)];
                for k in 1..self.cols {
                    acc = &acc + &(&self[(r, k)] * &rhs[(k, c)]);
                }
                nodes.push(acc);
            }
        }
        Ok(NodeArray {
            rows: self.rows,
            cols: rhs.cols,
            nodes,
        })
    }

    pub fn add(&self, rhs: &NodeArray<T>) -> Result<NodeArray<T>, LaneGradError> {
        self.zip_nodes(rhs, "add", |a, b| a + b)
    }

    pub fn sub(&self, rhs: &NodeArray<T>) -> Result<NodeArray<T>, LaneGradError> {
        self.zip_nodes(rhs, "sub", |a, b| a - b)
    }

    /// Elementwise product.
    pub fn dot(&self, rhs: &NodeArray<T>) -> Result<NodeArray<T>, LaneGradError> {
        self.zip_nodes(rhs, "dot", |a, b| a * b)
    }

    pub fn apply_func(&self, func: UnaryFunc) -> NodeArray<T> {
        self.map_nodes(|n| n.func(func))
    }

    /// Sum of all cells as a chain of additions.
    pub fn sum(&self) -> Result<Node<T>, LaneGradError> {
        let (first, rest) = self.nodes.split_first().ok_or(LaneGradError::EmptyGraph)?;
        Ok(rest.iter().fold(first.clone(), |acc, n| &acc + n))
    }

    pub fn mean(&self) -> Result<Node<T>, LaneGradError> {
        let count = Node::scalar(T::splat(self.len() as f32));
        Ok(&self.sum()? / &count)
    }

    /// Log-softmax over all cells, shifted by the largest cell so large
    /// inputs do not overflow `exp`.
    pub fn log_softmax(&self) -> Result<NodeArray<T>, LaneGradError> {
        let (first, rest) = self.nodes.split_first().ok_or(LaneGradError::EmptyGraph)?;
        let max = rest.iter().fold(first.clone(), |acc, n| acc.max(n));
        let shifted = self.map_nodes(|n| n - &max);
        let log_sum = shifted.apply_func(UnaryFunc::Exp).sum()?.log();
        Ok(shifted.map_nodes(|n| n - &log_sum))
    }

    /// The cells, in row-major order, as an `n x 1` column.
    pub fn flat_view_row(&self) -> NodeArray<T> {
        NodeArray {
            rows: self.len(),
            cols: 1,
            nodes: self.nodes.clone(),
        }
    }

    /// The cells, in row-major order, as a `1 x n` row.
    pub fn flat_view_col(&self) -> NodeArray<T> {
        NodeArray {
            rows: 1,
            cols: self.len(),
            nodes: self.nodes.clone(),
        }
    }

    /// Current values of all cells, evaluating them if needed.
    pub fn values(&self) -> Result<Matrix<T>, LaneGradError> {
        let data = self
            .nodes
            .iter()
            .map(|n| n.scalar_value())
            .collect::<Result<Vec<T>, LaneGradError>>()?;
        Matrix::from_vec(data, self.rows, self.cols)
    }

    /// Single-pass gradients of all cells.
    pub fn grads(&self) -> Result<Matrix<T>, LaneGradError> {
        let data = self
            .nodes
            .iter()
            .map(|n| n.grad().to_scalar())
            .collect::<Result<Vec<T>, LaneGradError>>()?;
        Matrix::from_vec(data, self.rows, self.cols)
    }

    /// Row of the largest value in column `col`, judged on lane 0.
    pub fn max_value_index_of_column(&self, col: usize) -> Result<usize, LaneGradError> {
        self.values()?.max_index_of_column(col, 0)
    }

    /// Copies lane `lane` of every cell into a new block of plain floats, for
    /// the per-example decisions lane types cannot make in parallel.
    pub fn get_unparallel(&self, lane: usize) -> Result<NodeArray<f32>, LaneGradError> {
        if lane >= T::LANES {
            return Err(LaneGradError::InvalidArgument(format!(
                "lane {} out of range for a {}-lane element",
                lane,
                T::LANES
            )));
        }
        let values = self.values()?;
        let lane_values = Matrix::from_fn(self.rows, self.cols, |r, c| values[(r, c)].lane(lane));
        Ok(NodeArray::from_values(&lane_values))
    }

    /// Clears the single-pass gradient of every cell.
    pub fn zero_grad(&self) {
        for node in &self.nodes {
            node.write_data().clear_grad();
        }
    }

    pub fn accum_grads(&self) -> Result<(), LaneGradError> {
        for node in &self.nodes {
            node.write_data().accumulate_grad()?;
        }
        Ok(())
    }

    pub fn zero_accum_grads(&self) {
        for node in &self.nodes {
            node.write_data().roll_accum_grad();
        }
    }

    /// Handles to every cell, for an optimizer.
    pub fn parameters(&self) -> Vec<Node<T>> {
        self.nodes.clone()
    }
}

impl<T: Element> Index<(usize, usize)> for NodeArray<T> {
    type Output = Node<T>;

    fn index(&self, (row, col): (usize, usize)) -> &Node<T> {
        &self.nodes[row * self.cols + col]
    }
}

#[cfg(test)]
#[path = "array_test.rs"]
mod tests;
