//! Gradient bookkeeping across backward passes.
//!
//! `grad` holds one pass, `accum_grad` the running sum over the examples of a
//! batch, and `prev_accum_grad` the previous batch's sum for momentum.
//!
//! Replicas of one model (graphs built by the same code, one per worker) are
//! kept in step with [`TopoOrder::copy_params`] before a batch and merged
//! with [`TopoOrder::add_accum_grads`] after it. Both pair nodes by position.

use super::graph::TopoOrder;
use crate::element::Element;
use crate::error::LaneGradError;
use crate::matrix::Matrix;
use crate::node::{Node, NodeData};

impl<T: Element> NodeData<T> {
    /// Zeroes the single-pass gradient, keeping its shape.
    pub(crate) fn clear_grad(&mut self) {
        self.grad.set_zero();
    }

    /// `accum_grad += grad`.
    pub(crate) fn accumulate_grad(&mut self) -> Result<(), LaneGradError> {
        if self.accum_grad.is_empty() && !self.grad.is_empty() {
            self.accum_grad = Matrix::zeros(self.grad.rows(), self.grad.cols());
        }
        self.accum_grad.add_assign(&self.grad)
    }

    /// Moves `accum_grad` into `prev_accum_grad` and starts a fresh sum.
    pub(crate) fn roll_accum_grad(&mut self) {
        let [rows, cols] = self.grad.shape();
        let fresh = Matrix::zeros(rows, cols);
        self.prev_accum_grad = std::mem::replace(&mut self.accum_grad, fresh);
    }
}

impl<T: Element> TopoOrder<T> {
    /// Clears every node's single-pass gradient and drops the memoized value
    /// of every non-Parameter node, so the next evaluation recomputes from
    /// the current Parameter values. Accumulators are untouched.
    pub fn zero_grad(&self) {
        for node in self.iter().rev() {
            let mut guard = node.write_data();
            guard.clear_grad();
            if !guard.is_parameter() {
                guard.has_value = false;
            }
        }
    }

    /// Adds each node's current gradient into its accumulator.
    pub fn accum_grads(&self) -> Result<(), LaneGradError> {
        for node in self.iter() {
            node.write_data().accumulate_grad()?;
        }
        Ok(())
    }

    /// Snapshots each accumulator into `prev_accum_grad` and zeroes it.
    pub fn zero_accum_grads(&self) {
        for node in self.iter() {
            node.write_data().roll_accum_grad();
        }
    }

    /// Copies every Parameter value of this graph into the node at the same
    /// position of `dst`, a replica built the same way.
    ///
    /// Memoized values of `dst` are not invalidated; call `zero_grad` on it
    /// before evaluating.
    pub fn copy_params(&self, dst: &TopoOrder<T>) -> Result<(), LaneGradError> {
        check_replica(self, dst)?;
        for (src, copy) in self.iter().zip(dst.iter()) {
            if src.ptr_eq(copy) || !src.is_parameter() {
                continue;
            }
            let value = src.read_data().value.clone();
            copy.set_value(value)?;
        }
        Ok(())
    }

    /// Adds the accumulated gradients of the replica `from` into this
    /// graph's accumulators, node by node.
    pub fn add_accum_grads(&self, from: &TopoOrder<T>) -> Result<(), LaneGradError> {
        check_replica(self, from)?;
        for (dst, src) in self.iter().zip(from.iter()) {
            let accum = src.read_data().accum_grad.clone();
            if accum.is_empty() {
                continue;
            }
            let mut guard = dst.write_data();
            if guard.accum_grad.is_empty() {
                guard.accum_grad = Matrix::zeros(accum.rows(), accum.cols());
            }
            guard.accum_grad.add_assign(&accum)?;
        }
        Ok(())
    }
}

/// Both orders must have the same length and the same mode at every position.
fn check_replica<T: Element>(a: &TopoOrder<T>, b: &TopoOrder<T>) -> Result<(), LaneGradError> {
    if a.len() != b.len() {
        return Err(LaneGradError::ProjectionMismatch {
            expected: format!("a replica of {} nodes", a.len()),
            actual: format!("{} nodes", b.len()),
        });
    }
    for (position, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let (mx, my) = (x.mode(), y.mode());
        if mx != my {
            return Err(LaneGradError::ProjectionMismatch {
                expected: format!("{:?} at position {}", mx, position),
                actual: format!("{:?}", my),
            });
        }
    }
    Ok(())
}

impl<T: Element> Node<T> {
    /// [`TopoOrder::zero_grad`] over the graph rooted at this node.
    pub fn zero_grad(&self) {
        self.topological_order().zero_grad();
    }

    pub fn accum_grads(&self) -> Result<(), LaneGradError> {
        self.topological_order().accum_grads()
    }

    pub fn zero_accum_grads(&self) {
        self.topological_order().zero_accum_grads();
    }
}

#[cfg(test)]
#[path = "accumulate_test.rs"]
mod tests;
