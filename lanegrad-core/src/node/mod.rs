//! The expression-graph vertex.
//!
//! A [`Node`] is a cheap, clonable handle (`Arc<RwLock<NodeData>>`) to one
//! value of the graph: either a leaf `Parameter` holding a matrix, or an
//! operation over previously built nodes. Operations are recorded by the
//! builder functions in [`builder`] and evaluated lazily by
//! [`crate::autograd::forward`].

use crate::element::Element;
use crate::func::UnaryFunc;
use crate::matrix::Matrix;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub mod builder;
pub mod create;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

fn next_node_id() -> u64 {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Operation tag of a node, without its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Parameter,
    Add,
    Mul,
    Div,
    Neg,
    Dot,
    Func,
    Max,
    Sum,
    Slice,
    Flatten,
    Convolution,
    MaxPool2D,
    Dropout,
    LogSoftmax,
}

/// An operation together with its operands.
#[derive(Clone)]
pub enum Op<T: Element> {
    Parameter,
    Add(Node<T>, Node<T>),
    /// Dense matrix product (scalar product for 1x1 operands).
    Mul(Node<T>, Node<T>),
    /// Division by a 1x1 right-hand side.
    Div(Node<T>, Node<T>),
    Neg(Node<T>),
    /// Elementwise product.
    Dot(Node<T>, Node<T>),
    Func(Node<T>, UnaryFunc),
    Max(Node<T>, Node<T>),
    Sum(Node<T>),
    Slice {
        input: Node<T>,
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    },
    Flatten(Vec<Node<T>>),
    Convolution {
        input: Node<T>,
        kernel: Node<T>,
        bias: Node<T>,
        size: usize,
    },
    MaxPool2D {
        input: Node<T>,
        size: usize,
    },
    /// `mask` is redrawn on every evaluation and reused by the backward pass.
    Dropout {
        input: Node<T>,
        rate: f32,
        mask: Matrix<T>,
    },
    LogSoftmax(Node<T>),
}

impl<T: Element> Op<T> {
    pub fn mode(&self) -> Mode {
        match self {
            Op::Parameter => Mode::Parameter,
            Op::Add(..) => Mode::Add,
            Op::Mul(..) => Mode::Mul,
            Op::Div(..) => Mode::Div,
            Op::Neg(..) => Mode::Neg,
            Op::Dot(..) => Mode::Dot,
            Op::Func(..) => Mode::Func,
            Op::Max(..) => Mode::Max,
            Op::Sum(..) => Mode::Sum,
            Op::Slice { .. } => Mode::Slice,
            Op::Flatten(..) => Mode::Flatten,
            Op::Convolution { .. } => Mode::Convolution,
            Op::MaxPool2D { .. } => Mode::MaxPool2D,
            Op::Dropout { .. } => Mode::Dropout,
            Op::LogSoftmax(..) => Mode::LogSoftmax,
        }
    }

    /// Operands in traversal order: lhs, rhs, then flatten members, then the
    /// convolution bias.
    pub fn children(&self) -> Vec<Node<T>> {
        match self {
            Op::Parameter => Vec::new(),
            Op::Add(l, r) | Op::Mul(l, r) | Op::Div(l, r) | Op::Dot(l, r) | Op::Max(l, r) => {
                vec![l.clone(), r.clone()]
            }
            Op::Neg(l) | Op::Func(l, _) | Op::Sum(l) | Op::LogSoftmax(l) => vec![l.clone()],
            Op::Slice { input, .. } | Op::MaxPool2D { input, .. } | Op::Dropout { input, .. } => {
                vec![input.clone()]
            }
            Op::Flatten(members) => members.clone(),
            Op::Convolution {
                input, kernel, bias, ..
            } => vec![input.clone(), kernel.clone(), bias.clone()],
        }
    }
}

/// The state behind a [`Node`] handle.
pub struct NodeData<T: Element> {
    pub(crate) id: u64,
    pub(crate) op: Op<T>,
    pub(crate) value: Matrix<T>,
    pub(crate) has_value: bool,
    pub(crate) grad: Matrix<T>,
    pub(crate) accum_grad: Matrix<T>,
    pub(crate) prev_accum_grad: Matrix<T>,
    pub(crate) needs_grad: bool,
    pub(crate) is_variable: bool,
}

impl<T: Element> NodeData<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn op(&self) -> &Op<T> {
        &self.op
    }

    pub fn value(&self) -> &Matrix<T> {
        &self.value
    }

    pub fn grad(&self) -> &Matrix<T> {
        &self.grad
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.op, Op::Parameter)
    }
}

/// Shared handle to one vertex of the expression graph.
///
/// Cloning a `Node` clones the handle, not the value: both handles refer to
/// the same vertex, which is how diamond-shaped graphs share a subexpression.
pub struct Node<T: Element = f32> {
    pub(crate) data: Arc<RwLock<NodeData<T>>>,
}

impl<T: Element> Node<T> {
    /// A leaf holding `value`, with zeroed gradient buffers of the same shape.
    pub(crate) fn new_parameter(value: Matrix<T>) -> Self {
        let grad = Matrix::zeros(value.rows(), value.cols());
        Node::wrap(NodeData {
            id: next_node_id(),
            op: Op::Parameter,
            accum_grad: grad.clone(),
            prev_accum_grad: grad.clone(),
            grad,
            value,
            has_value: true,
            needs_grad: false,
            is_variable: false,
        })
    }

    /// An unevaluated operation node.
    pub(crate) fn from_op(op: Op<T>) -> Self {
        Node::wrap(NodeData {
            id: next_node_id(),
            op,
            value: Matrix::empty(),
            has_value: false,
            grad: Matrix::empty(),
            accum_grad: Matrix::empty(),
            prev_accum_grad: Matrix::empty(),
            needs_grad: false,
            is_variable: false,
        })
    }

    fn wrap(data: NodeData<T>) -> Self {
        Node {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Acquires a read lock on the node state. Panics if the lock is poisoned.
    pub fn read_data(&self) -> RwLockReadGuard<'_, NodeData<T>> {
        self.data.read().expect("RwLock poisoned")
    }

    /// Acquires a write lock on the node state. Panics if the lock is poisoned.
    pub fn write_data(&self) -> RwLockWriteGuard<'_, NodeData<T>> {
        self.data.write().expect("RwLock poisoned")
    }

    /// Process-unique identifier, stable for the lifetime of the node.
    pub fn id(&self) -> u64 {
        self.read_data().id
    }

    pub fn mode(&self) -> Mode {
        self.read_data().op.mode()
    }

    pub fn is_parameter(&self) -> bool {
        self.read_data().is_parameter()
    }

    pub fn has_value(&self) -> bool {
        let guard = self.read_data();
        guard.has_value || guard.is_parameter()
    }

    pub fn children(&self) -> Vec<Node<T>> {
        self.read_data().op.children()
    }

    /// Current single-pass gradient.
    pub fn grad(&self) -> Matrix<T> {
        self.read_data().grad.clone()
    }

    /// Gradient summed over the examples of the current batch.
    pub fn accum_grad(&self) -> Matrix<T> {
        self.read_data().accum_grad.clone()
    }

    /// Accumulated gradient of the previous batch.
    pub fn prev_accum_grad(&self) -> Matrix<T> {
        self.read_data().prev_accum_grad.clone()
    }

    pub fn needs_grad(&self) -> bool {
        self.read_data().needs_grad
    }

    /// Marks the node as a gradient receiver.
    pub fn set_needs_grad(&self, needs_grad: bool) {
        self.write_data().needs_grad = needs_grad;
    }

    pub fn is_variable(&self) -> bool {
        self.read_data().is_variable
    }

    /// Marks the node as an input rebound between compiled evaluations.
    pub fn set_variable(&self, is_variable: bool) {
        self.write_data().is_variable = is_variable;
    }

    /// Whether both handles refer to the same vertex.
    pub fn ptr_eq(&self, other: &Node<T>) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl<T: Element> Clone for Node<T> {
    fn clone(&self) -> Self {
        Node {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Element> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.read_data();
        f.debug_struct("Node")
            .field("id", &guard.id)
            .field("mode", &guard.op.mode())
            .field("shape", &guard.value.shape())
            .field("has_value", &(guard.has_value || guard.is_parameter()))
            .field("needs_grad", &guard.needs_grad)
            .field("is_variable", &guard.is_variable)
            .finish()
    }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod tests;
