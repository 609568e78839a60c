//! Graph-building operators.
//!
//! None of these compute anything: each returns a new node recording its mode
//! and operands. Shape errors surface when the result is evaluated.

use super::{Node, Op};
use crate::element::Element;
use crate::func::UnaryFunc;
use crate::matrix::Matrix;
use std::ops::{Add, Div, Mul, Neg, Sub};

impl<T: Element> Node<T> {
    /// Elementwise product.
    pub fn dot(&self, rhs: &Node<T>) -> Node<T> {
        Node::from_op(Op::Dot(self.clone(), rhs.clone()))
    }

    /// Elementwise maximum of two same-shaped nodes.
    pub fn max(&self, rhs: &Node<T>) -> Node<T> {
        Node::from_op(Op::Max(self.clone(), rhs.clone()))
    }

    /// Sum of all elements, as a 1x1 node.
    pub fn sum(&self) -> Node<T> {
        Node::from_op(Op::Sum(self.clone()))
    }

    pub fn func(&self, func: UnaryFunc) -> Node<T> {
        Node::from_op(Op::Func(self.clone(), func))
    }

    pub fn sigmoid(&self) -> Node<T> {
        self.func(UnaryFunc::Sigmoid)
    }

    pub fn relu(&self) -> Node<T> {
        self.func(UnaryFunc::Relu)
    }

    pub fn exp(&self) -> Node<T> {
        self.func(UnaryFunc::Exp)
    }

    pub fn log(&self) -> Node<T> {
        self.func(UnaryFunc::Log)
    }

    pub fn tanh(&self) -> Node<T> {
        self.func(UnaryFunc::Tanh)
    }

    pub fn square(&self) -> Node<T> {
        self.func(UnaryFunc::Square)
    }

    /// The `height x width` block starting at `(row, col)`.
    pub fn slice(&self, row: usize, col: usize, height: usize, width: usize) -> Node<T> {
        Node::from_op(Op::Slice {
            input: self.clone(),
            row,
            col,
            height,
            width,
        })
    }

    /// Concatenates the members into one column. Each member contributes its
    /// elements column by column.
    pub fn flatten(members: &[Node<T>]) -> Node<T> {
        Node::from_op(Op::Flatten(members.to_vec()))
    }

    /// Valid (unpadded) 2D convolution with a `size x size` kernel and a 1x1
    /// bias. The output is `(rows - size + 1) x (cols - size + 1)`.
    pub fn convolution(&self, kernel: &Node<T>, bias: &Node<T>, size: usize) -> Node<T> {
        Node::from_op(Op::Convolution {
            input: self.clone(),
            kernel: kernel.clone(),
            bias: bias.clone(),
            size,
        })
    }

    /// Maximum over non-overlapping `size x size` windows. Edge windows are
    /// truncated, so the output is `ceil(rows / size) x ceil(cols / size)`.
    pub fn max_pool_2d(&self, size: usize) -> Node<T> {
        Node::from_op(Op::MaxPool2D {
            input: self.clone(),
            size,
        })
    }

    /// Inverted dropout: each element is zeroed with probability `rate` and
    /// kept elements are scaled by `1 / (1 - rate)`.
    pub fn dropout(&self, rate: f32) -> Node<T> {
        if rate == 0.0 {
            log::warn!("dropout with rate 0 is the identity");
        }
        Node::from_op(Op::Dropout {
            input: self.clone(),
            rate,
            mask: Matrix::empty(),
        })
    }

    /// `x - max(x) - log(sum(exp(x - max(x))))` over all elements.
    pub fn log_softmax(&self) -> Node<T> {
        Node::from_op(Op::LogSoftmax(self.clone()))
    }
}

macro_rules! binary_node_op {
    ($trait:ident, $method:ident, |$l:ident, $r:ident| $build:expr) => {
        impl<'a, 'b, T: Element> $trait<&'b Node<T>> for &'a Node<T> {
            type Output = Node<T>;

            fn $method(self, rhs: &'b Node<T>) -> Node<T> {
                let ($l, $r) = (self.clone(), rhs.clone());
                $build
            }
        }

        impl<T: Element> $trait<Node<T>> for Node<T> {
            type Output = Node<T>;

            fn $method(self, rhs: Node<T>) -> Node<T> {
                (&self).$method(&rhs)
            }
        }

        impl<'b, T: Element> $trait<&'b Node<T>> for Node<T> {
            type Output = Node<T>;

            fn $method(self, rhs: &'b Node<T>) -> Node<T> {
                (&self).$method(rhs)
            }
        }

        impl<'a, T: Element> $trait<Node<T>> for &'a Node<T> {
            type Output = Node<T>;

            fn $method(self, rhs: Node<T>) -> Node<T> {
                self.$method(&rhs)
            }
        }
    };
}

binary_node_op!(Add, add, |l, r| Node::from_op(Op::Add(l, r)));
// a - b is recorded as a + (-b)
binary_node_op!(Sub, sub, |l, r| Node::from_op(Op::Add(l, -r)));
binary_node_op!(Mul, mul, |l, r| Node::from_op(Op::Mul(l, r)));
binary_node_op!(Div, div, |l, r| Node::from_op(Op::Div(l, r)));

impl<T: Element> Neg for &Node<T> {
    type Output = Node<T>;

    fn neg(self) -> Node<T> {
        Node::from_op(Op::Neg(self.clone()))
    }
}

impl<T: Element> Neg for Node<T> {
    type Output = Node<T>;

    fn neg(self) -> Node<T> {
        Node::from_op(Op::Neg(self))
    }
}
