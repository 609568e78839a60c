use super::forward::{assure_value, pool_windows, with_values};
use super::graph::TopoOrder;
use crate::element::Element;
use crate::error::LaneGradError;
use crate::matrix::Matrix;
use crate::node::{Node, Op};

impl<T: Element> Node<T> {
    /// Reverse-mode pass over the whole graph below this node.
    ///
    /// Seeds this node's gradient with ones and adds every node's local
    /// gradient contribution into its operands' `grad` buffers. Buffers are
    /// added to, never overwritten; call `zero_grad` between passes.
    pub fn backward(&self) -> Result<(), LaneGradError> {
        let topo = self.topological_order();
        self.backward_with(&topo)
    }

    /// Like [`Node::backward`], reusing an order built earlier from this node.
    pub fn backward_with(&self, topo: &TopoOrder<T>) -> Result<(), LaneGradError> {
        assure_value(self)?;
        {
            let mut guard = self.write_data();
            let [rows, cols] = guard.value.shape();
            guard.grad = Matrix::filled(rows, cols, T::one());
        }
        for node in topo.iter().rev() {
            propagate(node)?;
        }
        Ok(())
    }
}

fn add_grad<T: Element>(node: &Node<T>, contribution: &Matrix<T>) -> Result<(), LaneGradError> {
    node.write_data().grad.add_assign(contribution)
}

/// Pushes the gradient of `node` into its operands.
///
/// The node stays read-locked for the whole call; operands are locked one at
/// a time, and contributions that need operand values are computed before
/// any operand gradient is written.
fn propagate<T: Element>(node: &Node<T>) -> Result<(), LaneGradError> {
    let guard = node.read_data();
    let (grad, value) = (&guard.grad, &guard.value);

    match &guard.op {
        Op::Parameter => {}
        Op::Add(l, r) => {
            add_grad(l, grad)?;
            add_grad(r, grad)?;
        }
        Op::Neg(l) => add_grad(l, &grad.map(|g| -g))?,
        Op::Mul(l, r) => {
            let (dl, dr) = with_values(l, r, |lv, rv| -> Result<_, LaneGradError> {
                Ok((grad.matmul(&rv.transpose())?, lv.transpose().matmul(grad)?))
            })?;
            add_grad(l, &dl)?;
            add_grad(r, &dr)?;
        }
        Op::Div(l, r) => {
            let d = r.read_data().value.to_scalar()?;
            // the divisor is 1x1, so its contributions are summed
            let dr = {
                let lv = l.read_data();
                grad.zip_map(&lv.value, "div backward", |g, x| -g * x)?.sum() / (d * d)
            };
            add_grad(l, &grad.map(|g| g / d))?;
            add_grad(r, &Matrix::scalar(dr))?;
        }
        Op::Dot(l, r) => {
            let (dl, dr) = with_values(l, r, |lv, rv| -> Result<_, LaneGradError> {
                Ok((
                    grad.zip_map(rv, "dot backward", |g, y| g * y)?,
                    grad.zip_map(lv, "dot backward", |g, x| g * x)?,
                ))
            })?;
            add_grad(l, &dl)?;
            add_grad(r, &dr)?;
        }
        Op::Func(l, func) => {
            let func = *func;
            let dl = grad.zip_map(&l.read_data().value, "func backward", |g, x| g * func.derivative(x))?;
            add_grad(l, &dl)?;
        }
        Op::Max(l, r) => {
            // ties go to the right-hand side
            let (dl, dr) = with_values(l, r, |lv, rv| -> Result<_, LaneGradError> {
                let left_mask = rv.zip_map(lv, "max backward", |y, x| y.lt_mask(x))?;
                Ok((
                    grad.zip_map(&left_mask, "max backward", |g, m| g * m)?,
                    grad.zip_map(&left_mask, "max backward", |g, m| g * (T::one() - m))?,
                ))
            })?;
            add_grad(l, &dl)?;
            add_grad(r, &dr)?;
        }
        Op::Sum(l) => {
            let g = grad.to_scalar()?;
            l.write_data().grad.add_scalar_assign(g);
        }
        Op::Slice { input, row, col, .. } => {
            input.write_data().grad.add_to_block(*row, *col, grad)?;
        }
        Op::Flatten(members) => {
            let mut pos = 0;
            for member in members {
                let mut member = member.write_data();
                let [rows, cols] = member.grad.shape();
                for c in 0..cols {
                    for r in 0..rows {
                        member.grad[(r, c)] += grad[(pos, 0)];
                        pos += 1;
                    }
                }
            }
        }
        Op::LogSoftmax(l) => {
            let total = grad.sum();
            add_grad(l, &grad.zip_map(value, "log_softmax backward", |g, y| g - y.exp() * total)?)?;
        }
        Op::Convolution {
            input,
            kernel,
            bias,
            size,
        } => convolution_backward(input, kernel, bias, *size, grad)?,
        Op::MaxPool2D { input, size } => max_pool_backward(input, *size, grad, value)?,
        Op::Dropout { input, mask, .. } => {
            add_grad(input, &grad.zip_map(mask, "dropout backward", |g, m| g * m)?)?;
        }
    }
    Ok(())
}

fn convolution_backward<T: Element>(
    input: &Node<T>,
    kernel: &Node<T>,
    bias: &Node<T>,
    size: usize,
    grad: &Matrix<T>,
) -> Result<(), LaneGradError> {
    let [out_rows, out_cols] = grad.shape();
    // correlation of the input with the output gradient, scaled so its
    // magnitude does not grow with the output size
    let norm = T::splat(((out_rows * out_cols) as f32).sqrt());

    let (input_grad, kernel_grad) = with_values(input, kernel, |iv, kv| -> Result<_, LaneGradError> {
        let mut input_grad = Matrix::zeros(iv.rows(), iv.cols());
        for r in 0..out_rows {
            for c in 0..out_cols {
                let g = grad[(r, c)];
                input_grad.add_to_block(r, c, &kv.map(|k| k * g))?;
            }
        }
        let kernel_grad = Matrix::from_fn(size, size, |kr, kc| {
            let mut acc = T::zero();
            for r in 0..out_rows {
                for c in 0..out_cols {
                    acc += iv[(r + kr, c + kc)] * grad[(r, c)];
                }
            }
            acc / norm
        });
        Ok((input_grad, kernel_grad))
    })?;
    add_grad(input, &input_grad)?;
    add_grad(kernel, &kernel_grad)?;
    add_grad(bias, &Matrix::scalar(grad.sum()))
}

/// Routes each pooled gradient to the first position, in row-major order,
/// that holds its window's maximum. Decided per lane.
fn max_pool_backward<T: Element>(
    input: &Node<T>,
    size: usize,
    grad: &Matrix<T>,
    pooled: &Matrix<T>,
) -> Result<(), LaneGradError> {
    let input_grad = {
        let guard = input.read_data();
        let iv = &guard.value;
        let mut input_grad = Matrix::zeros(iv.rows(), iv.cols());
        for (r, height) in pool_windows(iv.rows(), size) {
            for (c, width) in pool_windows(iv.cols(), size) {
                let max = pooled[(r / size, c / size)];
                let g = grad[(r / size, c / size)];
                let mut taken = T::zero();
                for wr in r..r + height {
                    for wc in c..c + width {
                        let hit = iv[(wr, wc)].eq_mask(max) * (T::one() - taken);
                        input_grad[(wr, wc)] += g * hit;
                        taken += hit;
                    }
                }
            }
        }
        input_grad
    };
    add_grad(input, &input_grad)
}

#[cfg(test)]
#[path = "backward_test.rs"]
mod tests;
