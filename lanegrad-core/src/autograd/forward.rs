use super::graph::pending_order;
use crate::element::Element;
use crate::error::LaneGradError;
use crate::matrix::Matrix;
use crate::node::{Node, Op};
use rand::Rng;

/// Makes sure `node` holds a value, computing whatever part of its graph is
/// missing one.
///
/// Values are memoized: a node is computed at most once until `zero_grad`
/// invalidates it. Evaluating a node also resets its gradient buffers to
/// zeros of the value's shape.
pub fn assure_value<T: Element>(node: &Node<T>) -> Result<(), LaneGradError> {
    for pending in pending_order(node) {
        evaluate(&pending)?;
    }
    Ok(())
}

impl<T: Element> Node<T> {
    /// The node's value, evaluating the graph below it if needed.
    pub fn value(&self) -> Result<Matrix<T>, LaneGradError> {
        assure_value(self)?;
        Ok(self.read_data().value.clone())
    }

    /// The value of a 1x1 node.
    pub fn scalar_value(&self) -> Result<T, LaneGradError> {
        assure_value(self)?;
        self.read_data().value.to_scalar()
    }

    /// Shape of the node's value, evaluating it if needed.
    pub fn shape(&self) -> Result<[usize; 2], LaneGradError> {
        assure_value(self)?;
        Ok(self.read_data().value.shape())
    }
}

/// Runs `f` on the values of two operands, taking a single read lock when
/// both are the same node.
pub(crate) fn with_values<T: Element, R>(
    lhs: &Node<T>,
    rhs: &Node<T>,
    f: impl FnOnce(&Matrix<T>, &Matrix<T>) -> R,
) -> R {
    let l = lhs.read_data();
    if lhs.ptr_eq(rhs) {
        f(&l.value, &l.value)
    } else {
        let r = rhs.read_data();
        f(&l.value, &r.value)
    }
}

/// Computes one node whose operands already hold values.
fn evaluate<T: Element>(node: &Node<T>) -> Result<(), LaneGradError> {
    let (value, new_mask) = {
        let guard = node.read_data();
        compute(&guard.op, &guard.value)?
    };

    let mut guard = node.write_data();
    if let (Some(mask), Op::Dropout { mask: slot, .. }) = (new_mask, &mut guard.op) {
        *slot = mask;
    }
    let [rows, cols] = value.shape();
    guard.grad = Matrix::zeros(rows, cols);
    guard.accum_grad = Matrix::zeros(rows, cols);
    if guard.prev_accum_grad.shape() != [rows, cols] {
        guard.prev_accum_grad = Matrix::zeros(rows, cols);
    }
    guard.value = value;
    guard.has_value = true;
    log::trace!("evaluated node {} ({:?}), shape {}x{}", guard.id, guard.op.mode(), rows, cols);
    Ok(())
}

/// The value of `op` from its operands' values, and the fresh mask of a
/// Dropout node. `own` is the node's current value.
fn compute<T: Element>(op: &Op<T>, own: &Matrix<T>) -> Result<(Matrix<T>, Option<Matrix<T>>), LaneGradError> {
    let value = match op {
        Op::Parameter => own.clone(),
        Op::Add(l, r) => with_values(l, r, |a, b| a.zip_map(b, "add", |x, y| x + y))?,
        Op::Mul(l, r) => with_values(l, r, |a, b| a.matmul(b))?,
        Op::Div(l, r) => {
            let d = {
                let divisor = r.read_data();
                if !divisor.value.is_scalar() {
                    return Err(LaneGradError::DivisorNotScalar {
                        rows: divisor.value.rows(),
                        cols: divisor.value.cols(),
                    });
                }
                divisor.value[(0, 0)]
            };
            l.read_data().value.map(|v| v / d)
        }
        Op::Neg(l) => l.read_data().value.map(|v| -v),
        Op::Dot(l, r) => with_values(l, r, |a, b| a.zip_map(b, "dot", |x, y| x * y))?,
        Op::Func(l, func) => {
            let func = *func;
            l.read_data().value.map(|v| func.apply(v))
        }
        Op::Max(l, r) => with_values(l, r, |a, b| a.zip_map(b, "max", |x, y| x.max_elem(y)))?,
        Op::Sum(l) => Matrix::scalar(l.read_data().value.sum()),
        Op::Slice {
            input,
            row,
            col,
            height,
            width,
        } => input.read_data().value.block(*row, *col, *height, *width)?,
        Op::Flatten(members) => flatten(members),
        Op::LogSoftmax(l) => log_softmax(&l.read_data().value)?,
        Op::Convolution {
            input,
            kernel,
            bias,
            size,
        } => {
            let b = bias.read_data().value.clone();
            with_values(input, kernel, |i, k| convolution(i, k, &b, *size))?
        }
        Op::MaxPool2D { input, size } => max_pool_2d(&input.read_data().value, *size)?,
        Op::Dropout { input, rate, .. } => {
            let input = input.read_data();
            let mask = dropout_mask(input.value.rows(), input.value.cols(), *rate)?;
            let value = input.value.zip_map(&mask, "dropout", |a, m| a * m)?;
            return Ok((value, Some(mask)));
        }
    };
    Ok((value, None))
}

/// Members are laid out one after another, each column by column.
fn flatten<T: Element>(members: &[Node<T>]) -> Matrix<T> {
    let mut data = Vec::new();
    for member in members {
        let guard = member.read_data();
        let v = &guard.value;
        for c in 0..v.cols() {
            for r in 0..v.rows() {
                data.push(v[(r, c)]);
            }
        }
    }
    let len = data.len();
    Matrix::from_fn(len, 1, |r, _| data[r])
}

fn log_softmax<T: Element>(x: &Matrix<T>) -> Result<Matrix<T>, LaneGradError> {
    let max = x.max_coeff().ok_or_else(|| LaneGradError::ShapeMismatch {
        expected: vec![1, 1],
        actual: x.shape().to_vec(),
        operation: "log_softmax".to_string(),
    })?;
    let shifted = x.map(|v| v - max);
    let log_sum = shifted.map(|v| v.exp()).sum().ln();
    Ok(shifted.map(|v| v - log_sum))
}

fn convolution<T: Element>(
    input: &Matrix<T>,
    kernel: &Matrix<T>,
    bias: &Matrix<T>,
    size: usize,
) -> Result<Matrix<T>, LaneGradError> {
    if size == 0 || kernel.shape() != [size, size] {
        return Err(LaneGradError::ShapeMismatch {
            expected: vec![size, size],
            actual: kernel.shape().to_vec(),
            operation: "convolution kernel".to_string(),
        });
    }
    if input.rows() < size || input.cols() < size {
        return Err(LaneGradError::ShapeMismatch {
            expected: vec![size, size],
            actual: input.shape().to_vec(),
            operation: "convolution input".to_string(),
        });
    }
    if !bias.is_scalar() {
        return Err(LaneGradError::ShapeMismatch {
            expected: vec![1, 1],
            actual: bias.shape().to_vec(),
            operation: "convolution bias".to_string(),
        });
    }
    let b = bias[(0, 0)];
    let out_rows = input.rows() - size + 1;
    let out_cols = input.cols() - size + 1;
    Ok(Matrix::from_fn(out_rows, out_cols, |r, c| {
        let mut acc = b;
        for kr in 0..size {
            for kc in 0..size {
                acc += input[(r + kr, c + kc)] * kernel[(kr, kc)];
            }
        }
        acc
    }))
}

/// Start and extent of each pooling window along one axis. The last window
/// is truncated at the edge.
pub(crate) fn pool_windows(len: usize, size: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..len)
        .step_by(size)
        .map(move |start| (start, (start + size).min(len) - start))
}

fn max_pool_2d<T: Element>(input: &Matrix<T>, size: usize) -> Result<Matrix<T>, LaneGradError> {
    if size == 0 {
        return Err(LaneGradError::InvalidArgument(
            "max_pool_2d window size must be positive".to_string(),
        ));
    }
    let out_rows = (input.rows() + size - 1) / size;
    let out_cols = (input.cols() + size - 1) / size;
    let mut out = Matrix::zeros(out_rows, out_cols);
    for (r, height) in pool_windows(input.rows(), size) {
        for (c, width) in pool_windows(input.cols(), size) {
            let window = input.block(r, c, height, width)?;
            out[(r / size, c / size)] = window.max_coeff().unwrap_or_else(T::zero);
        }
    }
    Ok(out)
}

fn dropout_mask<T: Element>(rows: usize, cols: usize, rate: f32) -> Result<Matrix<T>, LaneGradError> {
    if !(0.0..1.0).contains(&rate) {
        return Err(LaneGradError::InvalidArgument(format!(
            "dropout rate must be in [0, 1), got {}",
            rate
        )));
    }
    let scale = 1.0 / (1.0 - rate);
    let mut rng = rand::thread_rng();
    Ok(Matrix::from_fn(rows, cols, |_, _| {
        T::from_lane_fn(|_| if rng.gen::<f32>() >= rate { scale } else { 0.0 })
    }))
}

#[cfg(test)]
#[path = "forward_test.rs"]
mod tests;
