use crate::error::LaneGradError;
use crate::node::Node;
use approx::relative_eq;
use thiserror::Error;

/// Error type for gradient checking failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error("Gradient check failed for input {input_index}, element {element_index}: analytical {analytical_grad} != numerical {numerical_grad} (difference {difference})")]
    GradientMismatch {
        input_index: usize,
        element_index: usize,
        analytical_grad: f64,
        numerical_grad: f64,
        difference: f64,
    },

    #[error("Gradient check input {input_index} must be a Parameter node")]
    InputNotParameter { input_index: usize },

    #[error("Numerical gradient is NaN or infinite for input {input_index}, element {element_index} (loss+ {loss_plus}, loss- {loss_minus})")]
    NumericalGradNaNOrInfinite {
        input_index: usize,
        element_index: usize,
        loss_plus: f64,
        loss_minus: f64,
    },

    #[error("Analytical gradient is NaN or infinite for input {input_index}, element {element_index}: {value}")]
    AnalyticalGradNaNOrInfinite {
        input_index: usize,
        element_index: usize,
        value: f64,
    },

    #[error("Forward evaluation failed during gradient check: {0}")]
    ForwardPassError(LaneGradError),

    #[error("Backward pass failed during gradient check: {0}")]
    BackwardPassError(LaneGradError),

    #[error("Graph error during gradient check: {0}")]
    GraphError(LaneGradError),
}

impl From<LaneGradError> for GradCheckError {
    fn from(err: LaneGradError) -> Self {
        GradCheckError::GraphError(err)
    }
}

/// Compares analytical gradients against central finite differences.
///
/// `func` builds a graph from `inputs` (all Parameter nodes); the sum of its
/// output is the loss being differentiated. Every element of every input is
/// perturbed by `±epsilon` in place and restored afterwards. An element fails
/// when the absolute and the relative difference both exceed `tolerance`.
pub fn check_grad<F>(func: F, inputs: &[Node<f32>], epsilon: f32, tolerance: f64) -> Result<(), GradCheckError>
where
    F: Fn(&[Node<f32>]) -> Node<f32>,
{
    for (i, input) in inputs.iter().enumerate() {
        if !input.is_parameter() {
            return Err(GradCheckError::InputNotParameter { input_index: i });
        }
    }

    let loss = func(inputs).sum();
    let topo = loss.topological_order();
    topo.zero_grad();
    loss.backward_with(&topo).map_err(GradCheckError::BackwardPassError)?;
    let analytical: Vec<Vec<f64>> = inputs
        .iter()
        .map(|input| input.grad().as_slice().iter().map(|g| *g as f64).collect())
        .collect();

    let eval_loss = || -> Result<f64, GradCheckError> {
        topo.zero_grad();
        let v = loss.scalar_value().map_err(GradCheckError::ForwardPassError)?;
        Ok(v as f64)
    };

    for (i, input) in inputs.iter().enumerate() {
        let original = input.value()?;
        let cols = original.cols();
        for (k, &x) in original.as_slice().iter().enumerate() {
            let (row, col) = (k / cols, k % cols);

            input.set_element(row, col, x + epsilon)?;
            let loss_plus = eval_loss()?;
            input.set_element(row, col, x - epsilon)?;
            let loss_minus = eval_loss()?;
            input.set_element(row, col, x)?;

            let numerical_grad = (loss_plus - loss_minus) / (2.0 * epsilon as f64);
            let analytical_grad = analytical[i][k];

            if !numerical_grad.is_finite() {
                return Err(GradCheckError::NumericalGradNaNOrInfinite {
                    input_index: i,
                    element_index: k,
                    loss_plus,
                    loss_minus,
                });
            }
            if !analytical_grad.is_finite() {
                return Err(GradCheckError::AnalyticalGradNaNOrInfinite {
                    input_index: i,
                    element_index: k,
                    value: analytical_grad,
                });
            }

            if !relative_eq!(
                analytical_grad,
                numerical_grad,
                epsilon = tolerance,
                max_relative = tolerance
            ) {
                return Err(GradCheckError::GradientMismatch {
                    input_index: i,
                    element_index: k,
                    analytical_grad,
                    numerical_grad,
                    difference: (analytical_grad - numerical_grad).abs(),
                });
            }
        }
    }

    topo.zero_grad();
    Ok(())
}

#[cfg(test)]
#[path = "grad_check_test.rs"]
mod tests;
