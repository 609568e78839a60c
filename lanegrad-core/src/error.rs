use thiserror::Error;

/// Custom error type for the lanegrad engine.
///
/// Every variant describes a programmer error (a graph that cannot be evaluated,
/// a projection used against the wrong program, a write to a computed node).
/// None of them are meant to be recovered from; callers that want abort
/// semantics `expect()` at their own boundary.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum LaneGradError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Division is only defined by a 1x1 value, divisor is {rows}x{cols}")]
    DivisorNotScalar { rows: usize, cols: usize },

    #[error("Slice of {height}x{width} at ({row}, {col}) does not fit in a {rows}x{cols} value")]
    SliceOutOfBounds {
        row: usize,
        col: usize,
        height: usize,
        width: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Index out of bounds: index {index:?} for shape {shape:?}")]
    IndexOutOfBounds {
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    #[error("Matrix creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Operation '{operation}' requires a Parameter node")]
    NotAParameter { operation: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Projection does not match program: expected {expected}, got {actual}")]
    ProjectionMismatch { expected: String, actual: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cannot evaluate an empty graph or program")]
    EmptyGraph,
}
