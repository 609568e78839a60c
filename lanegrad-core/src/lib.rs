//! Reverse-mode automatic differentiation over an expression graph.
//!
//! Graphs are built from [`Node`]s with ordinary operators, evaluated lazily
//! with memoization, and differentiated by a reverse pass over their
//! topological order. Graphs of 1x1 nodes can also be compiled into a flat
//! [`Program`] that is re-evaluated without touching the nodes, and converted
//! to a SIMD lane type such as [`F32x8`] to process one example per lane.

pub mod array;
pub mod autograd;
pub mod compile;
pub mod element;
pub mod error;
pub mod func;
pub mod matrix;
pub mod node;
pub mod optim;
pub mod simd;
pub mod utils;

pub use array::NodeArray;
pub use autograd::{assure_value, build_topo, check_grad, GradCheckError, TopoOrder};
pub use compile::{
    compile, make_projection, proj_back, proj_back_grad, proj_forward, proj_forward_splat, Program,
    Projection,
};
pub use element::Element;
pub use error::LaneGradError;
pub use func::UnaryFunc;
pub use matrix::Matrix;
pub use node::{Mode, Node};
pub use optim::{Optimizer, SgdConfig, SgdOptimizer};
pub use simd::{F32x4, F32x8, FVector};

// Re-export traits required by public functions/structs
pub use num_traits;
