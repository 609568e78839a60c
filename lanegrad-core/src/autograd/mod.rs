//! Evaluation and differentiation of the node graph.
//!
//! - [`graph`]: topological ordering of the graph below a root.
//! - [`forward`]: pull-based, memoizing value computation.
//! - [`backward`]: the reverse pass and the local gradient rule of each mode.
//! - [`accumulate`]: invalidation and cross-batch gradient accumulation.
//! - [`grad_check`]: finite-difference verification of the backward rules.

pub mod accumulate;
pub mod backward;
pub mod forward;
pub mod grad_check;
pub mod graph;

pub use forward::assure_value;
pub use grad_check::{check_grad, GradCheckError};
pub use graph::{build_topo, TopoOrder};
