//! Flat, re-evaluable encodings of scalar graphs.
//!
//! [`program::compile`] turns a topological order of 1x1 nodes into a
//! [`Program`]: one work item per node, operands addressed by index. The
//! [`projection`] module then feeds structured blocks into an existing
//! program and reads results and gradients back out.

pub mod program;
pub mod projection;

pub use program::{compile, DynEntry, Opcode, Program, WorkItem, UNUSED};
pub use projection::{
    make_projection, proj_back, proj_back_grad, proj_forward, proj_forward_splat, Projection,
};
