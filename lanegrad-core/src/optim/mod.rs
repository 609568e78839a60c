//! Parameter update rules.
//!
//! This module provides the `Optimizer` trait and the momentum SGD learning
//! step applied to accumulated batch gradients.

pub mod optimizer_trait;
pub mod sgd;

pub use optimizer_trait::Optimizer;
pub use sgd::{SgdConfig, SgdOptimizer};
