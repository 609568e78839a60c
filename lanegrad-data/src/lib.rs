//! Feeding examples to lanegrad training workers.
//!
//! A [`Sampler`] orders the examples of an epoch and a [`BatchQueue`] hands
//! them out to any number of worker threads, each evaluating its own copy of
//! a compiled program.

pub mod batch_queue;
pub mod samplers;

pub use batch_queue::BatchQueue;
pub use samplers::{RandomSampler, Sampler, SequentialSampler};
