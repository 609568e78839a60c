use crate::samplers::Sampler;
use lanegrad_core::LaneGradError;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Example indices shared by the workers of one training loop.
///
/// Workers call [`BatchQueue::get_batch`] concurrently; every index filled in
/// is handed out exactly once. The mutex around the pending indices is the
/// only point where workers wait on each other.
#[derive(Debug)]
pub struct BatchQueue {
    pending: Mutex<VecDeque<usize>>,
}

impl BatchQueue {
    /// A queue holding one epoch of `dataset_len` examples, ordered by `sampler`.
    pub fn new(sampler: &dyn Sampler, dataset_len: usize) -> Self {
        BatchQueue::from_indices(sampler.indices(dataset_len))
    }

    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        BatchQueue {
            pending: Mutex::new(indices.into_iter().collect()),
        }
    }

    /// Pops up to `n` indices. Near the end of the epoch fewer are returned,
    /// and none once the queue is exhausted.
    pub fn get_batch(&self, n: usize) -> Result<Vec<usize>, LaneGradError> {
        if n == 0 {
            return Err(LaneGradError::InvalidArgument(
                "batch size must be at least 1".to_string(),
            ));
        }
        let mut pending = self.pending.lock().expect("BatchQueue mutex poisoned");
        let take = n.min(pending.len());
        let batch: Vec<usize> = pending.drain(..take).collect();
        log::trace!("handed out {} indices, {} left", batch.len(), pending.len());
        Ok(batch)
    }

    /// Appends another epoch ordered by `sampler`.
    pub fn refill(&self, sampler: &dyn Sampler, dataset_len: usize) {
        let mut pending = self.pending.lock().expect("BatchQueue mutex poisoned");
        pending.extend(sampler.indices(dataset_len));
        log::debug!("queue refilled to {} indices", pending.len());
    }

    pub fn remaining(&self) -> usize {
        self.pending.lock().expect("BatchQueue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
#[path = "batch_queue_test.rs"]
mod tests;
