use std::fmt::Debug;

/// Decides the order in which the examples of one epoch are handed out.
///
/// A [`crate::BatchQueue`] is filled from a sampler once per epoch.
pub trait Sampler: Debug + Send + Sync {
    /// Every index of one epoch over `dataset_len` examples, in order.
    fn indices(&self, dataset_len: usize) -> Vec<usize>;

    /// Number of indices [`Sampler::indices`] yields for `dataset_len`.
    fn len(&self, dataset_len: usize) -> usize {
        dataset_len
    }
}
