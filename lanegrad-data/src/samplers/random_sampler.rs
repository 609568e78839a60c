use super::traits::Sampler;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Hands out every example once per epoch, in shuffled order.
#[derive(Debug, Clone, Default)]
pub struct RandomSampler {
    seed: Option<u64>,
}

impl RandomSampler {
    /// A sampler drawing a fresh permutation from the thread rng every epoch.
    pub fn new() -> Self {
        RandomSampler { seed: None }
    }

    /// A sampler whose permutation depends only on `seed`.
    pub fn with_seed(seed: u64) -> Self {
        RandomSampler { seed: Some(seed) }
    }
}

impl Sampler for RandomSampler {
    fn indices(&self, dataset_len: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..dataset_len).collect();
        match self.seed {
            Some(seed) => indices.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => indices.shuffle(&mut rand::thread_rng()),
        }
        indices
    }
}

#[cfg(test)]
#[path = "random_sampler_test.rs"]
mod tests;
