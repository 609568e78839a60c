use super::*;
use std::collections::HashSet;

#[test]
fn test_random_sampler_len() {
    assert_eq!(RandomSampler::new().len(10), 10);
}

#[test]
fn test_random_sampler_is_a_permutation() {
    let dataset_len = 50;
    let indices = RandomSampler::new().indices(dataset_len);
    assert_eq!(indices.len(), dataset_len);
    let unique: HashSet<usize> = indices.iter().copied().collect();
    assert_eq!(unique.len(), dataset_len);
    assert!(indices.iter().all(|&i| i < dataset_len));
}

#[test]
fn test_random_sampler_seed_is_reproducible() {
    let a = RandomSampler::with_seed(42).indices(100);
    let b = RandomSampler::with_seed(42).indices(100);
    assert_eq!(a, b);
    // 100 elements staying in order by chance is negligible
    assert_ne!(a, (0..100).collect::<Vec<_>>());
}

#[test]
fn test_random_sampler_empty_dataset() {
    assert!(RandomSampler::with_seed(1).indices(0).is_empty());
}
