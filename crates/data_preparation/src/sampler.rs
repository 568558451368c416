use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

/// A `Sampler` decides the order in which a class pool is consumed by the split.
///
/// The split pops samples off the end of each pool, so the order returned here
/// determines which physical samples land in test, train and valid.
///
/// # Method
/// - `order(pool_size, class_id)`: a permutation of `0..pool_size`.
///    - `class_id` lets seeded samplers derive a distinct, reproducible order per
///      class from one base seed.
pub trait Sampler: Send + Sync {
    fn order(&self, pool_size: usize, class_id: usize) -> Vec<usize>;
}

/// Picks the sampler for an optional `shuffle_seed`: stable order when absent.
pub fn from_seed(seed: Option<u64>) -> Box<dyn Sampler> {
    match seed {
        Some(seed) => Box::new(RandomSampler::new(seed)),
        None => Box::new(SequentialSampler),
    }
}

/// ============================================================================
/// Keeps pool insertion order `(0, 1, 2, ..., pool_size - 1)`.
///
/// # Examples
/// ```ignore
/// let indices = SequentialSampler.order(5, 0);
/// assert_eq!(indices, vec![0, 1, 2, 3, 4]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialSampler;

impl Sampler for SequentialSampler {
    fn order(&self, pool_size: usize, _class_id: usize) -> Vec<usize> {
        (0..pool_size).collect()
    }
}

/// ============================================================================
/// Shuffles each pool with an RNG derived as `base_seed + class_id`.
///
/// # Seed Handling
/// - Fixed seed -> identical split every run
/// - Per-class derivation -> two pools of equal size are not shuffled identically
#[derive(Debug, Clone, Copy)]
pub struct RandomSampler {
    base_seed: u64,
}

impl RandomSampler {
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed }
    }

    #[inline]
    fn derive_rng_for_class(&self, class_id: usize) -> StdRng {
        StdRng::seed_from_u64(self.base_seed.wrapping_add(class_id as u64))
    }
}

impl Sampler for RandomSampler {
    fn order(&self, pool_size: usize, class_id: usize) -> Vec<usize> {
        let mut rng = self.derive_rng_for_class(class_id);
        let mut shuffled: Vec<usize> = (0..pool_size).collect();
        shuffled.shuffle(&mut rng);
        shuffled
    }
}
