//! Thread-safe randomness source for reviewer selection
//!
//! A single [`SafeRandom`] is shared by every operation of a
//! [`ReviewEngine`](crate::engine::ReviewEngine). The generator state lives
//! behind a mutex that is held for exactly one draw, so concurrent callers
//! never corrupt it and never hold it across an await point.
//!
//! Production engines seed from OS entropy; tests seed explicitly with
//! [`SafeRandom::with_seed`] to get reproducible selections.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::{Mutex, MutexGuard};

/// Mutex-guarded ChaCha8 generator
#[derive(Debug)]
pub struct SafeRandom {
    rng: Mutex<ChaCha8Rng>,
}

impl SafeRandom {
    /// Create a generator seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
        }
    }

    /// Create a deterministic generator
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Create from an optional seed, falling back to entropy
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::new, Self::with_seed)
    }

    /// Uniform index in `0..upper`. `upper` must be non-zero.
    fn index(&self, upper: usize) -> usize {
        self.lock().gen_range(0..upper)
    }

    fn lock(&self) -> MutexGuard<'_, ChaCha8Rng> {
        // A panic mid-draw cannot leave the generator in an invalid state.
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Draw up to `limit` distinct ids uniformly without replacement
    ///
    /// When the pool holds no more than `limit` ids the whole pool is
    /// returned. Otherwise ids are removed one at a time from a shrinking
    /// working copy.
    pub fn pick(&self, pool: &[String], limit: usize) -> Vec<String> {
        if limit == 0 || pool.is_empty() {
            return Vec::new();
        }
        if pool.len() <= limit {
            return pool.to_vec();
        }

        let mut remaining = pool.to_vec();
        let mut selected = Vec::with_capacity(limit);
        while selected.len() < limit {
            let idx = self.index(remaining.len());
            selected.push(remaining.remove(idx));
        }
        selected
    }

    /// Draw a single id uniformly, or `None` for an empty pool
    pub fn pick_one(&self, pool: &[String]) -> Option<String> {
        if pool.is_empty() {
            return None;
        }
        Some(pool[self.index(pool.len())].clone())
    }
}

impl Default for SafeRandom {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("u{i}")).collect()
    }

    #[test]
    fn test_small_pool_returned_whole() {
        let random = SafeRandom::with_seed(7);
        let pool = ids(2);
        let picked = random.pick(&pool, 2);
        assert_eq!(picked, pool);

        let picked = random.pick(&ids(1), 2);
        assert_eq!(picked, vec!["u1".to_string()]);
    }

    #[test]
    fn test_empty_pool_and_zero_limit() {
        let random = SafeRandom::with_seed(7);
        assert!(random.pick(&[], 2).is_empty());
        assert!(random.pick(&ids(3), 0).is_empty());
        assert!(random.pick_one(&[]).is_none());
    }

    #[test]
    fn test_same_seed_same_selection() {
        let pool = ids(10);
        let a = SafeRandom::with_seed(42).pick(&pool, 2);
        let b = SafeRandom::with_seed(42).pick(&pool, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn test_every_member_eventually_selected() {
        let random = SafeRandom::with_seed(1);
        let pool = ids(4);
        let mut seen = HashSet::new();
        for _ in 0..200 {
            for id in random.pick(&pool, 2) {
                seen.insert(id);
            }
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_concurrent_draws() {
        let random = Arc::new(SafeRandom::with_seed(3));
        let pool = ids(6);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let random = Arc::clone(&random);
                let pool = pool.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| random.pick(&pool, 2))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            for picked in handle.join().unwrap() {
                assert_eq!(picked.len(), 2);
                assert_ne!(picked[0], picked[1]);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_pick_is_distinct_subset(size in 0usize..12, limit in 0usize..5, seed in any::<u64>()) {
            let random = SafeRandom::with_seed(seed);
            let pool = ids(size);
            let picked = random.pick(&pool, limit);

            prop_assert_eq!(picked.len(), size.min(limit));
            let unique: HashSet<_> = picked.iter().collect();
            prop_assert_eq!(unique.len(), picked.len());
            prop_assert!(picked.iter().all(|id| pool.contains(id)));
        }

        #[test]
        fn prop_pick_one_is_member(size in 1usize..12, seed in any::<u64>()) {
            let random = SafeRandom::with_seed(seed);
            let pool = ids(size);
            let picked = random.pick_one(&pool).unwrap();
            prop_assert!(pool.contains(&picked));
        }
    }
}
