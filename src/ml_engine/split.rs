//! Seeded train/test partitioning

use crate::types::evaluation_defaults;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Share of eligible rows held out for testing, in (0, 1).
    pub test_fraction: f64,
    pub seed: u64,
    /// Fewer eligible rows than this is an insufficient-data error.
    pub min_rows: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: evaluation_defaults::TEST_FRACTION,
            seed: evaluation_defaults::SPLIT_SEED,
            min_rows: evaluation_defaults::MIN_ROWS,
        }
    }
}

/// Row positions assigned to each side of a split; disjoint, each sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Number of held-out rows for `n` eligible rows.
///
/// Both sides always receive at least one row when `n >= 2`.
pub fn test_size(n: usize, test_fraction: f64) -> usize {
    if n < 2 {
        return 0;
    }
    let raw = (n as f64 * test_fraction).round() as usize;
    raw.clamp(1, n - 1)
}

/// Shuffle `candidates` with a seeded generator and cut off the test share.
///
/// The same candidates, fraction and seed always produce the same partition.
pub fn split_indices(candidates: &[usize], config: &SplitConfig) -> Partition {
    let mut shuffled = candidates.to_vec();
    let mut rng = StdRng::seed_from_u64(config.seed);
    shuffled.shuffle(&mut rng);

    let n_test = test_size(shuffled.len(), config.test_fraction);
    let mut train = shuffled.split_off(n_test);
    let mut test = shuffled;
    train.sort_unstable();
    test.sort_unstable();
    Partition { train, test }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_split_is_reproducible() {
        let candidates: Vec<usize> = (0..500).collect();
        let config = SplitConfig::default();
        assert_eq!(
            split_indices(&candidates, &config),
            split_indices(&candidates, &config)
        );

        let other = SplitConfig { seed: 7, ..config };
        assert_ne!(
            split_indices(&candidates, &config).test,
            split_indices(&candidates, &other).test
        );
    }

    #[test]
    fn test_partitions_are_disjoint_and_cover() {
        let candidates: Vec<usize> = (0..250).map(|i| i * 3).collect();
        let p = split_indices(&candidates, &SplitConfig::default());
        assert_eq!(p.test.len(), 50);
        assert_eq!(p.train.len(), 200);

        let train: HashSet<_> = p.train.iter().collect();
        assert!(p.test.iter().all(|i| !train.contains(i)));
        let mut all: Vec<usize> = p.train.iter().chain(&p.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, candidates);
    }

    #[test]
    fn test_size_clamps_to_non_empty_sides() {
        assert_eq!(test_size(2, 0.01), 1);
        assert_eq!(test_size(2, 0.99), 1);
        assert_eq!(test_size(10, 0.25), 3);
        assert_eq!(test_size(1, 0.5), 0);
    }
}
