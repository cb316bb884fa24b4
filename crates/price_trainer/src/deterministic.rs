//! Seeded shuffling and holdout splits
//!
//! Uses a glibc-compatible LCG so a given seed yields the same order on
//! every platform and run.

use std::num::Wrapping;

/// Linear Congruential Generator for deterministic pseudo-randomness
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<i64>,
}

impl LcgRng {
    const MULTIPLIER: i64 = 1103515245;
    const INCREMENT: i64 = 12345;
    const MODULUS: i64 = 1 << 31;

    pub fn new(seed: u64) -> Self {
        Self {
            state: Wrapping((seed % Self::MODULUS as u64) as i64),
        }
    }

    /// Next value in `[0, 2^31)`
    pub fn next_i64(&mut self) -> i64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        self.state.0 & (Self::MODULUS - 1)
    }

    /// Next value in `[0, max)`; 0 when `max` is 0
    pub fn next_index(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        (self.next_i64() as u64 % max as u64) as usize
    }
}

/// Fisher-Yates shuffle driven by `LcgRng`
pub fn shuffle<T>(items: &mut [T], seed: u64) {
    let mut rng = LcgRng::new(seed);
    for i in (1..items.len()).rev() {
        let j = rng.next_index(i + 1);
        items.swap(i, j);
    }
}

/// Shuffle, then move the last `ratio` share of items into a holdout set.
///
/// A ratio of 0 keeps everything for training. At least one item always
/// stays in the training set.
pub fn holdout_split<T>(mut items: Vec<T>, ratio: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    if ratio <= 0.0 || items.len() < 2 {
        return (items, Vec::new());
    }

    shuffle(&mut items, seed);
    let holdout = ((items.len() as f64 * ratio).round() as usize).clamp(1, items.len() - 1);
    let test = items.split_off(items.len() - holdout);
    (items, test)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_determinism() {
        let mut rng1 = LcgRng::new(42);
        let mut rng2 = LcgRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_i64(), rng2.next_i64());
        }
    }

    #[test]
    fn test_lcg_range() {
        let mut rng = LcgRng::new(7);
        for _ in 0..100 {
            assert!(rng.next_index(10) < 10);
        }
        assert_eq!(rng.next_index(0), 0);
    }

    #[test]
    fn test_shuffle_is_a_seeded_permutation() {
        let mut a: Vec<u32> = (0..50).collect();
        let mut b = a.clone();
        shuffle(&mut a, 42);
        shuffle(&mut b, 42);
        assert_eq!(a, b);
        assert_ne!(a, (0..50).collect::<Vec<_>>());

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_holdout_split_sizes() {
        let (train, test) = holdout_split((0..100).collect::<Vec<u32>>(), 0.2, 42);
        assert_eq!(train.len(), 80);
        assert_eq!(test.len(), 20);

        let (train, test) = holdout_split(vec![1, 2, 3], 0.0, 42);
        assert_eq!(train, vec![1, 2, 3]);
        assert!(test.is_empty());

        let (train, test) = holdout_split(vec![1, 2], 0.99, 42);
        assert_eq!((train.len(), test.len()), (1, 1));
    }
}
