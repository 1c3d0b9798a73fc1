use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded draw source shared by every shuffle pass.
///
/// All passes draw from one stream, so the order in which they call
/// `next_int`/`shuffle`/`pick` is part of the output: the same seed and flags
/// must always produce the same sequence of calls.
pub struct Random {
    rng: ChaCha8Rng,
}

impl Random {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Uniform integer in `0..n`. Returns 0 for `n == 0` without drawing.
    pub fn next_int(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        self.rng.gen_range(0..n)
    }

    /// In-place Fisher-Yates, walking from the back. Draws `len - 1` times.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        let mut i = items.len();
        while i > 1 {
            let j = self.next_int(i);
            i -= 1;
            if i != j {
                items.swap(i, j);
            }
        }
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.next_int(items.len());
        items.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::Random;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Random::new(42);
        let mut b = Random::new(42);
        let xs: Vec<usize> = (0..32).map(|_| a.next_int(1000)).collect();
        let ys: Vec<usize> = (0..32).map(|_| b.next_int(1000)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut random = Random::new(7);
        let mut items: Vec<u8> = (0..50).collect();
        random.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<u8>>());
    }

    #[test]
    fn pick_on_empty_is_none() {
        let mut random = Random::new(1);
        let empty: [u8; 0] = [];
        assert!(random.pick(&empty).is_none());
        assert_eq!(random.pick(&[9u8]), Some(&9));
    }

    #[test]
    fn next_int_zero_does_not_panic() {
        let mut random = Random::new(3);
        assert_eq!(random.next_int(0), 0);
    }
}
