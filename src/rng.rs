/// The linear congruential generator word2vec has always used.
///
/// Every source of randomness in training (initial weights, window radius,
/// subsampling, negative draws) comes from one of these, seeded from
/// `TrainSettings::seed`, so a single-threaded run is reproducible.
#[derive(Debug, Clone)]
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Rng(seed)
    }

    pub fn rand_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(25214903917).wrapping_add(11);
        self.0
    }

    /// Get a uniformly distributed random number in `0.0 .. 1.0`.
    pub fn rand_real(&mut self) -> f32 {
        (self.rand_u64() & 0xFFFF) as f32 / 65536.0
    }

    /// Uniform draw from `1..=max`. `max` must be nonzero.
    pub fn radius(&mut self, max: usize) -> usize {
        max - self.rand_u64() as usize % max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Rng::new(42);
        let mut b = Rng::new(42);
        for _ in 0..100 {
            assert_eq!(a.rand_u64(), b.rand_u64());
        }
    }

    #[test]
    fn radius_covers_one_through_max() {
        let mut rng = Rng::new(7);
        let mut seen = [false; 6];
        for _ in 0..1000 {
            let r = rng.radius(5);
            assert!((1..=5).contains(&r));
            seen[r] = true;
        }
        assert!(seen[1..].iter().all(|&s| s));
    }

    #[test]
    fn reals_are_in_unit_interval() {
        let mut rng = Rng::new(1);
        for _ in 0..1000 {
            let x = rng.rand_real();
            assert!((0.0..1.0).contains(&x));
        }
    }
}
