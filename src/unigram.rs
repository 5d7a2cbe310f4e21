//! Table for drawing negative samples.

use crate::rng::Rng;

const POWER: f64 = 0.75;

/// Maps a uniform random index to a word id, so that word `i` is drawn with
/// probability proportional to `count[i]^0.75`.
#[derive(Debug)]
pub struct UnigramTable {
    table: Vec<u32>,
}

impl UnigramTable {
    /// # Panics
    ///
    /// If `counts` is empty. [`Vocabulary`](crate::vocab::Vocabulary) never
    /// is, so tables built from one are always valid.
    pub fn new(counts: &[u64], table_size: usize) -> Self {
        assert!(!counts.is_empty(), "unigram table over an empty vocabulary");
        let train_words_pow = counts
            .iter()
            .map(|&c| (c as f64).powf(POWER))
            .sum::<f64>();

        let last = counts.len() - 1;
        let mut table = Vec::with_capacity(table_size);
        let mut i = 0;
        let mut d1 = (counts[i] as f64).powf(POWER) / train_words_pow;
        for a in 0..table_size {
            table.push(i as u32);
            if (a as f64 / table_size as f64) > d1 && i < last {
                i += 1;
                d1 += (counts[i] as f64).powf(POWER) / train_words_pow;
            }
        }
        UnigramTable { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn sample(&self, rng: &mut Rng) -> usize {
        let r = rng.rand_u64();
        self.table[(r >> 16) as usize % self.table.len()] as usize
    }
}
