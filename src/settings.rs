use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Word delimiter characters used when none are configured.
pub const DEFAULT_WORD_DELIMITERS: &str =
    " \n,.-!?:;/\"#$%&'()*+<=>@[]\\^_`{|}~\t\x0B\x0C\r";

/// End of sentence characters used when none are configured.
pub const DEFAULT_SENTENCE_DELIMITERS: &str = ".\n?!";

/// Longest sentence handed to the training window; longer runs are split.
pub const MAX_SENTENCE_LENGTH: usize = 1000;

/// Number of entries in the negative-sampling table.
pub const UNIGRAM_TABLE_SIZE: usize = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Architecture {
    /// Continuous bag of words: predict the center word from its averaged context.
    Cbow,
    /// Predict each context word from the center word.
    SkipGram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    HierarchicalSoftmax,
    NegativeSampling { negative: usize },
}

/// Everything a training run needs to know, fixed for the whole run and
/// read concurrently by every worker thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSettings {
    /// Embedding vector length (number of dimensions).
    pub vector_size: usize,

    /// Max skip length between words.
    pub window: usize,

    /// Threshold for occurrence of words. Words that appear with higher
    /// frequency are randomly down-sampled; 0 disables subsampling.
    pub sample: f32,

    pub objective: Objective,
    pub architecture: Architecture,
    pub threads: usize,
    pub iterations: usize,

    /// Words occurring fewer times are discarded from the vocabulary.
    pub min_word_freq: u64,

    /// Starting learning rate.
    pub alpha: f32,

    pub word_delimiters: String,
    pub sentence_delimiters: String,
    pub max_sentence_length: usize,
    pub unigram_table_size: usize,

    /// Seed for weight initialization; worker `i` uses `seed + i + 1`.
    pub seed: u64,
}

impl Default for TrainSettings {
    fn default() -> Self {
        TrainSettings {
            vector_size: 300,
            window: 5,
            sample: 1e-3,
            objective: Objective::NegativeSampling { negative: 5 },
            architecture: Architecture::SkipGram,
            threads: 12,
            iterations: 5,
            min_word_freq: 5,
            alpha: 0.05,
            word_delimiters: DEFAULT_WORD_DELIMITERS.to_string(),
            sentence_delimiters: DEFAULT_SENTENCE_DELIMITERS.to_string(),
            max_sentence_length: MAX_SENTENCE_LENGTH,
            unigram_table_size: UNIGRAM_TABLE_SIZE,
            seed: 1,
        }
    }
}

impl TrainSettings {
    pub fn validate(&self) -> Result<()> {
        if self.vector_size == 0 {
            return Err(Error::config("vector size must be greater than 0"));
        }
        if self.threads == 0 {
            return Err(Error::config("at least one training thread is required"));
        }
        if self.window == 0 {
            return Err(Error::config("window must be greater than 0"));
        }
        if self.iterations == 0 {
            return Err(Error::config("at least one training iteration is required"));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(Error::config(format!(
                "learning rate must be positive, got {}",
                self.alpha
            )));
        }
        if !(self.sample.is_finite() && self.sample >= 0.0) {
            return Err(Error::config(format!(
                "sample threshold must be non-negative, got {}",
                self.sample
            )));
        }
        if self.max_sentence_length == 0 {
            return Err(Error::config("max sentence length must be greater than 0"));
        }
        if self.word_delimiters.is_empty() && self.sentence_delimiters.is_empty() {
            return Err(Error::config("no word or sentence delimiter characters"));
        }
        if let Objective::NegativeSampling { negative } = self.objective {
            if negative == 0 {
                return Err(Error::config(
                    "negative sampling needs at least one negative example",
                ));
            }
            if self.unigram_table_size == 0 {
                return Err(Error::config("unigram table size must be greater than 0"));
            }
        }
        Ok(())
    }
}
