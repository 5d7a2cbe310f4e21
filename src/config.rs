//! Training configuration files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::settings::{
    Architecture, Objective, TrainSettings, DEFAULT_SENTENCE_DELIMITERS, DEFAULT_WORD_DELIMITERS,
};

/// Configuration file with every option at its default, as printed by
/// `w2v config`.
pub const DEFAULT_CONFIG: &str = r##"##
## word2vec configuration

##
## Corpus
[corpus]
## These words will be excluded from the training vocabulary.
## Stop-words are separated by whitespace or any word delimiter char (see below).
# stopwords = "./path-to/stopwords.txt"

##
## Word delimiter chars
tokenizer = " \n,.-!?:;/\"#$%&'()*+<=>@[]\\^_`{|}~\t\u000B\f\r"

##
## End of sentence chars
sequencer = ".\n?!"

##
## Word vectors
[word]
## Vector dimension.
## Large vectors are usually better, but they require more training data.
vector = 300

##
## Nearby words window: up to [value] words behind and [value] words ahead
## of each word are used to train it.
window = 5

##
## Threshold for occurrence of words. Words with higher frequency in the
## training data are randomly down-sampled; 0 disables down-sampling.
threshold = 1e-3

##
## Words that appear less than [value] times are left out of the vocabulary.
frequency = 5

##
## Learning parameters
[learning]
## Number of passes over the corpus.
## Training time grows linearly with the number of passes.
epoch = 5

##
## Starting learning rate
rate = 0.05

##
## Skip-gram: predict the nearby words from each word
[skip-gram]
enabled = true

##
## Continuous bag of words: predict each word from its nearby words
[cbow]
enabled = false

##
## Negative sampling
[negative-sampling]
enabled = true

## Number of negative examples per word.
## Values in [5, 20] suit small training sets; large ones can use [2, 5].
size = 5

##
## Hierarchical softmax
[hierarchical-softmax]
enabled = false
"##;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct TrainConfig {
    pub corpus: CorpusConfig,
    pub word: WordConfig,
    pub learning: LearningConfig,
    pub skip_gram: Switch,
    pub cbow: Switch,
    pub negative_sampling: NegativeSamplingConfig,
    pub hierarchical_softmax: Switch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorpusConfig {
    pub stopwords: Option<PathBuf>,
    pub tokenizer: String,
    pub sequencer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WordConfig {
    pub vector: usize,
    pub window: usize,
    pub threshold: f32,
    pub frequency: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LearningConfig {
    pub epoch: usize,
    pub rate: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Switch {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NegativeSamplingConfig {
    pub enabled: bool,
    pub size: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            corpus: CorpusConfig::default(),
            word: WordConfig::default(),
            learning: LearningConfig::default(),
            skip_gram: Switch { enabled: true },
            cbow: Switch { enabled: false },
            negative_sampling: NegativeSamplingConfig::default(),
            hierarchical_softmax: Switch { enabled: false },
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        CorpusConfig {
            stopwords: None,
            tokenizer: DEFAULT_WORD_DELIMITERS.to_string(),
            sequencer: DEFAULT_SENTENCE_DELIMITERS.to_string(),
        }
    }
}

impl Default for WordConfig {
    fn default() -> Self {
        let settings = TrainSettings::default();
        WordConfig {
            vector: settings.vector_size,
            window: settings.window,
            threshold: settings.sample,
            frequency: settings.min_word_freq,
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        let settings = TrainSettings::default();
        LearningConfig {
            epoch: settings.iterations,
            rate: settings.alpha,
        }
    }
}

impl Default for NegativeSamplingConfig {
    fn default() -> Self {
        NegativeSamplingConfig {
            enabled: true,
            size: 5,
        }
    }
}

impl TrainConfig {
    /// Read a TOML configuration file. Missing sections and keys take their
    /// defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        content.parse().map_err(|err: Error| match err {
            Error::Config(msg) => Error::config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn stop_words(&self) -> Option<&Path> {
        self.corpus.stopwords.as_deref()
    }

    /// The training settings this file describes.
    ///
    /// Exactly one of skip-gram and CBOW, and exactly one of negative sampling
    /// and hierarchical softmax, must be enabled.
    pub fn to_settings(&self) -> Result<TrainSettings> {
        let architecture = match (self.skip_gram.enabled, self.cbow.enabled) {
            (true, false) => Architecture::SkipGram,
            (false, true) => Architecture::Cbow,
            (true, true) => {
                return Err(Error::config("skip-gram and cbow cannot both be enabled"))
            }
            (false, false) => return Err(Error::config("enable one of skip-gram and cbow")),
        };
        let objective = match (
            self.negative_sampling.enabled,
            self.hierarchical_softmax.enabled,
        ) {
            (true, false) => Objective::NegativeSampling {
                negative: self.negative_sampling.size,
            },
            (false, true) => Objective::HierarchicalSoftmax,
            (true, true) => {
                return Err(Error::config(
                    "negative-sampling and hierarchical-softmax cannot both be enabled",
                ))
            }
            (false, false) => {
                return Err(Error::config(
                    "enable one of negative-sampling and hierarchical-softmax",
                ))
            }
        };

        let settings = TrainSettings {
            vector_size: self.word.vector,
            window: self.word.window,
            sample: self.word.threshold,
            min_word_freq: self.word.frequency,
            iterations: self.learning.epoch,
            alpha: self.learning.rate,
            word_delimiters: self.corpus.tokenizer.clone(),
            sentence_delimiters: self.corpus.sequencer.clone(),
            architecture,
            objective,
            ..TrainSettings::default()
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl std::str::FromStr for TrainConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|err| Error::config(err.to_string()))
    }
}
