use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::corpus::Corpus;
use crate::error::{Error, Result};
use crate::huffman::{create_binary_tree, HuffmanCode};
use crate::progress::{Progress, VocabularySummary};

/// Report parsing progress every this many sentences.
const PARSING_REPORT_INTERVAL: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabWord {
    pub word: String,
    pub count: u64,
    /// Only present when the vocabulary was built for hierarchical softmax.
    pub huffman: Option<HuffmanCode>,
}

/// The set of words a model knows, with dense ids assigned in order of
/// descending frequency. Immutable once built.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    words: Vec<VocabWord>,
    index: HashMap<String, usize>,
    train_words: u64,
    total_words: u64,
}

impl Vocabulary {
    /// Count every word of the corpus and keep the ones seen at least
    /// `min_word_freq` times.
    ///
    /// Ids follow descending frequency; words with equal counts keep the order
    /// in which they first appear in the corpus.
    pub fn build(corpus: &Corpus, min_word_freq: u64, progress: &mut dyn Progress) -> Result<Self> {
        let mut counts: Vec<(String, u64)> = Vec::with_capacity(1000);
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut total_words = 0u64;

        let mut sentences = corpus.sentences();
        let mut num_sentences = 0usize;
        while let Some(sentence) = sentences.next() {
            for word in sentence {
                total_words += 1;
                match seen.get(word) {
                    Some(&a) => counts[a].1 += 1,
                    None => {
                        seen.insert(word.to_string(), counts.len());
                        counts.push((word.to_string(), 1));
                    }
                }
            }
            num_sentences += 1;
            if num_sentences % PARSING_REPORT_INTERVAL == 0 {
                progress.parsing(percent(sentences.position(), corpus.len()));
            }
        }
        progress.parsing(100.0);

        let mut vocab = Vocabulary::from_counts(counts, min_word_freq)?;
        vocab.total_words = total_words;
        info!(
            vocabulary_size = vocab.len(),
            train_words = vocab.train_words,
            total_words,
            "built vocabulary"
        );
        progress.vocabulary(&vocab.summary());
        Ok(vocab)
    }

    /// Build a vocabulary from `(word, count)` pairs in first-seen order.
    ///
    /// Duplicate words are an error.
    pub fn from_counts(mut counts: Vec<(String, u64)>, min_word_freq: u64) -> Result<Self> {
        let total_words = counts.iter().map(|(_, c)| c).sum();

        // Stable, so ties stay in first-seen order.
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.retain(|(_, count)| *count >= min_word_freq);
        if counts.is_empty() {
            return Err(Error::EmptyVocabulary);
        }

        let mut vocab = Vocabulary::from_ordered(counts)?;
        vocab.total_words = total_words;
        Ok(vocab)
    }

    /// Rebuild a vocabulary whose ids are the positions in `entries`.
    pub(crate) fn from_ordered(entries: Vec<(String, u64)>) -> Result<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        let mut words = Vec::with_capacity(entries.len());
        let mut train_words = 0;
        for (word, count) in entries {
            if index.insert(word.clone(), words.len()).is_some() {
                return Err(Error::Format(format!("duplicate word {word:?} in vocabulary")));
            }
            train_words += count;
            words.push(VocabWord {
                word,
                count,
                huffman: None,
            });
        }

        Ok(Vocabulary {
            words,
            index,
            train_words,
            total_words: train_words,
        })
    }

    /// Attach Huffman codes for hierarchical softmax.
    pub(crate) fn assign_codes(&mut self) {
        let counts: Vec<u64> = self.words.iter().map(|vw| vw.count).collect();
        for (vw, code) in self.words.iter_mut().zip(create_binary_tree(&counts)) {
            vw.huffman = Some(code);
        }
    }

    /// Returns position of a word in the vocabulary; if the word is not found, returns None.
    pub fn search(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    /// Get the entry for a word id. Panics if `id` is out of range.
    pub fn get(&self, id: usize) -> &VocabWord {
        &self.words[id]
    }

    pub fn word(&self, id: usize) -> &str {
        &self.words[id].word
    }

    pub fn count(&self, id: usize) -> u64 {
        self.words[id].count
    }

    pub fn counts(&self) -> Vec<u64> {
        self.words.iter().map(|vw| vw.count).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VocabWord> {
        self.words.iter()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Occurrences of all kept words.
    pub fn train_words(&self) -> u64 {
        self.train_words
    }

    /// Occurrences of all words read, including discarded ones.
    pub fn total_words(&self) -> u64 {
        self.total_words
    }

    pub(crate) fn set_total_words(&mut self, total_words: u64) {
        self.total_words = total_words;
    }

    pub fn summary(&self) -> VocabularySummary {
        VocabularySummary {
            vocabulary_size: self.words.len(),
            train_words: self.train_words,
            total_words: self.total_words,
        }
    }

    /// Write `word count` lines in id order.
    pub fn save(&self, vocab_file: &Path) -> Result<()> {
        let write = || -> std::io::Result<()> {
            let mut fo = BufWriter::new(File::create(vocab_file)?);
            for vw in &self.words {
                writeln!(fo, "{} {}", vw.word, vw.count)?;
            }
            fo.flush()
        };
        write().map_err(|err| Error::io(vocab_file, err))
    }
}

fn percent(pos: usize, len: usize) -> f32 {
    if len == 0 {
        100.0
    } else {
        pos as f32 / len as f32 * 100.0
    }
}
