//! Multithreaded stochastic gradient descent over the shared weight matrices.
//!
//! Worker threads update rows of the matrices without any locking, so two
//! threads touching the same word at the same time can lose or interleave
//! updates. Training tolerates this; results differ from run to run when
//! more than one thread is used. Each weight is stored as an `AtomicU32`
//! accessed with `Relaxed` loads and stores, which compiles to plain moves
//! and keeps the races defined behavior.

use std::ops::Range;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use aligned_box::AlignedBox;
use tracing::{debug, info};

use crate::corpus::Corpus;
use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::rng::Rng;
use crate::settings::{Architecture, Objective, TrainSettings};
use crate::unigram::UnigramTable;
use crate::vocab::Vocabulary;

#[allow(non_camel_case_types)]
type real = f32; // Precision of float numbers

const EXP_TABLE_SIZE: usize = 1000;
const MAX_EXP: real = 6.0;

/// Words a worker processes between updates of the shared word counter.
const WORD_COUNT_INTERVAL: u64 = 10_000;

/// How often the calling thread reports training progress.
const REPORT_PERIOD: Duration = Duration::from_millis(100);

/// Table draws before giving up on finding a negative example that differs
/// from the target word.
const MAX_NEGATIVE_REDRAWS: usize = 16;

#[derive(Default)]
#[repr(transparent)]
struct Real {
    bits: AtomicU32,
}

impl Real {
    fn get(&self) -> real {
        real::from_bits(self.bits.load(Ordering::Relaxed))
    }

    fn set(&self, value: real) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Not atomic as a whole: a concurrent `add` to the same weight may be lost.
    fn add(&self, x: real) {
        let a = self.get();
        self.set(a + x);
    }
}

/// A `rows × dim` matrix shared by all worker threads.
struct Matrix {
    cells: AlignedBox<[Real]>,
    dim: usize,
}

impl Matrix {
    fn zeros(rows: usize, dim: usize) -> Result<Self> {
        let len = rows * dim;
        let cells = AlignedBox::slice_from_default(128, len.max(1))
            .map_err(|_| Error::Allocation(len))?;
        Ok(Matrix { cells, dim })
    }

    fn row(&self, i: usize) -> &[Real] {
        &self.cells[i * self.dim..][..self.dim]
    }

    fn to_vec(&self, rows: usize) -> Vec<f32> {
        self.cells[..rows * self.dim].iter().map(Real::get).collect()
    }
}

fn dot_shared(x: &[real], row: &[Real]) -> real {
    x.iter().zip(row).map(|(&x, w)| x * w.get()).sum()
}

/// Precomputed logistic function.
struct ExpTable(Vec<real>);

impl ExpTable {
    fn new() -> Self {
        ExpTable(
            (0..EXP_TABLE_SIZE)
                .map(|i| {
                    let e = ((i as real / EXP_TABLE_SIZE as real * 2.0 - 1.0) * MAX_EXP).exp(); // Precompute the exp() table
                    e / (e + 1.0) // Precompute f(x) = x / (x + 1)
                })
                .collect(),
        )
    }

    /// Approximate the logistic function, 1 / (1 + e^-x).
    fn sigmoid(&self, x: real) -> real {
        if x >= MAX_EXP {
            1.0
        } else if x <= -MAX_EXP {
            0.0
        } else {
            let i = ((x + MAX_EXP) * (EXP_TABLE_SIZE as real / MAX_EXP / 2.0)) as usize;
            self.0[i.min(EXP_TABLE_SIZE - 1)]
        }
    }
}

/// Decides, per occurrence, whether a frequent word is dropped from a
/// training sentence.
#[derive(Debug, Clone, Copy)]
pub struct Subsampler {
    /// `sample * train_words`, so that `count / threshold == f / sample`.
    threshold: real,
}

impl Subsampler {
    pub fn new(sample: f32, train_words: u64) -> Self {
        Subsampler {
            threshold: sample * train_words as real,
        }
    }

    /// Probability of keeping one occurrence of a word seen `count` times.
    pub fn keep_probability(&self, count: u64) -> real {
        let k = self.threshold;
        if k <= 0.0 || count == 0 {
            return 1.0;
        }
        let f = count as real;
        (((f / k).sqrt() + 1.0) * k / f).min(1.0)
    }

    pub fn keep(&self, count: u64, rng: &mut Rng) -> bool {
        if self.threshold <= 0.0 {
            return true;
        }
        // The subsampling randomly discards frequent words while keeping the ranking same
        self.keep_probability(count) >= rng.rand_real()
    }

    /// Copy the surviving words of `sentence` into `sen`.
    pub fn sample_sentence(
        &self,
        vocab: &Vocabulary,
        sentence: &[usize],
        rng: &mut Rng,
        sen: &mut Vec<usize>,
    ) {
        sen.clear();
        sen.extend(
            sentence
                .iter()
                .copied()
                .filter(|&word| self.keep(vocab.count(word), rng)),
        );
    }
}

/// Positions within `radius` of `i`, clipped to the sentence.
pub fn window_around(i: usize, radius: usize, len: usize) -> Range<usize> {
    let start = i.saturating_sub(radius);
    let stop = (i + radius + 1).min(len);
    start..stop
}

/// Map every sentence of the corpus to word ids, dropping words that are not
/// in the vocabulary and sentences left empty.
pub(crate) fn encode_sentences(corpus: &Corpus, vocab: &Vocabulary) -> Vec<Vec<usize>> {
    corpus
        .sentences()
        .map(|sentence| {
            sentence
                .into_iter()
                .filter_map(|word| vocab.search(word))
                .collect::<Vec<usize>>()
        })
        .filter(|sentence| !sentence.is_empty())
        .collect()
}

/// Divide the sentences into `num_threads` contiguous runs.
///
/// Runs have equal numbers of sentences, not of words; uneven sentence
/// lengths leave some threads with more work.
pub(crate) fn partition(mut sentences: Vec<Vec<usize>>, num_threads: usize) -> Vec<Vec<Vec<usize>>> {
    let mut threads: Vec<Vec<Vec<usize>>> = (0..num_threads)
        .rev()
        .map(|i| {
            let start = sentences.len() * i / num_threads;
            sentences.split_off(start)
        })
        .collect();
    threads.reverse();
    threads
}

enum OutputLayer {
    /// One weight row per internal node of the Huffman tree.
    Hierarchical { weights: Matrix },
    /// One weight row per word.
    Negative {
        weights: Matrix,
        table: UnigramTable,
        negative: usize,
    },
}

pub(crate) struct Trainer<'a> {
    settings: &'a TrainSettings,
    vocab: &'a Vocabulary,
    /// The learned word-vectors.
    embeddings: Matrix,
    output: OutputLayer,
    exp_table: ExpTable,
    /// Words processed so far by all threads, updated in batches.
    word_count_actual: AtomicU64,
    /// Words all threads will process over all iterations.
    total_words: u64,
}

impl<'a> Trainer<'a> {
    /// Allocate and initialize the network. For hierarchical softmax the
    /// vocabulary must already carry its Huffman codes.
    pub(crate) fn new(settings: &'a TrainSettings, vocab: &'a Vocabulary) -> Result<Self> {
        let vocab_size = vocab.len();
        let dim = settings.vector_size;

        let embeddings = Matrix::zeros(vocab_size, dim)?;
        let mut rng = Rng::new(settings.seed);
        for w in embeddings.cells[..vocab_size * dim].iter() {
            w.set((rng.rand_real() - 0.5) / dim as real);
        }

        let output = match settings.objective {
            Objective::HierarchicalSoftmax => {
                debug_assert!(vocab.iter().all(|vw| vw.huffman.is_some()));
                OutputLayer::Hierarchical {
                    weights: Matrix::zeros(vocab_size.saturating_sub(1), dim)?,
                }
            }
            Objective::NegativeSampling { negative } => OutputLayer::Negative {
                weights: Matrix::zeros(vocab_size, dim)?,
                table: UnigramTable::new(&vocab.counts(), settings.unigram_table_size),
                negative,
            },
        };

        Ok(Trainer {
            settings,
            vocab,
            embeddings,
            output,
            exp_table: ExpTable::new(),
            word_count_actual: AtomicU64::new(0),
            total_words: settings.iterations as u64 * vocab.train_words(),
        })
    }

    /// Learning rate after `word_count_actual` words, decaying linearly and
    /// never below 0.01% of the starting rate.
    fn alpha(&self, word_count_actual: u64) -> real {
        self.settings.alpha
            * (1.0 - word_count_actual as real / (self.total_words + 1) as real).max(0.0001)
    }

    fn percent_done(&self, word_count_actual: u64) -> f32 {
        (word_count_actual as f32 / self.total_words.max(1) as f32 * 100.0).min(100.0)
    }

    /// Train on `shards`, one worker thread per shard, all iterations.
    ///
    /// Blocks until every worker has finished. Progress is reported from the
    /// calling thread while waiting.
    pub(crate) fn run(&self, shards: &[Vec<Vec<usize>>], progress: &mut dyn Progress) -> Result<()> {
        debug!(threads = shards.len(), total_words = self.total_words, "starting workers");
        let start = Instant::now();

        let panicked = thread::scope(|s| {
            let workers = shards
                .iter()
                .enumerate()
                .map(|(id, shard)| s.spawn(move || self.train_model_thread(id, shard)))
                .collect::<Vec<_>>();

            while !workers.iter().all(|w| w.is_finished()) {
                let word_count_actual = self.word_count_actual.load(Ordering::Relaxed);
                progress.training(
                    self.alpha(word_count_actual),
                    self.percent_done(word_count_actual),
                );
                thread::sleep(REPORT_PERIOD);
            }
            workers
                .into_iter()
                .filter_map(|w| w.join().err())
                .count()
        });
        if panicked > 0 {
            return Err(Error::WorkerPanicked);
        }

        let word_count_actual = self.word_count_actual.load(Ordering::Relaxed);
        progress.training(self.alpha(word_count_actual), 100.0);
        let secs = start.elapsed().as_secs_f64();
        info!(
            words = word_count_actual,
            seconds = secs,
            words_per_sec = word_count_actual as f64 / secs.max(1e-9),
            "training finished"
        );
        Ok(())
    }

    /// The trained input embeddings, row `i` for word id `i`.
    pub(crate) fn into_embeddings(self) -> Vec<f32> {
        self.embeddings.to_vec(self.vocab.len())
    }

    fn train_model_thread(&self, id: usize, sentences: &[Vec<usize>]) {
        let dim = self.settings.vector_size;
        let window = self.settings.window;
        let subsampler = Subsampler::new(self.settings.sample, self.vocab.train_words());

        let mut rng = Rng::new(self.settings.seed.wrapping_add(id as u64 + 1));
        let mut neu1: Vec<real> = vec![0.0; dim];
        let mut neu1e: Vec<real> = vec![0.0; dim];
        let mut sen: Vec<usize> = Vec::with_capacity(self.settings.max_sentence_length);
        let mut alpha = self.alpha(self.word_count_actual.load(Ordering::Relaxed));

        for _ in 0..self.settings.iterations {
            let mut word_count: u64 = 0;
            let mut last_word_count: u64 = 0;
            for sentence in sentences {
                word_count += sentence.len() as u64;
                subsampler.sample_sentence(self.vocab, sentence, &mut rng, &mut sen);

                for sentence_position in 0..sen.len() {
                    let radius = rng.radius(window);
                    let context = window_around(sentence_position, radius, sen.len());
                    match self.settings.architecture {
                        Architecture::Cbow => self.train_cbow(
                            &sen,
                            sentence_position,
                            context,
                            &mut neu1,
                            &mut neu1e,
                            alpha,
                            &mut rng,
                        ),
                        Architecture::SkipGram => self.train_skip_gram(
                            &sen,
                            sentence_position,
                            context,
                            &mut neu1,
                            &mut neu1e,
                            alpha,
                            &mut rng,
                        ),
                    }
                }

                if word_count - last_word_count > WORD_COUNT_INTERVAL {
                    let n = word_count - last_word_count;
                    let word_count_actual =
                        self.word_count_actual.fetch_add(n, Ordering::Relaxed) + n;
                    last_word_count = word_count;
                    alpha = self.alpha(word_count_actual);
                }
            }
            self.word_count_actual
                .fetch_add(word_count - last_word_count, Ordering::Relaxed);
        }
    }

    /// Predict the center word from the average of its context.
    #[allow(clippy::too_many_arguments)]
    fn train_cbow(
        &self,
        sen: &[usize],
        sentence_position: usize,
        context: Range<usize>,
        neu1: &mut [real],
        neu1e: &mut [real],
        alpha: real,
        rng: &mut Rng,
    ) {
        // in -> hidden
        neu1.fill(0.0);
        neu1e.fill(0.0);
        let mut cw = 0;
        for c in context.clone() {
            if c == sentence_position {
                continue;
            }
            for (h, w) in neu1.iter_mut().zip(self.embeddings.row(sen[c])) {
                *h += w.get();
            }
            cw += 1;
        }
        if cw == 0 {
            return;
        }
        for h in neu1.iter_mut() {
            *h /= cw as real;
        }

        self.learn(neu1, sen[sentence_position], neu1e, alpha, rng);

        // hidden -> in
        for c in context {
            if c == sentence_position {
                continue;
            }
            for (w, &e) in self.embeddings.row(sen[c]).iter().zip(neu1e.iter()) {
                w.add(e);
            }
        }
    }

    /// Predict each context word from the center word.
    #[allow(clippy::too_many_arguments)]
    fn train_skip_gram(
        &self,
        sen: &[usize],
        sentence_position: usize,
        context: Range<usize>,
        neu1: &mut [real],
        neu1e: &mut [real],
        alpha: real,
        rng: &mut Rng,
    ) {
        let input = self.embeddings.row(sen[sentence_position]);
        for c in context {
            if c == sentence_position {
                continue;
            }
            for (h, w) in neu1.iter_mut().zip(input) {
                *h = w.get();
            }
            neu1e.fill(0.0);

            self.learn(neu1, sen[c], neu1e, alpha, rng);

            // Learn weights input -> hidden
            for (w, &e) in input.iter().zip(neu1e.iter()) {
                w.add(e);
            }
        }
    }

    /// One gradient step of "`hidden` predicts `word`" on the output layer.
    ///
    /// Updates the output weights in place and accumulates the error to be
    /// applied to the input embeddings into `neu1e`.
    fn learn(&self, hidden: &[real], word: usize, neu1e: &mut [real], alpha: real, rng: &mut Rng) {
        match &self.output {
            OutputLayer::Hierarchical { weights } => {
                let Some(huffman) = &self.vocab.get(word).huffman else {
                    return;
                };
                for (&node, &bit) in huffman.path.iter().zip(&huffman.code) {
                    let row = weights.row(node as usize);
                    // Propagate hidden -> output
                    let f = dot_shared(hidden, row);
                    if f <= -MAX_EXP || f >= MAX_EXP {
                        continue;
                    }
                    let f = self.exp_table.sigmoid(f);
                    // 'g' is the gradient (d/df loss) multiplied by the learning rate
                    let g = (1.0 - bit as real - f) * alpha;
                    self.backprop(row, hidden, neu1e, g);
                }
            }
            OutputLayer::Negative {
                weights,
                table,
                negative,
            } => {
                for d in 0..=*negative {
                    let (target, label) = if d == 0 {
                        (word, 1.0)
                    } else {
                        match self.draw_negative(table, word, rng) {
                            Some(target) => (target, 0.0),
                            None => continue,
                        }
                    };
                    let row = weights.row(target);
                    let f = dot_shared(hidden, row);
                    let g = (label - self.exp_table.sigmoid(f)) * alpha;
                    self.backprop(row, hidden, neu1e, g);
                }
            }
        }
    }

    fn backprop(&self, row: &[Real], hidden: &[real], neu1e: &mut [real], g: real) {
        // Propagate errors output -> hidden
        for (e, w) in neu1e.iter_mut().zip(row) {
            *e += g * w.get();
        }
        // Learn weights hidden -> output
        for (w, &h) in row.iter().zip(hidden) {
            w.add(g * h);
        }
    }

    /// Draw a word other than `word` from the unigram table.
    fn draw_negative(&self, table: &UnigramTable, word: usize, rng: &mut Rng) -> Option<usize> {
        if self.vocab.len() < 2 {
            return None;
        }
        let target = (0..MAX_NEGATIVE_REDRAWS)
            .map(|_| table.sample(rng))
            .find(|&target| target != word);
        if target.is_none() {
            debug!(word, "no negative example found");
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Tokenizer;
    use crate::progress::Silent;

    #[test]
    fn sigmoid_table_is_monotonic_and_saturates() {
        let table = ExpTable::new();
        assert_eq!(table.sigmoid(10.0), 1.0);
        assert_eq!(table.sigmoid(-10.0), 0.0);
        assert!((table.sigmoid(0.0) - 0.5).abs() < 0.01);
        let mut last = 0.0;
        for i in -59..60 {
            let y = table.sigmoid(i as real / 10.0);
            assert!(y >= last);
            last = y;
        }
    }

    #[test]
    fn subsampling_spares_rare_words() {
        let subsampler = Subsampler::new(1e-3, 1_000_000);
        assert_eq!(subsampler.keep_probability(10), 1.0);
        let common = subsampler.keep_probability(100_000);
        assert!(common < 0.2, "got {common}");
        assert!(subsampler.keep_probability(10_000) > common);

        let off = Subsampler::new(0.0, 1_000_000);
        let mut rng = Rng::new(1);
        assert!((0..100).all(|_| off.keep(100_000, &mut rng)));
    }

    #[test]
    fn subsampling_is_reproducible_with_a_fixed_seed() {
        let subsampler = Subsampler::new(1e-3, 1_000);
        let draw = |seed| {
            let mut rng = Rng::new(seed);
            (0..200).map(|_| subsampler.keep(100, &mut rng)).collect::<Vec<bool>>()
        };
        let a = draw(3);
        assert_eq!(a, draw(3));
        // Decided per occurrence: the same word is kept sometimes and not others.
        assert!(a.contains(&true) && a.contains(&false));
    }

    #[test]
    fn window_is_clipped_to_the_sentence() {
        assert_eq!(window_around(0, 2, 10), 0..3);
        assert_eq!(window_around(5, 2, 10), 3..8);
        assert_eq!(window_around(9, 5, 10), 4..10);
    }

    #[test]
    fn partition_is_contiguous_and_complete() {
        let sentences: Vec<Vec<usize>> = (0..10).map(|i| vec![i]).collect();
        let shards = partition(sentences.clone(), 3);
        assert_eq!(shards.len(), 3);
        assert_eq!(shards.concat(), sentences);

        let shards = partition(vec![vec![1]], 4);
        assert_eq!(shards.iter().filter(|s| !s.is_empty()).count(), 1);
    }

    #[test]
    fn learning_rate_decays_to_a_floor() {
        let corpus = Corpus::from_text("a b a b c", Tokenizer::new(" ", ".", 10));
        let vocab = Vocabulary::build(&corpus, 1, &mut Silent).unwrap();
        let settings = TrainSettings {
            vector_size: 4,
            unigram_table_size: 100,
            alpha: 0.1,
            iterations: 2,
            ..TrainSettings::default()
        };
        let trainer = Trainer::new(&settings, &vocab).unwrap();
        assert!((trainer.alpha(0) - 0.1).abs() < 1e-6);
        assert!(trainer.alpha(5) < trainer.alpha(1));
        assert!((trainer.alpha(1_000) - 0.1 * 0.0001).abs() < 1e-9);
    }

    #[test]
    fn negatives_are_redrawn_until_they_differ() {
        let vocab =
            Vocabulary::from_counts(vec![("a".into(), 1_000_000), ("b".into(), 1)], 1).unwrap();
        let settings = TrainSettings {
            vector_size: 4,
            unigram_table_size: 100,
            ..TrainSettings::default()
        };
        let trainer = Trainer::new(&settings, &vocab).unwrap();
        let mut rng = Rng::new(5);

        // Every slot of this table holds word 0.
        let skewed = UnigramTable::new(&vocab.counts(), 100);
        assert!((0..100).all(|_| trainer.draw_negative(&skewed, 0, &mut rng).is_none()));
        assert!((0..100).all(|_| trainer.draw_negative(&skewed, 1, &mut rng) == Some(0)));

        let even = UnigramTable::new(&[1, 1], 100);
        for word in 0..2 {
            let draws: Vec<Option<usize>> = (0..200)
                .map(|_| trainer.draw_negative(&even, word, &mut rng))
                .collect();
            assert!(draws.iter().all(|&d| d != Some(word)));
            assert!(draws.contains(&Some(1 - word)));
        }
    }

    #[test]
    fn one_word_vocabulary_has_no_negatives() {
        let vocab = Vocabulary::from_counts(vec![("a".into(), 3)], 1).unwrap();
        let settings = TrainSettings {
            vector_size: 4,
            unigram_table_size: 100,
            ..TrainSettings::default()
        };
        let trainer = Trainer::new(&settings, &vocab).unwrap();
        let table = UnigramTable::new(&vocab.counts(), 100);
        let mut rng = Rng::new(1);
        assert_eq!(trainer.draw_negative(&table, 0, &mut rng), None);
    }

    #[test]
    fn panicking_worker_is_reported() {
        let vocab = Vocabulary::from_counts(vec![("a".into(), 2), ("b".into(), 1)], 1).unwrap();
        let settings = TrainSettings {
            vector_size: 4,
            threads: 2,
            iterations: 1,
            unigram_table_size: 100,
            ..TrainSettings::default()
        };
        let trainer = Trainer::new(&settings, &vocab).unwrap();
        // Word id 7 is out of range, so the second worker panics.
        let shards = vec![vec![vec![0, 1, 0]], vec![vec![0, 7]]];
        let result = trainer.run(&shards, &mut Silent);
        assert!(matches!(result, Err(Error::WorkerPanicked)));
    }

    #[test]
    fn encodes_only_known_words() {
        let corpus = Corpus::from_text("a b z. z z. b", Tokenizer::new(" ", ".", 10));
        let vocab = Vocabulary::from_counts(vec![("a".into(), 1), ("b".into(), 2)], 0).unwrap();
        assert_eq!(encode_sentences(&corpus, &vocab), vec![vec![1, 0], vec![0]]);
    }
}
