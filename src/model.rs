use std::path::Path;

use tracing::{debug, info};

use crate::corpus::{Corpus, StopWords, Tokenizer};
use crate::error::{Error, Result};
use crate::export;
use crate::persist;
use crate::progress::Progress;
use crate::query::{cosine, Neighbor, Neighbors, SelfMatch, Vectors};
use crate::settings::{Objective, TrainSettings};
use crate::train::{encode_sentences, partition, Trainer};
use crate::vocab::Vocabulary;

/// A trained or loaded set of word vectors.
///
/// Produced only by training or loading, never copied, and released when
/// dropped. Queries take `&self` and never modify the model, so one `Model`
/// may be shared by any number of threads.
#[derive(Debug)]
pub struct Model {
    settings: TrainSettings,
    vocab: Vocabulary,
    vectors: Vectors,
    tokenizer: Tokenizer,
}

impl Model {
    /// Train on an in-memory corpus.
    ///
    /// Documents passed to [`Model::embedding`] are split with the
    /// delimiters in `settings`, so `corpus` should use the same ones (see
    /// [`Tokenizer::from_settings`]).
    pub fn train(
        settings: TrainSettings,
        corpus: &Corpus,
        progress: &mut dyn Progress,
    ) -> Result<Model> {
        settings.validate()?;
        debug!(?settings, "training settings");

        let mut vocab = Vocabulary::build(corpus, settings.min_word_freq, progress)?;
        if settings.objective == Objective::HierarchicalSoftmax {
            vocab.assign_codes();
        }

        let shards = partition(encode_sentences(corpus, &vocab), settings.threads);
        let embeddings = {
            let trainer = Trainer::new(&settings, &vocab)?;
            trainer.run(&shards, progress)?;
            trainer.into_embeddings()
        };
        let vectors = Vectors::new(settings.vector_size, embeddings)?;

        Ok(Model {
            tokenizer: Tokenizer::from_settings(&settings),
            settings,
            vocab,
            vectors,
        })
    }

    /// Train on the text in `corpus_file`, leaving out every word listed
    /// in `stop_words_file`.
    pub fn train_file(
        settings: TrainSettings,
        corpus_file: &Path,
        stop_words_file: Option<&Path>,
        progress: &mut dyn Progress,
    ) -> Result<Model> {
        settings.validate()?;
        info!(?corpus_file, "starting training");

        let mut corpus = Corpus::open(corpus_file, Tokenizer::from_settings(&settings))?;
        if let Some(path) = stop_words_file {
            let stop_words = StopWords::load(path, corpus.tokenizer())?;
            debug!(count = stop_words.len(), ?path, "loaded stop-words");
            corpus = corpus.with_stop_words(stop_words);
        }
        Model::train(settings, &corpus, progress)
    }

    /// Train on a file and save the result to `model_file`.
    pub fn train_and_save(
        settings: TrainSettings,
        corpus_file: &Path,
        stop_words_file: Option<&Path>,
        model_file: &Path,
        progress: &mut dyn Progress,
    ) -> Result<Model> {
        let model = Model::train_file(settings, corpus_file, stop_words_file, progress)?;
        model.save(model_file)?;
        Ok(model)
    }

    /// Assemble a model from a vocabulary and one row of `embeddings` per word.
    pub fn from_parts(
        settings: TrainSettings,
        vocab: Vocabulary,
        embeddings: Vec<f32>,
    ) -> Result<Model> {
        let expected = vocab.len() * settings.vector_size;
        if embeddings.len() != expected {
            return Err(Error::DimensionMismatch {
                found: embeddings.len(),
                expected,
            });
        }
        let vectors = Vectors::new(settings.vector_size, embeddings)?;
        Ok(Model {
            tokenizer: Tokenizer::from_settings(&settings),
            settings,
            vocab,
            vectors,
        })
    }

    pub fn load(model_file: &Path) -> Result<Model> {
        let loaded = persist::load(model_file)?;
        info!(
            ?model_file,
            words = loaded.vocab.len(),
            vector_size = loaded.vectors.size(),
            "loaded model"
        );
        Ok(Model {
            tokenizer: Tokenizer::from_settings(&loaded.settings),
            settings: loaded.settings,
            vocab: loaded.vocab,
            vectors: loaded.vectors,
        })
    }

    pub fn save(&self, model_file: &Path) -> Result<()> {
        persist::save(model_file, &self.settings, &self.vocab, &self.vectors)?;
        info!(?model_file, "saved model");
        Ok(())
    }

    /// Write the vectors in the classic word2vec text or binary format.
    pub fn export_word2vec(&self, output_file: &Path, binary: bool) -> Result<()> {
        export::save_word2vec(output_file, &self.vocab, &self.vectors, binary)
    }

    pub fn settings(&self) -> &TrainSettings {
        &self.settings
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn vectors(&self) -> &Vectors {
        &self.vectors
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn vector_size(&self) -> usize {
        self.vectors.size()
    }

    pub fn num_words(&self) -> usize {
        self.vocab.len()
    }

    /// The vector for `word`, or `None` if the word is not in the vocabulary.
    pub fn vector(&self, word: &str) -> Option<&[f32]> {
        self.vocab.search(word).map(|id| &self.vectors[id])
    }

    pub fn vector_of(&self, word: &str) -> Result<Vec<f32>> {
        self.vector(word)
            .map(<[f32]>::to_vec)
            .ok_or_else(|| Error::UnknownWord(word.to_string()))
    }

    /// Mean of the vectors of the known words in `document`. Unknown words
    /// are skipped; a document with no known words is an error.
    pub fn embedding(&self, document: &str) -> Result<Vec<f32>> {
        let ids = self.known_ids(document);
        self.vectors.mean(&ids).ok_or(Error::EmptyDocument)
    }

    /// Cosine similarity between two words.
    pub fn similarity(&self, a: &str, b: &str) -> Result<f32> {
        let va = self.vector(a).ok_or_else(|| Error::UnknownWord(a.to_string()))?;
        let vb = self.vector(b).ok_or_else(|| Error::UnknownWord(b.to_string()))?;
        Ok(cosine(va, vb))
    }

    /// The `k` words whose vectors are most similar to `query`.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Neighbors> {
        self.nearest_excluding(query, k, &[])
    }

    /// The `k` words nearest to the embedding of `document`. With
    /// [`SelfMatch::Exclude`] the document's own words are left out.
    pub fn lookup(&self, document: &str, k: usize, self_match: SelfMatch) -> Result<Neighbors> {
        let ids = self.known_ids(document);
        let query = self.vectors.mean(&ids).ok_or(Error::EmptyDocument)?;
        let exclude: &[usize] = match self_match {
            SelfMatch::Include => &[],
            SelfMatch::Exclude => &ids,
        };
        self.nearest_excluding(&query, k, exclude)
    }

    fn nearest_excluding(&self, query: &[f32], k: usize, exclude: &[usize]) -> Result<Neighbors> {
        let entries = self
            .vectors
            .nearest(query, k, exclude)?
            .into_iter()
            .map(|(id, similarity)| Neighbor {
                word: self.vocab.word(id).to_string(),
                id,
                similarity,
            })
            .collect();
        Ok(Neighbors::new(entries))
    }

    fn known_ids(&self, document: &str) -> Vec<usize> {
        self.tokenizer
            .words(document)
            .filter_map(|word| self.vocab.search(word))
            .collect()
    }
}
