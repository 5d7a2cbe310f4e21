//! Word vectors: train word2vec models on a text corpus and query them.
//!
//! Training builds a [`Vocabulary`] from a [`Corpus`], then runs
//! multithreaded stochastic gradient descent with either the CBOW or the
//! skip-gram architecture, approximating the softmax by hierarchical
//! softmax or negative sampling. The result is a [`Model`] that can be
//! saved, loaded, and queried for word vectors, document embeddings and
//! nearest neighbors.

pub mod config;
pub mod corpus;
pub mod error;
pub mod export;
pub mod huffman;
mod model;
mod persist;
pub mod progress;
pub mod query;
pub mod rng;
pub mod settings;
pub mod train;
pub mod unigram;
pub mod vocab;

pub use config::TrainConfig;
pub use corpus::{Corpus, StopWords, Tokenizer};
pub use error::{Error, Result};
pub use model::Model;
pub use persist::FORMAT_VERSION;
pub use progress::{Progress, Silent, VocabularySummary};
pub use query::{cosine, dot, norm, normalize, Neighbor, Neighbors, SelfMatch, Vectors};
pub use settings::{Architecture, Objective, TrainSettings};
pub use vocab::{VocabWord, Vocabulary};
