//! Error type shared by training, persistence and queries.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Settings rejected before any work began.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("error accessing {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("vocabulary is empty after discarding rare words and stop-words")]
    EmptyVocabulary,

    /// The model file is corrupt or truncated.
    #[error("invalid model file: {0}")]
    Format(String),

    #[error("model file has format version {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("vector has {found} dimensions, expected {expected}")]
    DimensionMismatch { found: usize, expected: usize },

    #[error("unknown word {0:?}")]
    UnknownWord(String),

    /// No word of the document is in the vocabulary.
    #[error("document has no words in the vocabulary")]
    EmptyDocument,

    #[error("memory allocation failed for {0} weights")]
    Allocation(usize),

    #[error("a training thread panicked")]
    WorkerPanicked,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = Error::VersionMismatch {
            found: 7,
            expected: 1,
        };
        assert_eq!(
            err.to_string(),
            "model file has format version 7, expected 1"
        );
        assert_eq!(
            Error::UnknownWord("fish".into()).to_string(),
            "unknown word \"fish\""
        );

        let err = Error::io("corpus.txt", io::Error::from(io::ErrorKind::NotFound));
        assert!(std::error::Error::source(&err).is_some());
    }
}
