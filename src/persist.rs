//! Versioned binary model files.
//!
//! A model file is a bincode-encoded [`Header`] followed by the body:
//! the settings used for training, the vocabulary in id order, and the
//! input embeddings as one flat row-major array. The header is read and
//! checked on its own before any of the body is decoded. Decoding never
//! reads or allocates more bytes than the file holds, so a corrupted length
//! prefix is reported as a format error.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::query::Vectors;
use crate::settings::TrainSettings;
use crate::vocab::Vocabulary;

pub const MAGIC: [u8; 4] = *b"W2VM";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    version: u32,
}

#[derive(Serialize)]
struct BodyRef<'a> {
    settings: &'a TrainSettings,
    words: Vec<&'a str>,
    counts: Vec<u64>,
    total_words: u64,
    vector_size: u64,
    embeddings: &'a [f32],
}

#[derive(Deserialize)]
struct Body {
    settings: TrainSettings,
    words: Vec<String>,
    counts: Vec<u64>,
    total_words: u64,
    vector_size: u64,
    embeddings: Vec<f32>,
}

/// Everything read back from a model file.
pub(crate) struct Loaded {
    pub settings: TrainSettings,
    pub vocab: Vocabulary,
    pub vectors: Vectors,
}

pub(crate) fn save(
    path: &Path,
    settings: &TrainSettings,
    vocab: &Vocabulary,
    vectors: &Vectors,
) -> Result<()> {
    let file = File::create(path).map_err(|err| Error::io(path, err))?;
    let mut fo = BufWriter::new(file);
    write_to(&mut fo, settings, vocab, vectors).map_err(|err| bincode_error(path, err))?;
    fo.flush().map_err(|err| Error::io(path, err))
}

pub(crate) fn load(path: &Path) -> Result<Loaded> {
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    let len = file.metadata().map_err(|err| Error::io(path, err))?.len();
    read_from(BufReader::new(file), len, path)
}

/// Fixed-width little-endian integers, the encoding of `bincode::serialize`.
fn options() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

fn write_to<W: Write>(
    mut w: W,
    settings: &TrainSettings,
    vocab: &Vocabulary,
    vectors: &Vectors,
) -> bincode::Result<()> {
    options().serialize_into(
        &mut w,
        &Header {
            magic: MAGIC,
            version: FORMAT_VERSION,
        },
    )?;
    options().serialize_into(
        &mut w,
        &BodyRef {
            settings,
            words: vocab.iter().map(|vw| vw.word.as_str()).collect(),
            counts: vocab.counts(),
            total_words: vocab.total_words(),
            vector_size: vectors.size() as u64,
            embeddings: vectors.as_slice(),
        },
    )
}

/// `len` is the size of the input in bytes. `path` is only used to describe
/// I/O errors.
fn read_from<R: Read>(mut r: R, len: u64, path: &Path) -> Result<Loaded> {
    let header: Header = options()
        .with_limit(len)
        .deserialize_from(&mut r)
        .map_err(|err| bincode_error(path, err))?;
    if header.magic != MAGIC {
        return Err(Error::Format("not a word-vector model file".into()));
    }
    if header.version != FORMAT_VERSION {
        return Err(Error::VersionMismatch {
            found: header.version,
            expected: FORMAT_VERSION,
        });
    }

    let body: Body = options()
        .with_limit(len)
        .deserialize_from(&mut r)
        .map_err(|err| bincode_error(path, err))?;
    let vector_size = usize::try_from(body.vector_size)
        .map_err(|_| Error::Format(format!("vector size {} is too large", body.vector_size)))?;
    if vector_size == 0 {
        return Err(Error::Format("vector size is 0".into()));
    }
    if vector_size != body.settings.vector_size {
        return Err(Error::Format(format!(
            "vector size {vector_size} does not match settings ({})",
            body.settings.vector_size
        )));
    }
    if body.embeddings.len() % vector_size != 0 {
        return Err(Error::Format(format!(
            "{} weights do not divide into vectors of size {vector_size}",
            body.embeddings.len()
        )));
    }
    let rows = body.embeddings.len() / vector_size;
    if rows != body.words.len() || body.counts.len() != body.words.len() {
        return Err(Error::Format(format!(
            "{} words, {} counts and {rows} vectors",
            body.words.len(),
            body.counts.len()
        )));
    }
    if rows == 0 {
        return Err(Error::EmptyVocabulary);
    }

    let mut vocab = Vocabulary::from_ordered(body.words.into_iter().zip(body.counts).collect())?;
    vocab.set_total_words(body.total_words);
    let vectors = Vectors::new(vector_size, body.embeddings)?;
    Ok(Loaded {
        settings: body.settings,
        vocab,
        vectors,
    })
}

fn bincode_error(path: &Path, err: bincode::Error) -> Error {
    match *err {
        bincode::ErrorKind::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
            Error::Format("file is truncated".into())
        }
        bincode::ErrorKind::Io(err) => Error::io(path, err),
        bincode::ErrorKind::SizeLimit => {
            Error::Format("length prefix exceeds the file size".into())
        }
        other => Error::Format(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DEFAULT_WORD_DELIMITERS;

    fn sample() -> (TrainSettings, Vocabulary, Vectors) {
        let settings = TrainSettings {
            vector_size: 3,
            ..TrainSettings::default()
        };
        let vocab =
            Vocabulary::from_counts(vec![("b".into(), 2), ("a".into(), 5), ("c".into(), 2)], 1)
                .unwrap();
        let vectors = Vectors::new(3, (0..9).map(|i| i as f32 * 0.25 - 1.0).collect()).unwrap();
        (settings, vocab, vectors)
    }

    fn encode() -> Vec<u8> {
        let (settings, vocab, vectors) = sample();
        let mut buf = vec![];
        write_to(&mut buf, &settings, &vocab, &vectors).unwrap();
        buf
    }

    fn decode(bytes: &[u8]) -> Result<Loaded> {
        read_from(bytes, bytes.len() as u64, Path::new("model.bin"))
    }

    #[test]
    fn reads_back_what_it_wrote() {
        let (settings, vocab, vectors) = sample();
        let loaded = decode(&encode()).unwrap();
        assert_eq!(loaded.settings, settings);
        let words: Vec<&str> = loaded.vocab.iter().map(|vw| vw.word.as_str()).collect();
        assert_eq!(words, vec!["a", "b", "c"]);
        assert_eq!(loaded.vocab.counts(), vocab.counts());
        assert_eq!(loaded.vocab.total_words(), 9);
        assert_eq!(loaded.vectors.as_slice(), vectors.as_slice());
    }

    #[test]
    fn every_truncation_fails_cleanly() {
        let bytes = encode();
        for len in 0..bytes.len() {
            assert!(
                matches!(decode(&bytes[..len]), Err(Error::Format(_))),
                "truncated to {len} bytes"
            );
        }
    }

    #[test]
    fn other_versions_are_rejected() {
        let mut bytes = encode();
        bytes[4..8].copy_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(Error::VersionMismatch {
                found: 7,
                expected: FORMAT_VERSION
            })
        ));
    }

    #[test]
    fn foreign_files_are_rejected() {
        let mut bytes = encode();
        bytes[..4].copy_from_slice(b"GIF8");
        assert!(matches!(decode(&bytes), Err(Error::Format(_))));
    }

    /// Offset of the length prefix of the stored word delimiters.
    fn delimiters_offset(bytes: &[u8]) -> usize {
        let mut prefix = (DEFAULT_WORD_DELIMITERS.len() as u64).to_le_bytes().to_vec();
        prefix.extend(DEFAULT_WORD_DELIMITERS.as_bytes());
        bytes
            .windows(prefix.len())
            .position(|w| w == prefix)
            .unwrap()
    }

    #[test]
    fn huge_length_prefixes_are_rejected() {
        let original = encode();
        let at = delimiters_offset(&original);
        for len in [u64::MAX / 4, u64::MAX, original.len() as u64] {
            let mut bytes = original.clone();
            bytes[at..at + 8].copy_from_slice(&len.to_le_bytes());
            assert!(
                matches!(decode(&bytes), Err(Error::Format(_))),
                "length prefix {len}"
            );
        }

        // The last eight bytes before the embeddings hold their count.
        let mut bytes = original.clone();
        let at = bytes.len() - 9 * 4 - 8;
        bytes[at..at + 8].copy_from_slice(&(1u64 << 40).to_le_bytes());
        assert!(matches!(decode(&bytes), Err(Error::Format(_))));
    }

    #[test]
    fn ragged_embeddings_are_rejected() {
        let (settings, _, _) = sample();
        let body = BodyRef {
            settings: &settings,
            words: vec!["a", "b"],
            counts: vec![2, 1],
            total_words: 3,
            vector_size: 3,
            embeddings: &[0.5; 7],
        };
        let mut bytes = vec![];
        bincode::serialize_into(
            &mut bytes,
            &Header {
                magic: MAGIC,
                version: FORMAT_VERSION,
            },
        )
        .unwrap();
        bincode::serialize_into(&mut bytes, &body).unwrap();
        assert!(matches!(decode(&bytes), Err(Error::Format(_))));
    }
}
