//! Output formats understood by other word-vector tools.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::query::Vectors;
use crate::vocab::Vocabulary;

/// Write vectors in the format of the C word2vec tool: a
/// `"<words> <size>"` line, then one line per word holding the word and
/// its vector, either as decimal text or as raw floats in native byte order.
pub fn save_word2vec(
    output_file: &Path,
    vocab: &Vocabulary,
    vectors: &Vectors,
    binary: bool,
) -> Result<()> {
    let file = File::create(output_file).map_err(|err| Error::io(output_file, err))?;
    write_word2vec(BufWriter::new(file), vocab, vectors, binary)
        .map_err(|err| Error::io(output_file, err))
}

pub fn write_word2vec<W: Write>(
    mut fo: W,
    vocab: &Vocabulary,
    vectors: &Vectors,
    binary: bool,
) -> io::Result<()> {
    writeln!(fo, "{} {}", vocab.len(), vectors.size())?;
    for (a, vw) in vocab.iter().enumerate() {
        write!(fo, "{} ", vw.word)?;
        let word_vec = &vectors[a];
        if binary {
            fo.write_all(bytemuck::cast_slice::<f32, u8>(word_vec))?;
        } else {
            for f in word_vec {
                write!(fo, "{f} ")?;
            }
        }
        writeln!(fo)?;
    }
    fo.flush()
}

/// Append one vector in `.fvecs` layout: the dimension as a little-endian
/// `i32`, then the components as little-endian `f32`s.
pub fn write_fvec<W: Write>(mut w: W, vector: &[f32]) -> io::Result<()> {
    write_len(&mut w, vector.len())?;
    for f in vector {
        w.write_all(&f.to_le_bytes())?;
    }
    Ok(())
}

/// Append one byte string in `.bvecs` layout: the length as a little-endian
/// `i32`, then the bytes.
pub fn write_bvec<W: Write>(mut w: W, bytes: &[u8]) -> io::Result<()> {
    write_len(&mut w, bytes.len())?;
    w.write_all(bytes)
}

fn write_len<W: Write>(w: &mut W, len: usize) -> io::Result<()> {
    let len = i32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "record too long"))?;
    w.write_all(&len.to_le_bytes())
}
