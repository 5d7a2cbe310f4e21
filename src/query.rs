//! Read-only queries against trained vectors.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::ops::Index;

use ordered_float::OrderedFloat;

use crate::error::{Error, Result};

pub fn norm(v: &[f32]) -> f32 {
    v.iter().copied().map(|e| e * e).sum::<f32>().sqrt()
}

pub fn normalize(v: &mut [f32]) {
    let len = norm(v);
    if len > 0.0 {
        for e in v {
            *e /= len;
        }
    }
}

/// # Panics
///
/// If `a` and `b` have different lengths.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(&a, &b)| a * b).sum()
}

/// Cosine similarity; 0 when either vector is zero.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let d = norm(a) * norm(b);
    if d > 0.0 {
        dot(a, b) / d
    } else {
        0.0
    }
}

/// Dense word vectors, one row per word id.
#[derive(Debug)]
pub struct Vectors {
    /// Embedding vector length (number of dimensions).
    size: usize,

    /// `embeddings[k * size..(k+1) * size]` is the vector embedding for word `k`.
    embeddings: Vec<f32>,

    /// Euclidean length of each row.
    norms: Vec<f32>,
}

impl Index<usize> for Vectors {
    type Output = [f32];

    fn index(&self, i: usize) -> &[f32] {
        &self.embeddings[i * self.size..][..self.size]
    }
}

impl Vectors {
    pub fn new(size: usize, embeddings: Vec<f32>) -> Result<Self> {
        if size == 0 || embeddings.len() % size != 0 {
            return Err(Error::Format(format!(
                "{} weights do not form rows of {size}",
                embeddings.len()
            )));
        }
        let norms = embeddings.chunks_exact(size).map(norm).collect();
        Ok(Vectors {
            size,
            embeddings,
            norms,
        })
    }

    pub fn num_words(&self) -> usize {
        self.norms.len()
    }

    /// Returns the vector size.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.embeddings
    }

    /// Arithmetic mean of the given rows, or `None` if `ids` is empty.
    pub fn mean(&self, ids: &[usize]) -> Option<Vec<f32>> {
        if ids.is_empty() {
            return None;
        }
        let mut vec = vec![0.0f32; self.size];
        for &i in ids {
            for (v, r) in vec.iter_mut().zip(self[i].iter().copied()) {
                *v += r;
            }
        }
        let n = ids.len() as f32;
        for v in &mut vec {
            *v /= n;
        }
        Some(vec)
    }

    /// The `k` rows most similar to `query` by cosine similarity, as
    /// `(id, similarity)` in descending similarity; ties go to the lower id.
    /// Rows listed in `exclude` are never returned.
    pub fn nearest(
        &self,
        query: &[f32],
        k: usize,
        exclude: &[usize],
    ) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.size {
            return Err(Error::DimensionMismatch {
                found: query.len(),
                expected: self.size,
            });
        }
        if k == 0 {
            return Ok(vec![]);
        }

        let exclude: HashSet<usize> = exclude.iter().copied().collect();
        let query_norm = norm(query);
        let mut best: Vec<(usize, f32)> = (0..self.num_words())
            .filter(|c| !exclude.contains(c))
            .map(|c| {
                let d = query_norm * self.norms[c];
                let similarity = if d > 0.0 { dot(query, &self[c]) / d } else { 0.0 };
                (c, similarity)
            })
            .collect();

        let key = |&(c, similarity): &(usize, f32)| (Reverse(OrderedFloat(similarity)), c);
        if k < best.len() {
            best.select_nth_unstable_by_key(k - 1, key);
            best.truncate(k);
        }
        best.sort_unstable_by_key(key);
        Ok(best)
    }
}

/// Whether the words of a query may appear among its own nearest neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelfMatch {
    #[default]
    Include,
    Exclude,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub word: String,
    pub id: usize,
    pub similarity: f32,
}

/// Result of a nearest-neighbor query, most similar first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighbors {
    entries: Vec<Neighbor>,
}

impl Neighbors {
    pub(crate) fn new(entries: Vec<Neighbor>) -> Self {
        Neighbors { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Neighbor> {
        self.entries.iter()
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|n| n.word.as_str())
    }

    pub fn similarities(&self) -> impl Iterator<Item = f32> + '_ {
        self.entries.iter().map(|n| n.similarity)
    }
}

impl Index<usize> for Neighbors {
    type Output = Neighbor;

    fn index(&self, i: usize) -> &Neighbor {
        &self.entries[i]
    }
}

impl IntoIterator for Neighbors {
    type Item = Neighbor;
    type IntoIter = std::vec::IntoIter<Neighbor>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Neighbors {
    type Item = &'a Neighbor;
    type IntoIter = std::slice::Iter<'a, Neighbor>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectors() -> Vectors {
        Vectors::new(
            2,
            vec![
                1.0, 0.0, //
                0.0, 1.0, //
                2.0, 0.0, //
                1.0, 1.0, //
                0.0, 0.0, //
            ],
        )
        .unwrap()
    }

    #[test]
    fn self_similarity_is_one() {
        let v = [0.3, -1.2, 4.5];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
        assert_eq!(cosine(&v, &[0.0; 3]), 0.0);
    }

    #[test]
    fn ties_go_to_the_lower_id() {
        let best = vectors().nearest(&[1.0, 0.0], 3, &[]).unwrap();
        let ids: Vec<usize> = best.iter().map(|&(id, _)| id).collect();
        assert_eq!(ids, vec![0, 2, 3]);
        assert!((best[0].1 - 1.0).abs() < 1e-6);
        assert!((best[1].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn k_bounds() {
        let v = vectors();
        assert!(v.nearest(&[1.0, 0.0], 0, &[]).unwrap().is_empty());
        assert_eq!(v.nearest(&[1.0, 0.0], 100, &[]).unwrap().len(), 5);
        assert_eq!(v.nearest(&[1.0, 0.0], 100, &[0, 2]).unwrap().len(), 3);
    }

    #[test]
    fn repeated_exclusions_count_once() {
        let v = vectors();
        let best = v.nearest(&[1.0, 0.0], 100, &[2, 0, 2, 2, 0]).unwrap();
        let ids: Vec<usize> = best.iter().map(|&(id, _)| id).collect();
        assert_eq!(ids, vec![3, 1, 4]);
    }

    #[test]
    fn wrong_query_dimension_is_an_error() {
        let v = vectors();
        assert!(matches!(
            v.nearest(&[1.0, 0.0, 0.0], 3, &[]),
            Err(Error::DimensionMismatch {
                found: 3,
                expected: 2
            })
        ));
        assert!(matches!(
            v.nearest(&[], 0, &[]),
            Err(Error::DimensionMismatch { found: 0, .. })
        ));
    }

    #[test]
    fn zero_rows_rank_last_among_non_negative() {
        let best = vectors().nearest(&[0.0, 1.0], 5, &[]).unwrap();
        let ids: Vec<usize> = best.iter().map(|&(id, _)| id).collect();
        assert_eq!(ids, vec![1, 3, 0, 2, 4]);
    }

    #[test]
    fn mean_of_rows() {
        let v = vectors();
        assert_eq!(v.mean(&[0, 1]), Some(vec![0.5, 0.5]));
        assert_eq!(v.mean(&[]), None);
    }

    #[test]
    fn ragged_payload_is_rejected() {
        assert!(matches!(Vectors::new(3, vec![0.0; 7]), Err(Error::Format(_))));
        assert!(matches!(Vectors::new(0, vec![]), Err(Error::Format(_))));
    }
}
