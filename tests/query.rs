use w2v::*;

/// A model with hand-picked two-dimensional vectors.
fn model(entries: &[(&str, [f32; 2])]) -> Model {
    let settings = TrainSettings {
        vector_size: 2,
        ..TrainSettings::default()
    };
    let n = entries.len() as u64;
    let vocab = Vocabulary::from_counts(
        entries
            .iter()
            .enumerate()
            .map(|(i, (w, _))| (w.to_string(), n - i as u64))
            .collect(),
        1,
    )
    .unwrap();
    let embeddings = entries.iter().flat_map(|(_, v)| *v).collect();
    Model::from_parts(settings, vocab, embeddings).unwrap()
}

fn fruit() -> Model {
    model(&[
        ("king", [1.0, 0.0]),
        ("queen", [0.9, 0.1]),
        ("apple", [0.0, 1.0]),
        ("pear", [0.1, 0.9]),
        ("zero", [0.0, 0.0]),
    ])
}

fn words(neighbors: &Neighbors) -> Vec<&str> {
    neighbors.words().collect()
}

#[test]
fn a_word_is_its_own_nearest_neighbor() {
    let m = fruit();
    for word in ["king", "queen", "apple", "pear"] {
        let v = m.vector(word).unwrap();
        assert!((cosine(v, v) - 1.0).abs() < 1e-6);
        let best = m.nearest(v, 1).unwrap();
        assert_eq!(words(&best), vec![word]);
        assert!((best[0].similarity - 1.0).abs() < 1e-6);
    }
}

#[test]
fn self_match_policy() {
    let m = fruit();
    let included = m.lookup("king", 2, SelfMatch::Include).unwrap();
    assert_eq!(words(&included), vec!["king", "queen"]);

    let excluded = m.lookup("king", 2, SelfMatch::Exclude).unwrap();
    assert_eq!(words(&excluded), vec!["queen", "pear"]);

    let excluded = m.lookup("king apple", 10, SelfMatch::Exclude).unwrap();
    assert!(!excluded.words().any(|w| w == "king" || w == "apple"));
    assert_eq!(excluded.len(), 3);
}

#[test]
fn k_is_clamped_to_the_vocabulary() {
    let m = fruit();
    let q = m.vector("apple").unwrap();
    assert!(m.nearest(q, 0).unwrap().is_empty());
    assert!(m.lookup("apple", 0, SelfMatch::Include).unwrap().is_empty());
    assert_eq!(m.nearest(q, 5).unwrap().len(), 5);
    assert_eq!(m.nearest(q, 1000).unwrap().len(), 5);
}

#[test]
fn results_are_sorted_by_similarity() {
    let m = fruit();
    let all = m.nearest(&[0.6, 0.4], 5).unwrap();
    let scores: Vec<f32> = all.similarities().collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{scores:?}");
    // The zero vector has similarity 0 to everything.
    assert_eq!(all[4].word, "zero");
    assert_eq!(all[4].similarity, 0.0);
}

#[test]
fn ties_go_to_the_lower_id() {
    let m = model(&[
        ("b", [0.0, 1.0]),
        ("a", [2.0, 0.0]),
        ("c", [1.0, 0.0]),
        ("d", [3.0, 0.0]),
    ]);
    let best = m.nearest(&[1.0, 0.0], 3).unwrap();
    assert_eq!(words(&best), vec!["a", "c", "d"]);
    let ids: Vec<usize> = best.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn document_embedding_averages_known_words() {
    let m = fruit();
    assert_eq!(m.embedding("king apple").unwrap(), vec![0.5, 0.5]);
    assert_eq!(m.embedding("king, fish!").unwrap(), vec![1.0, 0.0]);
    assert_eq!(m.embedding("king king").unwrap(), vec![1.0, 0.0]);
}

#[test]
fn documents_without_known_words_fail() {
    let m = fruit();
    assert!(matches!(m.embedding("fish chips"), Err(Error::EmptyDocument)));
    assert!(matches!(m.embedding(""), Err(Error::EmptyDocument)));
    assert!(matches!(m.embedding(" . ,"), Err(Error::EmptyDocument)));
    assert!(matches!(
        m.lookup("fish", 3, SelfMatch::Include),
        Err(Error::EmptyDocument)
    ));
}

#[test]
fn word_queries() {
    let m = fruit();
    assert_eq!(m.vector_of("pear").unwrap(), vec![0.1, 0.9]);
    assert!(m.vector("Pear").is_none());
    assert!((m.similarity("king", "king").unwrap() - 1.0).abs() < 1e-6);
    assert!(m.similarity("king", "apple").unwrap().abs() < 1e-6);
    assert!(matches!(m.similarity("king", "fish"), Err(Error::UnknownWord(_))));
}

#[test]
fn dimension_mismatches_are_errors() {
    let m = fruit();
    assert!(matches!(
        m.nearest(&[1.0, 0.0, 0.0], 3),
        Err(Error::DimensionMismatch {
            found: 3,
            expected: 2
        })
    ));

    let vocab = Vocabulary::from_counts(vec![("a".into(), 1)], 1).unwrap();
    let settings = TrainSettings {
        vector_size: 2,
        ..TrainSettings::default()
    };
    assert!(matches!(
        Model::from_parts(settings, vocab, vec![0.0; 3]),
        Err(Error::DimensionMismatch { .. })
    ));
}
