/// Sizes reported once the vocabulary has been built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocabularySummary {
    /// Number of distinct words kept.
    pub vocabulary_size: usize,
    /// Occurrences of kept words; this is what one training pass consumes.
    pub train_words: u64,
    /// Occurrences of all words read, including discarded ones.
    pub total_words: u64,
}

/// Training progress callbacks.
///
/// All methods are called on the thread that started training, never from
/// a worker, and never concurrently with each other.
pub trait Progress {
    /// Percentage of the corpus scanned while counting words.
    fn parsing(&mut self, _percent: f32) {}

    fn vocabulary(&mut self, _summary: &VocabularySummary) {}

    /// Current learning rate and percentage of all iterations done.
    fn training(&mut self, _alpha: f32, _percent: f32) {}
}

/// Ignores all progress.
pub struct Silent;

impl Progress for Silent {}
