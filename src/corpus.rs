//! Splitting raw text into sentences of words.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::settings::TrainSettings;

/// A set of characters, with a fast path for ASCII.
#[derive(Debug, Clone)]
struct CharSet {
    ascii: [bool; 128],
    other: Vec<char>,
}

impl CharSet {
    fn new(chars: &str) -> Self {
        let mut ascii = [false; 128];
        let mut other = vec![];
        for ch in chars.chars() {
            if ch.is_ascii() {
                ascii[ch as usize] = true;
            } else if !other.contains(&ch) {
                other.push(ch);
            }
        }
        CharSet { ascii, other }
    }

    fn contains(&self, ch: char) -> bool {
        if ch.is_ascii() {
            self.ascii[ch as usize]
        } else {
            self.other.contains(&ch)
        }
    }
}

/// Splits text into words at delimiter characters and into sentences at
/// sentence terminators. A terminator also ends the current word.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    word_delimiters: CharSet,
    sentence_delimiters: CharSet,
    max_sentence_length: usize,
}

impl Tokenizer {
    pub fn new(word_delimiters: &str, sentence_delimiters: &str, max_sentence_length: usize) -> Self {
        Tokenizer {
            word_delimiters: CharSet::new(word_delimiters),
            sentence_delimiters: CharSet::new(sentence_delimiters),
            max_sentence_length: max_sentence_length.max(1),
        }
    }

    pub fn from_settings(settings: &TrainSettings) -> Self {
        Tokenizer::new(
            &settings.word_delimiters,
            &settings.sentence_delimiters,
            settings.max_sentence_length,
        )
    }

    /// Iterate over the sentences of `text`.
    pub fn sentences<'t>(&'t self, text: &'t str) -> Sentences<'t> {
        Sentences {
            tokenizer: self,
            text,
            pos: 0,
            stop_words: None,
        }
    }

    /// All words of `text`, ignoring sentence boundaries.
    pub fn words<'t>(&'t self, text: &'t str) -> impl Iterator<Item = &'t str> + 't {
        self.sentences(text).flatten()
    }

    fn is_sentence_end(&self, ch: char) -> bool {
        self.sentence_delimiters.contains(ch)
    }

    fn is_word_end(&self, ch: char) -> bool {
        self.word_delimiters.contains(ch)
    }
}

/// Lazy sentence iterator over a borrowed text.
pub struct Sentences<'t> {
    tokenizer: &'t Tokenizer,
    text: &'t str,
    pos: usize,
    stop_words: Option<&'t StopWords>,
}

impl<'t> Sentences<'t> {
    /// Byte offset of the next unread character.
    pub fn position(&self) -> usize {
        self.pos
    }
}

fn push_word<'t>(sentence: &mut Vec<&'t str>, word: &'t str, stop_words: Option<&StopWords>) {
    if word.is_empty() || stop_words.map_or(false, |s| s.contains(word)) {
        return;
    }
    sentence.push(word);
}

impl<'t> Iterator for Sentences<'t> {
    type Item = Vec<&'t str>;

    fn next(&mut self) -> Option<Vec<&'t str>> {
        let tokenizer = self.tokenizer;
        let text = self.text;
        let stop_words = self.stop_words;
        let mut sentence = vec![];
        while self.pos < text.len() {
            let rest = &text[self.pos..];
            let mut word_start = self.pos;
            let mut end_of_sentence = false;
            let mut consumed = rest.len();
            for (i, ch) in rest.char_indices() {
                let at = self.pos + i;
                let sentence_end = tokenizer.is_sentence_end(ch);
                if sentence_end || tokenizer.is_word_end(ch) {
                    push_word(&mut sentence, &text[word_start..at], stop_words);
                    word_start = at + ch.len_utf8();
                    if sentence_end || sentence.len() >= tokenizer.max_sentence_length {
                        end_of_sentence = true;
                        consumed = i + ch.len_utf8();
                        break;
                    }
                }
            }
            if !end_of_sentence {
                // Ran off the end of the text with a word possibly pending.
                push_word(&mut sentence, &text[word_start..], stop_words);
            }
            self.pos += consumed;
            if !sentence.is_empty() {
                return Some(sentence);
            }
        }
        None
    }
}

/// Words excluded from training entirely.
#[derive(Debug, Clone, Default)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StopWords {
            words: words.into_iter().map(Into::into).collect(),
        }
    }

    /// Read a stop-words file. Words may be separated by whitespace or by any
    /// of the tokenizer's delimiter characters.
    pub fn load(path: &Path, tokenizer: &Tokenizer) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        Ok(StopWords::new(
            tokenizer
                .words(&text)
                .flat_map(str::split_whitespace)
                .map(str::to_string),
        ))
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// The whole training text, held in memory so it can be read once per pass.
pub struct Corpus {
    text: String,
    tokenizer: Tokenizer,
    stop_words: StopWords,
}

impl Corpus {
    /// Read a corpus file. Failure to read it is reported here, never while
    /// iterating.
    pub fn open(path: &Path, tokenizer: Tokenizer) -> Result<Self> {
        let bytes = fs::read(path).map_err(|err| Error::io(path, err))?;
        Ok(Corpus::from_text(
            String::from_utf8_lossy(&bytes).into_owned(),
            tokenizer,
        ))
    }

    pub fn from_text(text: impl Into<String>, tokenizer: Tokenizer) -> Self {
        Corpus {
            text: text.into(),
            tokenizer,
            stop_words: StopWords::default(),
        }
    }

    pub fn with_stop_words(mut self, stop_words: StopWords) -> Self {
        self.stop_words = stop_words;
        self
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Size of the text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Start a fresh pass over the sentences, with stop-words removed.
    pub fn sentences(&self) -> Sentences<'_> {
        let mut sentences = self.tokenizer.sentences(&self.text);
        if !self.stop_words.is_empty() {
            sentences.stop_words = Some(&self.stop_words);
        }
        sentences
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(" \n,.", ".\n", 1000)
    }

    #[test]
    fn splits_words_and_sentences() {
        let t = tokenizer();
        let sentences: Vec<Vec<&str>> = t.sentences("the cat sat. the dog,, sat .").collect();
        assert_eq!(sentences, vec![vec!["the", "cat", "sat"], vec!["the", "dog", "sat"]]);
    }

    #[test]
    fn pending_word_at_end_of_text() {
        let t = tokenizer();
        let sentences: Vec<Vec<&str>> = t.sentences("  one two").collect();
        assert_eq!(sentences, vec![vec!["one", "two"]]);
        assert_eq!(t.sentences("...\n\n  ").count(), 0);
    }

    #[test]
    fn long_sentences_are_split() {
        let t = Tokenizer::new(" ", ".", 2);
        let sentences: Vec<Vec<&str>> = t.sentences("a b c d e.f").collect();
        assert_eq!(
            sentences,
            vec![vec!["a", "b"], vec!["c", "d"], vec!["e"], vec!["f"]]
        );
    }

    #[test]
    fn multibyte_delimiters() {
        let t = Tokenizer::new(" ·", "。", 100);
        let sentences: Vec<Vec<&str>> = t.sentences("ça·va bien。über alles").collect();
        assert_eq!(sentences, vec![vec!["ça", "va", "bien"], vec!["über", "alles"]]);
    }

    #[test]
    fn restartable_and_filters_stop_words() {
        let corpus = Corpus::from_text("a the b. the c.", tokenizer())
            .with_stop_words(StopWords::new(["the"]));
        let first: Vec<Vec<&str>> = corpus.sentences().collect();
        let second: Vec<Vec<&str>> = corpus.sentences().collect();
        assert_eq!(first, vec![vec!["a", "b"], vec!["c"]]);
        assert_eq!(first, second);
    }

    #[test]
    fn missing_file_fails_at_open() {
        let result = Corpus::open(Path::new("/nonexistent/corpus.txt"), tokenizer());
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
