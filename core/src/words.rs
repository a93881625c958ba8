//! Word streams.
//!
//! The analysis pipeline after segmentation is a chain of decorators over a
//! [`WordStream`]: the numeral converter and the synonym canonicalizer each
//! wrap the stream below them and rewrite words as they pass.

/// A cursor over words.
pub trait WordStream {
    /// Consume and return the next word.
    fn next_word(&mut self) -> Option<String>;

    /// Return the next word without consuming it. Decorators that cannot
    /// look ahead return `None`.
    fn peek_word(&self) -> Option<String>;

    /// Skip up to `count` words and return how many were skipped.
    fn skip_words(&mut self, count: usize) -> usize;

    fn has_next(&self) -> bool;

    /// Drain the stream.
    fn collect_words(&mut self) -> Vec<String>
    where
        Self: Sized,
    {
        let mut out = Vec::new();
        while self.has_next() {
            match self.next_word() {
                Some(word) => out.push(word),
                None => break,
            }
        }
        out
    }
}

/// Stream over an owned list of words.
#[derive(Debug, Clone, Default)]
pub struct VecWordStream {
    words: Vec<String>,
    offset: usize,
}

impl VecWordStream {
    pub fn new(words: Vec<String>) -> Self {
        Self { words, offset: 0 }
    }
}

impl From<Vec<String>> for VecWordStream {
    fn from(words: Vec<String>) -> Self {
        Self::new(words)
    }
}

impl WordStream for VecWordStream {
    fn next_word(&mut self) -> Option<String> {
        let word = self.words.get(self.offset).cloned()?;
        self.offset += 1;
        Some(word)
    }

    fn peek_word(&self) -> Option<String> {
        self.words.get(self.offset).cloned()
    }

    fn skip_words(&mut self, count: usize) -> usize {
        let skipped = count.min(self.words.len() - self.offset);
        self.offset += skipped;
        skipped
    }

    fn has_next(&self) -> bool {
        self.offset < self.words.len()
    }
}
