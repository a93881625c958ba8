//! Full-width to half-width folding over a character stream.
//!
//! `TextNormalizer` wraps any `Iterator<Item = char>` and folds each character
//! as it is read: the full-width ASCII block (U+FF01..=U+FF5E) shifts down to
//! plain ASCII and a fixed table of CJK punctuation variants maps onto the
//! ASCII punctuation that the sentence segmenter understands. The class of the
//! last character produced stays available so the consumer need not classify
//! it again.

use phf::phf_map;

use crate::units::{classify, CharClass};

/// CJK punctuation variants and their ASCII stand-ins. Ellipsis becomes `^`
/// so that it survives as a single boundary character.
static PUNCTUATION_FOLDS: phf::Map<char, char> = phf_map! {
    '\u{3000}' => ' ',
    '‘' => '\'',
    '’' => '\'',
    '“' => '"',
    '”' => '"',
    '、' => '\\',
    '﹑' => '\\',
    '﹨' => '\\',
    '。' => '.',
    '﹒' => '.',
    '…' => '^',
    '—' => '-',
    '﹦' => '=',
    '﹟' => '#',
    '﹠' => '&',
    '﹡' => '*',
    '﹢' => '+',
    '﹣' => '-',
    '﹐' => ',',
    '﹔' => ';',
    '﹕' => ':',
    '﹖' => '?',
    '﹗' => '!',
    '﹪' => '%',
    '﹩' => '$',
    '﹫' => '@',
    '〈' => '<',
    '《' => '<',
    '﹤' => '<',
    '〉' => '>',
    '》' => '>',
    '﹥' => '>',
    '「' => '[',
    '『' => '[',
    '【' => '[',
    '〔' => '[',
    '〖' => '[',
    '﹝' => '[',
    '」' => ']',
    '』' => ']',
    '】' => ']',
    '〕' => ']',
    '〗' => ']',
    '﹞' => ']',
    '﹛' => '{',
    '﹜' => '}',
    '﹙' => '(',
    '﹚' => ')',
};

/// Fold a single character.
pub fn fold(ch: char) -> char {
    if let Some(&folded) = PUNCTUATION_FOLDS.get(&ch) {
        return folded;
    }
    match ch {
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(ch as u32 - 65248).unwrap_or(ch),
        _ => ch,
    }
}

/// Fold a whole string.
pub fn normalize_str(text: &str) -> String {
    text.chars().map(fold).collect()
}

/// Folding decorator over a character source.
#[derive(Debug, Clone)]
pub struct TextNormalizer<I> {
    inner: I,
    last_class: Option<CharClass>,
}

impl<I: Iterator<Item = char>> TextNormalizer<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            last_class: None,
        }
    }

    /// Class of the character returned by the latest `next()`, or `None` if
    /// that call produced nothing.
    pub fn last_class(&self) -> Option<CharClass> {
        self.last_class
    }
}

impl<'a> TextNormalizer<std::str::Chars<'a>> {
    pub fn from_text(text: &'a str) -> Self {
        Self::new(text.chars())
    }
}

impl<I: Iterator<Item = char>> Iterator for TextNormalizer<I> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        let ch = self.inner.next().map(fold);
        self.last_class = ch.map(classify);
        ch
    }
}
