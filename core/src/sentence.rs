//! Punctuation-driven clause segmentation.
//!
//! The segmenter pulls characters from a [`TextNormalizer`] and cuts them into
//! clauses, recording what kind of boundary ended each one. Bracketed and
//! quoted regions are passed through raw as clauses of their own, and
//! `{namespace:key}` placeholders are copied verbatim into the current clause.

use serde::{Deserialize, Serialize};

use crate::normalizer::TextNormalizer;
use crate::units::CharClass;

/// What ended a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Boundary {
    /// `,`
    HalfStop,
    /// `.`, a control character, a non-newline splitter or end of input
    FullStop,
    /// `\` (folded from `、`)
    SeriesStop,
    Question,
    Exclamation,
    /// `^` (folded from `…`)
    Abbreviation,
    Colon,
    Semicolon,
    /// Newline
    Paragraph,
    /// Raw content of a `( ... )` region
    InBracket,
    /// Raw content of a `" ... "` region
    InQuote,
}

impl Boundary {
    /// True for the raw bracket/quote regions, which are not analyzed further.
    pub fn is_region(self) -> bool {
        matches!(self, Boundary::InBracket | Boundary::InQuote)
    }

    fn for_symbol(ch: char) -> Option<Boundary> {
        match ch {
            ',' => Some(Boundary::HalfStop),
            '\\' => Some(Boundary::SeriesStop),
            '.' => Some(Boundary::FullStop),
            '?' => Some(Boundary::Question),
            '!' => Some(Boundary::Exclamation),
            '^' => Some(Boundary::Abbreviation),
            ':' => Some(Boundary::Colon),
            ';' => Some(Boundary::Semicolon),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Bracket,
    Quote,
}

impl Region {
    fn open(ch: char) -> Option<Region> {
        match ch {
            '(' => Some(Region::Bracket),
            '"' => Some(Region::Quote),
            _ => None,
        }
    }

    fn close(self) -> char {
        match self {
            Region::Bracket => ')',
            Region::Quote => '"',
        }
    }

    fn boundary(self) -> Boundary {
        match self {
            Region::Bracket => Boundary::InBracket,
            Region::Quote => Boundary::InQuote,
        }
    }
}

/// One clause and the boundary that ended it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub text: String,
    pub boundary: Boundary,
}

pub struct SentenceSegmenter<I> {
    reader: TextNormalizer<I>,
    pending: Option<Region>,
    last_boundary: Option<Boundary>,
}

impl<I: Iterator<Item = char>> SentenceSegmenter<I> {
    pub fn new(reader: TextNormalizer<I>) -> Self {
        Self {
            reader,
            pending: None,
            last_boundary: None,
        }
    }

    /// Boundary of the clause returned by the latest `next_sentence()`.
    /// `None` before the first call and once the input is exhausted.
    pub fn last_boundary(&self) -> Option<Boundary> {
        self.last_boundary
    }

    fn read_region(&mut self, region: Region) -> String {
        let close = region.close();
        let mut text = String::new();
        for ch in self.reader.by_ref() {
            if ch == close {
                break;
            }
            text.push(ch);
        }
        text
    }

    /// Next clause, or `None` when nothing is left.
    pub fn next_sentence(&mut self) -> Option<String> {
        if let Some(region) = self.pending.take() {
            let text = self.read_region(region);
            self.last_boundary = Some(region.boundary());
            return Some(text);
        }

        let mut current = loop {
            let ch = self.reader.next();
            match self.reader.last_class() {
                Some(CharClass::Splitter | CharClass::Control | CharClass::Other) => continue,
                None => {
                    self.last_boundary = None;
                    return None;
                }
                Some(_) => break ch,
            }
        };

        let mut clause = String::new();
        let boundary = loop {
            let (ch, class) = match (current, self.reader.last_class()) {
                (Some(ch), Some(class)) => (ch, class),
                _ => break Boundary::FullStop,
            };
            match class {
                CharClass::Control => break Boundary::FullStop,
                CharClass::Splitter => match ch {
                    ' ' => clause.push(' '),
                    '\r' => {}
                    '\n' => break Boundary::Paragraph,
                    _ => break Boundary::FullStop,
                },
                CharClass::Symbol => {
                    if let Some(boundary) = Boundary::for_symbol(ch) {
                        break boundary;
                    }
                    if let Some(region) = Region::open(ch) {
                        if clause.is_empty() {
                            clause = self.read_region(region);
                            break region.boundary();
                        }
                        self.pending = Some(region);
                        break Boundary::HalfStop;
                    }
                    if ch == '{' {
                        clause.push('{');
                        for inner in self.reader.by_ref() {
                            clause.push(inner);
                            if inner == '}' {
                                break;
                            }
                        }
                    } else {
                        clause.push(ch);
                    }
                }
                CharClass::Other => {}
                _ => clause.push(ch),
            }
            current = self.reader.next();
        };

        self.last_boundary = Some(boundary);
        Some(clause)
    }
}

impl<I: Iterator<Item = char>> Iterator for SentenceSegmenter<I> {
    type Item = Clause;

    fn next(&mut self) -> Option<Clause> {
        let text = self.next_sentence()?;
        let boundary = self.last_boundary.unwrap_or(Boundary::FullStop);
        Some(Clause { text, boundary })
    }
}

/// Segment a whole string into clauses.
///
/// # Example
/// ```
/// use libchat_core::sentence::{split_clauses, Boundary};
///
/// let clauses = split_clauses("你好，世界。");
/// assert_eq!(clauses.len(), 2);
/// assert_eq!(clauses[0].text, "你好");
/// assert_eq!(clauses[0].boundary, Boundary::HalfStop);
/// assert_eq!(clauses[1].text, "世界");
/// assert_eq!(clauses[1].boundary, Boundary::FullStop);
/// ```
pub fn split_clauses(text: &str) -> Vec<Clause> {
    SentenceSegmenter::new(TextNormalizer::from_text(text)).collect()
}
