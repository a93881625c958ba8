//! Question/answer corpus with an inverted word index.
//!
//! The corpus is a list of sessions, each an ordered list of question/answer
//! pairs. Questions are stored as clause vectors over a sorted vocabulary, and
//! every vocabulary word carries the list of pairs whose question contains
//! it.
//!
//! # Source format
//!
//! Plain text, one line per utterance. A question line is followed by its
//! answer line; a blank line, or a question without an answer, closes the
//! current session. Answers may contain `{namespace:key}` placeholders.
//!
//! # Binary format
//!
//! Big-endian, strings GBK encoded and NUL-terminated:
//!
//! ```text
//! i32 word count
//!   word, i32 posting count, postings as (i32 session, u8 pair)
//! i32 session count
//!   u8 pair count
//!     u8 clause count
//!       clause text, (u8 count, i32 word id)* 0x00, i32 squared norm
//!     answer
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analyzer::ClauseAnalyzer;
use crate::codec;
use crate::error::{Error, Result};
use crate::units::is_numeric;
use crate::utils;
use crate::vector::{FrequencyVector, FrequencyVectorSet};

const FORMAT: &str = "chat corpus";

/// Position of a pair inside the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub session: u32,
    pub pair: u8,
}

impl Location {
    pub fn new(session: u32, pair: u8) -> Self {
        Self { session, pair }
    }
}

/// Result of a vocabulary lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordId {
    Known(u32),
    /// Not in the vocabulary, but made of digits only.
    Numeric,
    Unknown,
}

impl WordId {
    pub fn known(self) -> Option<u32> {
        match self {
            WordId::Known(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPair {
    pub question: FrequencyVectorSet,
    /// Answer template, possibly with `{namespace:key}` placeholders.
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatSession {
    pub pairs: Vec<ChatPair>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCorpus {
    vocabulary: Vec<String>,
    postings: Vec<Vec<Location>>,
    sessions: Vec<ChatSession>,
}

/// Pairs of the session being compiled, with their string-keyed clause counts.
type PendingPair = (Vec<(String, BTreeMap<String, u32>)>, String);

struct Compiler<'a> {
    analyzer: &'a ClauseAnalyzer,
    index: BTreeMap<String, BTreeSet<Location>>,
    sessions: Vec<Vec<PendingPair>>,
    current: Vec<PendingPair>,
}

impl<'a> Compiler<'a> {
    fn close_session(&mut self) {
        if !self.current.is_empty() {
            self.sessions.push(std::mem::take(&mut self.current));
        }
    }

    fn add_pair(&mut self, question: &str, answer: &str) -> Result<()> {
        let session = self.sessions.len();
        let pair = self.current.len();
        Error::check_width("session id", session, i32::MAX as usize)?;
        Error::check_width("pair index", pair, u8::MAX as usize - 1)?;
        let location = Location::new(session as u32, pair as u8);

        let clauses = self.analyzer.analyze(question);
        Error::check_width("clause count", clauses.len(), u8::MAX as usize)?;
        let mut vectors = Vec::with_capacity(clauses.len());
        for clause in clauses {
            let mut counts: BTreeMap<String, u32> = BTreeMap::new();
            for word in clause.words {
                self.index.entry(word.clone()).or_default().insert(location);
                *counts.entry(word).or_insert(0) += 1;
            }
            if let Some(&count) = counts.values().max() {
                Error::check_width("word count in clause", count as usize, u8::MAX as usize)?;
            }
            vectors.push((clause.text, counts));
        }
        self.current.push((vectors, answer.to_string()));
        Ok(())
    }

    fn add_source(&mut self, name: &str, text: &str) -> Result<()> {
        let before = self.sessions.len();
        let mut lines = text.lines().map(utils::normalize);
        while let Some(question) = lines.next() {
            if question.trim().is_empty() {
                self.close_session();
                continue;
            }
            let answer = lines.next().unwrap_or_default();
            if answer.trim().is_empty() {
                self.close_session();
                continue;
            }
            self.add_pair(&question, &answer)?;
        }
        self.close_session();
        debug!(source = name, sessions = self.sessions.len() - before, "compiled chat source");
        Ok(())
    }

    fn finish(self) -> ChatCorpus {
        let ids: BTreeMap<&str, u32> = self
            .index
            .keys()
            .enumerate()
            .map(|(id, word)| (word.as_str(), id as u32))
            .collect();
        let sessions = self
            .sessions
            .into_iter()
            .map(|pairs| ChatSession {
                pairs: pairs
                    .into_iter()
                    .map(|(clauses, answer)| {
                        let vectors = clauses
                            .into_iter()
                            .map(|(text, counts)| {
                                let counts = counts
                                    .into_iter()
                                    .filter_map(|(word, c)| ids.get(word.as_str()).map(|&id| (id, c)))
                                    .collect();
                                FrequencyVector::new(text, counts)
                            })
                            .collect();
                        ChatPair {
                            question: FrequencyVectorSet::new(vectors),
                            answer,
                        }
                    })
                    .collect(),
            })
            .collect();
        let (vocabulary, postings): (Vec<String>, Vec<Vec<Location>>) = self
            .index
            .into_iter()
            .map(|(word, locations)| (word, locations.into_iter().collect()))
            .unzip();
        ChatCorpus {
            vocabulary,
            postings,
            sessions,
        }
    }
}

impl ChatCorpus {
    /// Compile `(name, text)` sources. Each source starts a fresh session.
    pub fn compile<I, N, T>(sources: I, analyzer: &ClauseAnalyzer) -> Result<Self>
    where
        I: IntoIterator<Item = (N, T)>,
        N: AsRef<str>,
        T: AsRef<str>,
    {
        let mut compiler = Compiler {
            analyzer,
            index: BTreeMap::new(),
            sessions: Vec::new(),
            current: Vec::new(),
        };
        for (name, text) in sources {
            compiler.add_source(name.as_ref(), text.as_ref())?;
        }
        let corpus = compiler.finish();
        info!(
            words = corpus.vocabulary.len(),
            sessions = corpus.sessions.len(),
            pairs = corpus.pair_count(),
            "compiled chat corpus"
        );
        Ok(corpus)
    }

    /// Look a word up in the sorted vocabulary.
    pub fn word_id(&self, word: &str) -> WordId {
        match self.vocabulary.binary_search_by(|w| w.as_str().cmp(word)) {
            Ok(id) => WordId::Known(id as u32),
            Err(_) if is_numeric(word) => WordId::Numeric,
            Err(_) => WordId::Unknown,
        }
    }

    pub fn word(&self, id: u32) -> Option<&str> {
        self.vocabulary.get(id as usize).map(String::as_str)
    }

    /// Pairs whose question contains word `id`, in ascending order.
    pub fn postings(&self, id: u32) -> &[Location] {
        self.postings.get(id as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn session(&self, id: u32) -> Option<&ChatSession> {
        self.sessions.get(id as usize)
    }

    pub fn pair(&self, location: Location) -> Option<&ChatPair> {
        self.session(location.session)?.pairs.get(location.pair as usize)
    }

    /// Union of the postings of `words`.
    pub fn candidates<I: IntoIterator<Item = u32>>(&self, words: I) -> BTreeSet<Location> {
        words
            .into_iter()
            .flat_map(|id| self.postings(id).iter().copied())
            .collect()
    }

    pub fn word_count(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn pair_count(&self) -> usize {
        self.sessions.iter().map(|s| s.pairs.len()).sum()
    }

    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self> {
        let word_count = codec::read_count_be(reader, FORMAT)?;
        let mut vocabulary: Vec<String> = Vec::with_capacity(word_count.min(1 << 16));
        let mut postings = Vec::with_capacity(word_count.min(1 << 16));
        for _ in 0..word_count {
            let word = codec::read_gbkz(reader)?;
            if let Some(previous) = vocabulary.last() {
                if previous.as_str() >= word.as_str() {
                    return Err(Error::corrupt(FORMAT, format!("vocabulary not ascending at {word:?}")));
                }
            }
            let posting_count = codec::read_count_be(reader, FORMAT)?;
            let mut list = Vec::with_capacity(posting_count.min(1 << 16));
            for _ in 0..posting_count {
                let session = codec::read_count_be(reader, FORMAT)?;
                let pair = codec::read_u8(reader)?;
                list.push(Location::new(session as u32, pair));
            }
            vocabulary.push(word);
            postings.push(list);
        }

        let session_count = codec::read_count_be(reader, FORMAT)?;
        let mut sessions = Vec::with_capacity(session_count.min(1 << 16));
        for _ in 0..session_count {
            let pair_count = codec::read_u8(reader)?;
            let mut pairs = Vec::with_capacity(pair_count as usize);
            for _ in 0..pair_count {
                let clause_count = codec::read_u8(reader)?;
                let mut vectors = Vec::with_capacity(clause_count as usize);
                for _ in 0..clause_count {
                    vectors.push(read_clause(reader, word_count)?);
                }
                let answer = codec::read_gbkz(reader)?;
                pairs.push(ChatPair {
                    question: FrequencyVectorSet::new(vectors),
                    answer,
                });
            }
            sessions.push(ChatSession { pairs });
        }
        if codec::peek_u8(reader)?.is_some() {
            return Err(Error::corrupt(FORMAT, "trailing bytes after last session"));
        }

        let corpus = ChatCorpus {
            vocabulary,
            postings,
            sessions,
        };
        for (id, list) in corpus.postings.iter().enumerate() {
            if let Some(bad) = list.iter().find(|&&loc| corpus.pair(loc).is_none()) {
                return Err(Error::corrupt(
                    FORMAT,
                    format!("posting {bad:?} of word {:?} has no pair", corpus.vocabulary[id]),
                ));
            }
        }
        Ok(corpus)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        codec::write_i32_be(writer, codec::count_to_i32("word count", self.vocabulary.len())?)?;
        for (word, list) in self.vocabulary.iter().zip(&self.postings) {
            codec::write_gbkz(writer, word)?;
            codec::write_i32_be(writer, codec::count_to_i32("posting count", list.len())?)?;
            for location in list {
                codec::write_i32_be(writer, codec::count_to_i32("session id", location.session as usize)?)?;
                codec::write_u8(writer, location.pair)?;
            }
        }

        codec::write_i32_be(writer, codec::count_to_i32("session count", self.sessions.len())?)?;
        for session in &self.sessions {
            Error::check_width("pair count", session.pairs.len(), u8::MAX as usize)?;
            codec::write_u8(writer, session.pairs.len() as u8)?;
            for pair in &session.pairs {
                let vectors = pair.question.vectors();
                Error::check_width("clause count", vectors.len(), u8::MAX as usize)?;
                codec::write_u8(writer, vectors.len() as u8)?;
                for vector in vectors {
                    write_clause(writer, vector)?;
                }
                codec::write_gbkz(writer, &pair.answer)?;
            }
        }
        Ok(())
    }

    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let corpus = Self::read_from(&mut reader)?;
        info!(
            path = %path.display(),
            words = corpus.word_count(),
            sessions = corpus.session_count(),
            "loaded chat corpus"
        );
        Ok(corpus)
    }

    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        info!(path = %path.display(), words = self.word_count(), "saved chat corpus");
        Ok(())
    }
}

fn read_clause<R: BufRead>(reader: &mut R, word_count: usize) -> Result<FrequencyVector> {
    let text = codec::read_gbkz(reader)?;
    let mut counts = BTreeMap::new();
    loop {
        let count = codec::read_u8(reader)?;
        if count == 0 {
            break;
        }
        let id = codec::read_count_be(reader, FORMAT)?;
        if id >= word_count {
            return Err(Error::corrupt(FORMAT, format!("word id {id} out of range in clause {text:?}")));
        }
        if counts.insert(id as u32, u32::from(count)).is_some() {
            return Err(Error::corrupt(FORMAT, format!("word id {id} repeated in clause {text:?}")));
        }
    }
    let norm = codec::read_count_be(reader, FORMAT)?;
    FrequencyVector::with_norm(text, counts, norm as u64)
        .ok_or_else(|| Error::corrupt(FORMAT, format!("squared norm {norm} does not match its counts")))
}

fn write_clause<W: Write>(writer: &mut W, vector: &FrequencyVector) -> Result<()> {
    codec::write_gbkz(writer, vector.text())?;
    for (&id, &count) in vector.counts() {
        Error::check_width("word count in clause", count as usize, u8::MAX as usize)?;
        if count == 0 {
            continue;
        }
        codec::write_u8(writer, count as u8)?;
        codec::write_i32_be(writer, codec::count_to_i32("word id", id as usize)?)?;
    }
    codec::write_u8(writer, 0)?;
    codec::write_i32_be(writer, codec::count_to_i32("squared norm", vector.norm_squared() as usize)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Lexicon;
    use crate::segmenter::WordSegmenter;
    use crate::synonym::SynonymTable;
    use crate::units::split_units;
    use std::io::Cursor;
    use std::sync::Arc;

    fn analyzer() -> ClauseAnalyzer {
        let mut lx = Lexicon::new();
        for (word, freq) in [("你好", 100.0), ("天气", 80.0), ("怎么样", 60.0), ("今天", 50.0), ("吃饭", 40.0)] {
            lx.set(&split_units(word), None, freq);
        }
        ClauseAnalyzer::new(WordSegmenter::new(Arc::new(lx), 16), Arc::new(SynonymTable::new()))
    }

    const SOURCE: &str = "你好\n你好呀\n今天天气怎么样\n{.system.DateTime:week}天气不错\n\n吃饭\n吃了\n你好\n";

    fn corpus() -> ChatCorpus {
        ChatCorpus::compile([("chat.txt", SOURCE)], &analyzer()).unwrap()
    }

    #[test]
    fn sessions_are_split_on_blank_lines_and_missing_answers() {
        let c = corpus();
        // the trailing "你好" has no answer and is dropped
        assert_eq!(c.session_count(), 2);
        assert_eq!(c.session(0).unwrap().pairs.len(), 2);
        assert_eq!(c.session(1).unwrap().pairs.len(), 1);
        assert_eq!(c.pair(Location::new(0, 0)).unwrap().answer, "你好呀");
        assert_eq!(c.pair(Location::new(0, 2)), None);
    }

    #[test]
    fn vocabulary_is_sorted_and_indexed() {
        let c = corpus();
        let words: Vec<&str> = (0..c.word_count() as u32).filter_map(|id| c.word(id)).collect();
        let mut sorted = words.clone();
        sorted.sort();
        assert_eq!(words, sorted);

        let id = c.word_id("天气").known().unwrap();
        assert_eq!(c.postings(id), &[Location::new(0, 1)]);
        let hello = c.word_id("你好").known().unwrap();
        assert_eq!(c.postings(hello), &[Location::new(0, 0)]);
        assert_eq!(c.word_id("2019"), WordId::Numeric);
        assert_eq!(c.word_id("不存在"), WordId::Unknown);
    }

    #[test]
    fn postings_are_deduplicated() {
        let c = ChatCorpus::compile([("a", "你好，你好\n嗯\n")], &analyzer()).unwrap();
        let hello = c.word_id("你好").known().unwrap();
        assert_eq!(c.postings(hello).len(), 1);
        let question = &c.pair(Location::new(0, 0)).unwrap().question;
        assert_eq!(question.len(), 2);
        assert_eq!(question.total_length(), 4);
    }

    #[test]
    fn candidates_union_postings() {
        let c = corpus();
        let ids = ["你好", "吃饭"].iter().filter_map(|w| c.word_id(w).known());
        let found: Vec<Location> = c.candidates(ids).into_iter().collect();
        assert_eq!(found, vec![Location::new(0, 0), Location::new(1, 0)]);
    }

    #[test]
    fn binary_round_trip() {
        let c = corpus();
        let mut buf = Vec::new();
        c.write_to(&mut buf).unwrap();
        let loaded = ChatCorpus::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(loaded, c);
        assert_eq!(loaded.word_id("今天"), c.word_id("今天"));
    }

    #[test]
    fn truncated_and_trailing_input_is_rejected() {
        let mut buf = Vec::new();
        corpus().write_to(&mut buf).unwrap();

        let mut short = buf.clone();
        short.truncate(buf.len() - 2);
        assert!(ChatCorpus::read_from(&mut Cursor::new(short)).is_err());

        let mut long = buf;
        long.push(7);
        assert!(matches!(
            ChatCorpus::read_from(&mut Cursor::new(long)),
            Err(Error::Corrupt { .. })
        ));
    }

    #[test]
    fn dangling_posting_is_corrupt() {
        let mut buf = Vec::new();
        codec::write_i32_be(&mut buf, 1).unwrap();
        codec::write_gbkz(&mut buf, "你好").unwrap();
        codec::write_i32_be(&mut buf, 1).unwrap();
        codec::write_i32_be(&mut buf, 3).unwrap();
        codec::write_u8(&mut buf, 0).unwrap();
        codec::write_i32_be(&mut buf, 0).unwrap();
        let err = ChatCorpus::read_from(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }

    #[test]
    fn bad_norm_is_corrupt() {
        let mut buf = Vec::new();
        codec::write_i32_be(&mut buf, 1).unwrap();
        codec::write_gbkz(&mut buf, "你好").unwrap();
        codec::write_i32_be(&mut buf, 0).unwrap();
        codec::write_i32_be(&mut buf, 1).unwrap(); // sessions
        codec::write_u8(&mut buf, 1).unwrap(); // pairs
        codec::write_u8(&mut buf, 1).unwrap(); // clauses
        codec::write_gbkz(&mut buf, "你好").unwrap();
        codec::write_u8(&mut buf, 2).unwrap();
        codec::write_i32_be(&mut buf, 0).unwrap();
        codec::write_u8(&mut buf, 0).unwrap();
        codec::write_i32_be(&mut buf, 5).unwrap();
        codec::write_gbkz(&mut buf, "你好呀").unwrap();
        let err = ChatCorpus::read_from(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }
}
