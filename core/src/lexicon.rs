//! Weighted dictionary of words over unit sequences.
//!
//! Words are stored in a [`Trie`] walked from the *last* unit to the first,
//! so a walk that starts at some end position visits every dictionary word
//! ending there. This is what the segmenter's frequency trace relies on.
//!
//! Each node carries a [`WordInfo`]: frequency `0.0` marks an internal node
//! that is not itself a word, [`UNDEFINED_FREQUENCY`] a known word without a
//! usable frequency.
//!
//! Public API:
//! - `Lexicon::find` / `set` / `add` / `delete` / `frequency_trace`
//! - `Lexicon::read_from` / `write_to` (binary dump) and `from_source` (text)
//! - `PartOfSpeech`: the 29 tags, ordinal equals the on-disk byte

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::codec;
use crate::error::{Error, Result};
use crate::trie::{NodeId, Trie};
use crate::units::{is_cjk, is_cjk_unit, split_units};

/// Frequency of a word whose weight is unknown.
pub const UNDEFINED_FREQUENCY: f64 = -1.0;

const NO_TAG: u8 = 0xFF;
const END_OF_CHILDREN: u8 = 0xFE;
const FORMAT: &str = "lexicon";

/// Part-of-speech tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartOfSpeech {
    A,
    C,
    D,
    E,
    F,
    H,
    I,
    J,
    K,
    M,
    Mq,
    N,
    Nd,
    Nh,
    Nhf,
    Nhs,
    Ni,
    Nl,
    Ns,
    Nt,
    O,
    P,
    Q,
    R,
    U,
    V,
    Vd,
    Vl,
    Vu,
}

impl PartOfSpeech {
    pub const ALL: [PartOfSpeech; 29] = [
        PartOfSpeech::A,
        PartOfSpeech::C,
        PartOfSpeech::D,
        PartOfSpeech::E,
        PartOfSpeech::F,
        PartOfSpeech::H,
        PartOfSpeech::I,
        PartOfSpeech::J,
        PartOfSpeech::K,
        PartOfSpeech::M,
        PartOfSpeech::Mq,
        PartOfSpeech::N,
        PartOfSpeech::Nd,
        PartOfSpeech::Nh,
        PartOfSpeech::Nhf,
        PartOfSpeech::Nhs,
        PartOfSpeech::Ni,
        PartOfSpeech::Nl,
        PartOfSpeech::Ns,
        PartOfSpeech::Nt,
        PartOfSpeech::O,
        PartOfSpeech::P,
        PartOfSpeech::Q,
        PartOfSpeech::R,
        PartOfSpeech::U,
        PartOfSpeech::V,
        PartOfSpeech::Vd,
        PartOfSpeech::Vl,
        PartOfSpeech::Vu,
    ];

    const TAGS: [&'static str; 29] = [
        "a", "c", "d", "e", "f", "h", "i", "j", "k", "m", "mq", "n", "nd", "nh", "nhf", "nhs",
        "ni", "nl", "ns", "nt", "o", "p", "q", "r", "u", "v", "vd", "vl", "vu",
    ];

    /// Parse a tag such as `"nhf"`. Unknown tags yield `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::TAGS
            .iter()
            .position(|t| *t == tag)
            .map(|i| Self::ALL[i])
    }

    pub fn tag(self) -> &'static str {
        Self::TAGS[self as usize]
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

impl std::fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Payload of a trie node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WordInfo {
    pub frequency: f64,
    pub part_of_speech: Option<PartOfSpeech>,
}

impl WordInfo {
    pub fn is_word(&self) -> bool {
        self.frequency != 0.0
    }
}

/// Trie-backed dictionary with a running word count.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    trie: Trie<WordInfo>,
    word_count: usize,
}

impl Lexicon {
    /// Create an empty lexicon.
    pub fn new() -> Self {
        Self::default()
    }

    fn node_for<S: AsRef<str>>(&self, units: &[S]) -> Option<NodeId> {
        self.trie.walk(units.iter().rev())
    }

    /// Look a word up. Succeeds only when every unit is consumed and the final
    /// node is a word.
    pub fn find<S: AsRef<str>>(&self, units: &[S]) -> Option<WordInfo> {
        if units.is_empty() {
            return None;
        }
        let node = self.node_for(units)?;
        let info = *self.trie.value(node);
        info.is_word().then_some(info)
    }

    pub fn contains<S: AsRef<str>>(&self, units: &[S]) -> bool {
        self.find(units).is_some()
    }

    /// Insert or overwrite a word. Returns `true` when an existing node was
    /// updated and `false` when a word was added. Setting frequency `0.0`
    /// turns the node back into a non-word. An empty unit list is ignored.
    pub fn set<S: AsRef<str>>(
        &mut self,
        units: &[S],
        part_of_speech: Option<PartOfSpeech>,
        frequency: f64,
    ) -> bool {
        if units.is_empty() {
            return false;
        }
        let existed = self.node_for(units).is_some();
        let node = self.trie.insert_path(units.iter().rev());
        let info = self.trie.value_mut(node);
        let was_word = info.is_word();
        info.part_of_speech = part_of_speech;
        info.frequency = frequency;

        let updated = match (existed, was_word, frequency != 0.0) {
            (false, _, is_word) => {
                if is_word {
                    self.word_count += 1;
                }
                false
            }
            (true, false, true) => {
                self.word_count += 1;
                false
            }
            (true, false, false) => true,
            (true, true, is_word) => {
                if !is_word {
                    self.word_count -= 1;
                }
                true
            }
        };
        if frequency == 0.0 {
            self.trie.prune(node, |v| !v.is_word());
        }
        updated
    }

    /// Insert a word only if it is not already present. Returns `true` when
    /// it was added.
    pub fn add<S: AsRef<str>>(
        &mut self,
        units: &[S],
        part_of_speech: Option<PartOfSpeech>,
        frequency: f64,
    ) -> bool {
        if self.contains(units) {
            return false;
        }
        self.set(units, part_of_speech, frequency);
        self.contains(units)
    }

    /// Remove a word. A leaf is unlinked from its parent (together with any
    /// ancestors that were only holding it up); a node that still prefixes
    /// other words only loses its frequency.
    pub fn delete<S: AsRef<str>>(&mut self, units: &[S]) -> bool {
        if units.is_empty() {
            return false;
        }
        let Some(node) = self.node_for(units) else {
            return false;
        };
        if !self.trie.value(node).is_word() {
            return false;
        }
        self.word_count -= 1;
        if self.trie.has_children(node) {
            *self.trie.value_mut(node) = WordInfo::default();
        } else {
            self.trie.remove(node);
            if let Some(parent) = self.node_for(&units[1..]) {
                self.trie.prune(parent, |v| !v.is_word());
            }
        }
        true
    }

    /// Per-position frequencies met while walking from `units[end - 1]` back
    /// towards `units[begin]`.
    ///
    /// `trace[i]` is the frequency stored for the unit run `units[i..end]`.
    /// The result always has `units.len()` entries: positions outside
    /// `[begin, end)` and positions beyond the first missing edge stay `0.0`.
    ///
    /// # Example
    /// ```
    /// use libchat_core::lexicon::Lexicon;
    ///
    /// let mut lx = Lexicon::new();
    /// lx.set(&["好"], None, 3.0);
    /// lx.set(&["你", "好"], None, 8.0);
    /// let trace = lx.frequency_trace(&["說", "你", "好"], 0, 3);
    /// assert_eq!(trace, vec![0.0, 8.0, 3.0]);
    /// ```
    pub fn frequency_trace<S: AsRef<str>>(&self, units: &[S], begin: usize, end: usize) -> Vec<f64> {
        let mut trace = vec![0.0; units.len()];
        let end = end.min(units.len());
        let mut node = Trie::<WordInfo>::ROOT;
        for i in (begin..end).rev() {
            match self.trie.child(node, units[i].as_ref()) {
                Some(child) => {
                    trace[i] = self.trie.value(child).frequency;
                    node = child;
                }
                None => break,
            }
        }
        trace
    }

    /// Number of words (nodes with non-zero frequency).
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Number of trie nodes, root included.
    pub fn node_count(&self) -> usize {
        self.trie.node_count()
    }

    /// Build a lexicon from whitespace-separated `word tag frequency` records.
    /// Unknown tags are stored as no tag; a frequency that does not parse
    /// fails with the record number.
    pub fn from_source(text: &str) -> Result<Self> {
        let mut lexicon = Self::new();
        let mut tokens = text
            .lines()
            .enumerate()
            .flat_map(|(n, line)| line.split_whitespace().map(move |t| (n + 1, t)));
        let mut record = 0usize;
        while let Some((line, word)) = tokens.next() {
            record += 1;
            let incomplete = || Error::Source {
                line,
                message: format!("record {record} ({word}) is incomplete"),
            };
            let (_, tag) = tokens.next().ok_or_else(incomplete)?;
            let (freq_line, freq) = tokens.next().ok_or_else(incomplete)?;
            let frequency: f64 = freq.parse().map_err(|_| Error::Source {
                line: freq_line,
                message: format!("bad frequency {freq:?} in record {record}"),
            })?;
            lexicon.set(&split_units(word), PartOfSpeech::parse(tag), frequency);
        }
        info!(records = record, words = lexicon.word_count, "built lexicon from source");
        Ok(lexicon)
    }

    /// Load a breadth-first binary dump.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self> {
        let mut lexicon = Self::new();
        let mut queue = VecDeque::from([Trie::<WordInfo>::ROOT]);
        while let Some(parent) = queue.pop_front() {
            let mut marker = codec::read_u8(reader)?;
            while marker != END_OF_CHILDREN {
                let part_of_speech = match marker {
                    NO_TAG => None,
                    b => Some(PartOfSpeech::from_ordinal(b).ok_or_else(|| {
                        Error::corrupt(FORMAT, format!("unknown part-of-speech byte {b:#04x}"))
                    })?),
                };
                let frequency = codec::read_f64_le(reader)?;
                let key = codec::read_utf16_key(reader, is_cjk_unit)?;
                if lexicon.trie.child(parent, &key).is_some() {
                    return Err(Error::corrupt(FORMAT, format!("duplicate key {key:?}")));
                }
                let child = lexicon.trie.child_or_insert(parent, &key);
                *lexicon.trie.value_mut(child) = WordInfo {
                    frequency,
                    part_of_speech,
                };
                if frequency != 0.0 {
                    lexicon.word_count += 1;
                }
                queue.push_back(child);
                marker = codec::read_u8(reader)?;
            }
        }
        if codec::peek_u8(reader)?.is_some() {
            return Err(Error::corrupt(FORMAT, "trailing bytes after last node"));
        }
        Ok(lexicon)
    }

    /// Write the breadth-first binary dump.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut queue = VecDeque::from([Trie::<WordInfo>::ROOT]);
        while let Some(node) = queue.pop_front() {
            for (key, child) in self.trie.children(node) {
                let info = self.trie.value(child);
                let tag = info.part_of_speech.map(PartOfSpeech::ordinal).unwrap_or(NO_TAG);
                codec::write_u8(writer, tag)?;
                codec::write_f64_le(writer, info.frequency)?;
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(first), None) if is_cjk(first) => codec::write_utf16(writer, key)?,
                    (Some(first), Some(_)) if is_cjk(first) => {
                        return Err(Error::Encoding {
                            encoding: "UTF-16",
                            direction: "encode",
                            text: key.to_string(),
                        })
                    }
                    _ => codec::write_utf16z(writer, key)?,
                }
                queue.push_back(child);
            }
            codec::write_u8(writer, END_OF_CHILDREN)?;
        }
        Ok(())
    }

    /// Load a dump produced by `save_file`.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let lexicon = Self::read_from(&mut reader)?;
        info!(path = %path.display(), words = lexicon.word_count, "loaded lexicon");
        Ok(lexicon)
    }

    /// Save the lexicon as a binary dump.
    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        info!(path = %path.display(), words = self.word_count, "saved lexicon");
        Ok(())
    }

    /// Read a source text file (UTF-8, or GBK as a fallback).
    pub fn load_source_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        Self::from_source(&codec::decode_source(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn u(word: &str) -> Vec<String> {
        split_units(word)
    }

    fn sample() -> Lexicon {
        let mut lx = Lexicon::new();
        lx.set(&u("你好"), Some(PartOfSpeech::I), 120.0);
        lx.set(&u("好"), Some(PartOfSpeech::A), 300.0);
        lx.set(&u("美好"), Some(PartOfSpeech::A), 40.0);
        lx.set(&u("iPhone"), Some(PartOfSpeech::N), 5.0);
        lx.set(&u("你"), Some(PartOfSpeech::R), UNDEFINED_FREQUENCY);
        lx
    }

    #[test]
    fn tags_round_trip_through_ordinals() {
        for (i, pos) in PartOfSpeech::ALL.iter().enumerate() {
            assert_eq!(pos.ordinal() as usize, i);
            assert_eq!(PartOfSpeech::parse(pos.tag()), Some(*pos));
        }
        assert_eq!(PartOfSpeech::parse("nhf"), Some(PartOfSpeech::Nhf));
        assert_eq!(PartOfSpeech::parse("zz"), None);
        assert_eq!(PartOfSpeech::from_ordinal(29), None);
    }

    #[test]
    fn set_then_find() {
        let lx = sample();
        let info = lx.find(&u("你好")).unwrap();
        assert_eq!(info.frequency, 120.0);
        assert_eq!(info.part_of_speech, Some(PartOfSpeech::I));
        assert_eq!(lx.find(&u("你")).unwrap().frequency, UNDEFINED_FREQUENCY);
        assert!(lx.find(&u("美")).is_none());
        assert!(lx.find(&u("你好吗")).is_none());
        assert!(lx.find::<String>(&[]).is_none());
        assert_eq!(lx.word_count(), 5);
    }

    #[test]
    fn set_reports_update_and_tracks_count() {
        let mut lx = Lexicon::new();
        assert!(!lx.set(&u("朋友"), None, 9.0));
        assert!(lx.set(&u("朋友"), Some(PartOfSpeech::N), 10.0));
        assert_eq!(lx.word_count(), 1);
        // an internal node becoming a word counts as an addition
        assert!(!lx.set(&u("友"), None, 1.0));
        assert_eq!(lx.word_count(), 2);
        assert!(lx.set(&u("朋友"), None, 0.0));
        assert_eq!(lx.word_count(), 1);
        assert!(lx.find(&u("朋友")).is_none());
        assert!(lx.find(&u("友")).is_some());
    }

    #[test]
    fn add_only_inserts_missing_words() {
        let mut lx = sample();
        assert!(!lx.add(&u("好"), None, 1.0));
        assert_eq!(lx.find(&u("好")).unwrap().frequency, 300.0);
        assert!(lx.add(&u("世界"), None, UNDEFINED_FREQUENCY));
        assert_eq!(lx.word_count(), 6);
    }

    #[test]
    fn delete_leaf_and_internal_words() {
        let mut lx = sample();
        let nodes_before = lx.node_count();
        assert!(lx.delete(&u("美好")));
        assert!(lx.find(&u("美好")).is_none());
        assert_eq!(lx.node_count(), nodes_before - 1);

        // "好" prefixes "你好" in reversed order, so it only loses its frequency
        assert!(lx.delete(&u("好")));
        assert!(lx.find(&u("好")).is_none());
        assert!(lx.find(&u("你好")).is_some());
        assert!(!lx.delete(&u("好")));
        assert!(!lx.delete(&u("不存在")));
        assert_eq!(lx.word_count(), 3);

        // removing the last word under "好" prunes the now-empty node too
        assert!(lx.delete(&u("你好")));
        assert_eq!(lx.frequency_trace(&u("好"), 0, 1), vec![0.0]);
        assert_eq!(lx.word_count(), 2);
    }

    #[test]
    fn word_count_matches_after_mixed_operations() {
        let mut lx = Lexicon::new();
        for w in ["一", "一二", "三一二", "四"] {
            lx.set(&u(w), None, 1.0);
        }
        lx.delete(&u("一二"));
        lx.set(&u("四"), None, 0.0);
        lx.set(&u("五"), None, 0.0);
        assert_eq!(lx.word_count(), 2);
        let reloaded = {
            let mut buf = Vec::new();
            lx.write_to(&mut buf).unwrap();
            Lexicon::read_from(&mut Cursor::new(buf)).unwrap()
        };
        assert_eq!(reloaded.word_count(), 2);
    }

    #[test]
    fn trace_walks_backwards_and_stops_at_missing_edge() {
        let lx = sample();
        let units = u("真美好");
        assert_eq!(lx.frequency_trace(&units, 0, 3), vec![0.0, 40.0, 300.0]);
        assert_eq!(lx.frequency_trace(&units, 2, 3), vec![0.0, 0.0, 300.0]);
        assert_eq!(lx.frequency_trace(&units, 0, 2), vec![0.0, 0.0, 0.0]);
        let units = u("你好");
        assert_eq!(lx.frequency_trace(&units, 0, 2), vec![120.0, 300.0]);
        assert_eq!(lx.frequency_trace(&units, 0, 1), vec![UNDEFINED_FREQUENCY, 0.0]);
    }

    #[test]
    fn binary_round_trip() {
        let lx = sample();
        let mut buf = Vec::new();
        lx.write_to(&mut buf).unwrap();
        let loaded = Lexicon::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(loaded.word_count(), lx.word_count());
        for w in ["你好", "好", "美好", "iPhone", "你"] {
            assert_eq!(loaded.find(&u(w)), lx.find(&u(w)), "{w}");
        }
        assert_eq!(
            loaded.frequency_trace(&u("你好"), 0, 2),
            lx.frequency_trace(&u("你好"), 0, 2)
        );
    }

    #[test]
    fn empty_lexicon_dump_is_one_sentinel() {
        let mut buf = Vec::new();
        Lexicon::new().write_to(&mut buf).unwrap();
        assert_eq!(buf, vec![END_OF_CHILDREN]);
        assert_eq!(Lexicon::read_from(&mut Cursor::new(buf)).unwrap().word_count(), 0);
    }

    #[test]
    fn cjk_keys_are_written_without_terminator() {
        let mut lx = Lexicon::new();
        lx.set(&["好"], None, 1.0);
        let mut buf = Vec::new();
        lx.write_to(&mut buf).unwrap();
        let mut expected = vec![NO_TAG];
        expected.extend_from_slice(&1.0f64.to_le_bytes());
        expected.extend_from_slice(&('好' as u16).to_le_bytes());
        expected.extend_from_slice(&[END_OF_CHILDREN, END_OF_CHILDREN]);
        assert_eq!(buf, expected);
    }

    #[test]
    fn truncated_dump_fails() {
        let mut buf = Vec::new();
        sample().write_to(&mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(Lexicon::read_from(&mut Cursor::new(buf)).is_err());
    }

    #[test]
    fn from_source_parses_records() {
        let text = "你好 i 120\n好 a 300 美好 a\n40\n奇怪 zz -1\n";
        let lx = Lexicon::from_source(text).unwrap();
        assert_eq!(lx.word_count(), 4);
        assert_eq!(lx.find(&u("美好")).unwrap().frequency, 40.0);
        let odd = lx.find(&u("奇怪")).unwrap();
        assert_eq!(odd.part_of_speech, None);
        assert_eq!(odd.frequency, UNDEFINED_FREQUENCY);
    }

    #[test]
    fn from_source_reports_bad_record() {
        match Lexicon::from_source("好 a 1\n坏 a x\n") {
            Err(Error::Source { line, message }) => {
                assert_eq!(line, 2);
                assert!(message.contains("record 2"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(Lexicon::from_source("好 a"), Err(Error::Source { .. })));
    }

    #[test]
    fn file_round_trip() {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("libchat_lexicon_{}_{}.bin", std::process::id(), ts));
        sample().save_file(&path).unwrap();
        let loaded = Lexicon::load_file(&path).unwrap();
        assert_eq!(loaded.word_count(), 5);
        let _ = std::fs::remove_file(path);
    }
}
