//! Synonym canonicalization.
//!
//! A [`SynonymTable`] maps alias words onto a canonical form so that questions
//! phrased with different synonyms land on the same corpus vocabulary. Words
//! listed as special are never rewritten, even when they also appear as an
//! alias.
//!
//! The table is compiled from a thesaurus where each line is a category code
//! followed by space-separated synonyms, checked against the lexicon.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use ahash::{AHashMap, AHashSet};
use tracing::info;

use crate::codec;
use crate::error::{Error, Result};
use crate::lexicon::Lexicon;
use crate::units::split_units;
use crate::words::WordStream;

const FORMAT: &str = "synonym table";

#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    canonical_forms: Vec<String>,
    aliases: AHashMap<String, usize>,
    specials: AHashSet<String>,
}

impl SynonymTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_special(&self, word: &str) -> bool {
        self.specials.contains(word)
    }

    /// Index of the canonical form `alias` maps to.
    pub fn canonical_id(&self, alias: &str) -> Option<usize> {
        self.aliases.get(alias).copied()
    }

    pub fn canonical(&self, id: usize) -> Option<&str> {
        self.canonical_forms.get(id).map(String::as_str)
    }

    /// Rewrite `word` to its canonical form. Special words and words without
    /// an alias entry come back as they are.
    pub fn replace<'a>(&'a self, word: &'a str) -> &'a str {
        if self.is_special(word) {
            return word;
        }
        self.canonical_id(word)
            .and_then(|id| self.canonical(id))
            .unwrap_or(word)
    }

    pub fn canonical_count(&self) -> usize {
        self.canonical_forms.len()
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    pub fn special_count(&self) -> usize {
        self.specials.len()
    }

    /// Register a synonym group by hand. The first word is the canonical
    /// form; aliases that are already mapped keep their old target.
    pub fn insert_group<S: AsRef<str>>(&mut self, canonical: &str, aliases: &[S]) -> usize {
        let id = self.canonical_forms.len();
        self.canonical_forms.push(canonical.to_string());
        for alias in aliases {
            self.aliases.entry(alias.as_ref().to_string()).or_insert(id);
        }
        id
    }

    pub fn insert_special(&mut self, word: &str) -> bool {
        self.specials.insert(word.to_string())
    }

    /// Compile a thesaurus and a whitespace-separated list of special words.
    ///
    /// Each thesaurus line is `CODE w1 w2 ...`. Words the lexicon does not
    /// know are dropped, and a line needs two known words to form a group.
    /// The longest known word (earliest on ties) becomes the canonical form
    /// provided it is longer than one character; every other known word
    /// longer than one character that is not mapped yet becomes its alias.
    pub fn compile(thesaurus: &str, specials: &str, lexicon: &Lexicon) -> Result<Self> {
        let mut table = Self::new();
        for line in thesaurus.lines() {
            let valid: Vec<&str> = line
                .split(' ')
                .skip(1)
                .filter(|w| !w.is_empty() && lexicon.contains(&split_units(w)))
                .collect();
            if valid.len() < 2 {
                continue;
            }

            let mut target = 0;
            for (i, word) in valid.iter().enumerate() {
                if word.chars().count() > valid[target].chars().count() {
                    target = i;
                }
            }
            if valid[target].chars().count() <= 1 {
                continue;
            }

            let id = table.canonical_forms.len();
            table.canonical_forms.push(valid[target].to_string());
            for (i, word) in valid.iter().enumerate() {
                if i != target && word.chars().count() > 1 && !table.aliases.contains_key(*word) {
                    table.aliases.insert(word.to_string(), id);
                }
            }
        }
        Error::check_width("canonical form count", table.canonical_forms.len(), u16::MAX as usize)?;
        if let Some(last) = table.canonical_forms.len().checked_sub(1) {
            Error::check_width("canonical id", last, i16::MAX as usize)?;
        }

        table.specials = specials.split_whitespace().map(str::to_string).collect();
        info!(
            canonical = table.canonical_forms.len(),
            aliases = table.aliases.len(),
            specials = table.specials.len(),
            "compiled synonym table"
        );
        Ok(table)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut table = Self::new();
        let canonical_count = codec::read_u16_le(reader)? as usize;
        table.canonical_forms.reserve(canonical_count);
        for _ in 0..canonical_count {
            table.canonical_forms.push(codec::read_utf16z(reader)?);
        }

        let alias_count = codec::read_count_le(reader, FORMAT)?;
        for _ in 0..alias_count {
            let alias = codec::read_utf16z(reader)?;
            let id = codec::read_i16_le(reader)?;
            let id = usize::try_from(id)
                .ok()
                .filter(|&id| id < canonical_count)
                .ok_or_else(|| Error::corrupt(FORMAT, format!("alias {alias:?} points at canonical id {id}")))?;
            table.aliases.insert(alias, id);
        }

        let special_count = codec::read_count_le(reader, FORMAT)?;
        for _ in 0..special_count {
            table.specials.insert(codec::read_utf16z(reader)?);
        }
        Ok(table)
    }

    /// Write the little-endian dump. Aliases and specials are written in
    /// sorted order so identical tables produce identical files.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        Error::check_width("canonical form count", self.canonical_forms.len(), u16::MAX as usize)?;
        codec::write_u16_le(writer, self.canonical_forms.len() as u16)?;
        for word in &self.canonical_forms {
            codec::write_utf16z(writer, word)?;
        }

        let mut aliases: Vec<(&String, &usize)> = self.aliases.iter().collect();
        aliases.sort_unstable();
        codec::write_i32_le(writer, codec::count_to_i32("alias count", aliases.len())?)?;
        for (alias, &id) in aliases {
            Error::check_width("canonical id", id, i16::MAX as usize)?;
            codec::write_utf16z(writer, alias)?;
            codec::write_i16_le(writer, id as i16)?;
        }

        let specials: BTreeSet<&String> = self.specials.iter().collect();
        codec::write_i32_le(writer, codec::count_to_i32("special word count", specials.len())?)?;
        for word in specials {
            codec::write_utf16z(writer, word)?;
        }
        Ok(())
    }

    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let table = Self::read_from(&mut reader)?;
        info!(
            path = %path.display(),
            canonical = table.canonical_forms.len(),
            aliases = table.aliases.len(),
            "loaded synonym table"
        );
        Ok(table)
    }

    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        info!(path = %path.display(), "saved synonym table");
        Ok(())
    }
}

/// Word stream decorator applying [`SynonymTable::replace`] on the way out.
pub struct SynonymStream<'a, S> {
    inner: S,
    table: &'a SynonymTable,
}

impl<'a, S: WordStream> SynonymStream<'a, S> {
    pub fn new(inner: S, table: &'a SynonymTable) -> Self {
        Self { inner, table }
    }
}

impl<S: WordStream> WordStream for SynonymStream<'_, S> {
    fn next_word(&mut self) -> Option<String> {
        let word = self.inner.next_word()?;
        Some(self.table.replace(&word).to_string())
    }

    fn peek_word(&self) -> Option<String> {
        let word = self.inner.peek_word()?;
        Some(self.table.replace(&word).to_string())
    }

    fn skip_words(&mut self, count: usize) -> usize {
        self.inner.skip_words(count)
    }

    fn has_next(&self) -> bool {
        self.inner.has_next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::words::VecWordStream;
    use std::io::Cursor;

    fn lexicon() -> Lexicon {
        let mut lx = Lexicon::new();
        for word in ["高兴", "开心", "快乐", "愉快", "欢", "喜欢", "爱好", "苹果"] {
            lx.set(&split_units(word), None, 10.0);
        }
        lx
    }

    const THESAURUS: &str = "Ee01A 高兴 开心 快乐 愉悦\nEe02B 喜欢 欢 不在词典\nFf01A 苹果\nGg01A 爱好 开心";

    #[test]
    fn compile_groups_known_words() {
        let table = SynonymTable::compile(THESAURUS, "快乐\n", &lexicon()).unwrap();
        // 愉悦 is unknown; 高兴 is the first of the longest words
        assert_eq!(table.canonical(0), Some("高兴"));
        assert_eq!(table.canonical_id("开心"), Some(0));
        assert_eq!(table.canonical_id("快乐"), Some(0));
        // 喜欢/欢: canonical 喜欢, 欢 is too short to alias
        assert_eq!(table.canonical(1), Some("喜欢"));
        assert_eq!(table.canonical_id("欢"), None);
        // one known word only: no group
        assert_eq!(table.canonical_id("苹果"), None);
        // 开心 already maps to the first group
        assert_eq!(table.canonical(2), Some("爱好"));
        assert_eq!(table.canonical_id("开心"), Some(0));
        assert_eq!(table.canonical_count(), 3);
    }

    #[test]
    fn specials_are_never_rewritten() {
        let table = SynonymTable::compile(THESAURUS, "快乐", &lexicon()).unwrap();
        assert!(table.is_special("快乐"));
        assert_eq!(table.replace("快乐"), "快乐");
        assert_eq!(table.replace("开心"), "高兴");
        assert_eq!(table.replace("香蕉"), "香蕉");
    }

    #[test]
    fn single_character_targets_are_rejected() {
        let mut lx = Lexicon::new();
        lx.set(&split_units("好"), None, 1.0);
        lx.set(&split_units("善"), None, 1.0);
        let table = SynonymTable::compile("X 好 善", "", &lx).unwrap();
        assert_eq!(table.canonical_count(), 0);
    }

    #[test]
    fn binary_round_trip() {
        let table = SynonymTable::compile(THESAURUS, "快乐 苹果", &lexicon()).unwrap();
        let mut buf = Vec::new();
        table.write_to(&mut buf).unwrap();
        let loaded = SynonymTable::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(loaded.canonical_count(), table.canonical_count());
        assert_eq!(loaded.alias_count(), table.alias_count());
        for word in ["快乐", "开心", "爱好", "苹果", "欢"] {
            assert_eq!(loaded.replace(word), table.replace(word));
        }
        assert!(loaded.is_special("苹果"));
    }

    #[test]
    fn alias_with_bad_id_is_corrupt() {
        let mut buf = Vec::new();
        codec::write_u16_le(&mut buf, 1).unwrap();
        codec::write_utf16z(&mut buf, "高兴").unwrap();
        codec::write_i32_le(&mut buf, 1).unwrap();
        codec::write_utf16z(&mut buf, "开心").unwrap();
        codec::write_i16_le(&mut buf, 3).unwrap();
        codec::write_i32_le(&mut buf, 0).unwrap();
        let err = SynonymTable::read_from(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }

    #[test]
    fn truncated_dump_fails() {
        let table = SynonymTable::compile(THESAURUS, "", &lexicon()).unwrap();
        let mut buf = Vec::new();
        table.write_to(&mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(SynonymTable::read_from(&mut Cursor::new(buf)).is_err());
    }

    #[test]
    fn stream_rewrites_next_and_peek() {
        let mut table = SynonymTable::new();
        table.insert_group("高兴", &["开心"]);
        let words = VecWordStream::new(vec!["我".into(), "开心".into()]);
        let mut stream = SynonymStream::new(words, &table);
        assert_eq!(stream.next_word().as_deref(), Some("我"));
        assert_eq!(stream.peek_word().as_deref(), Some("高兴"));
        assert_eq!(stream.collect_words(), vec!["高兴"]);
    }
}
