//! Random response bank behind the `.Random` placeholder namespace.
//!
//! Each key names a list of interchangeable responses, one of which is drawn
//! uniformly whenever `{.Random:key}` is expanded.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::codec;
use crate::error::{Error, Result};
use crate::utils;

const FORMAT: &str = "response bank";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBank {
    responses: BTreeMap<String, Vec<String>>,
}

impl ResponseBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, text)` sources, one response per non-blank line.
    /// Sources without any response are skipped; a repeated key replaces the
    /// earlier list.
    pub fn compile<I, K, T>(sources: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: AsRef<str>,
    {
        let mut bank = Self::new();
        for (key, text) in sources {
            let lines: Vec<String> = text
                .as_ref()
                .lines()
                .map(utils::normalize)
                .filter(|line| !line.is_empty())
                .collect();
            if !lines.is_empty() {
                bank.responses.insert(key.as_ref().to_string(), lines);
            }
        }
        info!(keys = bank.responses.len(), "compiled response bank");
        bank
    }

    /// Pick one response for `key` at random.
    pub fn response<R: Rng + ?Sized>(&self, key: &str, rng: &mut R) -> Option<&str> {
        self.responses.get(key)?.choose(rng).map(String::as_str)
    }

    pub fn responses(&self, key: &str) -> Option<&[String]> {
        self.responses.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.responses.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bank = Self::new();
        let key_count = codec::read_count_le(reader, FORMAT)?;
        for _ in 0..key_count {
            let key = codec::read_utf8z(reader)?;
            let count = codec::read_count_le(reader, FORMAT)?;
            if count == 0 {
                return Err(Error::corrupt(FORMAT, format!("key {key:?} has no responses")));
            }
            let mut list = Vec::with_capacity(count.min(1 << 12));
            for _ in 0..count {
                list.push(codec::read_utf8z(reader)?);
            }
            bank.responses.insert(key, list);
        }
        Ok(bank)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        codec::write_i32_le(writer, codec::count_to_i32("response key count", self.responses.len())?)?;
        for (key, list) in &self.responses {
            codec::write_utf8z(writer, key)?;
            codec::write_i32_le(writer, codec::count_to_i32("response count", list.len())?)?;
            for response in list {
                codec::write_utf8z(writer, response)?;
            }
        }
        Ok(())
    }

    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bank = Self::read_from(&mut BufReader::new(File::open(path)?))?;
        info!(path = %path.display(), keys = bank.len(), "loaded response bank");
        Ok(bank)
    }

    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        info!(path = %path.display(), keys = self.len(), "saved response bank");
        Ok(())
    }
}
