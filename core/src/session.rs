//! Per-conversation dialogue state.
//!
//! A `DialogueState` holds the decaying context vector of recently seen
//! corpus words and the location of the last matched pair. It belongs to a
//! single conversation and can be persisted between runs with bincode.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::corpus::Location;
use crate::error::Result;
use crate::vector::WeightedVector;

/// Phase of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialoguePhase {
    /// Fresh or cleared: no context words, no previous match
    #[default]
    NoContext,
    HasContext,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueState {
    context: WeightedVector,
    last_match: Option<Location>,
}

impl DialogueState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> &WeightedVector {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut WeightedVector {
        &mut self.context
    }

    pub fn last_match(&self) -> Option<Location> {
        self.last_match
    }

    pub fn set_last_match(&mut self, location: Location) {
        self.last_match = Some(location);
    }

    pub fn phase(&self) -> DialoguePhase {
        if self.context.is_empty() && self.last_match.is_none() {
            DialoguePhase::NoContext
        } else {
            DialoguePhase::HasContext
        }
    }

    /// Forget the context and the last match.
    pub fn clear(&mut self) {
        self.context.clear();
        self.last_match = None;
    }

    /// Load from bincode file
    pub fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }

    /// Save to bincode file
    pub fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}
