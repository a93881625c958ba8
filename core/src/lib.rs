//! libchat-core
//!
//! Retrieval-based Chinese chat engine: text normalization, clause and word
//! segmentation over a frequency lexicon, numeral and synonym folding, a
//! question/answer corpus with an inverted index, and a dialogue engine that
//! keeps a decaying word context per conversation.
//!
//! Public API:
//! - `Lexicon` - Reversed-unit trie of word frequencies
//! - `WordSegmenter` - Maximum-likelihood segmentation over the lexicon
//! - `SynonymTable` - Alias → canonical word rewriting
//! - `ChatCorpus` - Compiled sessions of question/answer pairs
//! - `DialogueEngine` - One conversation over a shared `Model`
//! - `Config` - Tunables and asset locations
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

pub mod codec;
pub mod error;
pub use error::{Error, Result};

pub mod units;
pub use units::{classify, CharClass};

pub mod normalizer;
pub use normalizer::TextNormalizer;

pub mod sentence;
pub use sentence::{split_clauses, Boundary, Clause, SentenceSegmenter};

pub mod trie;
pub use trie::Trie;

pub mod lexicon;
pub use lexicon::{Lexicon, PartOfSpeech, WordInfo};

pub mod segmenter;
pub use segmenter::WordSegmenter;

pub mod words;
pub use words::{VecWordStream, WordStream};

pub mod numeral;
pub use numeral::NumeralStream;

pub mod synonym;
pub use synonym::{SynonymStream, SynonymTable};

pub mod vector;
pub use vector::{FrequencyVector, FrequencyVectorSet, WeightedVector};

pub mod analyzer;
pub use analyzer::{AnalyzedClause, ClauseAnalyzer};

pub mod corpus;
pub use corpus::{ChatCorpus, ChatPair, ChatSession, Location, WordId};

pub mod response;
pub use response::ResponseBank;

pub mod commands;
pub use commands::{CommandTable, PlaceholderResolver, Resolution};

pub mod session;
pub use session::{DialoguePhase, DialogueState};

pub mod engine;
pub use engine::{DialogueEngine, TurnTrace};

/// Locations of the compiled assets.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetPaths {
    pub lexicon: PathBuf,
    pub synonyms: PathBuf,
    pub chats: PathBuf,
    /// Optional; the engine serves without `.Random` when it cannot load.
    pub responses: PathBuf,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            lexicon: PathBuf::from("ChineseFreqDict"),
            synonyms: PathBuf::from("ChineseThesaurus"),
            chats: PathBuf::from("ChineseChats"),
            responses: PathBuf::from("ChineseRandomResponses"),
        }
    }
}

impl AssetPaths {
    /// Resolve every relative path against `base`.
    pub fn relative_to<P: AsRef<Path>>(&self, base: P) -> Self {
        let base = base.as_ref();
        let join = |p: &PathBuf| if p.is_absolute() { p.clone() } else { base.join(p) };
        Self {
            lexicon: join(&self.lexicon),
            synonyms: join(&self.synonyms),
            chats: join(&self.chats),
            responses: join(&self.responses),
        }
    }
}

/// Dialogue and analysis configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Every turn divides context weights by this value
    pub context_decay: f64,
    /// Context words whose weight drops below this are forgotten
    pub context_eviction_threshold: f64,

    /// Score multiplier for a different pair of the last matched session
    pub session_continuity_bonus: f64,

    /// Answer template used when nothing matches
    pub mismatch_answer: String,

    /// Upper bound on template expansion passes
    pub max_expansion_rounds: usize,

    // Cache Management
    /// Maximum number of entries in the clause -> words cache
    pub max_cache_size: usize,

    /// Weight of a lone unit the lexicon has no frequency for
    pub unknown_unit_floor: f64,

    pub assets: AssetPaths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            context_decay: 4.0,
            context_eviction_threshold: 0.001,
            session_continuity_bonus: 5.0,
            mismatch_answer: "{.Random:chat_mismatch}".to_string(),
            max_expansion_rounds: 16,
            max_cache_size: 1000,
            unknown_unit_floor: 0.0001,
            assets: AssetPaths::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    // ========== Context Management ==========

    /// Set the per-turn decay divisor. Values not above 1 are ignored.
    pub fn set_context_decay(&mut self, divisor: f64) {
        if divisor > 1.0 {
            self.context_decay = divisor;
        }
    }

    pub fn get_context_decay(&self) -> f64 {
        self.context_decay
    }

    pub fn set_context_eviction_threshold(&mut self, threshold: f64) {
        self.context_eviction_threshold = threshold.max(0.0);
    }

    pub fn get_context_eviction_threshold(&self) -> f64 {
        self.context_eviction_threshold
    }

    /// Set the same-session score multiplier.
    /// Default: 5.0
    pub fn set_session_continuity_bonus(&mut self, bonus: f64) {
        self.session_continuity_bonus = bonus;
    }

    pub fn get_session_continuity_bonus(&self) -> f64 {
        self.session_continuity_bonus
    }

    // ========== Answer Templates ==========

    pub fn set_mismatch_answer(&mut self, template: &str) {
        self.mismatch_answer = template.to_string();
    }

    pub fn get_mismatch_answer(&self) -> &str {
        &self.mismatch_answer
    }

    /// Set the expansion pass limit. At least one pass always runs.
    pub fn set_max_expansion_rounds(&mut self, rounds: usize) {
        self.max_expansion_rounds = rounds.max(1);
    }

    pub fn get_max_expansion_rounds(&self) -> usize {
        self.max_expansion_rounds
    }
}

/// Utility helpers.
pub mod utils {
    /// Normalize input strings (NFC) and trim whitespace.
    pub fn normalize(s: &str) -> String {
        use unicode_normalization::UnicodeNormalization;
        s.nfc().collect::<String>().trim().to_string()
    }
}

/// Shared read-only resources for any number of dialogue engines.
#[derive(Debug, Clone)]
pub struct Model {
    pub lexicon: Arc<Lexicon>,
    pub synonyms: Arc<SynonymTable>,
    pub corpus: Arc<ChatCorpus>,
    pub responses: Option<Arc<ResponseBank>>,
    pub config: Config,
}

impl Model {
    pub fn new(
        lexicon: Lexicon,
        synonyms: SynonymTable,
        corpus: ChatCorpus,
        responses: Option<ResponseBank>,
        config: Config,
    ) -> Self {
        Self {
            lexicon: Arc::new(lexicon),
            synonyms: Arc::new(synonyms),
            corpus: Arc::new(corpus),
            responses: responses.map(Arc::new),
            config,
        }
    }

    /// Load the assets named by `config`. A response bank that fails to load
    /// is logged and left out.
    pub fn load(config: &Config) -> Result<Self> {
        let assets = &config.assets;
        let lexicon = Lexicon::load_file(&assets.lexicon)?;
        let synonyms = SynonymTable::load_file(&assets.synonyms)?;
        let corpus = ChatCorpus::load_file(&assets.chats)?;
        let responses = match ResponseBank::load_file(&assets.responses) {
            Ok(bank) => Some(bank),
            Err(e) => {
                warn!(path = %assets.responses.display(), error = %e, "serving without response bank");
                None
            }
        };
        Ok(Self::new(lexicon, synonyms, corpus, responses, config.clone()))
    }

    /// Segmenter over this model's lexicon, sized from the config.
    pub fn segmenter(&self) -> WordSegmenter {
        WordSegmenter::from_config(Arc::clone(&self.lexicon), &self.config)
    }

    pub fn analyzer(&self) -> ClauseAnalyzer {
        ClauseAnalyzer::new(self.segmenter(), Arc::clone(&self.synonyms))
    }
}
