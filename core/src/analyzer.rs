// core/src/analyzer.rs
//
// Question analysis shared by corpus compilation and the dialogue engine:
// normalize → clauses → words → numerals → synonyms.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::numeral::NumeralStream;
use crate::segmenter::WordSegmenter;
use crate::sentence::{split_clauses, Boundary};
use crate::synonym::{SynonymStream, SynonymTable};
use crate::words::{VecWordStream, WordStream};

/// One analyzed clause of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedClause {
    pub text: String,
    pub boundary: Boundary,
    pub words: Vec<String>,
}

/// Runs the full analysis pipeline over a piece of text.
///
/// Bracketed and quoted regions are skipped, as are clauses left empty after
/// segmentation.
pub struct ClauseAnalyzer {
    segmenter: WordSegmenter,
    synonyms: Arc<SynonymTable>,
}

impl ClauseAnalyzer {
    pub fn new(segmenter: WordSegmenter, synonyms: Arc<SynonymTable>) -> Self {
        Self { segmenter, synonyms }
    }

    pub fn segmenter(&self) -> &WordSegmenter {
        &self.segmenter
    }

    pub fn synonyms(&self) -> &Arc<SynonymTable> {
        &self.synonyms
    }

    /// Words of a single clause after numeral folding and synonym rewriting.
    pub fn words(&self, clause: &str) -> Vec<String> {
        let segmented = VecWordStream::new(self.segmenter.segment(clause));
        SynonymStream::new(NumeralStream::new(segmented), &self.synonyms).collect_words()
    }

    pub fn analyze(&self, text: &str) -> Vec<AnalyzedClause> {
        split_clauses(text)
            .into_iter()
            .filter(|clause| !clause.boundary.is_region() && !clause.text.is_empty())
            .map(|clause| {
                let words = self.words(&clause.text);
                AnalyzedClause {
                    text: clause.text,
                    boundary: clause.boundary,
                    words,
                }
            })
            .filter(|clause| !clause.words.is_empty())
            .collect()
    }
}
