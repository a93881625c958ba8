// core/src/engine.rs
//
// Dialogue engine: one conversation over a shared model.

use serde::Serialize;
use tracing::debug;

use crate::analyzer::{AnalyzedClause, ClauseAnalyzer};
use crate::commands::{self, CommandTable, PlaceholderResolver};
use crate::corpus::Location;
use crate::session::{DialoguePhase, DialogueState};
use crate::vector::WeightedVector;
use crate::Model;

/// Everything a turn computed, in the order it was computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnTrace {
    pub input: String,
    /// Analyzed clauses of the input, regions excluded
    pub clauses: Vec<AnalyzedClause>,
    /// Context after this turn's words were merged, as (word, weight)
    pub context: Vec<(String, f64)>,
    pub candidates: usize,
    pub matched: Option<Location>,
    pub score: f64,
    /// Answer before placeholder expansion
    pub template: String,
    pub answer: String,
}

impl TurnTrace {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Retrieval dialogue engine.
///
/// Type parameter R resolves answer placeholders; the default is the
/// built-in [`CommandTable`].
///
/// Each turn decays the context, merges the input's corpus words into it,
/// collects every pair that shares a context word, and answers with the pair
/// whose question is closest to the context. Pairs from the session of the
/// previous match get a continuity bonus.
pub struct DialogueEngine<R = CommandTable> {
    model: Model,
    analyzer: ClauseAnalyzer,
    resolver: R,
    state: DialogueState,
}

impl DialogueEngine<CommandTable> {
    /// Create an engine whose `.Random` command draws from the model's
    /// response bank.
    pub fn new(model: Model) -> Self {
        let resolver = CommandTable::new(model.responses.clone());
        Self::with_resolver(model, resolver)
    }
}

impl<R: PlaceholderResolver> DialogueEngine<R> {
    pub fn with_resolver(model: Model, resolver: R) -> Self {
        let analyzer = model.analyzer();
        Self {
            model,
            analyzer,
            resolver,
            state: DialogueState::new(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn state(&self) -> &DialogueState {
        &self.state
    }

    /// Replace the conversation state, e.g. with one loaded from disk.
    pub fn set_state(&mut self, state: DialogueState) {
        self.state = state;
    }

    pub fn into_state(self) -> DialogueState {
        self.state
    }

    pub fn phase(&self) -> DialoguePhase {
        self.state.phase()
    }

    /// Start a new conversation.
    pub fn clear_context(&mut self) {
        self.state.clear();
    }

    /// Answer one input.
    pub fn answer(&mut self, input: &str) -> String {
        self.answer_with_trace(input).answer
    }

    pub fn answer_with_trace(&mut self, input: &str) -> TurnTrace {
        let config = &self.model.config;
        let corpus = &self.model.corpus;

        self.state
            .context_mut()
            .decay(config.context_decay, config.context_eviction_threshold);

        let clauses = self.analyzer.analyze(input);
        for clause in &clauses {
            for word in &clause.words {
                if let Some(id) = corpus.word_id(word).known() {
                    self.state.context_mut().merge(id, 1.0);
                }
            }
        }

        let context = self.state.context();
        let candidates = corpus.candidates(context.words());
        let last = self.state.last_match();

        let mut best: Option<(Location, f64)> = None;
        let mut question = WeightedVector::new();
        for &location in &candidates {
            let Some(pair) = corpus.pair(location) else {
                continue;
            };
            question.clear();
            question.merge_set(&pair.question);
            let mut score = context.cosine(&question);
            if let Some(last) = last {
                if last.session == location.session && last.pair != location.pair {
                    score *= config.session_continuity_bonus;
                }
            }
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((location, score));
            }
        }

        let template = match best.and_then(|(location, _)| corpus.pair(location)) {
            Some(pair) => pair.answer.clone(),
            None => config.mismatch_answer.clone(),
        };
        let trace_context = context
            .iter()
            .filter_map(|(id, weight)| corpus.word(id).map(|w| (w.to_string(), weight)))
            .collect();
        if let Some((location, _)) = best {
            self.state.set_last_match(location);
        }

        let answer = commands::expand(&template, &self.resolver, config.max_expansion_rounds);
        debug!(
            clauses = clauses.len(),
            candidates = candidates.len(),
            matched = ?best.map(|(l, _)| l),
            "dialogue turn"
        );
        TurnTrace {
            input: input.to_string(),
            clauses,
            context: trace_context,
            candidates: candidates.len(),
            matched: best.map(|(l, _)| l),
            score: best.map_or(0.0, |(_, s)| s),
            template,
            answer,
        }
    }

    /// Segmentation cache counters of this engine's analyzer.
    pub fn cache_stats(&self) -> (usize, usize) {
        self.analyzer.segmenter().cache_stats()
    }

    pub fn cache_hit_rate(&self) -> Option<f32> {
        self.analyzer.segmenter().cache_hit_rate()
    }

    pub fn cache_size(&self) -> usize {
        self.analyzer.segmenter().cache_size()
    }

    pub fn cache_capacity(&self) -> usize {
        self.analyzer.segmenter().cache_capacity()
    }

    pub fn clear_cache(&self) {
        self.analyzer.segmenter().clear_cache()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Resolution;
    use crate::corpus::ChatCorpus;
    use crate::lexicon::Lexicon;
    use crate::synonym::SynonymTable;
    use crate::units::split_units;
    use crate::Config;

    struct Fixed;

    impl PlaceholderResolver for Fixed {
        fn resolve(&self, namespace: &str, key: &str) -> Resolution {
            match (namespace, key) {
                (".Random", "chat_mismatch") => Resolution::Resolved("听不懂".to_string()),
                _ => Resolution::Failed,
            }
        }
    }

    fn model(source: &str) -> Model {
        let mut lx = Lexicon::new();
        for (word, freq) in [("你好", 100.0), ("天气", 80.0), ("怎么样", 60.0), ("明天", 50.0), ("下雨", 40.0)] {
            lx.set(&split_units(word), None, freq);
        }
        let lexicon = std::sync::Arc::new(lx);
        let synonyms = std::sync::Arc::new(SynonymTable::new());
        let config = Config::default();
        let analyzer = ClauseAnalyzer::new(
            crate::WordSegmenter::from_config(lexicon.clone(), &config),
            synonyms.clone(),
        );
        let corpus = ChatCorpus::compile([("t", source)], &analyzer).unwrap();
        Model {
            lexicon,
            synonyms,
            corpus: std::sync::Arc::new(corpus),
            responses: None,
            config,
        }
    }

    #[test]
    fn context_decays_between_turns() {
        let mut engine = DialogueEngine::with_resolver(model("你好\n你好呀\n"), Fixed);
        let first = engine.answer_with_trace("你好");
        assert_eq!(first.context, vec![("你好".to_string(), 1.0)]);
        let second = engine.answer_with_trace("随便");
        assert_eq!(second.context, vec![("你好".to_string(), 0.25)]);
        // the decayed context still points at the only pair
        assert_eq!(second.answer, "你好呀");
    }

    #[test]
    fn no_candidate_gives_mismatch_and_keeps_last_match() {
        let mut engine = DialogueEngine::with_resolver(model("你好\n你好呀\n"), Fixed);
        assert_eq!(engine.answer("你好"), "你好呀");
        engine.clear_context();
        assert_eq!(engine.phase(), DialoguePhase::NoContext);
        let trace = engine.answer_with_trace("鱻犇");
        assert_eq!(trace.matched, None);
        assert_eq!(trace.template, "{.Random:chat_mismatch}");
        assert_eq!(trace.answer, "听不懂");
        assert_eq!(engine.state().last_match(), None);
    }

    #[test]
    fn failed_placeholder_is_marked() {
        let mut engine = DialogueEngine::with_resolver(model("你好\n{.system.Nope:x}\n"), Fixed);
        assert_eq!(engine.answer("你好"), "{this part failed: .system.Nope:x}");
    }

    #[test]
    fn trace_serializes() {
        let mut engine = DialogueEngine::with_resolver(model("你好\n你好呀\n"), Fixed);
        let json = engine.answer_with_trace("你好").to_json().unwrap();
        assert!(json.contains("\"answer\": \"你好呀\""));
    }

    #[test]
    fn cache_is_shared_across_turns() {
        let mut engine = DialogueEngine::with_resolver(model("你好\n你好呀\n"), Fixed);
        engine.answer("你好");
        engine.answer("你好");
        assert_eq!(engine.cache_stats(), (1, 1));
        engine.clear_cache();
        assert_eq!(engine.cache_size(), 0);
    }
}
