// core/tests/dialogue_end_to_end.rs
//
// Integration tests for the dialogue engine over small compiled corpora.
//
// Tests cover:
// - Exact question retrieval and the mismatch fallback
// - Same-session continuity bonus
// - Numeral and synonym folding on both corpus and input side
// - Context decay across turns and clearing
// - Persisting a conversation between engines

use std::sync::Arc;

use libchat_core::{
    ChatCorpus, ClauseAnalyzer, CommandTable, Config, DialogueEngine, DialoguePhase, DialogueState, Lexicon, Location,
    Model, ResponseBank, SynonymTable, WordSegmenter,
};

const WORDS: &[(&str, f64)] = &[
    ("你好", 120.0),
    ("天气", 80.0),
    ("怎么样", 60.0),
    ("明天", 50.0),
    ("下雨", 40.0),
    ("今年", 30.0),
    ("开心", 20.0),
    ("高兴", 25.0),
    ("我", 200.0),
    ("很", 150.0),
];

fn lexicon() -> Lexicon {
    let mut lexicon = Lexicon::new();
    for &(word, frequency) in WORDS {
        lexicon.set(&libchat_core::units::split_units(word), None, frequency);
    }
    lexicon
}

fn synonyms() -> SynonymTable {
    let mut table = SynonymTable::new();
    table.insert_group("高兴", &["开心"]);
    table
}

fn model(source: &str) -> Model {
    let config = Config::default();
    let lexicon = Arc::new(lexicon());
    let synonyms = Arc::new(synonyms());
    let analyzer = ClauseAnalyzer::new(WordSegmenter::from_config(lexicon.clone(), &config), synonyms.clone());
    let corpus = ChatCorpus::compile([("chats.txt", source)], &analyzer).expect("compile corpus");
    let responses = ResponseBank::compile([("chat_mismatch", "我没听懂")]);
    Model {
        lexicon,
        synonyms,
        corpus: Arc::new(corpus),
        responses: Some(Arc::new(responses)),
        config,
    }
}

fn engine(source: &str) -> DialogueEngine {
    let model = model(source);
    let commands = CommandTable::new(model.responses.clone()).with_seed(42);
    DialogueEngine::with_resolver(model, commands)
}

#[test]
fn greeting_is_answered() {
    let mut engine = engine("你好\n你好呀\n");
    assert_eq!(engine.phase(), DialoguePhase::NoContext);
    assert_eq!(engine.answer("你好"), "你好呀");
    assert_eq!(engine.state().last_match(), Some(Location::new(0, 0)));
    assert_eq!(engine.phase(), DialoguePhase::HasContext);
}

#[test]
fn unrelated_input_gets_the_mismatch_response() {
    let mut engine = engine("你好\n你好呀\n");
    let trace = engine.answer_with_trace("随便说点别的完全不相关的话");
    assert_eq!(trace.candidates, 0);
    assert_eq!(trace.matched, None);
    assert_eq!(trace.answer, "我没听懂");
    assert_eq!(engine.state().last_match(), None);
}

#[test]
fn full_width_punctuation_and_regions_do_not_matter() {
    let mut engine = engine("你好\n你好呀\n");
    assert_eq!(engine.answer("（小声）你好！"), "你好呀");
}

const WEATHER: &str = "明天下雨\n别出门\n\n天气怎么样\n晴天\n明天下雨\n带伞吧\n";

#[test]
fn equal_scores_keep_the_first_candidate() {
    let mut engine = engine(WEATHER);
    let trace = engine.answer_with_trace("明天下雨");
    assert_eq!(trace.matched, Some(Location::new(0, 0)));
    assert_eq!(trace.answer, "别出门");
}

#[test]
fn continuity_bonus_prefers_the_current_session() {
    let mut engine = engine(WEATHER);
    assert_eq!(engine.answer("天气怎么样"), "晴天");
    let trace = engine.answer_with_trace("明天下雨");
    assert_eq!(trace.matched, Some(Location::new(1, 1)));
    assert_eq!(trace.answer, "带伞吧");
    // three pairs share a context word
    assert_eq!(trace.candidates, 3);
    assert!(trace.score > 1.0);
}

#[test]
fn clearing_the_context_drops_the_bonus() {
    let mut engine = engine(WEATHER);
    engine.answer("天气怎么样");
    engine.clear_context();
    assert_eq!(engine.phase(), DialoguePhase::NoContext);
    assert_eq!(engine.answer("明天下雨"), "别出门");
}

#[test]
fn numerals_match_digits() {
    let mut engine = engine("我今年二十岁\n真年轻\n");
    let corpus = engine.model().corpus.clone();
    assert!(corpus.word_id("20").known().is_some());
    assert_eq!(engine.answer("我今年20岁"), "真年轻");
}

#[test]
fn synonyms_fold_on_both_sides() {
    let mut engine = engine("我很开心\n那太好了\n");
    assert!(engine.model().corpus.word_id("开心").known().is_none());
    let trace = engine.answer_with_trace("我很高兴");
    assert_eq!(trace.answer, "那太好了");
    assert!(trace.clauses[0].words.contains(&"高兴".to_string()));
}

#[test]
fn old_context_fades_out() {
    let mut engine = engine("你好\n你好呀\n");
    engine.answer("你好");
    for _ in 0..4 {
        engine.answer("鱻");
    }
    let trace = engine.answer_with_trace("鱻");
    // 1 / 4^5 is under the eviction threshold
    assert!(trace.context.is_empty());
    assert_eq!(trace.answer, "我没听懂");
}

#[test]
fn state_survives_a_new_engine() {
    let mut first = engine(WEATHER);
    first.answer("天气怎么样");
    let state: DialogueState = first.into_state();

    let path = std::env::temp_dir().join(format!(
        "libchat_dialogue_state_{}_{}.bin",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    state.save_bincode(&path).expect("save state");
    let restored = DialogueState::load_bincode(&path).expect("load state");
    let _ = std::fs::remove_file(&path);

    let mut second = engine(WEATHER);
    second.set_state(restored);
    assert_eq!(second.answer("明天下雨"), "带伞吧");
}

#[test]
fn engines_share_one_model() {
    let model = model("你好\n你好呀\n");
    let mut a = DialogueEngine::new(model.clone());
    let mut b = DialogueEngine::new(model);
    assert_eq!(a.answer("你好"), "你好呀");
    assert_eq!(b.state().last_match(), None);
    assert_eq!(b.answer("你好"), "你好呀");
}
