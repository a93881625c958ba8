use anyhow::{bail, Context, Result};
use serde_json::json;
use std::path::Path;

use libchat_core::units::split_units;
use libchat_core::{ChatCorpus, Lexicon, PartOfSpeech};

fn load_lexicon(bank: &Path) -> Result<Lexicon> {
    Lexicon::load_file(bank).with_context(|| format!("loading lexicon {}", bank.display()))
}

pub fn lexicon_get(bank: &Path, word: &str) -> Result<()> {
    let lexicon = load_lexicon(bank)?;
    match lexicon.find(&split_units(word)) {
        Some(info) => {
            let tag = info.part_of_speech.map(|p| p.tag()).unwrap_or("-");
            println!("{word}\t{tag}\t{}", info.frequency);
        }
        None => println!("{word}: not found"),
    }
    Ok(())
}

pub fn lexicon_trace(bank: &Path, word: &str) -> Result<()> {
    let lexicon = load_lexicon(bank)?;
    let units = split_units(word);
    let trace = lexicon.frequency_trace(&units, 0, units.len());
    for (i, frequency) in trace.iter().enumerate() {
        println!("{i}\t{}\t{frequency}", units[i..].concat());
    }
    Ok(())
}

pub fn lexicon_stats(bank: &Path) -> Result<()> {
    let lexicon = load_lexicon(bank)?;
    println!("words: {}", lexicon.word_count());
    println!("nodes: {}", lexicon.node_count());
    Ok(())
}

fn parse_tag(tag: Option<&str>) -> Result<Option<PartOfSpeech>> {
    match tag {
        None => Ok(None),
        Some(tag) => match PartOfSpeech::parse(tag) {
            Some(pos) => Ok(Some(pos)),
            None => bail!("unknown part-of-speech tag {tag:?}"),
        },
    }
}

/// The mutating commands rewrite the bank in place.
pub enum Edit {
    Set,
    Add,
    Delete,
}

pub fn lexicon_edit(bank: &Path, word: &str, edit: Edit, frequency: f64, tag: Option<&str>) -> Result<()> {
    let mut lexicon = load_lexicon(bank)?;
    let units = split_units(word);
    let pos = parse_tag(tag)?;
    let message = match edit {
        Edit::Set => {
            if lexicon.set(&units, pos, frequency) {
                "updated"
            } else {
                "added"
            }
        }
        Edit::Add => {
            if lexicon.add(&units, pos, frequency) {
                "added"
            } else {
                "already present"
            }
        }
        Edit::Delete => {
            if lexicon.delete(&units) {
                "deleted"
            } else {
                "not found"
            }
        }
    };
    lexicon
        .save_file(bank)
        .with_context(|| format!("writing lexicon {}", bank.display()))?;
    println!("{word}: {message}");
    Ok(())
}

/// Print every pair whose question contains `word`, as JSON.
pub fn chats(chats: &Path, word: &str) -> Result<()> {
    let corpus = ChatCorpus::load_file(chats).with_context(|| format!("loading corpus {}", chats.display()))?;
    let Some(id) = corpus.word_id(word).known() else {
        println!("{}", json!({ "word": word, "id": null, "pairs": [] }));
        return Ok(());
    };
    let pairs: Vec<_> = corpus
        .postings(id)
        .iter()
        .filter_map(|&location| {
            let pair = corpus.pair(location)?;
            let question: Vec<&str> = pair.question.vectors().iter().map(|v| v.text()).collect();
            Some(json!({
                "session": location.session,
                "pair": location.pair,
                "question": question,
                "answer": pair.answer,
            }))
        })
        .collect();
    let report = json!({ "word": word, "id": id, "pairs": pairs });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
