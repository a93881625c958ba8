use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use libchat_core::codec::decode_source;
use libchat_core::{ChatCorpus, ClauseAnalyzer, Config, Lexicon, ResponseBank, SynonymTable, WordSegmenter};

/// Read a source file as UTF-8, falling back to GBK.
pub fn read_source(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    decode_source(&bytes).with_context(|| format!("decoding {}", path.display()))
}

/// Every `*.txt` file under `dir`, sorted by name, as (file stem, text).
pub fn read_source_dir(dir: &Path) -> Result<Vec<(String, String)>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("txt"))
        .collect();
    paths.sort();
    debug!(dir = %dir.display(), files = paths.len(), "reading source directory");
    paths
        .iter()
        .map(|p| {
            let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or("").to_string();
            Ok((stem, read_source(p)?))
        })
        .collect()
}

pub fn lexicon(source: &Path, out: &Path) -> Result<()> {
    let lexicon = Lexicon::from_source(&read_source(source)?)
        .with_context(|| format!("parsing {}", source.display()))?;
    lexicon.save_file(out)?;
    info!(source = %source.display(), nodes = lexicon.node_count(), "lexicon build finished");
    println!("Wrote {} words to {}", lexicon.word_count(), out.display());
    Ok(())
}

pub fn synonyms(thesaurus: &Path, specials: &Path, lexicon: &Path, out: &Path) -> Result<()> {
    let lexicon = Lexicon::load_file(lexicon).context("loading lexicon")?;
    let table = SynonymTable::compile(&read_source(thesaurus)?, &read_source(specials)?, &lexicon)?;
    table.save_file(out)?;
    info!(thesaurus = %thesaurus.display(), "synonym build finished");
    println!(
        "Wrote {} groups, {} aliases and {} special words to {}",
        table.canonical_count(),
        table.alias_count(),
        table.special_count(),
        out.display()
    );
    Ok(())
}

pub fn chats(dir: &Path, lexicon: &Path, synonyms: &Path, out: &Path) -> Result<()> {
    let lexicon = Arc::new(Lexicon::load_file(lexicon).context("loading lexicon")?);
    let synonyms = Arc::new(SynonymTable::load_file(synonyms).context("loading synonym table")?);
    let analyzer = ClauseAnalyzer::new(WordSegmenter::from_config(lexicon, &Config::default()), synonyms);
    let sources = read_source_dir(dir)?;
    let corpus = ChatCorpus::compile(sources, &analyzer)?;
    corpus.save_file(out)?;
    info!(dir = %dir.display(), "chat corpus build finished");
    println!(
        "Wrote {} sessions ({} pairs, {} words) to {}",
        corpus.session_count(),
        corpus.pair_count(),
        corpus.word_count(),
        out.display()
    );
    Ok(())
}

pub fn responses(dir: &Path, out: &Path) -> Result<()> {
    let bank = ResponseBank::compile(read_source_dir(dir)?);
    bank.save_file(out)?;
    info!(dir = %dir.display(), "response bank build finished");
    println!("Wrote {} response keys to {}", bank.len(), out.display());
    Ok(())
}
