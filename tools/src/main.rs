mod compile;
mod inspect;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use libchat_core::{Config, DialogueEngine, Model};

#[derive(Parser)]
#[command(name = "libchat", about = "Build and query libchat assets")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Word frequency lexicon
    Lexicon {
        #[command(subcommand)]
        command: LexiconCommand,
    },
    /// Synonym table
    Synonyms {
        #[command(subcommand)]
        command: SynonymsCommand,
    },
    /// Chat corpus
    Chats {
        #[command(subcommand)]
        command: ChatsCommand,
    },
    /// Random response bank
    Responses {
        #[command(subcommand)]
        command: ResponsesCommand,
    },
    /// Run one conversation, a turn per question
    Ask {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the full turn trace as JSON
        #[arg(long)]
        trace: bool,
        #[arg(required = true)]
        questions: Vec<String>,
    },
}

#[derive(Subcommand)]
enum LexiconCommand {
    Build {
        source: PathBuf,
        out: PathBuf,
    },
    Get {
        bank: PathBuf,
        word: String,
    },
    Trace {
        bank: PathBuf,
        word: String,
    },
    Delete {
        bank: PathBuf,
        word: String,
    },
    Set {
        bank: PathBuf,
        word: String,
        #[arg(default_value_t = 1.0)]
        frequency: f64,
        tag: Option<String>,
    },
    Add {
        bank: PathBuf,
        word: String,
        #[arg(default_value_t = 1.0)]
        frequency: f64,
        tag: Option<String>,
    },
    Stats {
        bank: PathBuf,
    },
}

#[derive(Subcommand)]
enum SynonymsCommand {
    Build {
        thesaurus: PathBuf,
        specials: PathBuf,
        lexicon: PathBuf,
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum ChatsCommand {
    Build {
        dir: PathBuf,
        lexicon: PathBuf,
        synonyms: PathBuf,
        out: PathBuf,
    },
    /// Pairs whose question contains a word
    Inspect {
        chats: PathBuf,
        word: String,
    },
}

#[derive(Subcommand)]
enum ResponsesCommand {
    Build {
        dir: PathBuf,
        out: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let mut config = Config::load_toml(path).with_context(|| format!("reading config {}", path.display()))?;
    if let Some(base) = path.parent() {
        config.assets = config.assets.relative_to(base);
    }
    Ok(config)
}

fn ask(config: Option<&Path>, trace: bool, questions: &[String]) -> Result<()> {
    let config = load_config(config)?;
    let model = Model::load(&config).context("loading model")?;
    let mut engine = DialogueEngine::new(model);
    for question in questions {
        if trace {
            println!("{}", engine.answer_with_trace(question).to_json()?);
        } else {
            println!("{}", engine.answer(question));
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Lexicon { command } => match command {
            LexiconCommand::Build { source, out } => compile::lexicon(&source, &out),
            LexiconCommand::Get { bank, word } => inspect::lexicon_get(&bank, &word),
            LexiconCommand::Trace { bank, word } => inspect::lexicon_trace(&bank, &word),
            LexiconCommand::Delete { bank, word } => {
                inspect::lexicon_edit(&bank, &word, inspect::Edit::Delete, 0.0, None)
            }
            LexiconCommand::Set { bank, word, frequency, tag } => {
                inspect::lexicon_edit(&bank, &word, inspect::Edit::Set, frequency, tag.as_deref())
            }
            LexiconCommand::Add { bank, word, frequency, tag } => {
                inspect::lexicon_edit(&bank, &word, inspect::Edit::Add, frequency, tag.as_deref())
            }
            LexiconCommand::Stats { bank } => inspect::lexicon_stats(&bank),
        },
        Command::Synonyms {
            command: SynonymsCommand::Build { thesaurus, specials, lexicon, out },
        } => compile::synonyms(&thesaurus, &specials, &lexicon, &out),
        Command::Chats { command } => match command {
            ChatsCommand::Build { dir, lexicon, synonyms, out } => compile::chats(&dir, &lexicon, &synonyms, &out),
            ChatsCommand::Inspect { chats, word } => inspect::chats(&chats, &word),
        },
        Command::Responses {
            command: ResponsesCommand::Build { dir, out },
        } => compile::responses(&dir, &out),
        Command::Ask { config, trace, questions } => ask(config.as_deref(), trace, &questions),
    }
}
