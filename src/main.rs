//! # Study Harness CLI (`study`)
//!
//! ## Usage
//!
//! ```bash
//! study --config ./config/study.toml <command> <file>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `study extract <file>` | Print the extracted text |
//! | `study chunks <file>` | Print chunk ids and word counts |
//! | `study summarize <file>` | Summarize the notes |
//! | `study quiz <file>` | Summary, flashcards and a scored quiz |
//! | `study ask <file> "<q>"` | One grounded answer with its sources |
//! | `study chat <file>` | Interactive grounded chat |
//! | `study completions <shell>` | Shell completion script |

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use study_harness::progress::ProgressMode;
use study_harness::{chat_cmd, config, logging, study_cmd};

const DEFAULT_CONFIG: &str = "./config/study.toml";

/// Study Harness: summaries, quizzes and a grounded chatbot for lecture notes.
///
/// Provider settings are read from a TOML file. See
/// `config/study.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "study", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/study.toml`; built-in defaults apply when that
    /// file does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Indexing progress on stderr. `auto` shows it only on a terminal.
    #[arg(long, global = true, value_enum, default_value_t = ProgressArg::Auto)]
    progress: ProgressArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Auto,
    Human,
    Json,
    Off,
}

impl ProgressArg {
    fn mode(self) -> ProgressMode {
        match self {
            ProgressArg::Auto => ProgressMode::default_for_tty(),
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
            ProgressArg::Off => ProgressMode::Off,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the text extracted from a document.
    Extract { file: PathBuf },

    /// Print the chunks a document is split into.
    Chunks {
        file: PathBuf,
        /// Words per chunk (overrides `[chunking] size`).
        #[arg(long)]
        size: Option<usize>,
    },

    /// Summarize a document.
    Summarize { file: PathBuf },

    /// Generate a summary, 5 MCQs and 3 flashcards.
    ///
    /// Asks the questions interactively when stdin is a terminal;
    /// otherwise prints the bundle as JSON.
    Quiz {
        file: PathBuf,
        /// Print JSON even on a terminal.
        #[arg(long)]
        json: bool,
    },

    /// Answer one question from the document.
    Ask {
        file: PathBuf,
        question: String,
        /// Chunks of context to retrieve (overrides `[retrieval] top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Chat about a document until `exit`, `quit` or `stop`.
    Chat { file: PathBuf },

    /// Print a shell completion script.
    Completions { shell: Shell },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "study", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Extract { file } => return study_cmd::run_extract(file),
        _ => {}
    }

    let cfg = if cli.config.as_os_str() == DEFAULT_CONFIG {
        config::load_config_or_default(&cli.config)?
    } else {
        config::load_config(&cli.config)?
    };

    let progress = cli.progress.mode();
    match cli.command {
        Commands::Chunks { file, size } => {
            study_cmd::run_chunks(&file, size.unwrap_or(cfg.chunking.size))?;
        }
        Commands::Summarize { file } => {
            study_cmd::run_summarize(&cfg, &file, progress).await?;
        }
        Commands::Quiz { file, json } => {
            let interactive = !json && atty::is(atty::Stream::Stdin);
            study_cmd::run_quiz(&cfg, &file, interactive, progress).await?;
        }
        Commands::Ask {
            file,
            question,
            top_k,
        } => {
            study_cmd::run_ask(&cfg, &file, &question, top_k, progress).await?;
        }
        Commands::Chat { file } => {
            chat_cmd::run_chat(&cfg, &file, progress).await?;
        }
        Commands::Extract { .. } | Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
