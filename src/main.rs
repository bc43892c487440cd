//! # Answer Gate CLI (`gate`)
//!
//! The `gate` binary manages sessions, loads documents into them, and
//! answers questions with quality gating, hallucination detection, and
//! fallback retrieval.
//!
//! ## Usage
//!
//! ```bash
//! gate --config ./config/gate.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gate session create [NAME]` | Create and save an empty session |
//! | `gate session list` | List saved sessions |
//! | `gate session show <id>` | Print the session summary as JSON |
//! | `gate session delete <id>` | Delete a session record |
//! | `gate session export <id>` | Write the session as JSON or a Markdown report |
//! | `gate docs add <session> <path>...` | Chunk files or directories into a session |
//! | `gate ask <session> "<question>"` | Answer, gate, and record a question |
//! | `gate assess` | Score a standalone question/answer pair |
//! | `gate completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! gate session create research
//! gate docs add research ./docs
//! gate ask research "How does the scheduler balance work?"
//! gate session export research --format md --output research.md
//! ```
//!
//! Logs go to stderr; set `RUST_LOG=answer_gate=debug` for scoring detail.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use answer_gate::config::{self, Config};
use answer_gate::export::ExportFormat;
use answer_gate::{ask, corpus, session_cmd};

/// Answer Gate CLI: quality-gated question answering over local documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Every section is optional; see `config/gate.example.toml`.
#[derive(Parser)]
#[command(
    name = "gate",
    about = "Answer Gate: quality gating and repair for retrieval-augmented answers",
    version,
    long_about = "Answer Gate answers questions against a session's documents, scores each \
    answer for completeness, specificity, relevance, confidence and hallucination risk, and \
    retries retrieval with an alternate strategy when an answer fails the quality gate."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/gate.toml`.
    #[arg(long, global = true, default_value = "./config/gate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Manage session records.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Manage a session's documents.
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Ask a question within a session.
    ///
    /// Retrieves passages from the session's documents, generates an answer,
    /// scores it, runs a fallback retrieval strategy when the score is below
    /// the threshold, then records the turn and saves the session.
    Ask {
        /// Session id.
        session: String,

        /// The question to answer.
        question: String,

        /// Skip fallback retrieval even when the answer fails the gate.
        #[arg(long)]
        no_fallback: bool,

        /// Skip the hallucination scan.
        #[arg(long)]
        no_hallucination_check: bool,

        /// Print the full gated result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Score a question/answer pair without a session.
    ///
    /// Prints the quality assessment and hallucination report as JSON.
    Assess {
        #[arg(long)]
        question: String,

        #[arg(long)]
        answer: String,

        /// File holding the source context the answer should be grounded in.
        #[arg(long)]
        context_file: Option<PathBuf>,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

/// Session subcommands.
#[derive(Subcommand)]
enum SessionAction {
    /// Create and save a new empty session.
    ///
    /// Without a name the id is generated from the current time.
    Create {
        /// Session name (letters, digits, `-`, `_`, `.`).
        name: Option<String>,
    },
    /// List saved session ids.
    List,
    /// Print a session summary as JSON.
    Show {
        id: String,
    },
    /// Delete a session record.
    Delete {
        id: String,
    },
    /// Export a session.
    Export {
        id: String,

        /// `json` for the raw record, `md` for a readable report.
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,

        /// Destination file.
        #[arg(long)]
        output: PathBuf,
    },
}

/// Document subcommands.
#[derive(Subcommand)]
enum DocsAction {
    /// Chunk files (or directories of text, PDF, DOCX and XLSX files) into a session.
    Add {
        /// Session id.
        session: String,

        /// Files or directories to add.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Config for commands that work without one: the file is used when present.
fn optional_config(path: &std::path::Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    // Commands that don't require a config file
    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "gate", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Assess {
            question,
            answer,
            context_file,
        } => {
            let cfg = optional_config(&cli.config)?;
            ask::run_assess(&cfg, question, answer, context_file.as_deref())?;
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;
    tracing::debug!(config = %cli.config.display(), "loaded config");

    match cli.command {
        Commands::Session { action } => match action {
            SessionAction::Create { name } => session_cmd::run_create(&cfg, name.as_deref())?,
            SessionAction::List => session_cmd::run_list(&cfg)?,
            SessionAction::Show { id } => session_cmd::run_show(&cfg, &id)?,
            SessionAction::Delete { id } => session_cmd::run_delete(&cfg, &id)?,
            SessionAction::Export { id, format, output } => {
                session_cmd::run_export(&cfg, &id, format, &output)?
            }
        },
        Commands::Docs { action } => match action {
            DocsAction::Add { session, paths } => corpus::run_add_docs(&cfg, &session, &paths)?,
        },
        Commands::Ask {
            session,
            question,
            no_fallback,
            no_hallucination_check,
            json,
        } => {
            ask::run_ask(
                &cfg,
                &session,
                &question,
                no_fallback,
                no_hallucination_check,
                json,
            )
            .await?;
        }
        Commands::Assess { .. } | Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
