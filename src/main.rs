//! # Subject Tutor CLI (`tutor`)
//!
//! Answers questions about a class's subject from that subject's reference
//! document, building a searchable knowledge base on first use.
//!
//! ## Usage
//!
//! ```bash
//! tutor --config ./config/tutor.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tutor catalog` | List classes and their subjects |
//! | `tutor locate <class> <subject>` | Show which source document a key resolves to |
//! | `tutor build <class> <subject> [--force]` | Load or build a knowledge base |
//! | `tutor list` | List persisted knowledge bases |
//! | `tutor ask <class> <subject> "<question>"` | Answer one question |
//! | `tutor chat <class> <subject>` | Interactive chat |
//! | `tutor serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Which document backs 9th-grade Science?
//! tutor locate 9th Science
//!
//! # Rebuild after editing the document
//! tutor build 9th Science --force
//!
//! # One-off question
//! tutor ask 10th English "What is a gerund?"
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use subject_tutor::app::Tutor;
use subject_tutor::{commands, config, server};

/// Subject Tutor: a class- and subject-scoped Q&A assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(name = "tutor", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tutor.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    /// `RUST_LOG` takes precedence when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the classes and the subjects offered in each.
    Catalog,

    /// Show the candidate source documents for a class and subject.
    Locate { class: String, subject: String },

    /// Load or build the knowledge base for a class and subject.
    Build {
        class: String,
        subject: String,

        /// Rebuild from the source document even if a knowledge base exists.
        #[arg(long)]
        force: bool,
    },

    /// List persisted knowledge bases.
    List,

    /// Answer a single question.
    Ask {
        class: String,
        subject: String,
        question: String,
    },

    /// Chat interactively about one subject.
    ///
    /// Type `/clear` to clear the transcript and `/quit` to exit.
    Chat { class: String, subject: String },

    /// Start the HTTP server on `[server].bind`.
    Serve {
        /// Override the bind address.
        #[arg(long)]
        bind: Option<String>,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Catalog => commands::run_catalog(&cfg)?,
        Commands::Locate { class, subject } => commands::run_locate(&cfg, &class, &subject)?,
        Commands::Build {
            class,
            subject,
            force,
        } => commands::run_build(&cfg, &class, &subject, force).await?,
        Commands::List => commands::run_list(&cfg)?,
        Commands::Ask {
            class,
            subject,
            question,
        } => commands::run_ask(&cfg, &class, &subject, &question).await?,
        Commands::Chat { class, subject } => commands::run_chat(&cfg, &class, &subject).await?,
        Commands::Serve { bind } => {
            let tutor = Tutor::from_config(&cfg)?;
            let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
            server::run_server(&bind, tutor.server_state()).await?;
        }
    }

    Ok(())
}
