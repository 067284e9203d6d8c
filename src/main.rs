//! # askdocs CLI
//!
//! Ask questions of your own documents. `askdocs` chunks and embeds PDFs,
//! text files and web pages into a local SQLite index, then answers
//! questions from the closest passages with a language model.
//!
//! ## Usage
//!
//! ```bash
//! askdocs --config ./config/askdocs.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askdocs init` | Create the SQLite database and schema |
//! | `askdocs ingest <paths…> [--url URL]` | Replace the corpus with these documents |
//! | `askdocs ask "<question>"` | Answer one question and cite the top source |
//! | `askdocs chat` | Interactive session with in-memory history |
//! | `askdocs documents` | List the documents of the live corpus |
//! | `askdocs serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! askdocs init
//! askdocs ingest ./handbook.pdf ./notes/ --url https://example.com/faq
//! askdocs ask "What is the refund policy?"
//! askdocs ask "What is the refund policy?" --json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use askdocs::{ask, config, documents, ingest, logging, migrate, server};

/// askdocs: question answering over your own documents.
///
/// All commands accept `--config` pointing to a TOML file. See
/// `config/askdocs.example.toml` for every setting.
#[derive(Parser)]
#[command(
    name = "askdocs",
    about = "Question answering over your own documents",
    version,
    long_about = "askdocs chunks and embeds PDFs, text files and web pages into a local \
    index and answers questions from the most similar passages using a language model. \
    Every ingestion replaces the previous corpus."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite file and the `chunks` and `documents` tables.
    /// Safe to run repeatedly.
    Init,

    /// Replace the corpus with the given files, directories and pages.
    ///
    /// Directories are walked for `.pdf`, `.txt` and `.md` files. The
    /// previous corpus is removed before anything new is indexed.
    Ingest {
        /// Files or directories to ingest.
        paths: Vec<PathBuf>,

        /// Web page to ingest (repeatable). Only the page itself is fetched.
        #[arg(long = "url")]
        urls: Vec<String>,
    },

    /// Answer a single question.
    Ask {
        question: String,

        /// Print the full turn (answer and retrieved chunks) as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ask questions interactively; history lasts for the session only.
    Chat,

    /// List the documents of the live corpus.
    Documents {
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init("info");

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { paths, urls } => {
            ingest::run_ingest(&cfg, &paths, &urls).await?;
        }
        Commands::Ask { question, json } => {
            ask::run_ask(&cfg, &question, json).await?;
        }
        Commands::Chat => {
            ask::run_chat(&cfg).await?;
        }
        Commands::Documents { json } => {
            documents::run_documents(&cfg, json).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
