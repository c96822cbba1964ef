//! # RAG Mind CLI (`ragmind`)
//!
//! ## Usage
//!
//! ```bash
//! ragmind --config ./config/ragmind.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragmind init` | Write a starter config if missing, create the settings file and database |
//! | `ragmind serve [--reindex]` | Start the HTTP API |
//! | `ragmind reindex` | Rebuild the collection from the document paths |
//! | `ragmind ask "<question>"` | Answer a question |
//! | `ragmind search "<query>"` | Show the nearest chunks without generating |
//! | `ragmind stats` | Collection statistics |
//! | `ragmind paths list\|add\|remove` | Manage document paths |
//! | `ragmind settings` | Print the runtime settings as JSON |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rag_mind::config::{self, Config, SettingsStore};
use rag_mind::logging;
use rag_mind::server;
use rag_mind::service::RagService;
use rag_mind::stats;
use rag_mind::store::sqlite::SqliteVectorIndex;

#[derive(Parser)]
#[command(
    name = "ragmind",
    about = "RAG Mind — question answering over your own documents",
    version,
    long_about = "RAG Mind indexes the text, Markdown, and PDF files under your document \
    folders into a local vector collection and answers questions from them with a chat model, \
    through a CLI and a JSON HTTP API."
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "./config/ragmind.toml")]
    config: PathBuf,

    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the configuration (if missing), settings file, and database.
    Init,

    /// Start the HTTP server.
    Serve {
        /// Rebuild the collection before accepting requests.
        #[arg(long)]
        reindex: bool,
    },

    /// Rebuild the collection from the configured document paths.
    Reindex,

    /// Answer a question from the indexed documents.
    Ask {
        question: String,

        /// Number of chunks to retrieve (defaults to the `n_results` setting).
        #[arg(long)]
        n_results: Option<usize>,

        /// Send the bare question to the model, without retrieved context.
        #[arg(long)]
        no_augmentation: bool,
    },

    /// Show the chunks nearest to a query.
    Search {
        query: String,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show collection statistics.
    Stats,

    /// Manage document paths.
    Paths {
        #[command(subcommand)]
        action: PathsAction,
    },

    /// Print the runtime settings as JSON.
    Settings,
}

#[derive(Subcommand)]
enum PathsAction {
    List,
    Add { path: String },
    Remove { path: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config_path = cli.config;
    let load = || config::load_config(&config_path);

    match cli.command {
        Commands::Init => init(&config_path).await?,
        Commands::Serve { reindex } => {
            let service = Arc::new(RagService::open(load()?).await?);
            if reindex {
                let report = service.reindex().await?;
                eprint!("{}", stats::format_report(&report));
            }
            let bind = service.config().server.bind.clone();
            server::run_server(service, &bind).await?;
        }
        Commands::Reindex => {
            let service = RagService::open(load()?).await?;
            let report = service.reindex().await?;
            print!("{}", stats::format_report(&report));
        }
        Commands::Ask {
            question,
            n_results,
            no_augmentation,
        } => {
            let service = RagService::open(load()?).await?;
            let augmentation = if no_augmentation { Some(false) } else { None };
            let answer = service.ask(&question, n_results, augmentation).await?;

            println!("{}", answer.answer);
            println!();
            if answer.grounded {
                println!("Sources:");
                for s in &answer.sources {
                    println!("  {:.3}  {} #{}", s.score, s.source_path, s.position);
                }
            } else {
                println!("(answer not grounded in retrieved documents)");
            }
        }
        Commands::Search { query, limit } => {
            let service = RagService::open(load()?).await?;
            let hits = service.search(&query, limit).await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} #{}",
                    i + 1,
                    hit.score,
                    hit.source_path,
                    hit.position
                );
                println!("    {}", snippet(&hit.text, 200));
            }
        }
        Commands::Stats => {
            let service = RagService::open(load()?).await?;
            let collection = service.stats().await?;
            print!("{}", stats::format_stats(&collection, &service.config().db.path));
        }
        Commands::Paths { action } => {
            let cfg = load()?;
            let store = SettingsStore::open(&cfg.settings.path)?;
            match action {
                PathsAction::List => {
                    for path in store.snapshot().document_paths {
                        println!("{}", path);
                    }
                }
                PathsAction::Add { path } => {
                    store.add_document_path(&path)?;
                    println!("Added document path: {}", path);
                }
                PathsAction::Remove { path } => {
                    if store.remove_document_path(&path)? {
                        println!("Removed document path: {}", path);
                    } else {
                        println!("Document path not configured: {}", path);
                    }
                }
            }
        }
        Commands::Settings => {
            let cfg = load()?;
            let store = SettingsStore::open(&cfg.settings.path)?;
            println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
        }
    }

    Ok(())
}

async fn init(config_path: &Path) -> anyhow::Result<()> {
    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(config_path, config::EXAMPLE_CONFIG)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        println!("Wrote starter configuration to {}", config_path.display());
    }

    let cfg: Config = config::load_config(config_path)?;
    SettingsStore::open(&cfg.settings.path)?;
    let index = SqliteVectorIndex::open(&cfg.db.path, &cfg.db.collection).await?;
    index.close().await;

    println!("Settings file: {}", cfg.settings.path.display());
    println!("Database initialized successfully.");
    Ok(())
}

/// First `max` characters of `text` on one line.
fn snippet(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &flat[..idx]),
        None => flat,
    }
}
