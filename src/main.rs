//! # chatdocs CLI (`cdx`)
//!
//! The `cdx` binary drives the session lifecycle from the command line and
//! starts the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! cdx --config ./config/cdx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cdx create <paths...>` | Create a session from files or directories |
//! | `cdx chat <id> <question>` | Ask a question within a session |
//! | `cdx sessions` | List sessions, most recently active first |
//! | `cdx show <id>` | Print a session's documents and transcript |
//! | `cdx delete <id>` | Delete a session |
//! | `cdx serve` | Start the JSON HTTP server |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use chatdocs::config::{load_config, Config};
use chatdocs::models::Role;
use chatdocs::server::run_server;
use chatdocs::sessions::{purge_session, IngestFile, SessionManager};
use chatdocs::store::SessionStore;

/// chatdocs CLI — chat with your documents over persistent sessions.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file holding the storage root, gateway settings, and server bind address.
#[derive(Parser)]
#[command(
    name = "cdx",
    about = "chatdocs — a session-based retrieval-augmented chat service for your documents",
    version,
    long_about = "chatdocs ingests documents into persistent sessions, builds a per-session \
    vector index, and answers questions grounded in the retrieved passages via a CLI and a \
    JSON HTTP server."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cdx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create a session from files or directories.
    ///
    /// Directories are walked recursively; unreadable or unsupported files
    /// are skipped with a warning. Fails if no file yields any text.
    Create {
        /// Files or directories to ingest.
        paths: Vec<PathBuf>,
    },

    /// Ask a question within an existing session.
    Chat {
        /// Session identifier.
        id: String,

        /// The question text.
        question: String,
    },

    /// List sessions, most recently active first.
    Sessions,

    /// Print a session's documents and transcript.
    Show {
        /// Session identifier.
        id: String,
    },

    /// Delete a session and its persisted index. Idempotent.
    Delete {
        /// Session identifier.
        id: String,
    },

    /// Start the JSON HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Create { paths } => run_create(&config, paths).await,
        Commands::Chat { id, question } => run_chat(&config, &id, &question).await,
        Commands::Sessions => run_sessions(&config).await,
        Commands::Show { id } => run_show(&config, &id).await,
        Commands::Delete { id } => run_delete(&config, &id).await,
        Commands::Serve => run_server(&config).await,
    }
}

/// Expand files and directories into ingestable (name, bytes) pairs.
fn collect_files(paths: &[PathBuf]) -> anyhow::Result<Vec<IngestFile>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(false) {
                let entry = entry?;
                if entry.file_type().is_file() {
                    files.push(read_ingest_file(entry.path())?);
                }
            }
        } else {
            files.push(read_ingest_file(path)?);
        }
    }

    Ok(files)
}

fn read_ingest_file(path: &std::path::Path) -> anyhow::Result<IngestFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(IngestFile { name, bytes })
}

async fn run_create(config: &Config, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    if paths.is_empty() {
        anyhow::bail!("No files given. Usage: cdx create <paths...>");
    }

    let files = collect_files(&paths)?;
    let manager = SessionManager::new(config)?;
    let record = manager.create_session(files).await?;

    println!("Created session {}", record.id);
    for name in &record.document_names {
        println!("  {}", name);
    }

    Ok(())
}

async fn run_chat(config: &Config, id: &str, question: &str) -> anyhow::Result<()> {
    let manager = SessionManager::new(config)?;
    let outcome = manager.chat(id, question).await?;

    println!("{}", outcome.answer);
    Ok(())
}

async fn run_sessions(config: &Config) -> anyhow::Result<()> {
    let store = SessionStore::open(config.storage.root.clone())?;
    let sessions = store.list().await;

    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }

    for record in sessions {
        println!(
            "{}  {}  {} turns  [{}]",
            record.id,
            record.updated_at.format("%Y-%m-%d %H:%M:%S"),
            record.transcript.len(),
            record.document_names.join(", ")
        );
    }

    Ok(())
}

async fn run_show(config: &Config, id: &str) -> anyhow::Result<()> {
    let store = SessionStore::open(config.storage.root.clone())?;
    let record = store.get(id).await?;

    println!("Session {}", record.id);
    println!("Updated {}", record.updated_at.format("%Y-%m-%d %H:%M:%S"));
    println!("Documents:");
    for name in &record.document_names {
        println!("  {}", name);
    }
    println!("Transcript:");
    for turn in &record.transcript {
        let speaker = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        println!("  [{}] {}", speaker, turn.content);
    }

    Ok(())
}

async fn run_delete(config: &Config, id: &str) -> anyhow::Result<()> {
    let store = SessionStore::open(config.storage.root.clone())?;
    purge_session(&store, id).await?;

    println!("Deleted session {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
