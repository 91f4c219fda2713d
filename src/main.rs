use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use ragserve::Result;
use ragserve::config::Config;
use ragserve::documents::DocumentStatus;
use ragserve::server::{AppState, serve};

#[derive(Parser)]
#[command(name = "ragserve")]
#[command(about = "Document ingestion and retrieval service with RAG workflows")]
#[command(version)]
struct Cli {
    /// Data directory holding config.toml, uploaded documents, and vector records
    #[arg(long, global = true, default_value = "./data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,
        /// Override the configured bind port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show the resolved configuration
    Config,
    /// Upload a document file into the intake root
    Upload {
        /// Path of the file to upload
        path: PathBuf,
    },
    /// Index (or re-index) an uploaded document
    Index {
        /// Document id returned at upload time
        document_id: String,
    },
    /// Rank indexed chunks against a query
    Search {
        query: String,
        /// Number of results to return
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// List indexed documents
    List,
    /// Delete a document and its indexed chunks
    Delete {
        document_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.data_dir)?;

    match cli.command {
        Commands::Serve { host, port } => {
            let bind_host = host.unwrap_or_else(|| config.server.host.clone());
            let bind_port = port.unwrap_or(config.server.port);

            let state = AppState::from_config(&config).await?;
            let listener = TcpListener::bind((bind_host.as_str(), bind_port)).await?;
            serve(state, listener).await?;
        }
        Commands::Config => {
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| anyhow::anyhow!("Failed to render config: {e}"))?;
            println!("# data_dir: {}", config.data_dir.display());
            println!("{rendered}");
        }
        Commands::Upload { path } => {
            let bytes = tokio::fs::read(&path).await?;
            let state = AppState::from_config(&config).await?;
            let document_id = state.intake.save(&bytes).await?;
            state
                .statuses
                .set(&document_id, DocumentStatus::Uploaded)
                .await;
            println!("{document_id}");
        }
        Commands::Index { document_id } => {
            let state = AppState::from_config(&config).await?;
            let chunks_indexed = state.indexer.index_document(&document_id).await?;
            println!("Indexed {document_id}: {chunks_indexed} chunks");
        }
        Commands::Search { query, top_k } => {
            let state = AppState::from_config(&config).await?;
            let hits = state.workflows.retrieve(&query, top_k).await?;
            if hits.is_empty() {
                println!("No results");
            }
            for hit in hits {
                println!(
                    "{:.4}  {}#{}  {}",
                    hit.score,
                    hit.chunk.document_id,
                    hit.chunk.sequence_index,
                    preview(&hit.chunk.text)
                );
            }
        }
        Commands::List => {
            let state = AppState::from_config(&config).await?;
            let summaries = state.store.documents().await?;
            if summaries.is_empty() {
                println!("No indexed documents");
            }
            for summary in summaries {
                println!(
                    "{}  {} chunks  written {}",
                    summary.document_id, summary.chunk_count, summary.written_at
                );
            }
        }
        Commands::Delete { document_id } => {
            let state = AppState::from_config(&config).await?;
            state.indexer.delete_document(&document_id).await?;
            println!("Deleted {document_id}");
        }
    }

    Ok(())
}

/// Single-line preview of a chunk for terminal output.
fn preview(text: &str) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(80).collect();
    if collapsed.chars().count() > 80 {
        format!("{truncated}…")
    } else {
        truncated
    }
}
