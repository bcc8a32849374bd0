use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ragpipe_core::config::Config;
use ragpipe_core::engine::Engine;
use ragpipe_core::orchestrator::QueryRequest;
use ragpipe_llm::{EmbeddingClient, HttpEmbeddingClient, LlmClient, OpenAiClient};
use ragpipe_memory::{InMemoryBackend, QdrantBackend, VectorBackend};

#[derive(Debug, Parser)]
#[command(name = "ragpipe", version, about = "Retrieval-augmented query pipeline")]
struct Cli {
    /// Config file path. Falls back to RAGPIPE_CONFIG, then config/default.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ask a question against the indexed documents.
    Query {
        text: String,
        /// Session whose conversation memory frames the answer.
        #[arg(long, default_value = "default")]
        session: String,
        /// Skip document retrieval and answer from the model alone.
        #[arg(long)]
        no_context: bool,
        /// Per-query sampling temperature override.
        #[arg(long)]
        temperature: Option<f32>,
    },
    /// Ingest a text or markdown file into the document index.
    Ingest { path: PathBuf },
    /// List indexed documents.
    Documents,
    /// Remove a document and all of its chunks from the index.
    DeleteDocument { document_id: String },
    /// Show both memory tiers of a session.
    Memory { session: String },
    /// Summarize a session's recent exchanges into long-term memory.
    Summarize { session: String },
    /// Delete all memory for a session.
    ClearMemory { session: String },
    /// Check connectivity of the vector and memory stores.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);
    let config = Config::load(&config_path)?;

    let engine = build_engine(&config).await?;

    match cli.command {
        Command::Query {
            text,
            session,
            no_context,
            temperature,
        } => {
            let request = QueryRequest {
                use_context: !no_context,
                temperature,
                ..QueryRequest::new(text, session)
            };
            let result = engine.submit_query(request).await?;

            println!("{}", result.answer);
            if let Some(sources) = &result.sources {
                println!("\nSources:");
                for source in sources {
                    println!(
                        "  {} (chunk {}, score {:.3})",
                        source.filename, source.chunk_index, source.score
                    );
                }
            }
            if !result.guardrails_passed {
                println!("\n[guardrails intervened on this turn]");
            }
        }
        Command::Ingest { path } => {
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .context("path has no usable filename")?
                .to_owned();
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let report = engine.ingest_document(&filename, &bytes).await?;
            println!(
                "ingested {} as {} ({} chunk(s))",
                report.filename, report.document_id, report.chunks_created
            );
        }
        Command::Documents => {
            let documents = engine.list_documents().await?;
            if documents.is_empty() {
                println!("no documents indexed");
            }
            for doc in documents {
                println!("{}  {}  {} chunk(s)", doc.document_id, doc.filename, doc.chunks);
            }
        }
        Command::DeleteDocument { document_id } => {
            if engine.delete_document(&document_id).await? {
                println!("deleted {document_id}");
            } else {
                println!("document {document_id} not found");
            }
        }
        Command::Memory { session } => {
            let snapshot = engine.get_memory(&session).await;
            println!("short-term ({} turn(s)):", snapshot.short_term.len());
            for turn in &snapshot.short_term {
                println!("  {}: {}", turn.role.as_str(), turn.content);
            }
            println!("long-term ({} summary(ies)):", snapshot.long_term.len());
            for entry in &snapshot.long_term {
                println!("  [{}] {}", entry.created_at, entry.summary);
            }
        }
        Command::Summarize { session } => {
            let summary = engine.summarize_session(&session).await?;
            println!("{summary}");
        }
        Command::ClearMemory { session } => {
            engine.clear_memory(&session).await?;
            println!("cleared memory for session {session}");
        }
        Command::Health => {
            let health = engine.health().await;
            println!("vector store: {}", status(health.vector_store_ok));
            println!("memory store: {}", status(health.memory_store_ok));
            if !health.ok() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Priority: CLI --config > `RAGPIPE_CONFIG` env > config/default.toml
fn resolve_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }
    if let Ok(path) = std::env::var("RAGPIPE_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

async fn build_engine(config: &Config) -> anyhow::Result<Engine> {
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
        config.llm.model.clone(),
    ));
    let embedder: Arc<dyn EmbeddingClient> = Arc::new(HttpEmbeddingClient::new(
        config.embedding.url.clone(),
        config.embedding.dimension,
    ));

    let backend: Arc<dyn VectorBackend> = match &config.vector.qdrant_url {
        Some(url) => {
            let vector_size = u64::try_from(config.embedding.dimension)
                .context("embedding dimension out of range")?;
            let qdrant = QdrantBackend::connect(url, vector_size).await?;
            tracing::info!(url, "connected to Qdrant");
            Arc::new(qdrant)
        }
        None => {
            tracing::warn!("no Qdrant URL configured, using in-memory vector store");
            Arc::new(InMemoryBackend::new())
        }
    };

    if let Some(parent) = std::path::Path::new(&config.memory.sqlite_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    Ok(Engine::new(config, llm, embedder, backend).await?)
}

const fn status(ok: bool) -> &'static str {
    if ok { "ok" } else { "unreachable" }
}
