//! `lectern`: build a vector index over a folder of documents, search it, and answer
//! questions from it.
//!
//! ```bash
//! lectern index --source uploads
//! lectern query "What color is the sky?" -k 3
//! lectern ask "What color is the sky?"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use lectern_core::bootstrap::{
    create_builder, create_embedder, create_provider, open_context, resolve_config_path,
};
use lectern_core::{Answer, Config, RagError};
use lectern_index::{BuildReport, FieldCondition, SearchFilter, SearchHit};
use lectern_llm::{AnyProvider, Embedder};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "lectern")]
#[command(about = "Question answering over your documents with a local vector index")]
#[command(version)]
struct Cli {
    /// Path to config file (default: $LECTERN_CONFIG or ./lectern.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the index from every supported file in the source directory
    Index {
        /// Source directory (default: index.source_dir from config)
        #[arg(short, long)]
        source: Option<PathBuf>,
    },

    /// Print the passages closest to a query
    Query {
        text: String,

        /// Number of passages (default: retrieval.k from config)
        #[arg(short)]
        k: Option<usize>,

        /// Only search chunks from this file name
        #[arg(long)]
        file: Option<String>,
    },

    /// Answer a question from the retrieved passages
    Ask {
        question: String,

        /// Number of passages given to the model (default: retrieval.k from config)
        #[arg(short)]
        k: Option<usize>,
    },
}

#[derive(Serialize)]
struct IndexOutput<'a> {
    index: String,
    source: String,
    files_scanned: usize,
    files_indexed: usize,
    files_skipped: usize,
    files_empty: usize,
    chunks_created: usize,
    errors: &'a [String],
    duration_ms: u64,
}

#[derive(Serialize)]
struct QueryOutput<'a> {
    query: &'a str,
    results: &'a [SearchHit],
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    match cli.command {
        Command::Index { source } => {
            let source = source.unwrap_or_else(|| config.index.source_dir.clone());
            run_index(&config, &source, cli.format).await
        }
        Command::Query { text, k, file } => {
            let k = k.unwrap_or(config.retrieval.k);
            run_query(&config, &text, k, file, cli.format).await
        }
        Command::Ask { question, k } => {
            let k = k.unwrap_or(config.retrieval.k);
            run_ask(&config, &question, k, cli.format).await
        }
    }
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_index(config: &Config, source: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let embedder = Arc::new(create_embedder(config)?);
    tracing::info!(
        backend = embedder.backend(),
        model = embedder.model_id(),
        "embedding backend ready"
    );
    let builder = create_builder(config, embedder)?;
    let (report, _index) = builder
        .build(source)
        .await
        .with_context(|| format!("failed to index {}", source.display()))?;

    print_report(config, source, &report, format)
}

async fn run_query(
    config: &Config,
    query: &str,
    k: usize,
    file: Option<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let embedder = Arc::new(create_embedder(config)?);
    let ctx = open_context(config, embedder).await.map_err(index_hint)?;

    let hits = match file {
        Some(name) => {
            let filter = SearchFilter::default().must(FieldCondition::text("file_name", name));
            ctx.retrieve_filtered(query, k, &filter).await?
        }
        None => ctx.retrieve(query, k).await?,
    };

    match format {
        OutputFormat::Json => {
            let output = QueryOutput {
                query,
                results: &hits,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            if hits.is_empty() {
                println!("No results found.");
            }
            print_hits(&hits);
        }
    }
    Ok(())
}

async fn run_ask(
    config: &Config,
    question: &str,
    k: usize,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let provider = create_provider(config)?;
    if let AnyProvider::Ollama(ref ollama) = provider
        && let Err(e) = ollama.health_check().await
    {
        tracing::warn!("{e}");
    }

    let embedder = Arc::new(create_embedder(config)?);
    let ctx = open_context(config, embedder)
        .await
        .map_err(index_hint)?
        .with_provider(provider);
    let answer = ctx.ask(question, k).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&answer)?),
        OutputFormat::Text => print_answer(&answer),
    }
    Ok(())
}

fn index_hint(err: RagError) -> anyhow::Error {
    if err.is_index_unavailable() {
        anyhow::Error::new(err).context("no usable index, run `lectern index` first")
    } else {
        err.into()
    }
}

fn print_report(
    config: &Config,
    source: &Path,
    report: &BuildReport,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let output = IndexOutput {
                index: config.index.path.display().to_string(),
                source: source.display().to_string(),
                files_scanned: report.files_scanned,
                files_indexed: report.files_indexed,
                files_skipped: report.files_skipped,
                files_empty: report.files_empty,
                chunks_created: report.chunks_created,
                errors: &report.errors,
                duration_ms: report.duration_ms,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!(
                "Indexed {} of {} file(s) from {} into {} chunk(s) at {}",
                report.files_indexed,
                report.files_scanned,
                source.display(),
                report.chunks_created,
                config.index.path.display()
            );
            if report.files_skipped > 0 {
                println!("Skipped {} unsupported file(s)", report.files_skipped);
            }
            if report.files_empty > 0 {
                println!("No content loaded from {} file(s)", report.files_empty);
            }
            for error in &report.errors {
                println!("  failed: {error}");
            }
        }
    }
    Ok(())
}

fn print_hits(hits: &[SearchHit]) {
    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, hit.score, describe_source(hit));
        println!("   {}", truncate(&hit.text, 200));
        println!();
    }
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text.trim());
    if answer.sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for hit in &answer.sources {
        println!("  - {} ({:.3})", describe_source(hit), hit.score);
    }
}

fn describe_source(hit: &SearchHit) -> String {
    match hit.metadata.page {
        Some(page) => format!("{} (page {page})", hit.metadata.file_name),
        None => hit.metadata.file_name.clone(),
    }
}

/// Collapse whitespace and cut to at most `max` characters.
fn truncate(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{cut}...")
}
