use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kag_core::config::{Config, Settings};
use kag_core::corpus::CorpusLoader;
use kag_core::types::{Query, SearchResponse};
use kag_graph::SqliteGraphStore;
use kag_hybrid::HybridSearchEngine;

mod backends;

#[derive(Parser)]
#[command(name = "kag", version, about = "Hybrid vector + full-text + graph retrieval")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild both indexes from a directory of .txt files
    Ingest {
        dir: PathBuf,
        /// Only load the first N files
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Run the retrieval pipeline for one query
    Query {
        text: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        /// Write intermediate stages to storage.debug_dir
        #[arg(long)]
        debug: bool,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the entity graph as JSON
    Graph {
        #[arg(long)]
        stats: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Config::load()?.settings()?;

    match cli.command {
        Command::Ingest { dir, limit } => ingest(&settings, &dir, limit).await,
        Command::Query { text, top_k, debug, json } => query(&settings, text, top_k, debug, json).await,
        Command::Graph { stats } => graph(&settings, stats),
    }
}

async fn ingest(settings: &Settings, dir: &Path, limit: Option<usize>) -> Result<()> {
    let loader = CorpusLoader::new();
    let chunks = match limit {
        Some(n) => loader.load_directory_limited(dir, n)?,
        None => loader.load_directory(dir)?,
    };
    info!(dir = %dir.display(), chunks = chunks.len(), "loaded corpus");
    let engine = HybridSearchEngine::new(settings, backends::components(settings, backends::Mode::Rebuild).await?)?;
    engine.index(&chunks).await?;
    println!("Ingest complete ({} chunks)", chunks.len());
    Ok(())
}

async fn query(settings: &Settings, text: String, top_k: usize, debug: bool, json: bool) -> Result<()> {
    let query = Query::new(text, top_k, debug)?;
    let engine = HybridSearchEngine::new(settings, backends::components(settings, backends::Mode::Open).await?)?;
    let response = engine.query(&query).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

fn graph(settings: &Settings, stats: bool) -> Result<()> {
    let store = SqliteGraphStore::open(&settings.storage.graph_path())?;
    let out = if stats { serde_json::to_string_pretty(&store.stats()?)? } else { serde_json::to_string_pretty(&store.snapshot()?)? };
    println!("{out}");
    Ok(())
}

fn print_response(response: &SearchResponse) {
    println!("Found {} results for \"{}\" in {:.3}s", response.results.len(), response.query, response.execution_time);
    for (i, r) in response.results.iter().enumerate() {
        let c = &r.candidate;
        println!(
            "\n  {}. doc={}  combined={:.4}  vector={:.4}  text={:.4}",
            i + 1,
            c.doc_id,
            c.combined_score,
            c.vector_score,
            c.text_score
        );
        println!("     {}", snippet(&c.content, 200));
        if !r.entities.is_empty() {
            let names: Vec<String> = r.entities.iter().map(|e| format!("{} ({})", e.name, e.category)).collect();
            println!("     entities: {}", names.join(", "));
        }
        for rel in &r.relationships {
            println!(
                "     {} -[{}]-> {}",
                rel.source_name.as_deref().unwrap_or("?"),
                rel.relation_type,
                rel.target_name.as_deref().unwrap_or("?")
            );
        }
    }
    if let Some(answer) = &response.generated_response {
        println!("\nAnswer:\n{answer}");
    }
}

fn snippet(content: &str, max_chars: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        format!("{}...", flat.chars().take(max_chars).collect::<String>())
    }
}
