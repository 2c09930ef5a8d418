use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use cli::output;
use review_core::config;
use review_core::config::AppConfig;
use review_core::pipeline;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Index { rebuild, json } => run_index(cfg, rebuild, json).await,
        Commands::Search { query, topk, json } => run_search(cfg, query, topk, json).await,
        Commands::Review { files, json, save } => run_review(cfg, files, json, save).await,
    }
}

#[derive(Parser)]
#[command(name = "corpus-review", about = "Review documents against a reference corpus")]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or load the reference index
    Index {
        /// Rebuild from the reference corpus even if artifacts exist
        #[arg(long, default_value_t = false)]
        rebuild: bool,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Query the reference index
    Search {
        query: String,
        /// Number of passages to return (defaults to retrieval.top_k)
        #[arg(short = 'k', long = "top-k")]
        topk: Option<usize>,
        /// Output JSON results
        #[arg(long)]
        json: bool,
    },
    /// Review documents and report issues and missing documents
    Review {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output the JSON report
        #[arg(long)]
        json: bool,
        /// Save the JSON report into output.dir
        #[arg(long, default_value_t = false)]
        save: bool,
    },
}

async fn run_index(cfg: AppConfig, rebuild: bool, json: bool) -> Result<()> {
    let services = pipeline::build_services(&cfg)?;
    info!(backends = ?services.embedder.backend_names(), "embedding chain");
    let status = if rebuild {
        services.retriever.rebuild().await?
    } else {
        services.retriever.ensure_index().await?
    };
    if json {
        let summary = serde_json::json!({
            "status": "ok",
            "chunks": status.chunks,
            "backend": status.backend,
            "dims": status.dims,
            "path": cfg.index.path,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "index: {} chunks, backend {}, {} dims ({})",
            status.chunks, status.backend, status.dims, cfg.index.path
        );
    }
    Ok(())
}

async fn run_search(cfg: AppConfig, query: String, topk: Option<usize>, json: bool) -> Result<()> {
    let services = pipeline::build_services(&cfg)?;
    let k = topk.unwrap_or(cfg.retrieval.top_k);
    let hits = services.retriever.retrieve(&query, k).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else if hits.is_empty() {
        println!("no results");
    } else {
        print!("{}", output::render_hits(&hits));
    }
    Ok(())
}

async fn run_review(cfg: AppConfig, files: Vec<PathBuf>, json: bool, save: bool) -> Result<()> {
    let missing: Vec<&PathBuf> = files.iter().filter(|p| !p.is_file()).collect();
    if !missing.is_empty() {
        bail!(
            "not a file: {}",
            missing
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let services = pipeline::build_services(&cfg)?;
    let docs = pipeline::load_documents(services.extractor.as_ref(), &files);
    for doc in docs.iter().filter(|d| d.text.trim().is_empty()) {
        warn!(path = %doc.path.display(), "no text extracted");
    }
    let report = services.reviewer.review(&docs).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", output::render_report(&report));
    }
    if save {
        let path = output::save_report(&report, Path::new(&cfg.output.dir), chrono::Utc::now())?;
        if !json {
            println!("\nsaved report to {}", path.display());
        }
        info!(path = %path.display(), "report saved");
    }
    Ok(())
}
