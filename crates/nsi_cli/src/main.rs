use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::Parser;
use nsi_core::types::{DateRange, RetrievalQuery};
use nsi_core::{dates, Result, VectorStore};
use nsi_index::{IndexPipeline, ReconcileOptions, RetrievalEngine};
use nsi_inference::create_provider;
use nsi_storage::{SqliteArticleStore, SqliteVectorStore};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "News semantic index and hybrid retrieval", long_about = None)]
struct Cli {
    /// Article database path (falls back to NSI_DATABASE_PATH)
    #[arg(long)]
    db: Option<PathBuf>,
    /// Vector index path (falls back to NSI_INDEX_PATH)
    #[arg(long)]
    index_db: Option<PathBuf>,
    /// Embedding provider. Available providers: ollama (default), dummy
    #[arg(long, default_value = "ollama")]
    provider: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Incrementally index articles that have no embedding yet
    Backfill {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Articles fetched per database page
        #[arg(long, default_value_t = 100)]
        fetch_size: u32,
        /// Documents embedded per provider call
        #[arg(long, default_value_t = 10)]
        batch_size: usize,
        /// Concurrent embedding workers
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },
    /// Report database and index counts without changing anything
    Stats,
    /// Delete every indexed document
    Clear {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Query the index: semantic with --query, structured listing without
    Search {
        /// Free text for vector similarity search
        #[arg(long)]
        query: Option<String>,
        /// Result count (semantic default 5, listing default 100)
        #[arg(long)]
        k: Option<usize>,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Case-insensitive title substring
        #[arg(long)]
        title_contains: Option<String>,
        /// Case-insensitive content substring
        #[arg(long)]
        content_contains: Option<String>,
    },
}

fn resolve_path(flag: Option<PathBuf>, env_key: &str, default: &str) -> PathBuf {
    flag.unwrap_or_else(|| {
        PathBuf::from(env::var(env_key).unwrap_or_else(|_| default.to_string()))
    })
}

fn confirm_clear(count: u64) -> Result<bool> {
    println!("About to delete {} indexed documents. This cannot be undone.", count);
    print!("Type 'yes' to confirm: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim() == "yes")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let db_path = resolve_path(cli.db, "NSI_DATABASE_PATH", "data/news.db");
    let index_path = resolve_path(cli.index_db, "NSI_INDEX_PATH", "data/index.db");

    let articles = Arc::new(SqliteArticleStore::new_with_path(&db_path).await?);
    let vectors = Arc::new(SqliteVectorStore::new_with_path(&index_path).await?);
    let embedder = create_provider(&cli.provider)?;
    info!("💾 article database: {}", db_path.display());
    info!("🧠 embedding provider: {}", embedder.name());

    match cli.command {
        Commands::Backfill { start, end, fetch_size, batch_size, workers } => {
            let pipeline = IndexPipeline::new(articles, vectors, embedder);

            let shutdown = pipeline.shutdown_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, finishing in-flight chunks");
                    shutdown.store(true, Ordering::SeqCst);
                }
            });

            let options = ReconcileOptions {
                range: DateRange::new(start, end),
                fetch_page_size: fetch_size,
                embed_batch_size: batch_size,
                worker_count: workers,
            };
            let stats = pipeline.reconcile(&options).await?;
            info!(
                "✨ backfill finished - added: {} | skipped: {} | failed: {}",
                stats.added, stats.skipped, stats.failed
            );
        }
        Commands::Stats => {
            let pipeline = IndexPipeline::new(articles, vectors, embedder);
            let stats = pipeline.stats().await?;
            info!("articles in database: {}", stats.db_count);
            info!("indexed documents: {}", stats.indexed_doc_count);
            info!("indexed keys: {}", stats.indexed_key_count);
            info!("unindexed articles: {}", stats.unindexed_count);
        }
        Commands::Clear { yes } => {
            let count = vectors.count().await?;
            if !yes && !confirm_clear(count)? {
                info!("cancelled");
                return Ok(());
            }

            let pipeline = IndexPipeline::new(articles, vectors, embedder);
            let removed = pipeline.clear().await?;
            info!("🗑️ removed {} indexed documents", removed);
        }
        Commands::Search { query, k, start, end, title_contains, content_contains } => {
            let engine = RetrievalEngine::new(articles, vectors, embedder);
            let request = RetrievalQuery {
                free_text: query,
                k,
                start_date_int: start.map(dates::encode),
                end_date_int: end.map(dates::encode),
                title_contains,
                content_contains,
            };

            let result = engine.search(&request).await?;
            info!("found {} records", result.len());
            println!("{}", serde_json::to_string_pretty(&result.records)?);
        }
    }

    Ok(())
}
