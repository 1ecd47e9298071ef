//! CLI subcommands: thin shells over the core pipeline. Grounded on
//! `cli/commands.rs`'s `Cli`/`Commands` shape (derive-based `clap`,
//! one `cmd_*` function per subcommand, a `run()` dispatcher called from
//! `main`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::{load_settings, Settings};
use crate::content_fetcher::ContentFetcher;
use crate::discovery::LinkDiscoverer;
use crate::error::AppError;
use crate::fetcher::Fetcher;
use crate::indexer::Indexer;
use crate::models::PageRecord;
use crate::search::Searcher;
use crate::server::{self, AppState};
use crate::store::Store;
use crate::text::TextPipeline;
use crate::url_tracker::UrlTracker;

#[derive(Parser)]
#[command(name = "search-engine")]
#[command(about = "Crawl, index, and search the web with BM25 conjunctive ranking")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover outbound links from seed URLs and enqueue them
    Discover {
        /// Seed URLs to start from
        seeds: Vec<String>,
        /// Restrict discovered links to the seed's own domain
        #[arg(long)]
        same_domain_only: Option<bool>,
        /// Re-process seeds even if already marked crawled (default: skip them)
        #[arg(long)]
        recrawl: bool,
    },

    /// Fetch content for uncrawled URLs and append to a JSONL sink
    Fetch {
        /// Path to the JSONL output file
        #[arg(long, default_value = "pages.jsonl")]
        out: PathBuf,
        /// Cap the number of URLs fetched this run (0 = unlimited)
        #[arg(long, default_value = "0")]
        max_urls: usize,
        /// Include the raw HTML body in each JSONL line (omitted by default)
        #[arg(long)]
        include_html: bool,
    },

    /// Index page records from a JSONL file
    Index {
        /// Path to the JSONL input file produced by `fetch`
        input: PathBuf,
        /// Use a parallel worker pool for document/posting construction
        #[arg(long)]
        parallel: bool,
    },

    /// Recompute index_text/text_excerpt for all stored documents
    Reindex,

    /// Run a BM25 conjunctive search
    Search {
        /// Query text
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(short, long, default_value = "0")]
        skip: usize,
    },

    /// Show crawl-queue statistics
    Stats,

    /// Start the HTTP search API
    Serve {
        /// Address to bind to, e.g. 127.0.0.1:8000
        bind: Option<String>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings()?;
    let store = Store::open(&settings.database_path).await?;
    let pipeline = TextPipeline::load(settings.stopwords_file.as_deref());

    match cli.command {
        Commands::Discover {
            seeds,
            same_domain_only,
            recrawl,
        } => cmd_discover(&settings, store, seeds, same_domain_only, !recrawl).await,
        Commands::Fetch {
            out,
            max_urls,
            include_html,
        } => cmd_fetch(&settings, store, &out, max_urls, include_html).await,
        Commands::Index { input, parallel } => {
            cmd_index(&settings, store, pipeline, &input, parallel).await
        }
        Commands::Reindex => cmd_reindex(&settings, store, pipeline).await,
        Commands::Search { query, limit, skip } => {
            cmd_search(&settings, store, pipeline, &query, limit, skip).await
        }
        Commands::Stats => cmd_stats(store).await,
        Commands::Serve { bind } => cmd_serve(&settings, store, pipeline, bind).await,
    }
}

async fn cmd_discover(
    settings: &Settings,
    store: Store,
    seeds: Vec<String>,
    same_domain_only: Option<bool>,
    skip_crawled: bool,
) -> anyhow::Result<()> {
    let tracker = UrlTracker::new(store);
    let fetcher = Fetcher::new(settings.http_timeout_secs, settings.http_max_content_mb);
    let discoverer = LinkDiscoverer::new(fetcher, tracker);
    let same_domain_only = same_domain_only.unwrap_or(settings.same_domain_only_default);

    let discovered = discoverer
        .discover_parallel(&seeds, same_domain_only, skip_crawled, settings.crawler_workers)
        .await?;
    info!(count = discovered.len(), "link discovery complete");
    println!("discovered {} new URLs", discovered.len());
    Ok(())
}

async fn cmd_fetch(
    settings: &Settings,
    store: Store,
    out: &PathBuf,
    max_urls: usize,
    include_html: bool,
) -> anyhow::Result<()> {
    let tracker = UrlTracker::new(store);
    let fetcher = Fetcher::new(settings.http_timeout_secs, settings.http_max_content_mb);
    let content_fetcher = ContentFetcher::new(
        fetcher,
        tracker,
        settings.content_fetch_batch_size,
        settings.crawler_workers,
        settings.crawl_delay_secs,
        include_html,
    );

    let max_urls = if max_urls == 0 { None } else { Some(max_urls) };
    let stats = content_fetcher.run(out, max_urls).await?;
    println!(
        "attempted={} fetched={} failed={}",
        stats.attempted, stats.fetched, stats.failed
    );
    Ok(())
}

async fn cmd_index(
    settings: &Settings,
    store: Store,
    pipeline: TextPipeline,
    input: &PathBuf,
    parallel: bool,
) -> anyhow::Result<()> {
    let indexer = Indexer::new(
        store,
        pipeline,
        settings.index_bulk_batch_size,
        settings.index_excerpt_max_chars,
    );

    let text = std::fs::read_to_string(input)?;
    let mut pages = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let page: PageRecord = serde_json::from_str(line)
            .map_err(|e| AppError::Config(format!("invalid JSONL line: {e}")))?;
        pages.push(page);
    }

    let stats = if parallel {
        indexer.index_pages_parallel(pages, settings.indexer_workers).await?
    } else {
        indexer.index_pages(&pages).await?
    };
    println!(
        "attempted={} changed={} batches={}",
        stats.attempted, stats.changed, stats.batches
    );
    Ok(())
}

async fn cmd_reindex(
    settings: &Settings,
    store: Store,
    pipeline: TextPipeline,
) -> anyhow::Result<()> {
    let indexer = Indexer::new(
        store,
        pipeline,
        settings.index_bulk_batch_size,
        settings.index_excerpt_max_chars,
    );
    let stats = indexer.reindex_all().await?;
    println!(
        "attempted={} changed={} batches={}",
        stats.attempted, stats.changed, stats.batches
    );
    Ok(())
}

async fn cmd_search(
    settings: &Settings,
    store: Store,
    pipeline: TextPipeline,
    query: &str,
    limit: Option<usize>,
    skip: usize,
) -> anyhow::Result<()> {
    let searcher = Searcher::new(store, pipeline);
    let limit = limit
        .unwrap_or(settings.default_search_limit)
        .clamp(1, settings.max_search_limit.max(1));

    let hits = searcher.search(query, limit, skip).await?;
    for (i, hit) in hits.iter().enumerate() {
        println!("[{}] {} (score={:.4})", i + 1, hit.title, hit.score);
        println!("    {}", hit.url);
        if !hit.text_excerpt.is_empty() {
            println!("    {}", hit.text_excerpt);
        }
    }
    Ok(())
}

async fn cmd_stats(store: Store) -> anyhow::Result<()> {
    let tracker = UrlTracker::new(store);
    let stats = tracker.stats().await?;
    println!("total={}", stats.total);
    println!("crawled={}", stats.crawled);
    println!("uncrawled={}", stats.uncrawled);
    println!("crawl_percentage={:.1}%", stats.crawl_percentage);
    Ok(())
}

async fn cmd_serve(
    settings: &Settings,
    store: Store,
    pipeline: TextPipeline,
    bind: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        searcher: Searcher::new(store.clone(), pipeline),
        tracker: UrlTracker::new(store),
        default_search_limit: settings.default_search_limit,
        max_search_limit: settings.max_search_limit,
    };
    let addr = bind.unwrap_or_else(|| settings.listen_addr.clone());
    server::serve(state, &addr).await
}
