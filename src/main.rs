//! search-engine - crawl, index, and search the web with BM25 conjunctive
//! ranking.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else).
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "search_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    search_engine::cli::run().await
}
