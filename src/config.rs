//! Configuration for search-engine, loaded from `CONFIG_TOML` (default
//! `config.toml`) with environment-variable overrides.
//!
//! Mirrors `search_engine/config.py` from the original implementation:
//! env vars take precedence over the TOML file, which takes precedence
//! over the built-in defaults below.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AppError, Result};

fn default_database_path() -> String {
    "search_engine.db".to_string()
}

fn default_crawler_workers() -> usize {
    8
}

fn default_indexer_workers() -> usize {
    8
}

fn default_index_bulk_batch_size() -> usize {
    200
}

fn default_content_fetch_batch_size() -> usize {
    50
}

fn default_index_excerpt_max_chars() -> usize {
    400
}

fn default_http_timeout_secs() -> u64 {
    15
}

fn default_http_max_content_mb() -> u64 {
    5
}

fn default_crawl_delay_secs() -> f64 {
    0.0
}

fn default_same_domain_only() -> bool {
    true
}

fn default_search_limit() -> usize {
    10
}

fn default_max_search_limit() -> usize {
    50
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct DbConfig {
    #[serde(default = "default_database_path")]
    path: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ThreadPoolConfig {
    #[serde(default = "default_crawler_workers")]
    crawler_workers: usize,
    #[serde(default = "default_indexer_workers")]
    indexer_workers: usize,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            crawler_workers: default_crawler_workers(),
            indexer_workers: default_indexer_workers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct IndexerConfig {
    #[serde(default = "default_index_bulk_batch_size")]
    bulk_batch_size: usize,
    #[serde(default = "default_index_excerpt_max_chars")]
    excerpt_max_chars: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            bulk_batch_size: default_index_bulk_batch_size(),
            excerpt_max_chars: default_index_excerpt_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct CrawlerConfig {
    #[serde(default = "default_http_timeout_secs")]
    http_timeout_secs: u64,
    #[serde(default = "default_http_max_content_mb")]
    http_max_content_mb: u64,
    #[serde(default = "default_crawl_delay_secs")]
    crawl_delay_secs: f64,
    #[serde(default = "default_same_domain_only")]
    same_domain_only: bool,
    #[serde(default = "default_content_fetch_batch_size")]
    content_fetch_batch_size: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout_secs(),
            http_max_content_mb: default_http_max_content_mb(),
            crawl_delay_secs: default_crawl_delay_secs(),
            same_domain_only: default_same_domain_only(),
            content_fetch_batch_size: default_content_fetch_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct SearchConfig {
    #[serde(default = "default_search_limit")]
    default_limit: usize,
    #[serde(default = "default_max_search_limit")]
    max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            max_limit: default_max_search_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct LoggingConfig {
    #[serde(default = "default_log_level")]
    level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawToml {
    dbconfig: DbConfig,
    threadpoolconfig: ThreadPoolConfig,
    indexerconfig: IndexerConfig,
    crawler: CrawlerConfig,
    search: SearchConfig,
    server: ServerConfig,
    logging: LoggingConfig,
    #[serde(default)]
    stopwords_file: Option<String>,
}

/// Fully-resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: PathBuf,
    pub crawler_workers: usize,
    pub indexer_workers: usize,
    pub index_bulk_batch_size: usize,
    pub content_fetch_batch_size: usize,
    pub index_excerpt_max_chars: usize,
    pub http_timeout_secs: u64,
    pub http_max_content_mb: u64,
    pub crawl_delay_secs: f64,
    pub same_domain_only_default: bool,
    pub default_search_limit: usize,
    pub max_search_limit: usize,
    pub log_level: String,
    pub listen_addr: String,
    pub stopwords_file: Option<PathBuf>,
}

fn env_override<T: std::str::FromStr>(key: &str, current: T) -> T {
    match env::var(key) {
        Ok(v) => v.parse().unwrap_or(current),
        Err(_) => current,
    }
}

fn env_override_string(key: &str, current: String) -> String {
    env::var(key).unwrap_or(current)
}

/// Load settings from `CONFIG_TOML` (default `config.toml`) plus environment
/// overrides. A missing TOML file is not an error — it just means every
/// field falls back to its built-in default before env overrides apply.
pub fn load_settings() -> Result<Settings> {
    let _ = dotenvy::dotenv();

    let config_path = env::var("CONFIG_TOML").unwrap_or_else(|_| "config.toml".to_string());
    let raw = load_toml(Path::new(&config_path))?;

    let database_path = env_override_string(
        "DATABASE_PATH",
        if raw.dbconfig.path.is_empty() {
            default_database_path()
        } else {
            raw.dbconfig.path
        },
    );

    Ok(Settings {
        database_path: PathBuf::from(database_path),
        crawler_workers: env_override("CRAWLER_WORKERS", raw.threadpoolconfig.crawler_workers),
        indexer_workers: env_override("INDEXER_WORKERS", raw.threadpoolconfig.indexer_workers),
        index_bulk_batch_size: env_override(
            "INDEX_BULK_BATCH_SIZE",
            raw.indexerconfig.bulk_batch_size,
        ),
        content_fetch_batch_size: env_override(
            "CONTENT_FETCH_BATCH_SIZE",
            raw.crawler.content_fetch_batch_size,
        ),
        index_excerpt_max_chars: env_override(
            "INDEX_EXCERPT_MAX_CHARS",
            raw.indexerconfig.excerpt_max_chars,
        ),
        http_timeout_secs: env_override("HTTP_TIMEOUT_SECS", raw.crawler.http_timeout_secs),
        http_max_content_mb: env_override("HTTP_MAX_CONTENT_MB", raw.crawler.http_max_content_mb),
        crawl_delay_secs: env_override("CRAWL_DELAY_SECS", raw.crawler.crawl_delay_secs),
        same_domain_only_default: raw.crawler.same_domain_only,
        default_search_limit: env_override("DEFAULT_SEARCH_LIMIT", raw.search.default_limit),
        max_search_limit: env_override("MAX_SEARCH_LIMIT", raw.search.max_limit),
        log_level: env_override_string("LOG_LEVEL", raw.logging.level),
        listen_addr: env_override_string("LISTEN_ADDR", raw.server.listen_addr),
        stopwords_file: raw.stopwords_file.map(PathBuf::from),
    })
}

fn load_toml(path: &Path) -> Result<RawToml> {
    if !path.exists() {
        return Ok(RawToml::default());
    }
    let text = fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|e| AppError::Config(format!("invalid {}: {e}", path.display())))
}
