//! Data model shared across the store, crawl pipeline, and search path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A URL tracked by the crawl queue (`urls` collection).
#[derive(Debug, Clone, PartialEq)]
pub struct UrlRecord {
    pub url: String,
    pub final_url: Option<String>,
    pub crawled: bool,
    pub crawled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate crawl-queue statistics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct UrlStats {
    pub total: u64,
    pub crawled: u64,
    pub uncrawled: u64,
    pub crawl_percentage: f64,
}

/// An indexed document (`documents` collection).
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub url: String,
    pub final_url: Option<String>,
    pub title: String,
    pub raw_text: String,
    pub text_excerpt: String,
    pub index_text: String,
    pub content_length: i64,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A per-(term, document) posting with positional information.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub term: String,
    pub doc_url: String,
    pub tf: i64,
    pub positions: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

/// A page record produced by the fetcher and consumed by the indexer,
/// matching the JSONL sink schema in the spec's external interfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub final_url: String,
    pub title: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// The result of discovering links from a single seed URL.
#[derive(Debug, Clone)]
pub struct LinkDiscoveryResult {
    pub url: String,
    pub final_url: String,
    pub title: String,
    pub discovered_links: Vec<String>,
}

/// A single ranked search hit returned by the searcher and the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub text_excerpt: String,
    pub score: f64,
}

/// Summary statistics returned after an indexing run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct IndexStats {
    pub attempted: usize,
    pub changed: usize,
    pub batches: usize,
}
