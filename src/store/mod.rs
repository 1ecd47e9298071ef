//! `Store` — the narrow persistence abstraction the rest of the crate is
//! built on, backed by a single SQLite file via `rusqlite`.
//!
//! The spec describes the store as a document/secondary-index abstraction
//! over four logical collections (`urls`, `documents`, `postings`, `terms`)
//! with unique-key upserts, bulk writes, and simple queries — see the
//! original spec §4.2. Rather than a generic `collection + filter` API
//! (which would be an un-idiomatic translation of MongoDB's shape into
//! Rust), each collection gets typed methods grounded on
//! `repository/crawl.rs`'s direct-rusqlite style: own connection, own
//! schema, prepared statements, `params!`.

mod documents;
mod postings;
mod urls;

pub use postings::TermOccurrence;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::error::Result;

/// Shared handle to the SQLite-backed store. Cheap to clone: the
/// connection lives behind an `Arc<Mutex<_>>`, mirroring the teacher's
/// `Arc<Mutex<CrawlRepository>>` sharing pattern.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the SQLite database at `path` and run one-time
    /// schema/index initialization. Index creation must never happen
    /// per-call (see spec §9 DESIGN NOTES) — it happens exactly once here.
    pub async fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database, used by tests.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS urls (
            url TEXT PRIMARY KEY,
            final_url TEXT,
            crawled INTEGER NOT NULL DEFAULT 0,
            crawled_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_urls_crawled ON urls(crawled);

        CREATE TABLE IF NOT EXISTS documents (
            url TEXT PRIMARY KEY,
            final_url TEXT,
            title TEXT NOT NULL DEFAULT '',
            raw_text TEXT NOT NULL DEFAULT '',
            text_excerpt TEXT NOT NULL DEFAULT '',
            index_text TEXT NOT NULL DEFAULT '',
            content_length INTEGER NOT NULL DEFAULT 0,
            source TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS postings (
            term TEXT NOT NULL,
            doc_url TEXT NOT NULL,
            tf INTEGER NOT NULL,
            positions TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (term, doc_url)
        );
        CREATE INDEX IF NOT EXISTS idx_postings_term ON postings(term);

        CREATE TABLE IF NOT EXISTS terms (
            term TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- Legacy weighted full-text index (title > index_text), unused by
        -- the BM25 conjunctive path but retained for a legacy text-search
        -- mode, mirroring the original's weighted Mongo $text index.
        CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
            url UNINDEXED,
            title,
            index_text,
            tokenize = 'porter'
        );
        "#,
    )?;
    Ok(())
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

pub(crate) fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub(crate) fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::UNIX_EPOCH)
}

pub(crate) fn parse_rfc3339_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| parse_rfc3339(&s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_creates_all_tables() {
        let store = Store::open_in_memory().await.unwrap();
        let conn = store.conn.lock().await;
        let mut names: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type IN ('table','view')")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        names.sort();
        for expected in ["urls", "documents", "postings", "terms"] {
            assert!(names.iter().any(|n| n == expected), "missing table {expected}");
        }
    }

    #[tokio::test]
    async fn schema_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }
}
