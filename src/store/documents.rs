//! `documents` collection.

use rusqlite::params;

use crate::error::Result;
use crate::models::Document;

use super::{now, parse_rfc3339, to_rfc3339, Store};

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        url: row.get(0)?,
        final_url: row.get(1)?,
        title: row.get(2)?,
        raw_text: row.get(3)?,
        text_excerpt: row.get(4)?,
        index_text: row.get(5)?,
        content_length: row.get(6)?,
        source: row.get(7)?,
        created_at: parse_rfc3339(&row.get::<_, String>(8)?),
        updated_at: parse_rfc3339(&row.get::<_, String>(9)?),
    })
}

const SELECT_COLUMNS: &str = "url, final_url, title, raw_text, text_excerpt, index_text, \
     content_length, source, created_at, updated_at";

impl Store {
    /// Upsert a single document, also maintaining the legacy FTS5 index.
    pub async fn upsert_document(&self, doc: &Document) -> Result<()> {
        self.bulk_upsert_documents(std::slice::from_ref(doc)).await
    }

    /// Upsert a batch of documents in one transaction, matching the spec's
    /// `INDEX_BULK_BATCH_SIZE` bulk-write contract.
    pub async fn bulk_upsert_documents(&self, docs: &[Document]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let ts = to_rfc3339(now());
        let conn = self.conn.lock().await;
        let tx = conn.unchecked_transaction()?;
        {
            let mut upsert = tx.prepare(
                "INSERT INTO documents
                     (url, final_url, title, raw_text, text_excerpt, index_text,
                      content_length, source, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                 ON CONFLICT(url) DO UPDATE SET
                     final_url = excluded.final_url,
                     title = excluded.title,
                     raw_text = excluded.raw_text,
                     text_excerpt = excluded.text_excerpt,
                     index_text = excluded.index_text,
                     content_length = excluded.content_length,
                     source = excluded.source,
                     updated_at = excluded.updated_at",
            )?;
            let mut fts_delete = tx.prepare("DELETE FROM documents_fts WHERE url = ?1")?;
            let mut fts_insert =
                tx.prepare("INSERT INTO documents_fts (url, title, index_text) VALUES (?1, ?2, ?3)")?;
            for doc in docs {
                upsert.execute(params![
                    doc.url,
                    doc.final_url,
                    doc.title,
                    doc.raw_text,
                    doc.text_excerpt,
                    doc.index_text,
                    doc.content_length,
                    doc.source,
                    ts,
                ])?;
                fts_delete.execute(params![doc.url])?;
                fts_insert.execute(params![doc.url, doc.title, doc.index_text])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn find_document_by_url(&self, url: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock().await;
        let doc = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM documents WHERE url = ?1"),
                params![url],
                row_to_document,
            )
            .ok();
        Ok(doc)
    }

    /// Fetch documents matching `urls`, preserving no particular order —
    /// callers that need ranked order re-sort by score themselves.
    pub async fn find_documents_by_urls(&self, urls: &[String]) -> Result<Vec<Document>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().await;
        let placeholders = urls.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("SELECT {SELECT_COLUMNS} FROM documents WHERE url IN ({placeholders})");
        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            urls.iter().map(|u| u as &dyn rusqlite::ToSql).collect();
        let rows = stmt
            .query_map(params.as_slice(), row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn count_documents(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Average `content_length` across all documents, used as the corpus
    /// `avgdl` term in BM25 scoring. `0.0` when the corpus is empty.
    pub async fn avg_content_length(&self) -> Result<f64> {
        let conn = self.conn.lock().await;
        let avg: Option<f64> =
            conn.query_row("SELECT AVG(content_length) FROM documents", [], |row| {
                row.get(0)
            })?;
        Ok(avg.unwrap_or(0.0))
    }

    /// All documents, used by the reindex path to rebuild postings from
    /// scratch.
    pub async fn all_documents(&self) -> Result<Vec<Document>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM documents"))?;
        let rows = stmt
            .query_map([], row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_doc(url: &str) -> Document {
        Document {
            url: url.to_string(),
            final_url: None,
            title: "Title".to_string(),
            raw_text: "raw text body".to_string(),
            text_excerpt: "raw text body".to_string(),
            index_text: "raw text bodi".to_string(),
            content_length: 13,
            source: "https".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_then_find_round_trips() {
        let store = Store::open_in_memory().await.unwrap();
        store.upsert_document(&sample_doc("https://ex.com/a")).await.unwrap();
        let found = store
            .find_document_by_url("https://ex.com/a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.title, "Title");
        assert_eq!(found.content_length, 13);
    }

    #[tokio::test]
    async fn upsert_twice_updates_in_place() {
        let store = Store::open_in_memory().await.unwrap();
        store.upsert_document(&sample_doc("https://ex.com/a")).await.unwrap();
        let mut updated = sample_doc("https://ex.com/a");
        updated.title = "New Title".to_string();
        store.upsert_document(&updated).await.unwrap();

        assert_eq!(store.count_documents().await.unwrap(), 1);
        let found = store
            .find_document_by_url("https://ex.com/a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.title, "New Title");
    }

    #[tokio::test]
    async fn avg_content_length_is_zero_for_empty_corpus() {
        let store = Store::open_in_memory().await.unwrap();
        assert_eq!(store.avg_content_length().await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn find_documents_by_urls_returns_requested_subset() {
        let store = Store::open_in_memory().await.unwrap();
        store.upsert_document(&sample_doc("https://ex.com/a")).await.unwrap();
        store.upsert_document(&sample_doc("https://ex.com/b")).await.unwrap();
        store.upsert_document(&sample_doc("https://ex.com/c")).await.unwrap();

        let found = store
            .find_documents_by_urls(&[
                "https://ex.com/a".to_string(),
                "https://ex.com/c".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
    }
}
