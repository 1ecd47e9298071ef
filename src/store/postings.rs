//! `postings` collection and the `terms` dictionary it is indexed against.

use std::collections::HashMap;

use rusqlite::params;

use crate::error::Result;
use crate::models::Posting;

use super::{now, parse_rfc3339, to_rfc3339, Store};

/// One term's occurrences within a single document, keyed by the term's
/// stemmed form. Built by the indexer from a document's token stream.
pub struct TermOccurrence {
    pub tf: i64,
    pub positions: Vec<i64>,
}

impl Store {
    /// Replace all postings for `doc_url` with `postings`, and ensure every
    /// term referenced appears in the `terms` dictionary. Callers that are
    /// reindexing must call `delete_postings_for_doc` first (see spec
    /// §9 DESIGN NOTES on reindex staleness) — a plain upsert here would
    /// leave postings for terms no longer present in the new text.
    pub async fn upsert_postings_for_doc(
        &self,
        doc_url: &str,
        postings: &HashMap<String, TermOccurrence>,
    ) -> Result<()> {
        if postings.is_empty() {
            return Ok(());
        }
        let ts = to_rfc3339(now());
        let conn = self.conn.lock().await;
        let tx = conn.unchecked_transaction()?;
        {
            let mut upsert_posting = tx.prepare(
                "INSERT INTO postings (term, doc_url, tf, positions, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(term, doc_url) DO UPDATE SET
                     tf = excluded.tf,
                     positions = excluded.positions,
                     created_at = excluded.created_at",
            )?;
            let mut upsert_term = tx.prepare(
                "INSERT INTO terms (term, created_at, updated_at)
                 VALUES (?1, ?2, ?2)
                 ON CONFLICT(term) DO UPDATE SET updated_at = excluded.updated_at",
            )?;
            for (term, occ) in postings {
                let positions_json = serde_json::to_string(&occ.positions)?;
                upsert_posting.execute(params![term, doc_url, occ.tf, positions_json, ts])?;
                upsert_term.execute(params![term, ts])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete all postings for a document, the precondition for a clean
    /// reindex (stale terms from the old text must not survive).
    pub async fn delete_postings_for_doc(&self, doc_url: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM postings WHERE doc_url = ?1", params![doc_url])?;
        Ok(())
    }

    /// Document frequency: the number of distinct documents containing
    /// `term`.
    pub async fn document_frequency(&self, term: &str) -> Result<u64> {
        let conn = self.conn.lock().await;
        let df: i64 = conn.query_row(
            "SELECT COUNT(*) FROM postings WHERE term = ?1",
            params![term],
            |row| row.get(0),
        )?;
        Ok(df as u64)
    }

    /// `(doc_url, tf)` pairs for every document containing `term`.
    pub async fn postings_for_term(&self, term: &str) -> Result<Vec<(String, i64)>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT doc_url, tf FROM postings WHERE term = ?1")?;
        let rows = stmt
            .query_map(params![term], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every stored posting for a single document, positions included.
    /// Not on the BM25 hot path (which only needs `tf`) — useful for
    /// inspection and for a future phrase-search feature that needs the
    /// raw position lists.
    pub async fn postings_for_doc(&self, doc_url: &str) -> Result<Vec<Posting>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT term, doc_url, tf, positions, created_at FROM postings WHERE doc_url = ?1",
        )?;
        let rows = stmt
            .query_map(params![doc_url], |row| {
                let positions_json: String = row.get(3)?;
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?, positions_json, row.get::<_, String>(4)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut postings = Vec::with_capacity(rows.len());
        for (term, doc_url, tf, positions_json, created_at) in rows {
            let positions: Vec<i64> = serde_json::from_str(&positions_json)?;
            postings.push(Posting {
                term,
                doc_url,
                tf,
                positions,
                created_at: parse_rfc3339(&created_at),
            });
        }
        Ok(postings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(tf: i64, positions: Vec<i64>) -> TermOccurrence {
        TermOccurrence { tf, positions }
    }

    #[tokio::test]
    async fn upsert_and_lookup_postings_round_trip() {
        let store = Store::open_in_memory().await.unwrap();
        let mut postings = HashMap::new();
        postings.insert("fox".to_string(), occ(2, vec![1, 5]));
        store
            .upsert_postings_for_doc("https://ex.com/a", &postings)
            .await
            .unwrap();

        assert_eq!(store.document_frequency("fox").await.unwrap(), 1);
        let hits = store.postings_for_term("fox").await.unwrap();
        assert_eq!(hits, vec![("https://ex.com/a".to_string(), 2)]);
    }

    #[tokio::test]
    async fn delete_postings_removes_stale_terms_before_reindex() {
        let store = Store::open_in_memory().await.unwrap();
        let mut first = HashMap::new();
        first.insert("fox".to_string(), occ(1, vec![0]));
        store.upsert_postings_for_doc("https://ex.com/a", &first).await.unwrap();

        store.delete_postings_for_doc("https://ex.com/a").await.unwrap();

        let mut second = HashMap::new();
        second.insert("dog".to_string(), occ(1, vec![0]));
        store.upsert_postings_for_doc("https://ex.com/a", &second).await.unwrap();

        assert_eq!(store.document_frequency("fox").await.unwrap(), 0);
        assert_eq!(store.document_frequency("dog").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn document_frequency_counts_distinct_documents() {
        let store = Store::open_in_memory().await.unwrap();
        let mut a = HashMap::new();
        a.insert("fox".to_string(), occ(1, vec![0]));
        store.upsert_postings_for_doc("https://ex.com/a", &a).await.unwrap();
        let mut b = HashMap::new();
        b.insert("fox".to_string(), occ(3, vec![0, 2, 4]));
        store.upsert_postings_for_doc("https://ex.com/b", &b).await.unwrap();

        assert_eq!(store.document_frequency("fox").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn postings_for_doc_returns_positions_in_order() {
        let store = Store::open_in_memory().await.unwrap();
        let mut postings = HashMap::new();
        postings.insert("fox".to_string(), occ(2, vec![1, 5]));
        postings.insert("dog".to_string(), occ(1, vec![3]));
        store
            .upsert_postings_for_doc("https://ex.com/a", &postings)
            .await
            .unwrap();

        let mut stored = store.postings_for_doc("https://ex.com/a").await.unwrap();
        stored.sort_by(|a, b| a.term.cmp(&b.term));

        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].term, "dog");
        assert_eq!(stored[0].positions, vec![3]);
        assert_eq!(stored[1].term, "fox");
        assert_eq!(stored[1].positions, vec![1, 5]);
        assert_eq!(stored[1].tf, 2);
    }
}
