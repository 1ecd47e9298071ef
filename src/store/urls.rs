//! `urls` collection: the crawl queue. Layered directly on by `UrlTracker`.

use rusqlite::params;

use crate::error::Result;
use crate::models::{UrlRecord, UrlStats};

use super::{now, parse_rfc3339, parse_rfc3339_opt, to_rfc3339, Store};

impl Store {
    /// Bulk-upsert URLs, setting `crawled = false` only on insert; existing
    /// records keep their current `crawled` value.
    pub async fn enqueue_urls(&self, urls: &[String]) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }
        let ts = to_rfc3339(now());
        let conn = self.conn.lock().await;
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO urls (url, crawled, created_at, updated_at)
                 VALUES (?1, 0, ?2, ?2)
                 ON CONFLICT(url) DO UPDATE SET updated_at = excluded.updated_at",
            )?;
            for url in urls {
                stmt.execute(params![url, ts])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Mark a single URL crawled. Idempotent: a second call is a no-op
    /// beyond refreshing `crawled_at`/`updated_at`.
    pub async fn mark_crawled(&self, url: &str, final_url: Option<&str>) -> Result<()> {
        self.mark_crawled_many(
            std::slice::from_ref(&url.to_string()),
            &[final_url.map(|s| s.to_string())],
        )
        .await
    }

    /// Bulk-mark URLs crawled with parallel `final_urls` (by index).
    /// `final_url` is only recorded when it differs from `url`, matching
    /// the spec's `final_url` optionality.
    pub async fn mark_crawled_many(
        &self,
        urls: &[String],
        final_urls: &[Option<String>],
    ) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }
        let ts = to_rfc3339(now());
        let conn = self.conn.lock().await;
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO urls (url, final_url, crawled, crawled_at, created_at, updated_at)
                 VALUES (?1, ?2, 1, ?3, ?3, ?3)
                 ON CONFLICT(url) DO UPDATE SET
                     final_url = excluded.final_url,
                     crawled = 1,
                     crawled_at = excluded.crawled_at,
                     updated_at = excluded.updated_at",
            )?;
            for (i, url) in urls.iter().enumerate() {
                let final_url = final_urls
                    .get(i)
                    .and_then(|f| f.as_ref())
                    .filter(|f| f.as_str() != url.as_str());
                stmt.execute(params![url, final_url, ts])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Whether a URL exists and is marked crawled.
    pub async fn is_crawled(&self, url: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let crawled: Option<i64> = conn
            .query_row("SELECT crawled FROM urls WHERE url = ?1", params![url], |row| {
                row.get(0)
            })
            .ok();
        Ok(crawled.unwrap_or(0) != 0)
    }

    /// The full `UrlRecord` for a single URL, if it has been enqueued.
    pub async fn find_url(&self, url: &str) -> Result<Option<UrlRecord>> {
        let conn = self.conn.lock().await;
        let record = conn
            .query_row(
                "SELECT url, final_url, crawled, crawled_at, created_at, updated_at \
                 FROM urls WHERE url = ?1",
                params![url],
                |row| {
                    Ok(UrlRecord {
                        url: row.get(0)?,
                        final_url: row.get(1)?,
                        crawled: row.get::<_, i64>(2)? != 0,
                        crawled_at: parse_rfc3339_opt(row.get(3)?),
                        created_at: parse_rfc3339(&row.get::<_, String>(4)?),
                        updated_at: parse_rfc3339(&row.get::<_, String>(5)?),
                    })
                },
            )
            .ok();
        Ok(record)
    }

    /// All URLs whose `crawled` flag is not true.
    pub async fn uncrawled_urls(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT url FROM urls WHERE crawled = 0")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Aggregate crawl-queue statistics.
    pub async fn url_stats(&self) -> Result<UrlStats> {
        let conn = self.conn.lock().await;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM urls", [], |row| row.get(0))?;
        let crawled: i64 =
            conn.query_row("SELECT COUNT(*) FROM urls WHERE crawled = 1", [], |row| {
                row.get(0)
            })?;
        let uncrawled = total - crawled;
        let crawl_percentage = if total > 0 {
            100.0 * crawled as f64 / total as f64
        } else {
            0.0
        };
        Ok(UrlStats {
            total: total as u64,
            crawled: crawled as u64,
            uncrawled: uncrawled as u64,
            crawl_percentage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn enqueue_then_mark_crawled_updates_state() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .enqueue_urls(&["https://ex.com/a".to_string()])
            .await
            .unwrap();
        assert!(!store.is_crawled("https://ex.com/a").await.unwrap());

        store
            .mark_crawled("https://ex.com/a", None)
            .await
            .unwrap();
        assert!(store.is_crawled("https://ex.com/a").await.unwrap());
    }

    #[tokio::test]
    async fn enqueue_twice_produces_one_record_and_preserves_crawled() {
        let store = Store::open_in_memory().await.unwrap();
        let url = "https://ex.com/a".to_string();
        store.enqueue_urls(&[url.clone()]).await.unwrap();
        store.mark_crawled(&url, None).await.unwrap();
        // Re-enqueueing an already-crawled URL must not reset it.
        store.enqueue_urls(&[url.clone()]).await.unwrap();
        assert!(store.is_crawled(&url).await.unwrap());

        let stats = store.url_stats().await.unwrap();
        assert_eq!(stats.total, 1);
    }

    #[tokio::test]
    async fn stats_percentage_is_zero_when_empty() {
        let store = Store::open_in_memory().await.unwrap();
        let stats = store.url_stats().await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.crawl_percentage, 0.0);
    }

    #[tokio::test]
    async fn uncrawled_urls_excludes_crawled() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .enqueue_urls(&["https://ex.com/a".into(), "https://ex.com/b".into()])
            .await
            .unwrap();
        store.mark_crawled("https://ex.com/a", None).await.unwrap();
        let uncrawled = store.uncrawled_urls().await.unwrap();
        assert_eq!(uncrawled, vec!["https://ex.com/b".to_string()]);
    }

    #[tokio::test]
    async fn mark_crawled_records_final_url_only_when_different() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .enqueue_urls(&["https://ex.com/a".to_string()])
            .await
            .unwrap();
        store
            .mark_crawled("https://ex.com/a", Some("https://ex.com/a"))
            .await
            .unwrap();
        let conn = store.conn.lock().await;
        let final_url: Option<String> = conn
            .query_row(
                "SELECT final_url FROM urls WHERE url = ?1",
                params!["https://ex.com/a"],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(final_url, None);
    }

    #[tokio::test]
    async fn find_url_reflects_crawl_state() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .enqueue_urls(&["https://ex.com/a".to_string()])
            .await
            .unwrap();
        let before = store.find_url("https://ex.com/a").await.unwrap().unwrap();
        assert!(!before.crawled);
        assert!(before.crawled_at.is_none());

        store
            .mark_crawled("https://ex.com/a", Some("https://ex.com/other"))
            .await
            .unwrap();
        let after = store.find_url("https://ex.com/a").await.unwrap().unwrap();
        assert!(after.crawled);
        assert!(after.crawled_at.is_some());
        assert_eq!(after.final_url.as_deref(), Some("https://ex.com/other"));
    }

    #[tokio::test]
    async fn find_url_returns_none_for_unknown_url() {
        let store = Store::open_in_memory().await.unwrap();
        assert!(store.find_url("https://ex.com/missing").await.unwrap().is_none());
    }
}
