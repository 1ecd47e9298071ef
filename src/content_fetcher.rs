//! Drains the uncrawled queue in batches, fetches content in parallel,
//! writes page records to a JSONL sink, and marks URLs crawled. Grounded
//! on `original_source/search_engine/fetch_contents.py`
//! (`fetch_content_from_database`/`fetch_content_batch`).

use std::io::Write;
use std::path::Path;

use tokio::task::JoinSet;
use tracing::info;

use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::models::PageRecord;
use crate::url_tracker::UrlTracker;

#[derive(Clone)]
pub struct ContentFetcher {
    fetcher: Fetcher,
    tracker: UrlTracker,
    batch_size: usize,
    workers: usize,
    crawl_delay_secs: f64,
    include_html: bool,
}

/// Summary of a content-fetch run: attempted, succeeded, failed counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchStats {
    pub attempted: usize,
    pub fetched: usize,
    pub failed: usize,
}

impl ContentFetcher {
    /// `include_html` controls whether the JSONL sink's `html` field is
    /// populated — the spec's sink schema marks it optional ("`html?`"),
    /// omitted by default, matching the original's
    /// `_write_jsonl(..., include_html=False)`.
    pub fn new(
        fetcher: Fetcher,
        tracker: UrlTracker,
        batch_size: usize,
        workers: usize,
        crawl_delay_secs: f64,
        include_html: bool,
    ) -> Self {
        Self {
            fetcher,
            tracker,
            batch_size,
            workers,
            crawl_delay_secs,
            include_html,
        }
    }

    /// Snapshot the uncrawled queue, optionally capped to `max_urls`, and
    /// fetch it in batches, appending one JSON object per line to
    /// `sink_path`. After each batch's successful fetches are written,
    /// `mark_crawled_many` is called before the next batch starts (the
    /// batch boundary write barrier from the spec's concurrency model).
    pub async fn run(&self, sink_path: &Path, max_urls: Option<usize>) -> Result<FetchStats> {
        let mut uncrawled = self.tracker.uncrawled().await?;
        if let Some(max) = max_urls {
            uncrawled.truncate(max);
        }
        if uncrawled.is_empty() {
            info!("no uncrawled URLs found");
            return Ok(FetchStats::default());
        }

        info!(count = uncrawled.len(), "found uncrawled URLs");
        let mut sink = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(sink_path)?;

        let mut stats = FetchStats::default();
        let chunks: Vec<Vec<String>> = uncrawled
            .chunks(self.batch_size)
            .map(|c| c.to_vec())
            .collect();
        let total_batches = chunks.len();

        for (batch_idx, batch) in chunks.into_iter().enumerate() {
            stats.attempted += batch.len();
            let pages = self.fetch_batch(&batch).await;
            stats.failed += batch.len() - pages.len();
            stats.fetched += pages.len();

            let mut urls = Vec::with_capacity(pages.len());
            let mut final_urls = Vec::with_capacity(pages.len());
            for page in &pages {
                urls.push(page.url.clone());
                final_urls.push(Some(page.final_url.clone()).filter(|f| f != &page.url));

                if self.include_html {
                    let line = serde_json::to_string(page)?;
                    writeln!(sink, "{line}")?;
                } else {
                    let mut page = page.clone();
                    page.html = None;
                    let line = serde_json::to_string(&page)?;
                    writeln!(sink, "{line}")?;
                }
            }
            sink.flush()?;

            if !urls.is_empty() {
                self.tracker.mark_crawled_many(&urls, &final_urls).await?;
            }

            let is_last = batch_idx + 1 == total_batches;
            if !is_last && self.crawl_delay_secs > 0.0 {
                tokio::time::sleep(std::time::Duration::from_secs_f64(self.crawl_delay_secs))
                    .await;
            }
        }

        info!(
            attempted = stats.attempted,
            fetched = stats.fetched,
            failed = stats.failed,
            "content fetching completed"
        );
        Ok(stats)
    }

    async fn fetch_batch(&self, batch: &[String]) -> Vec<PageRecord> {
        let mut set: JoinSet<Option<PageRecord>> = JoinSet::new();
        let mut results = Vec::new();

        for chunk in batch.chunks(self.workers.max(1)) {
            for url in chunk {
                let fetcher = self.fetcher.clone();
                let url = url.clone();
                set.spawn(async move { fetcher.fetch_content(&url).await });
            }
            while let Some(joined) = set.join_next().await {
                if let Ok(Some(page)) = joined {
                    results.push(page);
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn run_with_no_uncrawled_urls_is_a_no_op() {
        let store = Store::open_in_memory().await.unwrap();
        let tracker = UrlTracker::new(store);
        let fetcher = Fetcher::new(5, 5);
        let content_fetcher = ContentFetcher::new(fetcher, tracker, 10, 2, 0.0, false);

        let dir = tempfile::tempdir().unwrap();
        let sink = dir.path().join("pages.jsonl");
        let stats = content_fetcher.run(&sink, None).await.unwrap();
        assert_eq!(stats.attempted, 0);
        assert_eq!(stats.fetched, 0);
    }

    #[test]
    fn sink_line_omits_html_unless_requested() {
        let page = PageRecord {
            url: "https://ex.com/a".to_string(),
            final_url: "https://ex.com/a".to_string(),
            title: "Title".to_string(),
            text: "body text".to_string(),
            html: Some("<html>body text</html>".to_string()),
        };

        let mut stripped = page.clone();
        stripped.html = None;
        let line = serde_json::to_string(&stripped).unwrap();
        assert!(!line.contains("html"));

        let line_with_html = serde_json::to_string(&page).unwrap();
        assert!(line_with_html.contains("\"html\""));
    }
}
