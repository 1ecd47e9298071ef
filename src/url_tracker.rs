//! Thin naming layer over `Store`'s `urls` collection, matching the
//! original `url_tracker` module's public surface (enqueue, mark crawled,
//! query uncrawled, stats) so callers don't reach into `Store` directly.

use crate::error::Result;
use crate::models::{UrlRecord, UrlStats};
use crate::store::Store;

#[derive(Clone)]
pub struct UrlTracker {
    store: Store,
}

impl UrlTracker {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn enqueue(&self, urls: &[String]) -> Result<()> {
        self.store.enqueue_urls(urls).await
    }

    pub async fn mark_crawled(&self, url: &str, final_url: Option<&str>) -> Result<()> {
        self.store.mark_crawled(url, final_url).await
    }

    pub async fn mark_crawled_many(
        &self,
        urls: &[String],
        final_urls: &[Option<String>],
    ) -> Result<()> {
        self.store.mark_crawled_many(urls, final_urls).await
    }

    pub async fn is_crawled(&self, url: &str) -> Result<bool> {
        self.store.is_crawled(url).await
    }

    /// The full `UrlRecord` for a single URL, if it has been enqueued.
    pub async fn find(&self, url: &str) -> Result<Option<UrlRecord>> {
        self.store.find_url(url).await
    }

    pub async fn uncrawled(&self) -> Result<Vec<String>> {
        self.store.uncrawled_urls().await
    }

    pub async fn stats(&self) -> Result<UrlStats> {
        self.store.url_stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_and_mark_crawled_round_trip() {
        let store = Store::open_in_memory().await.unwrap();
        let tracker = UrlTracker::new(store);

        tracker.enqueue(&["https://ex.com/a".to_string()]).await.unwrap();
        assert!(!tracker.is_crawled("https://ex.com/a").await.unwrap());

        tracker.mark_crawled("https://ex.com/a", None).await.unwrap();
        assert!(tracker.is_crawled("https://ex.com/a").await.unwrap());

        let stats = tracker.stats().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.crawled, 1);
    }
}
