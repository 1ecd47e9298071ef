//! Link discovery: fetch seeds, extract outbound links, optionally filter
//! by domain, enqueue newly discovered links. Grounded on
//! `original_source/search_engine/crawler.py`
//! (`discover_links_from_seeds`/`discover_links_parallel`); the
//! deprecated `bfs_crawl`/`bfs_crawl_parallel` aliases are not carried
//! forward (§9 DESIGN NOTES).

use std::collections::HashSet;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::fetcher::{is_same_domain, Fetcher};
use crate::url_tracker::UrlTracker;

#[derive(Clone)]
pub struct LinkDiscoverer {
    fetcher: Fetcher,
    tracker: UrlTracker,
}

impl LinkDiscoverer {
    pub fn new(fetcher: Fetcher, tracker: UrlTracker) -> Self {
        Self { fetcher, tracker }
    }

    /// Discover links from `seeds` sequentially. Returns the union of newly
    /// discovered links (order-independent). A single seed's failure is
    /// logged and skipped; the overall call still succeeds.
    pub async fn discover(
        &self,
        seeds: &[String],
        same_domain_only: bool,
        skip_crawled: bool,
    ) -> Result<Vec<String>> {
        let mut discovered: HashSet<String> = HashSet::new();
        let mut processed_urls = Vec::new();
        let mut processed_final_urls = Vec::new();

        for seed in seeds {
            if skip_crawled && self.tracker.is_crawled(seed).await? {
                debug!(url = %seed, "skipping already-crawled seed");
                continue;
            }

            let Some(result) = self.fetcher.fetch_for_links(seed).await else {
                warn!(url = %seed, "link discovery fetch failed, skipping");
                continue;
            };

            let links = filter_links(seed, result.discovered_links, same_domain_only);
            info!(url = %seed, found = links.len(), "discovered links");
            discovered.extend(links);

            processed_urls.push(seed.clone());
            processed_final_urls.push(Some(result.final_url).filter(|f| f != seed));
        }

        if !processed_urls.is_empty() {
            self.tracker
                .mark_crawled_many(&processed_urls, &processed_final_urls)
                .await?;
        }

        let discovered: Vec<String> = discovered.into_iter().collect();
        if !discovered.is_empty() {
            self.tracker.enqueue(&discovered).await?;
        }
        Ok(discovered)
    }

    /// Discover links from `seeds` using up to `workers` concurrent
    /// fetches. Result ordering is unspecified under parallelism; the
    /// returned set is order-independent, matching the sequential variant.
    pub async fn discover_parallel(
        &self,
        seeds: &[String],
        same_domain_only: bool,
        skip_crawled: bool,
        workers: usize,
    ) -> Result<Vec<String>> {
        let mut pending = Vec::new();
        for seed in seeds {
            if skip_crawled && self.tracker.is_crawled(seed).await? {
                debug!(url = %seed, "skipping already-crawled seed");
                continue;
            }
            pending.push(seed.clone());
        }

        let mut discovered: HashSet<String> = HashSet::new();
        let mut processed_urls = Vec::new();
        let mut processed_final_urls = Vec::new();

        for chunk in pending.chunks(workers.max(1)) {
            let mut set: JoinSet<(String, Option<(String, Vec<String>)>)> = JoinSet::new();
            for seed in chunk {
                let fetcher = self.fetcher.clone();
                let seed = seed.clone();
                set.spawn(async move {
                    let result = fetcher
                        .fetch_for_links(&seed)
                        .await
                        .map(|r| (r.final_url, r.discovered_links));
                    (seed, result)
                });
            }
            while let Some(joined) = set.join_next().await {
                let Ok((seed, result)) = joined else {
                    continue;
                };
                let Some((final_url, links)) = result else {
                    warn!(url = %seed, "link discovery fetch failed, skipping");
                    continue;
                };
                let links = filter_links(&seed, links, same_domain_only);
                info!(url = %seed, found = links.len(), "discovered links");
                discovered.extend(links);
                processed_urls.push(seed.clone());
                processed_final_urls.push(Some(final_url).filter(|f| f != &seed));
            }
        }

        if !processed_urls.is_empty() {
            self.tracker
                .mark_crawled_many(&processed_urls, &processed_final_urls)
                .await?;
        }

        let discovered: Vec<String> = discovered.into_iter().collect();
        if !discovered.is_empty() {
            self.tracker.enqueue(&discovered).await?;
        }
        Ok(discovered)
    }
}

fn filter_links(seed: &str, links: Vec<String>, same_domain_only: bool) -> Vec<String> {
    if !same_domain_only {
        return links;
    }
    links
        .into_iter()
        .filter(|link| is_same_domain(seed, link))
        .collect()
}
