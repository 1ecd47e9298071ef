//! HTTP fetching for both link discovery and content crawling.
//!
//! Grounded on `scrapers/http_client/mod.rs`'s `HttpClient` (client
//! construction, user agent, timeout) generalized to the two fetch shapes
//! the spec calls for: a link-discovery fetch that returns outgoing links,
//! and a content fetch that returns extracted visible text.

use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::models::{LinkDiscoveryResult, PageRecord};

const USER_AGENT: &str = "search-engine/0.1";
const RETRY_ATTEMPTS: u32 = 2;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(4);

/// Thin wrapper over a `reqwest::Client` with the crawler's fixed timeout,
/// user agent, and content-size ceiling.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_content_bytes: u64,
}

impl Fetcher {
    pub fn new(timeout_secs: u64, max_content_mb: u64) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .gzip(true)
            .brotli(true)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            max_content_bytes: max_content_mb * 1024 * 1024,
        }
    }

    /// Fetch `url` and extract outgoing links plus the page title, without
    /// extracting body text. Retries transient failures with exponential
    /// backoff (0.5s, 1s, capped at 4s), matching the original crawler's
    /// `@retry(stop_after_attempt(2), wait_exponential(...))` decorator.
    pub async fn fetch_for_links(&self, url: &str) -> Option<LinkDiscoveryResult> {
        let (final_url, html) = self.get_with_retry(url).await?;

        let document = Html::parse_document(&html);
        let title = extract_title(&document);
        let discovered_links = extract_links(url, &html);

        Some(LinkDiscoveryResult {
            url: url.to_string(),
            final_url,
            title,
            discovered_links,
        })
    }

    /// Fetch `url` and extract its visible text content.
    pub async fn fetch_content(&self, url: &str) -> Option<PageRecord> {
        let (final_url, html) = self.get_with_retry(url).await?;

        let document = Html::parse_document(&html);
        let title = extract_title(&document);
        let text = extract_visible_text(&document);

        Some(PageRecord {
            url: url.to_string(),
            final_url,
            title,
            text,
            html: Some(html),
        })
    }

    async fn get_with_retry(&self, url: &str) -> Option<(String, String)> {
        let mut delay = RETRY_BASE_DELAY;
        for attempt in 0..RETRY_ATTEMPTS {
            match self.get_once(url).await {
                Ok(result) => return result,
                Err(e) if attempt + 1 < RETRY_ATTEMPTS => {
                    debug!("fetch {url} failed (attempt {attempt}): {e}, retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(RETRY_MAX_DELAY);
                }
                Err(e) => {
                    warn!("fetch {url} failed after {RETRY_ATTEMPTS} attempts: {e}");
                    return None;
                }
            }
        }
        None
    }

    /// Single GET attempt. `Ok(None)` means a non-retriable rejection (bad
    /// status or oversized content); `Err` means a transport error worth
    /// retrying.
    async fn get_once(&self, url: &str) -> Result<Option<(String, String)>, reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            warn!("non-OK response for {url}: status={status}");
            return Ok(None);
        }

        if let Some(len) = response.content_length() {
            if len > self.max_content_bytes {
                debug!("skipping large content {url} size={len}");
                return Ok(None);
            }
        }

        let bytes = response.bytes().await?;
        if bytes.len() as u64 > self.max_content_bytes {
            debug!("skipping large content {url} size={}", bytes.len());
            return Ok(None);
        }

        let html = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Some((final_url, html)))
    }
}

fn extract_title(document: &Html) -> String {
    let selector = Selector::parse("title").expect("valid selector");
    document
        .select(&selector)
        .next()
        .map(|el| {
            let raw = el.text().collect::<String>();
            collapse_whitespace(raw.trim())
        })
        .unwrap_or_default()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip `script`/`style`/`noscript` and return the remaining visible text,
/// space-joined, matching BeautifulSoup's `get_text(separator=" ")`.
fn extract_visible_text(document: &Html) -> String {
    let skip = Selector::parse("script, style, noscript").expect("valid selector");
    let skip_ids: std::collections::HashSet<_> = document
        .select(&skip)
        .flat_map(|el| el.descendants().map(|n| n.id()))
        .collect();

    let root = document.root_element();
    let mut parts = Vec::new();
    for node in root.descendants() {
        if skip_ids.contains(&node.id()) {
            continue;
        }
        if let Some(text) = node.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }
    }
    parts.join(" ")
}

/// Extract absolute `http(s)` links from `<a href>` attributes, resolving
/// root-relative hrefs against `base_url`'s origin. Matches the original's
/// `extract_links`: only absolute `http(s)` URLs are kept.
fn extract_links(base_url: &str, html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("valid selector");
    let base = Url::parse(base_url).ok();

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let href = match element.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }

        let resolved = if href.starts_with("http://") || href.starts_with("https://") {
            Some(href.to_string())
        } else if href.starts_with('/') {
            base.as_ref().map(|b| format!("{}://{}{}", b.scheme(), b.host_str().unwrap_or(""), href))
        } else {
            None
        };

        if let Some(link) = resolved {
            links.push(link);
        }
    }
    links
}

/// Whether two URLs share the same host, ignoring scheme, path, and port.
pub fn is_same_domain(url_a: &str, url_b: &str) -> bool {
    let host = |u: &str| Url::parse(u).ok().and_then(|p| p.host_str().map(|h| h.to_lowercase()));
    host(url_a) == host(url_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_links_resolves_root_relative_and_drops_fragments() {
        let html = r#"
            <html><body>
                <a href="https://ex.com/a">a</a>
                <a href="/b">b</a>
                <a href="#section">skip</a>
                <a href="mailto:x@ex.com">skip</a>
                <a href="javascript:void(0)">skip</a>
            </body></html>
        "#;
        let links = extract_links("https://ex.com/start", html);
        assert_eq!(links, vec!["https://ex.com/a", "https://ex.com/b"]);
    }

    #[test]
    fn extract_title_collapses_whitespace() {
        let document = Html::parse_document("<html><head><title>  Hello\n  World </title></head></html>");
        assert_eq!(extract_title(&document), "Hello World");
    }

    #[test]
    fn extract_visible_text_drops_script_and_style() {
        let document = Html::parse_document(
            "<html><body><p>Hello</p><script>var x = 1;</script><style>.a{}</style>World</body></html>",
        );
        let text = extract_visible_text(&document);
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
        assert!(!text.contains("var x"));
        assert!(!text.contains(".a{}"));
    }

    #[test]
    fn is_same_domain_ignores_scheme_and_path() {
        assert!(is_same_domain("https://ex.com/a", "http://ex.com/b"));
        assert!(!is_same_domain("https://ex.com/a", "https://other.com/b"));
    }
}
