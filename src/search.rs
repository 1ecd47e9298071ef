//! BM25 conjunctive retrieval. Grounded on
//! `original_source/run_search.py` (`_bm25_search`/`_bm25_score`), same
//! algorithm, same constants.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::models::SearchHit;
use crate::store::Store;
use crate::text::TextPipeline;

const K1: f64 = 1.5;
const B: f64 = 0.75;

/// BM25 conjunctive (AND) searcher over a `Store`'s `documents`/`postings`
/// tables. Cheap to clone.
#[derive(Clone)]
pub struct Searcher {
    store: Store,
    pipeline: TextPipeline,
}

impl Searcher {
    pub fn new(store: Store, pipeline: TextPipeline) -> Self {
        Self { store, pipeline }
    }

    /// Run a BM25 conjunctive search. `limit` is not clamped here — the
    /// caller (CLI/API) is responsible for clamping to `[1, MAX_SEARCH_LIMIT]`
    /// per the spec's boundary contract.
    pub async fn search(&self, query: &str, limit: usize, skip: usize) -> Result<Vec<SearchHit>> {
        let normalized = self.pipeline.normalize(query);
        let mut seen = HashSet::new();
        let terms: Vec<String> = normalized
            .tokens
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let n = self.store.count_documents().await?;
        if n == 0 {
            return Ok(Vec::new());
        }
        let avgdl = self.store.avg_content_length().await?;

        let required: HashSet<&str> = terms.iter().map(|t| t.as_str()).collect();
        let mut doc_scores: HashMap<String, f64> = HashMap::new();
        let mut doc_lengths: HashMap<String, i64> = HashMap::new();
        let mut doc_matched: HashMap<String, HashSet<String>> = HashMap::new();

        for term in &terms {
            let df = self.store.document_frequency(term).await?;
            if df == 0 {
                // AND semantics: any term absent from the corpus means no
                // document can match every term.
                return Ok(Vec::new());
            }
            for (doc_url, tf) in self.store.postings_for_term(term).await? {
                if tf <= 0 {
                    continue;
                }
                let dl = match doc_lengths.get(&doc_url) {
                    Some(dl) => *dl,
                    None => {
                        let dl = self
                            .store
                            .find_document_by_url(&doc_url)
                            .await?
                            .map(|d| d.content_length)
                            .unwrap_or(0);
                        doc_lengths.insert(doc_url.clone(), dl);
                        dl
                    }
                };
                let score = bm25_score(tf, df as i64, dl, n as i64, avgdl);
                *doc_scores.entry(doc_url.clone()).or_insert(0.0) += score;
                doc_matched
                    .entry(doc_url.clone())
                    .or_default()
                    .insert(term.clone());
            }
        }

        let mut conjunctive: Vec<String> = doc_matched
            .into_iter()
            .filter(|(_, matched)| required.iter().all(|t| matched.contains(*t)))
            .map(|(url, _)| url)
            .collect();
        if conjunctive.is_empty() {
            return Ok(Vec::new());
        }

        // Deterministic ranking: score descending, then url ascending
        // (the spec leaves tie-break unspecified and recommends exactly
        // this secondary key).
        conjunctive.sort_by(|a, b| {
            let score_a = doc_scores.get(a).copied().unwrap_or(0.0);
            let score_b = doc_scores.get(b).copied().unwrap_or(0.0);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cmp(b))
        });

        let paged: Vec<String> = conjunctive.into_iter().skip(skip).take(limit).collect();
        if paged.is_empty() {
            return Ok(Vec::new());
        }

        let docs = self.store.find_documents_by_urls(&paged).await?;
        let mut by_url: HashMap<String, _> = docs.into_iter().map(|d| (d.url.clone(), d)).collect();

        let mut hits = Vec::with_capacity(paged.len());
        for url in &paged {
            let score = doc_scores.get(url).copied().unwrap_or(0.0);
            if let Some(doc) = by_url.remove(url) {
                let resolved_url = doc.final_url.clone().unwrap_or_else(|| doc.url.clone());
                hits.push(SearchHit {
                    url: resolved_url,
                    title: doc.title,
                    text_excerpt: doc.text_excerpt,
                    score,
                });
            }
        }
        Ok(hits)
    }
}

/// `idf = ln(1 + max(0, (N - df + 0.5) / (df + 0.5)))`,
/// `K = k1 * (1 - b + b * dl / max(avgdl, 1))`,
/// `score = idf * (tf * (k1 + 1)) / (tf + K)`.
fn bm25_score(tf: i64, df: i64, dl: i64, n: i64, avgdl: f64) -> f64 {
    if tf <= 0 || df <= 0 || n <= 0 {
        return 0.0;
    }
    let idf_raw = ((n as f64 - df as f64 + 0.5) / (df as f64 + 0.5)).max(0.0);
    let idf = (1.0 + idf_raw).ln();
    let k = K1 * (1.0 - B + B * (dl as f64 / avgdl.max(1.0)));
    idf * ((tf as f64 * (K1 + 1.0)) / (tf as f64 + k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::Indexer;
    use crate::models::PageRecord;

    async fn setup() -> (Store, Indexer, Searcher) {
        let store = Store::open_in_memory().await.unwrap();
        let pipeline = TextPipeline::new();
        let indexer = Indexer::new(store.clone(), pipeline.clone(), 200, 400);
        let searcher = Searcher::new(store.clone(), pipeline);
        (store, indexer, searcher)
    }

    fn page(url: &str, text: &str) -> PageRecord {
        PageRecord {
            url: url.to_string(),
            final_url: url.to_string(),
            title: "Title".to_string(),
            text: text.to_string(),
            html: None,
        }
    }

    #[tokio::test]
    async fn conjunctive_search_only_returns_docs_with_all_terms() {
        let (_store, indexer, searcher) = setup().await;
        indexer.index_page(&page("https://ex.com/a", "the quick fox jumps")).await.unwrap();
        indexer.index_page(&page("https://ex.com/b", "the quick brown dog")).await.unwrap();
        indexer.index_page(&page("https://ex.com/c", "a slow turtle")).await.unwrap();

        let hits = searcher.search("quick fox", 10, 0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://ex.com/a");
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test]
    async fn query_with_df_zero_term_returns_empty() {
        let (_store, indexer, searcher) = setup().await;
        indexer.index_page(&page("https://ex.com/a", "quick fox")).await.unwrap();

        let hits = searcher.search("quick nonexistentword", 10, 0).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn query_of_all_stopwords_returns_empty() {
        let (_store, indexer, searcher) = setup().await;
        indexer.index_page(&page("https://ex.com/a", "quick fox")).await.unwrap();

        let hits = searcher.search("the a an", 10, 0).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn empty_corpus_returns_empty() {
        let (_store, _indexer, searcher) = setup().await;
        let hits = searcher.search("anything", 10, 0).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn skip_past_ranked_set_returns_empty_without_error() {
        let (_store, indexer, searcher) = setup().await;
        indexer.index_page(&page("https://ex.com/a", "quick fox")).await.unwrap();

        let hits = searcher.search("quick fox", 10, 100).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn ranking_is_deterministic_by_score_then_url() {
        let (_store, indexer, searcher) = setup().await;
        // Both docs contain "fox" once; tie-break falls to url ascending.
        indexer.index_page(&page("https://ex.com/b", "fox")).await.unwrap();
        indexer.index_page(&page("https://ex.com/a", "fox")).await.unwrap();

        let hits = searcher.search("fox", 10, 0).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://ex.com/a");
        assert_eq!(hits[1].url, "https://ex.com/b");
    }

    #[test]
    fn bm25_score_matches_formula_for_known_inputs() {
        let score = bm25_score(2, 1, 10, 3, 10.0);
        let idf = (1.0 + (3.0 - 1.0 + 0.5) / (1.0 + 0.5f64)).ln();
        let k = 1.5 * (1.0 - 0.75 + 0.75 * (10.0 / 10.0));
        let expected = idf * ((2.0 * (1.5 + 1.0)) / (2.0 + k));
        assert!((score - expected).abs() < 1e-9);
    }
}
