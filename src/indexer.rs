//! Converts fetched pages into documents + positional postings and
//! bulk-upserts both. Grounded on
//! `original_source/search_engine/indexer.py` (`build_document_from_page`,
//! `_build_postings`, `index_pages`/`index_pages_parallel`,
//! `reindex_documents`), adapted to the teacher's worker-pool idiom
//! (`tokio::task::JoinSet`, as in `scrapers/http_client`).

use std::collections::HashMap;

use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{Document, IndexStats, PageRecord};
use crate::store::{Store, TermOccurrence};
use crate::text::{summarize, TextPipeline};

/// Builds documents and postings from fetched pages and writes them to a
/// `Store`. Cheap to clone: `TextPipeline` and `Store` are both
/// `Arc`-backed.
#[derive(Clone)]
pub struct Indexer {
    store: Store,
    pipeline: TextPipeline,
    bulk_batch_size: usize,
    excerpt_max_chars: usize,
}

impl Indexer {
    pub fn new(
        store: Store,
        pipeline: TextPipeline,
        bulk_batch_size: usize,
        excerpt_max_chars: usize,
    ) -> Self {
        Self {
            store,
            pipeline,
            bulk_batch_size,
            excerpt_max_chars,
        }
    }

    /// Convert a fetched page into its `Document` record. `index_text` is
    /// the deterministic output of `TextPipeline::normalize` over
    /// `raw_text`, and `content_length` is `raw_text`'s character count —
    /// both invariants the rest of the crate relies on.
    pub fn build_document(&self, page: &PageRecord) -> Document {
        let normalized = self.pipeline.normalize(&page.text);
        let excerpt = summarize(&page.text, self.excerpt_max_chars);
        let now = crate::store::now();
        Document {
            url: page.url.clone(),
            final_url: Some(page.final_url.clone()).filter(|f| f != &page.url),
            title: page.title.clone(),
            raw_text: page.text.clone(),
            text_excerpt: excerpt,
            index_text: normalized.joined,
            content_length: page.text.chars().count() as i64,
            source: "crawler".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build the `{term -> (tf, positions)}` map for a page. Positions are
    /// indices into the raw (pre-stopword-removal) token stream — the
    /// spec's documented behavior (§9 Open Questions: position coordinates
    /// preserve pre-filter indices), matching `_build_postings`'s
    /// per-raw-token loop exactly.
    pub fn build_postings(&self, page: &PageRecord) -> HashMap<String, TermOccurrence> {
        let raw_tokens = self.pipeline.tokenize(&page.text.to_lowercase());
        let mut postings: HashMap<String, TermOccurrence> = HashMap::new();
        for (i, raw) in raw_tokens.iter().enumerate() {
            let Some(term) = self.pipeline.normalize_token(raw) else {
                continue;
            };
            let occ = postings.entry(term).or_insert_with(|| TermOccurrence {
                tf: 0,
                positions: Vec::new(),
            });
            occ.tf += 1;
            occ.positions.push(i as i64);
        }
        postings
    }

    /// Index a single page: upsert its document, then replace its
    /// postings. Indexing the same URL twice yields the same document and
    /// posting set (idempotent), since both writes are full replacements
    /// keyed by `url`/`(term, doc_url)`.
    pub async fn index_page(&self, page: &PageRecord) -> Result<()> {
        let doc = self.build_document(page);
        self.store.upsert_document(&doc).await?;
        let postings = self.build_postings(page);
        self.store.upsert_postings_for_doc(&doc.url, &postings).await?;
        Ok(())
    }

    /// Index many pages sequentially, flushing documents in batches of
    /// `bulk_batch_size` and postings per document, matching
    /// `index_pages`'s batching contract.
    pub async fn index_pages(&self, pages: &[PageRecord]) -> Result<IndexStats> {
        let mut attempted = 0usize;
        let mut changed = 0usize;
        let mut batches = 0usize;

        for chunk in pages.chunks(self.bulk_batch_size) {
            attempted += chunk.len();
            let docs: Vec<Document> = chunk.iter().map(|p| self.build_document(p)).collect();
            self.store.bulk_upsert_documents(&docs).await?;
            batches += 1;
            for page in chunk {
                let postings = self.build_postings(page);
                self.store
                    .upsert_postings_for_doc(&page.url, &postings)
                    .await?;
            }
            changed += chunk.len();
        }

        info!(attempted, changed, batches, "indexing completed");
        Ok(IndexStats {
            attempted,
            changed,
            batches,
        })
    }

    /// Index many pages using `workers` tasks to build documents/postings
    /// in parallel, then flush writes serially on the store — the teacher's
    /// "parallelize the CPU-bound work, serialize the writes" idiom, same
    /// shape as `index_pages_parallel`'s two-stage design.
    pub async fn index_pages_parallel(
        &self,
        pages: Vec<PageRecord>,
        workers: usize,
    ) -> Result<IndexStats> {
        let attempted = pages.len();
        let mut built: Vec<(Document, HashMap<String, TermOccurrence>)> =
            Vec::with_capacity(pages.len());

        let mut chunks: Vec<Vec<PageRecord>> = Vec::new();
        let chunk_size = workers.max(1);
        for chunk in pages.chunks(chunk_size.max(1)) {
            chunks.push(chunk.to_vec());
        }

        for chunk in chunks {
            let mut set: JoinSet<(Document, HashMap<String, TermOccurrence>)> = JoinSet::new();
            for page in chunk {
                let indexer = self.clone();
                set.spawn(async move {
                    let doc = indexer.build_document(&page);
                    let postings = indexer.build_postings(&page);
                    (doc, postings)
                });
            }
            while let Some(res) = set.join_next().await {
                if let Ok(pair) = res {
                    built.push(pair);
                }
            }
        }

        let mut changed = 0usize;
        let mut batches = 0usize;
        for chunk in built.chunks(self.bulk_batch_size) {
            let docs: Vec<Document> = chunk.iter().map(|(d, _)| d.clone()).collect();
            self.store.bulk_upsert_documents(&docs).await?;
            batches += 1;
            for (doc, postings) in chunk {
                self.store.upsert_postings_for_doc(&doc.url, postings).await?;
            }
            changed += chunk.len();
        }

        info!(attempted, changed, batches, "parallel indexing completed");
        Ok(IndexStats {
            attempted,
            changed,
            batches,
        })
    }

    /// Recompute `index_text`/`text_excerpt` from `raw_text` for every
    /// stored document, deleting and rebuilding postings so terms that
    /// disappeared from the re-normalized text don't linger — the
    /// precondition the spec documents for reindexing (§9 Open Questions:
    /// "delete postings for `doc_url` before upserting").
    pub async fn reindex_all(&self) -> Result<IndexStats> {
        let docs = self.store.all_documents().await?;
        let mut changed = 0usize;

        for doc in &docs {
            let normalized = self.pipeline.normalize(&doc.raw_text);
            let excerpt = summarize(&doc.raw_text, self.excerpt_max_chars);
            let mut updated = doc.clone();
            updated.index_text = normalized.joined;
            updated.text_excerpt = excerpt;
            self.store.upsert_document(&updated).await?;

            self.store.delete_postings_for_doc(&doc.url).await?;
            let page = PageRecord {
                url: doc.url.clone(),
                final_url: doc.final_url.clone().unwrap_or_else(|| doc.url.clone()),
                title: doc.title.clone(),
                text: doc.raw_text.clone(),
                html: None,
            };
            let postings = self.build_postings(&page);
            self.store.upsert_postings_for_doc(&doc.url, &postings).await?;
            changed += 1;
            debug!(url = %doc.url, "reindexed document");
        }

        Ok(IndexStats {
            attempted: docs.len(),
            changed,
            batches: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    async fn indexing_same_page_twice_is_idempotent() {
        let store = Store::open_in_memory().await.unwrap();
        let indexer = Indexer::new(store.clone(), TextPipeline::new(), 200, 400);
        let p = page("https://ex.com/a", "The quick brown fox jumps over the lazy dog");

        indexer.index_page(&p).await.unwrap();
        let first = store.find_document_by_url(&p.url).await.unwrap().unwrap();
        let first_fox_postings = store.postings_for_term("fox").await.unwrap();

        indexer.index_page(&p).await.unwrap();
        let second = store.find_document_by_url(&p.url).await.unwrap().unwrap();
        let second_fox_postings = store.postings_for_term("fox").await.unwrap();

        assert_eq!(first.index_text, second.index_text);
        assert_eq!(first_fox_postings, second_fox_postings);
        assert_eq!(store.count_documents().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn build_document_sets_content_length_and_index_text() {
        let store = Store::open_in_memory().await.unwrap();
        let indexer = Indexer::new(store, TextPipeline::new(), 200, 400);
        let p = page("https://ex.com/a", "The quick brown foxes jumped over lazy dogs.");
        let doc = indexer.build_document(&p);

        assert_eq!(doc.content_length, p.text.chars().count() as i64);
        assert_eq!(doc.index_text, "quick brown fox jump lazi dog");
    }

    #[tokio::test]
    async fn build_postings_positions_are_pre_filter_raw_token_indices() {
        let store = Store::open_in_memory().await.unwrap();
        let indexer = Indexer::new(store, TextPipeline::new(), 200, 400);
        // raw tokens: [the, quick, fox] -> "the" is filtered, "quick"=1, "fox"=2
        let p = page("https://ex.com/a", "the quick fox");
        let postings = indexer.build_postings(&p);

        assert_eq!(postings.get("quick").unwrap().positions, vec![1]);
        assert_eq!(postings.get("fox").unwrap().positions, vec![2]);
        assert!(!postings.contains_key("the"));
    }

    #[tokio::test]
    async fn reindex_drops_stale_terms_no_longer_present() {
        let store = Store::open_in_memory().await.unwrap();
        let indexer = Indexer::new(store.clone(), TextPipeline::new(), 200, 400);
        indexer.index_page(&page("https://ex.com/a", "fox fox dog")).await.unwrap();
        assert_eq!(store.document_frequency("dog").await.unwrap(), 1);

        // Simulate raw_text changing underneath us directly via the store,
        // then reindex from the stored raw_text.
        let mut doc = store.find_document_by_url("https://ex.com/a").await.unwrap().unwrap();
        doc.raw_text = "fox fox fox".to_string();
        store.upsert_document(&doc).await.unwrap();

        indexer.reindex_all().await.unwrap();
        assert_eq!(store.document_frequency("dog").await.unwrap(), 0);
        assert_eq!(store.document_frequency("fox").await.unwrap(), 1);
    }
}
