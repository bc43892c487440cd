//! Embedding-backed retrieval.
//!
//! [`EmbeddingRetriever`] embeds every passage once through an
//! [`Embedder`], keeps the vectors in memory, and answers queries with a
//! brute-force cosine scan. Distance is `1 − cosine_similarity`, so it lies
//! in `[0, 2]` and identical directions score `0.0`.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::SourcePassage;

use super::Retriever;

/// Turns text into fixed-size vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Largest number of texts sent in one [`embed`](Embedder::embed) call.
    fn batch_size(&self) -> usize {
        64
    }

    /// One vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Cosine similarity in `[-1, 1]`; `0.0` for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

pub struct EmbeddingRetriever<E> {
    embedder: E,
    entries: RwLock<Vec<(SourcePassage, Vec<f32>)>>,
}

impl<E: Embedder> EmbeddingRetriever<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Embed `passages` in batches and append them to the index.
    ///
    /// Nothing is added if any batch fails.
    pub async fn index(&self, passages: Vec<SourcePassage>) -> Result<()> {
        let batch_size = self.embedder.batch_size().max(1);
        let mut vectors = Vec::with_capacity(passages.len());

        for batch in passages.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|p| p.content.clone()).collect();
            let embedded = self.embedder.embed(&texts).await?;
            if embedded.len() != texts.len() {
                bail!(
                    "Embedder returned {} vectors for {} passages",
                    embedded.len(),
                    texts.len()
                );
            }
            vectors.extend(embedded);
        }

        tracing::debug!(
            model = self.embedder.model_name(),
            passages = passages.len(),
            "indexed passages"
        );
        let mut entries = self.entries.write().unwrap();
        entries.extend(passages.into_iter().zip(vectors));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn ranked(&self, query: &str, k: usize) -> Result<Vec<(SourcePassage, f64)>> {
        if query.trim().is_empty() || k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))?;

        let entries = self.entries.read().unwrap();
        let mut scored: Vec<(f64, &SourcePassage)> = entries
            .iter()
            .map(|(passage, vec)| {
                let distance = 1.0 - cosine_similarity(&query_vec, vec) as f64;
                (distance, passage)
            })
            .collect();

        // stable: equal distances keep insertion order
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, p)| (p.clone(), distance))
            .collect())
    }
}

#[async_trait]
impl<E: Embedder> Retriever for EmbeddingRetriever<E> {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SourcePassage>> {
        Ok(self
            .ranked(query, k)
            .await?
            .into_iter()
            .map(|(p, _)| p)
            .collect())
    }

    async fn search_with_score(&self, query: &str, k: usize) -> Result<Vec<(SourcePassage, f64)>> {
        self.ranked(query, k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts of a few fixed keywords; deterministic and order-free.
    struct KeywordEmbedder {
        calls: AtomicUsize,
        batch: usize,
    }

    const AXES: &[&str] = &["tokio", "serde", "scheduler", "json"];

    impl KeywordEmbedder {
        fn new(batch: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                batch,
            }
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keywords"
        }

        fn batch_size(&self) -> usize {
            self.batch
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    AXES.iter()
                        .map(|axis| lower.matches(axis).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            bail!("embedding service unavailable")
        }
    }

    fn passages() -> Vec<SourcePassage> {
        vec![
            SourcePassage::new("Serde reads JSON.", "a.md", 0, "md"),
            SourcePassage::new("The Tokio scheduler steals work.", "a.md", 1, "md"),
            SourcePassage::new("Tokio runs tasks.", "b.md", 0, "md"),
        ]
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_index_batches() {
        let r = EmbeddingRetriever::new(KeywordEmbedder::new(2));
        r.index(passages()).await.unwrap();
        assert_eq!(r.len(), 3);
        assert_eq!(r.embedder().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let r = EmbeddingRetriever::new(KeywordEmbedder::new(64));
        r.index(passages()).await.unwrap();

        let hits = r.search_with_score("tokio scheduler", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0.content, "The Tokio scheduler steals work.");
        assert!(hits[0].1.abs() < 1e-6);
        assert_eq!(hits[1].0.content, "Tokio runs tasks.");
        // orthogonal to the query
        assert!((hits[2].1 - 1.0).abs() < 1e-6);
        for pair in hits.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[tokio::test]
    async fn test_search_respects_k_and_blank_query() {
        let r = EmbeddingRetriever::new(KeywordEmbedder::new(64));
        r.index(passages()).await.unwrap();
        assert_eq!(r.search("serde json", 1).await.unwrap().len(), 1);
        assert!(r.search("   ", 3).await.unwrap().is_empty());

        let empty = EmbeddingRetriever::new(KeywordEmbedder::new(64));
        assert!(empty.search("tokio", 3).await.unwrap().is_empty());
        assert_eq!(empty.embedder().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedder_failure_propagates() {
        let r = EmbeddingRetriever::new(FailingEmbedder);
        assert!(r.index(passages()).await.is_err());
        assert!(r.is_empty());
    }
}
