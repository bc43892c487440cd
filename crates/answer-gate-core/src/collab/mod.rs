//! Collaborator abstractions for retrieval and generation.
//!
//! The gate never talks to a vector index or a language model directly.
//! It goes through the [`Retriever`] and [`Generator`] traits, which lets
//! the application plug in live backends and lets tests use the
//! deterministic implementations in [`memory`]. [`embedding`] ranks
//! passages by cosine distance over vectors from any [`embedding::Embedder`].
//!
//! Implementations own their timeout and retry policy; the gate only
//! observes success or failure.

pub mod embedding;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::SourcePassage;

/// Passage search over an indexed document set.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`search`](Retriever::search) | Top-`k` passages by similarity |
/// | [`search_with_score`](Retriever::search_with_score) | Same, with a distance per passage |
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `k` passages, most similar first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SourcePassage>>;

    /// Return up to `k` passages with their distance to the query.
    ///
    /// Lower distance means closer. The scale is backend-defined: the
    /// term-overlap backend stays within `[0, 1]`, the embedding backend
    /// uses cosine distance in `[0, 2]`.
    async fn search_with_score(&self, query: &str, k: usize) -> Result<Vec<(SourcePassage, f64)>>;
}

/// Free-text answer generation from a question and a context string.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Identifier recorded with each conversation turn (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;

    async fn generate(&self, question: &str, context: &str) -> Result<String>;
}
