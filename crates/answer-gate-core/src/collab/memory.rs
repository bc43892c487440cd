//! In-memory collaborators for tests and offline use.
//!
//! [`InMemoryRetriever`] keeps passages in insertion order behind a
//! `std::sync::RwLock` and ranks them by query-term overlap.
//! [`StaticGenerator`] returns a fixed answer regardless of input.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::SourcePassage;
use crate::text;

use super::{Generator, Retriever};

/// Term-overlap retriever over a fixed passage set.
///
/// A passage's raw score is the number of distinct query terms it
/// contains. Passages matching no term are never returned. Distance is
/// `1 − matched / query_terms`, so a passage containing every query term
/// has distance `0.0`. Ties keep insertion order.
pub struct InMemoryRetriever {
    passages: RwLock<Vec<SourcePassage>>,
}

impl InMemoryRetriever {
    pub fn new() -> Self {
        Self {
            passages: RwLock::new(Vec::new()),
        }
    }

    pub fn with_passages(passages: Vec<SourcePassage>) -> Self {
        Self {
            passages: RwLock::new(passages),
        }
    }

    pub fn add_passages(&self, new: impl IntoIterator<Item = SourcePassage>) {
        let mut passages = self.passages.write().unwrap();
        passages.extend(new);
    }

    pub fn len(&self) -> usize {
        self.passages.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ranked(&self, query: &str, k: usize) -> Vec<(SourcePassage, f64)> {
        let mut terms = text::words(query);
        terms.sort();
        terms.dedup();
        if terms.is_empty() {
            return Vec::new();
        }

        let passages = self.passages.read().unwrap();
        let mut candidates: Vec<(usize, &SourcePassage)> = passages
            .iter()
            .filter_map(|p| {
                let haystack = text::normalized_text(&p.content);
                let matches = terms
                    .iter()
                    .filter(|t| text::contains_phrase(&haystack, t))
                    .count();
                (matches > 0).then_some((matches, p))
            })
            .collect();

        // stable: equal scores keep insertion order
        candidates.sort_by(|a, b| b.0.cmp(&a.0));
        candidates.truncate(k);

        candidates
            .into_iter()
            .map(|(matches, p)| {
                let distance = 1.0 - matches as f64 / terms.len() as f64;
                (p.clone(), distance)
            })
            .collect()
    }
}

impl Default for InMemoryRetriever {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SourcePassage>> {
        Ok(self.ranked(query, k).into_iter().map(|(p, _)| p).collect())
    }

    async fn search_with_score(&self, query: &str, k: usize) -> Result<Vec<(SourcePassage, f64)>> {
        Ok(self.ranked(query, k))
    }
}

/// Generator stub that always answers with the same text.
pub struct StaticGenerator {
    model: String,
    answer: String,
}

impl StaticGenerator {
    pub fn new(model: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            answer: answer.into(),
        }
    }
}

#[async_trait]
impl Generator for StaticGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, _question: &str, _context: &str) -> Result<String> {
        Ok(self.answer.clone())
    }
}
