//! Fallback retrieval for answers that fail the quality gate.
//!
//! Strategy selection is a pure priority list over the metrics of the
//! failed assessment (first match wins):
//!
//! 1. `completeness < 0.5` → [`IncreaseContext`](FallbackStrategy::IncreaseContext):
//!    re-run the search with `fallback_k` results.
//! 2. `hallucination_risk ≥ 0.5` → [`StrictMatching`](FallbackStrategy::StrictMatching):
//!    scored search, keeping passages with distance below `strict_distance`.
//! 3. `specificity < 0.5` → [`QueryExpansion`](FallbackStrategy::QueryExpansion):
//!    search each rewrite from [`expand_queries`] and merge.
//! 4. otherwise → [`MultiStrategy`](FallbackStrategy::MultiStrategy):
//!    a standard search plus the first two rewrites, merged.
//!
//! Merges deduplicate by content digest and keep first-seen order.
//! Retrieval errors never escape: the attempt comes back with no
//! passages and the error text in its improvement note.

use std::collections::HashSet;

use anyhow::Result;

use crate::collab::Retriever;
use crate::config::{ConfigError, FallbackParams};
use crate::models::{
    FallbackAttempt, FallbackOutcome, FallbackStrategy, QualityMetrics, SourcePassage,
};

const COMPLETENESS_FLOOR: f64 = 0.5;
const HALLUCINATION_CEILING: f64 = 0.5;
const SPECIFICITY_FLOOR: f64 = 0.5;

const MAX_EXPANDED_QUERIES: usize = 4;
const MULTI_STRATEGY_REWRITES: usize = 2;

/// Leading interrogatives and the phrases substituted for them.
const REWRITES: &[(&str, &[&str])] = &[
    ("how", &["explain", "describe", "what is"]),
    ("why", &["explain reasons for", "what causes"]),
    ("what", &["define", "explain", "describe"]),
    ("which", &["what", "list"]),
    ("when", &["time of", "date of"]),
];

/// Choose a strategy from the metrics of a failed assessment.
pub fn select_strategy(metrics: &QualityMetrics) -> FallbackStrategy {
    if metrics.completeness < COMPLETENESS_FLOOR {
        FallbackStrategy::IncreaseContext
    } else if metrics.hallucination_risk >= HALLUCINATION_CEILING {
        FallbackStrategy::StrictMatching
    } else if metrics.specificity < SPECIFICITY_FLOOR {
        FallbackStrategy::QueryExpansion
    } else {
        FallbackStrategy::MultiStrategy
    }
}

/// The question itself followed by rewrites of its leading interrogative,
/// at most four queries in total.
///
/// Rewrites are lowercased. Questions that do not start with a known
/// interrogative word yield only themselves.
pub fn expand_queries(question: &str) -> Vec<String> {
    let mut expanded = vec![question.to_string()];

    let lower = question.trim_start().to_lowercase();
    let leading = lower
        .split(|c: char| !c.is_alphanumeric())
        .next()
        .unwrap_or("");

    if let Some((word, alternatives)) = REWRITES.iter().find(|(w, _)| *w == leading) {
        let rest = &lower[word.len()..];
        for alt in alternatives.iter() {
            expanded.push(format!("{}{}", alt, rest));
        }
    }

    expanded.truncate(MAX_EXPANDED_QUERIES);
    expanded
}

/// Append `incoming` to `into`, skipping passages whose content was seen.
fn merge_unique(
    into: &mut Vec<SourcePassage>,
    seen: &mut HashSet<String>,
    incoming: Vec<SourcePassage>,
) {
    for passage in incoming {
        if seen.insert(passage.content_digest()) {
            into.push(passage);
        }
    }
}

/// Deduplicate passages by content, keeping the first occurrence.
pub fn dedup_passages(passages: Vec<SourcePassage>) -> Vec<SourcePassage> {
    let mut out = Vec::with_capacity(passages.len());
    let mut seen = HashSet::new();
    merge_unique(&mut out, &mut seen, passages);
    out
}

/// Merge a fallback attempt onto the original turn.
///
/// `fallback_applied` is true exactly when the attempt produced passages.
/// The original answer is left untouched either way.
pub fn combine_fallback(attempt: FallbackAttempt) -> FallbackOutcome {
    FallbackOutcome {
        fallback_applied: !attempt.new_passages.is_empty(),
        strategy: attempt.strategy,
        improvement: attempt.improvement,
        additional_passages: attempt.new_passages,
    }
}

/// Runs one fallback strategy against a [`Retriever`].
pub struct FallbackOrchestrator<'a, R: Retriever + ?Sized> {
    retriever: &'a R,
    params: FallbackParams,
}

impl<'a, R: Retriever + ?Sized> FallbackOrchestrator<'a, R> {
    pub fn new(retriever: &'a R, params: FallbackParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self { retriever, params })
    }

    /// Select and execute a strategy for `question`.
    pub async fn apply(&self, question: &str, metrics: &QualityMetrics) -> FallbackAttempt {
        let strategy = select_strategy(metrics);
        tracing::debug!(%strategy, "selected fallback strategy");
        self.run(strategy, question).await
    }

    /// Execute a specific strategy, trapping retrieval failures.
    pub async fn run(&self, strategy: FallbackStrategy, question: &str) -> FallbackAttempt {
        let result = match strategy {
            FallbackStrategy::IncreaseContext => self.increase_context(question).await,
            FallbackStrategy::StrictMatching => self.strict_matching(question).await,
            FallbackStrategy::QueryExpansion => self.query_expansion(question).await,
            FallbackStrategy::MultiStrategy => self.multi_strategy(question).await,
        };

        match result {
            Ok((new_passages, improvement)) => FallbackAttempt {
                strategy,
                new_passages,
                improvement,
            },
            Err(e) => {
                tracing::warn!(%strategy, error = %e, "fallback retrieval failed");
                FallbackAttempt {
                    strategy,
                    new_passages: Vec::new(),
                    improvement: format!("Error in fallback: {}", e),
                }
            }
        }
    }

    async fn increase_context(&self, question: &str) -> Result<(Vec<SourcePassage>, String)> {
        let passages = dedup_passages(self.retriever.search(question, self.params.fallback_k).await?);
        let note = if passages.is_empty() {
            "Failed to retrieve additional documents".to_string()
        } else {
            format!(
                "Retrieved {} chunks instead of {} for better context",
                passages.len(),
                self.params.k
            )
        };
        Ok((passages, note))
    }

    async fn strict_matching(&self, question: &str) -> Result<(Vec<SourcePassage>, String)> {
        let scored = self
            .retriever
            .search_with_score(question, self.params.k)
            .await?;
        let kept: Vec<SourcePassage> = scored
            .into_iter()
            .filter(|(_, distance)| *distance < self.params.strict_distance)
            .map(|(p, _)| p)
            .collect();
        let kept = dedup_passages(kept);

        let note = if kept.is_empty() {
            "No documents met strict similarity threshold".to_string()
        } else {
            format!(
                "Applied strict similarity threshold, kept {} high-confidence chunks",
                kept.len()
            )
        };
        Ok((kept, note))
    }

    async fn query_expansion(&self, question: &str) -> Result<(Vec<SourcePassage>, String)> {
        let queries = expand_queries(question);
        let mut passages = Vec::new();
        let mut seen = HashSet::new();

        for query in &queries {
            let hits = self.retriever.search(query, self.params.expansion_k).await?;
            merge_unique(&mut passages, &mut seen, hits);
        }

        let note = format!(
            "Expanded query to {} variants, found {} documents",
            queries.len(),
            passages.len()
        );
        Ok((passages, note))
    }

    async fn multi_strategy(&self, question: &str) -> Result<(Vec<SourcePassage>, String)> {
        let mut passages = Vec::new();
        let mut seen = HashSet::new();

        let standard = self.retriever.search(question, self.params.k).await?;
        merge_unique(&mut passages, &mut seen, standard);

        for query in expand_queries(question)
            .iter()
            .take(MULTI_STRATEGY_REWRITES)
        {
            let hits = self
                .retriever
                .search(query, self.params.multi_expanded_k)
                .await?;
            merge_unique(&mut passages, &mut seen, hits);
        }

        let note = format!(
            "Applied multi-strategy retrieval, combined {} unique documents",
            passages.len()
        );
        Ok((passages, note))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::memory::InMemoryRetriever;
    use async_trait::async_trait;

    fn healthy() -> QualityMetrics {
        QualityMetrics {
            completeness: 0.9,
            specificity: 0.9,
            relevance: 0.9,
            confidence: 0.9,
            hallucination_risk: 0.0,
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl Retriever for FailingRetriever {
        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<SourcePassage>> {
            anyhow::bail!("index unavailable")
        }

        async fn search_with_score(
            &self,
            _query: &str,
            _k: usize,
        ) -> Result<Vec<(SourcePassage, f64)>> {
            anyhow::bail!("index unavailable")
        }
    }

    /// Returns the same passages for every query, to force duplicates.
    struct RepeatingRetriever(Vec<SourcePassage>);

    #[async_trait]
    impl Retriever for RepeatingRetriever {
        async fn search(&self, _query: &str, k: usize) -> Result<Vec<SourcePassage>> {
            Ok(self.0.iter().take(k).cloned().collect())
        }

        async fn search_with_score(
            &self,
            _query: &str,
            k: usize,
        ) -> Result<Vec<(SourcePassage, f64)>> {
            Ok(self.0.iter().take(k).cloned().map(|p| (p, 0.1)).collect())
        }
    }

    fn corpus() -> InMemoryRetriever {
        InMemoryRetriever::with_passages(
            (0..10)
                .map(|i| SourcePassage::new(format!("tokio runtime note {}", i), "n.md", i, "md"))
                .collect(),
        )
    }

    #[test]
    fn test_select_increase_context() {
        let m = QualityMetrics {
            completeness: 0.4,
            ..healthy()
        };
        assert_eq!(select_strategy(&m), FallbackStrategy::IncreaseContext);
    }

    #[test]
    fn test_select_strict_matching() {
        let m = QualityMetrics {
            hallucination_risk: 0.6,
            ..healthy()
        };
        assert_eq!(select_strategy(&m), FallbackStrategy::StrictMatching);
        let edge = QualityMetrics {
            hallucination_risk: 0.5,
            ..healthy()
        };
        assert_eq!(select_strategy(&edge), FallbackStrategy::StrictMatching);
    }

    #[test]
    fn test_select_query_expansion() {
        let m = QualityMetrics {
            specificity: 0.3,
            ..healthy()
        };
        assert_eq!(select_strategy(&m), FallbackStrategy::QueryExpansion);
    }

    #[test]
    fn test_select_multi_strategy() {
        assert_eq!(select_strategy(&healthy()), FallbackStrategy::MultiStrategy);
    }

    #[test]
    fn test_select_priority_order() {
        let m = QualityMetrics {
            completeness: 0.1,
            specificity: 0.1,
            relevance: 0.1,
            confidence: 0.1,
            hallucination_risk: 0.9,
        };
        assert_eq!(select_strategy(&m), FallbackStrategy::IncreaseContext);
    }

    #[test]
    fn test_expand_queries() {
        let q = expand_queries("How does the scheduler work?");
        assert_eq!(
            q,
            vec![
                "How does the scheduler work?",
                "explain does the scheduler work?",
                "describe does the scheduler work?",
                "what is does the scheduler work?",
            ]
        );
        assert_eq!(expand_queries("Which crate?").len(), 3);
        assert_eq!(expand_queries("Tell me about caching"), vec!["Tell me about caching"]);
        // "however" is not the interrogative "how"
        assert_eq!(expand_queries("However it ends").len(), 1);
    }

    #[tokio::test]
    async fn test_increase_context_uses_fallback_k() {
        let r = corpus();
        let orch = FallbackOrchestrator::new(&r, FallbackParams::default()).unwrap();
        let attempt = orch.run(FallbackStrategy::IncreaseContext, "tokio").await;
        assert_eq!(attempt.new_passages.len(), 8);
        assert!(attempt.improvement.contains("8 chunks instead of 4"));
    }

    #[tokio::test]
    async fn test_strict_matching_filters_by_distance() {
        let r = InMemoryRetriever::with_passages(vec![
            SourcePassage::new("tokio runtime scheduler", "a", 0, "txt"),
            SourcePassage::new("tokio only", "a", 1, "txt"),
        ]);
        let orch = FallbackOrchestrator::new(&r, FallbackParams::default()).unwrap();
        let attempt = orch
            .run(FallbackStrategy::StrictMatching, "tokio runtime scheduler")
            .await;
        // second passage has distance 2/3
        assert_eq!(attempt.new_passages.len(), 1);
        assert_eq!(attempt.new_passages[0].metadata.chunk_index, 0);
    }

    #[tokio::test]
    async fn test_strict_matching_none_kept() {
        let r = InMemoryRetriever::with_passages(vec![SourcePassage::new("tokio", "a", 0, "txt")]);
        let orch = FallbackOrchestrator::new(&r, FallbackParams::default()).unwrap();
        let attempt = orch
            .run(FallbackStrategy::StrictMatching, "tokio runtime scheduler internals")
            .await;
        assert!(attempt.new_passages.is_empty());
        assert_eq!(attempt.improvement, "No documents met strict similarity threshold");
        assert!(!combine_fallback(attempt).fallback_applied);
    }

    #[tokio::test]
    async fn test_expansion_and_multi_never_duplicate() {
        let shared = vec![
            SourcePassage::new("alpha", "a", 0, "txt"),
            SourcePassage::new("beta", "a", 1, "txt"),
            SourcePassage::new("alpha", "b", 3, "txt"),
        ];
        let r = RepeatingRetriever(shared);
        let orch = FallbackOrchestrator::new(&r, FallbackParams::default()).unwrap();

        for strategy in [FallbackStrategy::QueryExpansion, FallbackStrategy::MultiStrategy] {
            let attempt = orch.run(strategy, "What is alpha?").await;
            let contents: Vec<&str> = attempt
                .new_passages
                .iter()
                .map(|p| p.content.as_str())
                .collect();
            assert_eq!(contents, vec!["alpha", "beta"], "{}", strategy);
            // first-seen metadata wins
            assert_eq!(attempt.new_passages[0].metadata.document_id, "a");
        }
    }

    #[tokio::test]
    async fn test_failure_becomes_note() {
        let r = FailingRetriever;
        let orch = FallbackOrchestrator::new(&r, FallbackParams::default()).unwrap();
        for strategy in [
            FallbackStrategy::IncreaseContext,
            FallbackStrategy::StrictMatching,
            FallbackStrategy::QueryExpansion,
            FallbackStrategy::MultiStrategy,
        ] {
            let attempt = orch.run(strategy, "why?").await;
            assert_eq!(attempt.strategy, strategy);
            assert!(attempt.new_passages.is_empty());
            assert!(attempt.improvement.contains("index unavailable"));
        }
    }

    #[tokio::test]
    async fn test_apply_selects_from_metrics() {
        let r = corpus();
        let orch = FallbackOrchestrator::new(&r, FallbackParams::default()).unwrap();
        let metrics = QualityMetrics {
            specificity: 0.2,
            ..healthy()
        };
        let attempt = orch.apply("What is tokio?", &metrics).await;
        assert_eq!(attempt.strategy, FallbackStrategy::QueryExpansion);
        let outcome = combine_fallback(attempt);
        assert!(outcome.fallback_applied);
        assert_eq!(outcome.strategy, FallbackStrategy::QueryExpansion);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let r = InMemoryRetriever::new();
        let params = FallbackParams {
            k: 0,
            ..Default::default()
        };
        assert!(FallbackOrchestrator::new(&r, params).is_err());
    }
}
