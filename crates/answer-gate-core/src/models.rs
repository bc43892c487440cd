//! Core data models used throughout Answer Gate.
//!
//! These types represent the passages, scores, and fallback results that
//! flow through the gating pipeline. None of them are persisted on their
//! own; the application records only the question, answer, model, and
//! overall score of each turn.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Where a retrieved passage came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageMetadata {
    /// Identifier of the originating document (usually its file name).
    pub document_id: String,
    /// Position of the passage within its document, starting at 0.
    pub chunk_index: i64,
    /// File kind of the origin document (e.g. `"md"`, `"txt"`).
    pub file_kind: String,
}

/// A retrieved text chunk plus a reference to its origin.
///
/// Passages are immutable once retrieved; deduplication compares
/// [`content_digest`](SourcePassage::content_digest) values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePassage {
    pub content: String,
    pub metadata: PassageMetadata,
}

impl SourcePassage {
    pub fn new(
        content: impl Into<String>,
        document_id: impl Into<String>,
        chunk_index: i64,
        file_kind: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            metadata: PassageMetadata {
                document_id: document_id.into(),
                chunk_index,
                file_kind: file_kind.into(),
            },
        }
    }

    /// SHA-256 hex digest of the passage content.
    ///
    /// Two passages with identical text have the same digest regardless
    /// of their metadata.
    pub fn content_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Join passage contents into the single context string handed to the
/// generator and the scorers.
pub fn combine_passages(passages: &[SourcePassage]) -> String {
    passages
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// The five heuristic metrics, each in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub completeness: f64,
    pub specificity: f64,
    pub relevance: f64,
    pub confidence: f64,
    pub hallucination_risk: f64,
}

/// Human-readable bucket of an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    #[serde(rename = "Very Poor")]
    VeryPoor,
}

impl QualityLevel {
    /// Step function over the overall score. Boundaries are inclusive on
    /// the lower edge: `0.6` is `Fair`, `0.4` is `Poor`.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            QualityLevel::Excellent
        } else if score >= 0.7 {
            QualityLevel::Good
        } else if score >= 0.6 {
            QualityLevel::Fair
        } else if score >= 0.4 {
            QualityLevel::Poor
        } else {
            QualityLevel::VeryPoor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::Excellent => "Excellent",
            QualityLevel::Good => "Good",
            QualityLevel::Fair => "Fair",
            QualityLevel::Poor => "Poor",
            QualityLevel::VeryPoor => "Very Poor",
        }
    }
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of scoring one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub metrics: QualityMetrics,
    pub overall_score: f64,
    pub quality_level: QualityLevel,
    pub needs_fallback: bool,
    pub recommendations: Vec<String>,
}

/// A negated statement in the answer whose positive form appears in the
/// source context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contradiction {
    pub answer_fragment: String,
    pub context_fragment: String,
}

/// Findings of the hallucination scan over one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallucinationReport {
    pub unsupported_claims: Vec<String>,
    pub contradictions: Vec<Contradiction>,
    pub fabricated_facts: Vec<String>,
    pub exaggerations: Vec<String>,
    pub citation_issues: Vec<String>,
    pub confidence_score: f64,
    pub overall_hallucination_risk: f64,
    pub is_hallucination_likely: bool,
}

impl HallucinationReport {
    /// Total number of flagged items across all finding lists.
    pub fn issue_count(&self) -> usize {
        self.unsupported_claims.len()
            + self.contradictions.len()
            + self.fabricated_facts.len()
            + self.exaggerations.len()
            + self.citation_issues.len()
    }
}

/// Alternate retrieval policy chosen when an answer fails gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    IncreaseContext,
    StrictMatching,
    QueryExpansion,
    MultiStrategy,
}

impl FallbackStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackStrategy::IncreaseContext => "increase_context",
            FallbackStrategy::StrictMatching => "strict_matching",
            FallbackStrategy::QueryExpansion => "query_expansion",
            FallbackStrategy::MultiStrategy => "multi_strategy",
        }
    }
}

impl std::fmt::Display for FallbackStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed fallback strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackAttempt {
    pub strategy: FallbackStrategy,
    /// Deduplicated by content, in first-seen order. Empty on failure.
    pub new_passages: Vec<SourcePassage>,
    pub improvement: String,
}

/// A fallback attempt merged onto the original turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackOutcome {
    pub fallback_applied: bool,
    pub strategy: FallbackStrategy,
    pub improvement: String,
    pub additional_passages: Vec<SourcePassage>,
}

/// Everything produced for one question by the gate procedure.
#[derive(Debug, Clone, Serialize)]
pub struct GatedAnswer {
    pub question: String,
    pub answer: String,
    pub model: String,
    pub passages: Vec<SourcePassage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hallucination: Option<HallucinationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackOutcome>,
}

impl GatedAnswer {
    /// The score recorded with the conversation turn, when assessed.
    pub fn quality_score(&self) -> Option<f64> {
        self.quality.as_ref().map(|q| q.overall_score)
    }
}
