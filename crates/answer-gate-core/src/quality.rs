//! Heuristic answer quality scoring.
//!
//! [`QualityAssessor::assess`] scores an answer on completeness,
//! specificity, relevance, and confidence, estimates a coarse local
//! hallucination risk, and folds them into a single overall score:
//!
//! ```text
//! overall = clamp(0.3·completeness + 0.25·specificity + 0.25·relevance
//!                 + 0.2·confidence − 0.5·hallucination_risk, 0, 1)
//! ```
//!
//! (weights shown are the defaults from [`ScoringConfig`]). The overall
//! score maps to a [`QualityLevel`] and decides `needs_fallback`.
//!
//! All scorers are total: empty or odd input degrades to neutral values
//! instead of failing, so gating never blocks an answer from being shown.

use regex::Regex;
use serde::Serialize;

use crate::config::{ConfigError, ScoringConfig};
use crate::models::{QualityAssessment, QualityLevel, QualityMetrics};
use crate::text;

/// Phrases that signal the answer admits it could not respond fully.
const INCOMPLETE_MARKERS: &[&str] = &[
    "i don't know",
    "not sure",
    "insufficient information",
    "not provided",
    "unclear",
];

const HEDGING_TERMS: &[&str] = &[
    "maybe",
    "perhaps",
    "possibly",
    "might",
    "could be",
    "appears to be",
    "seems",
    "arguably",
    "probably",
];

/// Score returned for answers under the minimum word count.
const SHORT_ANSWER_COMPLETENESS: f64 = 0.3;

/// Summary over a batch of assessments.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total_assessments: usize,
    pub average_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub assessments: Vec<QualityAssessment>,
}

/// Scores answers against their question and retrieved context.
#[derive(Debug, Clone)]
pub struct QualityAssessor {
    config: ScoringConfig,
    quoted_span: Regex,
    uppercase_run: Regex,
}

impl QualityAssessor {
    /// Build an assessor, rejecting invalid weights or thresholds.
    pub fn new(config: ScoringConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            quoted_span: Regex::new(r#""[^"\n]+"|“[^”\n]+”|(?:^|\s)'[^'\n]+'"#).unwrap(),
            uppercase_run: Regex::new(r"[A-Z]{4,}").unwrap(),
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score one answer.
    pub fn assess(&self, question: &str, answer: &str, context: &str) -> QualityAssessment {
        let metrics = QualityMetrics {
            completeness: self.completeness(answer),
            specificity: self.specificity(answer),
            relevance: self.relevance(question, answer),
            confidence: self.confidence(answer),
            hallucination_risk: self.hallucination_risk(answer, context),
        };

        let overall_score = self.overall_score(&metrics);
        let assessment = QualityAssessment {
            metrics,
            overall_score,
            quality_level: QualityLevel::from_score(overall_score),
            needs_fallback: self.needs_fallback(overall_score),
            recommendations: recommendations(&metrics),
        };

        tracing::debug!(
            completeness = metrics.completeness,
            specificity = metrics.specificity,
            relevance = metrics.relevance,
            confidence = metrics.confidence,
            hallucination_risk = metrics.hallucination_risk,
            overall_score,
            level = %assessment.quality_level,
            "assessed answer quality"
        );

        assessment
    }

    /// Score several question/answer/context triples.
    ///
    /// Extra items in longer slices are ignored, as with `zip`.
    pub fn assess_batch(
        &self,
        questions: &[&str],
        answers: &[&str],
        contexts: &[&str],
    ) -> BatchSummary {
        let assessments: Vec<QualityAssessment> = questions
            .iter()
            .zip(answers)
            .zip(contexts)
            .map(|((q, a), c)| self.assess(q, a, c))
            .collect();

        let scores: Vec<f64> = assessments.iter().map(|a| a.overall_score).collect();
        let (average_score, min_score, max_score) = if scores.is_empty() {
            (0.0, 0.0, 1.0)
        } else {
            (
                scores.iter().sum::<f64>() / scores.len() as f64,
                scores.iter().copied().fold(f64::INFINITY, f64::min),
                scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        BatchSummary {
            total_assessments: assessments.len(),
            average_score,
            min_score,
            max_score,
            assessments,
        }
    }

    /// Weighted combination of the metrics, clamped to `[0, 1]`.
    pub fn overall_score(&self, m: &QualityMetrics) -> f64 {
        let c = &self.config;
        let raw = c.completeness_weight * m.completeness
            + c.specificity_weight * m.specificity
            + c.relevance_weight * m.relevance
            + c.confidence_weight * m.confidence
            - c.hallucination_penalty * m.hallucination_risk;
        raw.clamp(0.0, 1.0)
    }

    pub fn needs_fallback(&self, overall_score: f64) -> bool {
        overall_score < self.config.fallback_threshold
    }

    pub fn completeness(&self, answer: &str) -> f64 {
        let count = text::word_count(answer);
        if count < 30 {
            return SHORT_ANSWER_COMPLETENESS;
        }

        let lower = answer.to_lowercase();
        if INCOMPLETE_MARKERS.iter().any(|m| lower.contains(m)) {
            0.4
        } else if count > 100 {
            0.9
        } else if count > 60 {
            0.8
        } else {
            0.6
        }
    }

    pub fn specificity(&self, answer: &str) -> f64 {
        let mut score: f64 = 0.5;

        if answer.chars().any(|c| c.is_ascii_digit()) {
            score += 0.15;
        }
        if self.quoted_span.is_match(answer) {
            score += 0.15;
        }
        if self.uppercase_run.is_match(answer) {
            score += 0.1;
        }
        if text::split_sentences(answer).len() > 5 {
            score += 0.15;
        }

        score.min(1.0)
    }

    pub fn relevance(&self, question: &str, answer: &str) -> f64 {
        let question_words = text::content_words(question);
        if question_words.is_empty() {
            return 0.5;
        }
        let answer_words = text::content_words(answer);
        let overlap = question_words.intersection(&answer_words).count() as f64
            / question_words.len() as f64;

        (0.3 + overlap * 0.7).min(1.0)
    }

    /// Penalize hedging, normalized per 50 words so long answers are not
    /// penalized more than short ones.
    pub fn confidence(&self, answer: &str) -> f64 {
        let hedges = text::count_terms(answer, HEDGING_TERMS) as f64;
        let per_fifty = (text::word_count(answer) as f64 / 50.0).max(1.0);
        let penalty = (hedges / per_fifty * 0.1).min(0.5);

        (1.0 - penalty).max(0.3)
    }

    /// Coarse local risk estimate; the full scan lives in
    /// [`HallucinationDetector`](crate::hallucination::HallucinationDetector).
    pub fn hallucination_risk(&self, answer: &str, context: &str) -> f64 {
        let context_words: Vec<String> = text::words(context);
        let context_set: std::collections::HashSet<&str> =
            context_words.iter().map(String::as_str).collect();

        let sentences = text::split_sentences(answer);
        let mut risk = 0.0;

        for sentence in &sentences {
            let content = text::content_words(sentence);
            if content.is_empty() {
                continue;
            }
            let missing = content
                .iter()
                .filter(|w| {
                    !context_set.contains(w.as_str())
                        && !context_words.iter().any(|cw| cw.contains(w.as_str()))
                })
                .count();
            if missing as f64 / content.len() as f64 > 0.5 {
                risk += 0.1;
            }
        }

        for (i, first) in sentences.iter().enumerate() {
            for second in &sentences[i + 1..] {
                if negates(first, second) || negates(second, first) {
                    risk += 0.15;
                }
            }
        }

        f64::min(1.0, risk)
    }
}

/// True when `negated` contains "not" and `other` contains the same
/// statement with the "not" removed.
fn negates(negated: &str, other: &str) -> bool {
    let tokens = text::words(negated);
    if !tokens.iter().any(|t| t == "not") {
        return false;
    }
    let positive: Vec<&str> = tokens
        .iter()
        .filter(|t| *t != "not")
        .map(String::as_str)
        .collect();
    if positive.is_empty() {
        return false;
    }
    text::contains_phrase(&text::normalized_text(other), &positive.join(" "))
}

fn recommendations(m: &QualityMetrics) -> Vec<String> {
    let mut out = Vec::new();
    if m.completeness < 0.6 {
        out.push(
            "Answer appears incomplete - consider asking a more specific follow-up question"
                .to_string(),
        );
    }
    if m.specificity < 0.5 {
        out.push("Answer lacks specific details - request concrete examples or data".to_string());
    }
    if m.confidence < 0.5 {
        out.push("Answer expresses low confidence - try rephrasing the question".to_string());
    }
    if m.hallucination_risk > 0.5 {
        out.push(
            "High risk of hallucination detected - verify with original documents".to_string(),
        );
    }
    out
}
