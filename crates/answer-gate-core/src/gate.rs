//! The single-question gate procedure.
//!
//! ```text
//! question ─▶ Retriever::search ─▶ Generator::generate
//!                                      │
//!                 ┌────────────────────┴───────────────────┐
//!                 ▼                                        ▼
//!         QualityAssessor::assess             HallucinationDetector::detect
//!                 │
//!                 ▼ needs_fallback?
//!         FallbackOrchestrator::apply ─▶ combine_fallback
//! ```
//!
//! Retrieval or generation failures on the primary path fail the whole
//! question. The fallback step never fails; it only attaches extra
//! passages and a note. The generated answer is returned unchanged
//! whether or not a fallback was applied.

use anyhow::{bail, Context, Result};

use crate::collab::{Generator, Retriever};
use crate::config::{ConfigError, FallbackParams, ScoringConfig};
use crate::fallback::{combine_fallback, FallbackOrchestrator};
use crate::hallucination::HallucinationDetector;
use crate::models::{combine_passages, GatedAnswer};
use crate::quality::QualityAssessor;

/// Which gate stages run for a question.
#[derive(Debug, Clone, Copy)]
pub struct GateOptions {
    pub assess_quality: bool,
    pub check_hallucination: bool,
    pub enable_fallback: bool,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            assess_quality: true,
            check_hallucination: true,
            enable_fallback: true,
        }
    }
}

/// Validated scorers plus retrieval parameters, built once at startup.
pub struct Gate {
    assessor: QualityAssessor,
    detector: HallucinationDetector,
    params: FallbackParams,
    options: GateOptions,
}

impl Gate {
    pub fn new(
        scoring: ScoringConfig,
        params: FallbackParams,
        options: GateOptions,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        let detector = HallucinationDetector::new(&scoring)?;
        let assessor = QualityAssessor::new(scoring)?;
        Ok(Self {
            assessor,
            detector,
            params,
            options,
        })
    }

    pub fn assessor(&self) -> &QualityAssessor {
        &self.assessor
    }

    pub fn detector(&self) -> &HallucinationDetector {
        &self.detector
    }

    pub fn options(&self) -> GateOptions {
        self.options
    }

    pub fn with_options(mut self, options: GateOptions) -> Self {
        self.options = options;
        self
    }

    /// Answer one question and gate the result.
    pub async fn answer_question<R, G>(
        &self,
        retriever: &R,
        generator: &G,
        question: &str,
    ) -> Result<GatedAnswer>
    where
        R: Retriever + ?Sized,
        G: Generator + ?Sized,
    {
        let question = question.trim();
        if question.is_empty() {
            bail!("Question must not be empty");
        }

        let passages = retriever
            .search(question, self.params.k)
            .await
            .context("Retrieval failed")?;
        let context = combine_passages(&passages);

        let answer = generator
            .generate(question, &context)
            .await
            .context("Generation failed")?;

        let quality = self
            .options
            .assess_quality
            .then(|| self.assessor.assess(question, &answer, &context));

        let hallucination = self
            .options
            .check_hallucination
            .then(|| self.detector.detect_in_context(&answer, &context));

        let fallback = match &quality {
            Some(q) if self.options.enable_fallback && q.needs_fallback => {
                let orchestrator = FallbackOrchestrator::new(retriever, self.params.clone())?;
                let attempt = orchestrator.apply(question, &q.metrics).await;
                Some(combine_fallback(attempt))
            }
            _ => None,
        };

        tracing::info!(
            passages = passages.len(),
            score = quality.as_ref().map(|q| q.overall_score),
            fallback = fallback.as_ref().map(|f| f.strategy.as_str()),
            fallback_applied = fallback.as_ref().map(|f| f.fallback_applied),
            "answered question"
        );

        Ok(GatedAnswer {
            question: question.to_string(),
            answer,
            model: generator.model_name().to_string(),
            passages,
            quality,
            hallucination,
            fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::memory::{InMemoryRetriever, StaticGenerator};
    use crate::models::{FallbackStrategy, SourcePassage};
    use async_trait::async_trait;

    fn gate() -> Gate {
        Gate::new(
            ScoringConfig::default(),
            FallbackParams::default(),
            GateOptions::default(),
        )
        .unwrap()
    }

    fn corpus() -> InMemoryRetriever {
        InMemoryRetriever::with_passages(
            (0..12)
                .map(|i| {
                    SourcePassage::new(
                        format!("The scheduler note {} explains worker threads.", i),
                        "guide.md",
                        i,
                        "md",
                    )
                })
                .collect(),
        )
    }

    struct BrokenGenerator;

    #[async_trait]
    impl Generator for BrokenGenerator {
        fn model_name(&self) -> &str {
            "broken"
        }

        async fn generate(&self, _question: &str, _context: &str) -> anyhow::Result<String> {
            anyhow::bail!("model timed out")
        }
    }

    #[tokio::test]
    async fn test_short_answer_triggers_increase_context() {
        let r = corpus();
        let g = StaticGenerator::new("stub", "Worker threads.");
        let result = gate()
            .answer_question(&r, &g, "How does the scheduler work?")
            .await
            .unwrap();

        assert_eq!(result.answer, "Worker threads.");
        assert_eq!(result.model, "stub");
        assert_eq!(result.passages.len(), 4);
        let quality = result.quality.unwrap();
        assert!(quality.needs_fallback);
        let fallback = result.fallback.unwrap();
        assert_eq!(fallback.strategy, FallbackStrategy::IncreaseContext);
        assert!(fallback.fallback_applied);
        assert_eq!(fallback.additional_passages.len(), 8);
        assert!(result.hallucination.is_some());
    }

    #[tokio::test]
    async fn test_fallback_disabled() {
        let r = corpus();
        let g = StaticGenerator::new("stub", "Worker threads.");
        let options = GateOptions {
            enable_fallback: false,
            ..Default::default()
        };
        let result = gate()
            .with_options(options)
            .answer_question(&r, &g, "How does the scheduler work?")
            .await
            .unwrap();
        assert!(result.quality.unwrap().needs_fallback);
        assert!(result.fallback.is_none());
    }

    #[tokio::test]
    async fn test_no_assessment_means_no_fallback() {
        let r = corpus();
        let g = StaticGenerator::new("stub", "x");
        let options = GateOptions {
            assess_quality: false,
            check_hallucination: false,
            enable_fallback: true,
        };
        let result = gate()
            .with_options(options)
            .answer_question(&r, &g, "scheduler")
            .await
            .unwrap();
        assert!(result.quality.is_none());
        assert!(result.hallucination.is_none());
        assert!(result.fallback.is_none());
        assert_eq!(result.quality_score(), None);
    }

    #[tokio::test]
    async fn test_generation_failure_fails_turn() {
        let r = corpus();
        let err = gate()
            .answer_question(&r, &BrokenGenerator, "scheduler?")
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("model timed out"));
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let r = corpus();
        let g = StaticGenerator::new("stub", "x");
        assert!(gate().answer_question(&r, &g, "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_index_still_answers() {
        let r = InMemoryRetriever::new();
        let g = StaticGenerator::new("stub", "Nothing to go on.");
        let result = gate().answer_question(&r, &g, "anything?").await.unwrap();
        assert!(result.passages.is_empty());
        let fallback = result.fallback.unwrap();
        assert!(!fallback.fallback_applied);
        assert_eq!(fallback.improvement, "Failed to retrieve additional documents");
    }
}
