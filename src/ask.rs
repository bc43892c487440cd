//! Question answering inside a session, and standalone scoring.
//!
//! `gate ask` loads a session, rebuilds its passage index from the
//! document manifest, runs the gate, records the turn, and saves. A failed
//! save is reported on stderr but the answer is still printed.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::Path;

use answer_gate_core::collab::{Generator, Retriever};
use answer_gate_core::gate::{Gate, GateOptions};
use answer_gate_core::hallucination::{render_report, HallucinationDetector};
use answer_gate_core::models::{GatedAnswer, HallucinationReport, QualityAssessment};
use answer_gate_core::quality::QualityAssessor;

use crate::config::Config;
use crate::corpus;
use crate::generation::create_generator;
use crate::session::SessionStore;

/// Answer `question` against the current session and append the turn.
///
/// The session is not saved here. Nothing is recorded if retrieval or
/// generation fails.
pub async fn ask_in_session(
    store: &mut SessionStore,
    gate: &Gate,
    retriever: &dyn Retriever,
    generator: &dyn Generator,
    question: &str,
) -> Result<GatedAnswer> {
    let gated = gate.answer_question(retriever, generator, question).await?;

    store.add_conversation(
        &gated.question,
        &gated.answer,
        &gated.model,
        gated.quality_score(),
    );
    Ok(gated)
}

pub async fn run_ask(
    config: &Config,
    session_id: &str,
    question: &str,
    no_fallback: bool,
    no_hallucination_check: bool,
    json: bool,
) -> Result<()> {
    let mut store = SessionStore::open(&config.session.dir)?;
    if !store.load(session_id) {
        bail!("Session not found: {}", session_id);
    }
    if store.documents().is_empty() {
        eprintln!(
            "Warning: session '{}' has no documents; add some with `gate docs add`.",
            session_id
        );
    }

    let defaults = config.pipeline.gate_options();
    let options = GateOptions {
        enable_fallback: defaults.enable_fallback && !no_fallback,
        check_hallucination: defaults.check_hallucination && !no_hallucination_check,
        ..defaults
    };
    let gate = Gate::new(config.scoring.clone(), config.retrieval.params.clone(), options)
        .context("Invalid scoring configuration")?;
    let generator = create_generator(&config.generation)?;
    let retriever = corpus::build_retriever(config, store.documents()).await?;

    let gated = ask_in_session(
        &mut store,
        &gate,
        retriever.as_ref(),
        generator.as_ref(),
        question,
    )
    .await?;

    if !store.save() {
        eprintln!("Warning: failed to save session '{}'", session_id);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&gated)?);
    } else {
        print_answer(&gated);
    }
    Ok(())
}

fn print_answer(gated: &GatedAnswer) {
    println!("{}", gated.answer);
    println!();

    if let Some(q) = &gated.quality {
        println!(
            "Quality: {:.2} ({}){}",
            q.overall_score,
            q.quality_level,
            if q.needs_fallback {
                " - below threshold"
            } else {
                ""
            }
        );
        for rec in &q.recommendations {
            println!("  - {}", rec);
        }
    }

    if let Some(report) = &gated.hallucination {
        println!();
        println!("{}", render_report(report));
    }

    if let Some(fallback) = &gated.fallback {
        println!();
        println!("Fallback: {} - {}", fallback.strategy, fallback.improvement);
        for p in &fallback.additional_passages {
            println!(
                "  + {} #{}",
                p.metadata.document_id, p.metadata.chunk_index
            );
        }
    }

    if !gated.passages.is_empty() {
        println!();
        println!("Sources:");
        for p in &gated.passages {
            println!("  {} #{}", p.metadata.document_id, p.metadata.chunk_index);
        }
    }
}

/// Scores for a standalone question/answer pair.
#[derive(Debug, Serialize)]
pub struct AssessmentOutput {
    pub quality: QualityAssessment,
    pub hallucination: HallucinationReport,
}

pub fn assess(config: &Config, question: &str, answer: &str, context: &str) -> Result<AssessmentOutput> {
    let assessor = QualityAssessor::new(config.scoring.clone())?;
    let detector = HallucinationDetector::new(&config.scoring)?;
    Ok(AssessmentOutput {
        quality: assessor.assess(question, answer, context),
        hallucination: detector.detect_in_context(answer, context),
    })
}

pub fn run_assess(
    config: &Config,
    question: &str,
    answer: &str,
    context_file: Option<&Path>,
) -> Result<()> {
    let context = match context_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context file: {}", path.display()))?,
        None => String::new(),
    };
    let output = assess(config, question, answer, &context)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
