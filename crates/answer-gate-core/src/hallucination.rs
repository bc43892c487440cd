//! Hallucination detection against retrieved source passages.
//!
//! [`HallucinationDetector::detect`] runs five independent scans over an
//! answer and the combined passage context:
//!
//! | Scan | Flags | Cap |
//! |------|-------|-----|
//! | unsupported claims | sentences whose key phrases never occur in context | 5 |
//! | contradictions | "X is not Y" / "X doesn't Y" / "X never Y" where the positive form is in context | 5 |
//! | fabricated facts | years, date-like tokens, capitalized bigrams absent from context | 5 |
//! | exaggerations | spans around absolute terms that are not in context verbatim | 3 |
//! | citation issues | long answers with no source-indicating phrase | 1 |
//!
//! Risk is `min(1, 0.15 × total flagged items)`. Detection is
//! deterministic and tolerates an empty passage list.
//!
//! These are surface heuristics. Paraphrased but faithful answers can
//! still be flagged, especially by the fabricated-fact scan.

use regex::Regex;

use crate::config::{ConfigError, ScoringConfig};
use crate::models::{combine_passages, Contradiction, HallucinationReport, SourcePassage};
use crate::text;

const MAX_UNSUPPORTED: usize = 5;
const MAX_CONTRADICTIONS: usize = 5;
const MAX_FABRICATED: usize = 5;
const MAX_EXAGGERATIONS: usize = 3;

/// Sentences shorter than this (in bytes, after trimming) are not checked.
const MIN_CLAIM_LEN: usize = 10;
const KEY_PHRASES_PER_SENTENCE: usize = 3;
const KEY_PHRASE_MAX_WORDS: usize = 3;

/// Characters of answer text taken before and after an absolute term.
const EXAGGERATION_SPAN_BEFORE: usize = 50;
const EXAGGERATION_SPAN_AFTER: usize = 100;

/// Answers longer than this (in characters) must cite their sources.
const CITATION_MIN_CHARS: usize = 200;

const RISK_PER_ISSUE: f64 = 0.15;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

const ABSOLUTE_TERMS: &[&str] = &[
    "always",
    "never",
    "all",
    "none",
    "completely",
    "absolutely",
    "totally",
    "entirely",
    "definitely",
];

const CITATION_PHRASES: &[&str] = &["according to", "source", "document", "based on", "from the"];

const HEDGES: &[&str] = &["maybe", "perhaps", "seems", "appears", "might", "could"];

/// A negation pattern and how to build the positive phrase from its captures.
struct NegationPattern {
    regex: Regex,
    /// Word placed between the two captures of the positive form, if any.
    joiner: Option<&'static str>,
}

/// Scans answers for content unsupported by their source passages.
pub struct HallucinationDetector {
    threshold: f64,
    negations: Vec<NegationPattern>,
    specific_fact: Regex,
    absolutes: Vec<Regex>,
}

impl HallucinationDetector {
    pub fn new(config: &ScoringConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let negations = vec![
            NegationPattern {
                regex: Regex::new(r"(\w+) is not (\w+)").unwrap(),
                joiner: Some("is"),
            },
            NegationPattern {
                regex: Regex::new(r"(\w+) doesn't (\w+)").unwrap(),
                joiner: None,
            },
            NegationPattern {
                regex: Regex::new(r"(\w+) never (\w+)").unwrap(),
                joiner: None,
            },
        ];

        let absolutes = ABSOLUTE_TERMS
            .iter()
            .map(|term| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term))).unwrap())
            .collect();

        Ok(Self {
            threshold: config.hallucination_threshold,
            negations,
            specific_fact: Regex::new(
                r"\b(?:\d{4}|\d{1,2}[/-]\d{1,2}|[A-Z][a-z]+\s+[A-Z][a-z]+)\b",
            )
            .unwrap(),
            absolutes,
        })
    }

    /// Scan `answer` against `passages`.
    ///
    /// `question` is accepted for interface symmetry with the assessor and
    /// does not currently influence any scan.
    pub fn detect(
        &self,
        answer: &str,
        passages: &[SourcePassage],
        _question: Option<&str>,
    ) -> HallucinationReport {
        let context = combine_passages(passages);
        self.detect_in_context(answer, &context)
    }

    /// Same as [`detect`](Self::detect) over an already-combined context.
    pub fn detect_in_context(&self, answer: &str, context: &str) -> HallucinationReport {
        let mut report = HallucinationReport {
            unsupported_claims: find_unsupported_claims(answer, context),
            contradictions: self.find_contradictions(answer, context),
            fabricated_facts: self.find_fabricated_facts(answer, context),
            exaggerations: self.find_exaggerations(answer, context),
            citation_issues: check_citations(answer),
            confidence_score: confidence_score(answer, context),
            overall_hallucination_risk: 0.0,
            is_hallucination_likely: false,
        };

        let risk = f64::min(1.0, RISK_PER_ISSUE * report.issue_count() as f64);
        report.overall_hallucination_risk = risk;
        report.is_hallucination_likely = risk > self.threshold;

        tracing::debug!(
            issues = report.issue_count(),
            risk,
            confidence = report.confidence_score,
            "scanned answer for hallucinations"
        );

        report
    }

    pub fn find_contradictions(&self, answer: &str, context: &str) -> Vec<Contradiction> {
        let answer_lower = answer.to_lowercase();
        let context_lower = context.to_lowercase();
        let mut found = Vec::new();

        for pattern in &self.negations {
            for caps in pattern.regex.captures_iter(&answer_lower) {
                let subject = &caps[1];
                let object = &caps[2];
                let positive = match pattern.joiner {
                    Some(j) => format!("{} {} {}", subject, j, object),
                    None => format!("{} {}", subject, object),
                };
                if context_lower.contains(&positive) {
                    found.push(Contradiction {
                        answer_fragment: caps[0].to_string(),
                        context_fragment: positive,
                    });
                }
            }
        }

        found.truncate(MAX_CONTRADICTIONS);
        found
    }

    pub fn find_fabricated_facts(&self, answer: &str, context: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for m in self.specific_fact.find_iter(answer) {
            let fact = m.as_str();
            if context.contains(fact) {
                continue;
            }
            let note = format!("Specific fact '{}' not found in source context", fact);
            if !found.contains(&note) {
                found.push(note);
            }
            if found.len() == MAX_FABRICATED {
                break;
            }
        }
        found
    }

    pub fn find_exaggerations(&self, answer: &str, context: &str) -> Vec<String> {
        let mut found = Vec::new();
        for re in &self.absolutes {
            let Some(m) = re.find(answer) else {
                continue;
            };
            let start = text::floor_char_boundary(
                answer,
                m.start().saturating_sub(EXAGGERATION_SPAN_BEFORE),
            );
            let end = text::ceil_char_boundary(answer, m.start() + EXAGGERATION_SPAN_AFTER);
            let claim = answer[start..end].trim();
            if !context.contains(claim) {
                found.push(format!("Potential exaggeration: '{}'", claim));
            }
            if found.len() == MAX_EXAGGERATIONS {
                break;
            }
        }
        found
    }
}

/// Flag sentences none of whose key phrases appear in the context.
pub fn find_unsupported_claims(answer: &str, context: &str) -> Vec<String> {
    let normalized_context = text::normalized_text(context);
    let mut unsupported = Vec::new();

    for sentence in text::split_sentences(answer) {
        if sentence.len() < MIN_CLAIM_LEN {
            continue;
        }
        let phrases = key_phrases(sentence);
        if phrases.is_empty() {
            continue;
        }
        if !phrases
            .iter()
            .any(|p| text::contains_phrase(&normalized_context, p))
        {
            unsupported.push(sentence.to_string());
            if unsupported.len() == MAX_UNSUPPORTED {
                break;
            }
        }
    }

    unsupported
}

/// Up to three distinct runs of two to three words, each starting at a
/// content word that is not a stop word. A one-word sentence has no
/// key phrases.
pub fn key_phrases(sentence: &str) -> Vec<String> {
    let words = text::words(sentence);
    let mut phrases: Vec<String> = Vec::new();

    for (i, word) in words.iter().enumerate() {
        if STOP_WORDS.contains(&word.as_str()) || !text::is_content_word(word) {
            continue;
        }
        let end = (i + KEY_PHRASE_MAX_WORDS).min(words.len());
        // pull the start back so the run has at least two words
        let start = if end - i < 2 { i.saturating_sub(1) } else { i };
        if end - start < 2 {
            continue;
        }
        let phrase = words[start..end].join(" ");
        if !phrases.contains(&phrase) {
            phrases.push(phrase);
        }
        if phrases.len() == KEY_PHRASES_PER_SENTENCE {
            break;
        }
    }

    phrases
}

pub fn check_citations(answer: &str) -> Vec<String> {
    let lower = answer.to_lowercase();
    let cited = CITATION_PHRASES.iter().any(|p| lower.contains(p));
    if !cited && answer.chars().count() > CITATION_MIN_CHARS {
        vec!["Long answer without explicit source citations".to_string()]
    } else {
        Vec::new()
    }
}

/// `1 − 0.3 × (1 − overlap) − min(0.2, 0.05 × hedges)`, floored at 0.
pub fn confidence_score(answer: &str, context: &str) -> f64 {
    let mut confidence = 1.0;

    let answer_words = text::content_words(answer);
    if !answer_words.is_empty() {
        let context_words = text::content_words(context);
        let overlap = answer_words.intersection(&context_words).count() as f64
            / answer_words.len() as f64;
        confidence -= (1.0 - overlap) * 0.3;
    }

    let hedges = text::count_terms(answer, HEDGES) as f64;
    confidence -= f64::min(0.2, hedges * 0.05);

    f64::max(0.0, confidence)
}

/// Render a report as plain text for terminals and logs.
pub fn render_report(report: &HallucinationReport) -> String {
    let mut out = Vec::new();
    out.push("=== Hallucination Detection Report ===".to_string());
    out.push(String::new());
    out.push(format!(
        "Overall Hallucination Risk: {:.1}%",
        report.overall_hallucination_risk * 100.0
    ));
    out.push(format!(
        "Status: {}",
        if report.is_hallucination_likely {
            "HIGH RISK"
        } else {
            "LOW RISK"
        }
    ));
    out.push(String::new());

    push_section(&mut out, "Unsupported Claims Found:", &report.unsupported_claims);
    let contradictions: Vec<String> = report
        .contradictions
        .iter()
        .map(|c| {
            format!(
                "Answer says '{}' | Context mentions '{}'",
                c.answer_fragment, c.context_fragment
            )
        })
        .collect();
    push_section(&mut out, "Potential Contradictions:", &contradictions);
    push_section(&mut out, "Potentially Fabricated Facts:", &report.fabricated_facts);
    push_section(&mut out, "Potential Exaggerations:", &report.exaggerations);
    push_section(&mut out, "Citation Issues:", &report.citation_issues);

    out.push(format!(
        "Confidence Score: {:.1}%",
        report.confidence_score * 100.0
    ));
    out.join("\n")
}

fn push_section(out: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push(title.to_string());
    for item in items {
        out.push(format!("  - {}", item));
    }
    out.push(String::new());
}
