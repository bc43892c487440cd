//! Answer generation backends.
//!
//! - **[`ExtractiveGenerator`]**: offline and deterministic; answers with the
//!   context sentences that best overlap the question.
//! - **[`OpenAiGenerator`]**: calls the OpenAI chat completions API with the
//!   grounded-answer prompt.
//!
//! # Retry Strategy
//!
//! The OpenAI generator retries transient errors with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

use answer_gate_core::collab::Generator;
use answer_gate_core::text;

use crate::config::GenerationConfig;

/// Reply used when the context holds nothing relevant.
pub const NO_ANSWER: &str =
    "I don't have enough information in the provided documents to answer this question.";

const SYSTEM_PROMPT: &str = "You are a knowledgeable and helpful AI assistant. Your task is to \
answer questions accurately and completely based on the provided context.

IMPORTANT INSTRUCTIONS:
1. Only use information from the provided context to answer the question
2. If the answer is not found in the context, clearly state: \"I don't have enough information \
in the provided documents to answer this question.\"
3. Be specific and cite relevant parts of the context
4. Provide complete answers with all necessary details
5. If uncertain, express your uncertainty clearly
6. Do not invent or assume information not in the context";

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Sentences picked by the extractive backend.
const EXTRACTIVE_SENTENCES: usize = 3;

// ============ Extractive ============

/// Picks up to three context sentences sharing the most content words
/// with the question, in their original order.
pub struct ExtractiveGenerator;

#[async_trait]
impl Generator for ExtractiveGenerator {
    fn model_name(&self) -> &str {
        "extractive"
    }

    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        Ok(extract_answer(question, context))
    }
}

pub fn extract_answer(question: &str, context: &str) -> String {
    let terms = text::content_words(question);
    if terms.is_empty() {
        return NO_ANSWER.to_string();
    }

    let mut seen = HashSet::new();
    let mut scored: Vec<(usize, usize, &str)> = text::split_sentences(context)
        .into_iter()
        .filter(|s| seen.insert(*s))
        .enumerate()
        .filter_map(|(pos, sentence)| {
            let overlap = text::content_words(sentence).intersection(&terms).count();
            (overlap > 0).then_some((overlap, pos, sentence))
        })
        .collect();

    if scored.is_empty() {
        return NO_ANSWER.to_string();
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.truncate(EXTRACTIVE_SENTENCES);
    scored.sort_by_key(|(_, pos, _)| *pos);

    scored
        .iter()
        .map(|(_, _, s)| format!("{}.", clean_sentence(s)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop leading markup (passage separators, headings, bullets) and
/// collapse whitespace.
fn clean_sentence(sentence: &str) -> String {
    sentence
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ============ OpenAI ============

/// Generator backed by `POST /v1/chat/completions`.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAiGenerator {
    model: String,
    temperature: f64,
    max_tokens: u32,
    max_retries: u32,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            api_key,
            client,
        })
    }

    fn request_body(&self, question: &str, context: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": format!("Context:\n{}\n\nQuestion: {}", context, question)},
            ],
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let body = self.request_body(question, context);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, ?delay, "retrying chat completion");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(CHAT_COMPLETIONS_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "OpenAI API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Generation failed after retries")))
    }
}

/// Extract `choices[0].message.content` from a chat completions response.
pub fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))?;
    Ok(content.trim().to_string())
}

/// Create the configured [`Generator`].
///
/// | Config Value | Generator |
/// |-------------|-----------|
/// | `"extractive"` | [`ExtractiveGenerator`] |
/// | `"openai"` | [`OpenAiGenerator`] |
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "extractive" => Ok(Box::new(ExtractiveGenerator)),
        "openai" => Ok(Box::new(OpenAiGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
