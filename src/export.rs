//! Session export renderers.
//!
//! Two formats:
//!
//! - [`ExportFormat::Json`]: the persisted record verbatim, pretty-printed.
//! - [`ExportFormat::Markdown`]: a human-readable report with a metadata
//!   header, the document manifest, and one numbered Q/A block per turn.
//!
//! Rendering is pure; the same session always renders to the same text.

use anyhow::Result;
use clap::ValueEnum;

use crate::session::{Session, SessionSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    #[value(name = "md", alias = "markdown")]
    Markdown,
}

pub fn render(format: ExportFormat, session: &Session, summary: &SessionSummary) -> Result<String> {
    match format {
        ExportFormat::Json => render_json(session),
        ExportFormat::Markdown => Ok(render_markdown(summary, session)),
    }
}

pub fn render_json(session: &Session) -> Result<String> {
    Ok(serde_json::to_string_pretty(session)?)
}

pub fn render_markdown(summary: &SessionSummary, session: &Session) -> String {
    let mut out = String::new();
    let id = summary.session_id.as_deref().unwrap_or("unsaved");
    let quality = summary
        .average_quality_score
        .map_or_else(|| "n/a".to_string(), |avg| format!("{:.2}", avg));

    out.push_str(&format!("# Session Report: {}\n\n", id));
    out.push_str(&format!("**Created:** {}\n", summary.created_at.to_rfc3339()));
    out.push_str(&format!("**Updated:** {}\n", summary.updated_at.to_rfc3339()));
    out.push_str(&format!(
        "**Model:** {}\n",
        summary.model_used.as_deref().unwrap_or("n/a")
    ));
    out.push_str(&format!("**Quality Score:** {}\n\n", quality));

    out.push_str(&render_transcript(session));
    out
}

/// The manifest and Q/A blocks, without any timestamps.
pub fn render_transcript(session: &Session) -> String {
    let mut out = String::new();

    out.push_str("## Documents Loaded\n");
    for doc in &session.documents_loaded {
        out.push_str(&format!("- {} ({} chunks)\n", doc.name, doc.chunk_count));
    }

    out.push_str("\n## Conversations\n");
    for (i, turn) in session.conversations.iter().enumerate() {
        out.push_str(&format!("\n### Q{}: {}\n", i + 1, turn.question));
        out.push_str(&format!("**A:** {}\n", turn.answer));
        if let Some(score) = turn.quality_score {
            out.push_str(&format!("*Quality: {:.2}*\n", score));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::session::{ConversationTurn, DocumentEntry};

    fn sample() -> Session {
        let mut session = Session::new();
        session.documents_loaded.push(DocumentEntry {
            name: "guide.md".to_string(),
            path: "/docs/guide.md".to_string(),
            chunk_count: 3,
            loaded_at: Utc::now(),
        });
        session.conversations.push(ConversationTurn {
            question: "What is tokio?".to_string(),
            answer: "An async runtime.".to_string(),
            model: "extractive".to_string(),
            quality_score: Some(0.724),
            timestamp: Utc::now(),
        });
        session.conversations.push(ConversationTurn {
            question: "And serde?".to_string(),
            answer: "A serialization framework.".to_string(),
            model: "extractive".to_string(),
            quality_score: None,
            timestamp: Utc::now(),
        });
        session
    }

    #[test]
    fn test_transcript_layout() {
        let body = render_transcript(&sample());
        assert!(body.starts_with("## Documents Loaded\n- guide.md (3 chunks)\n"));
        assert!(body.contains("### Q1: What is tokio?\n**A:** An async runtime.\n*Quality: 0.72*\n"));
        assert!(body.contains("### Q2: And serde?\n**A:** A serialization framework.\n"));
        // unscored turns carry no quality line
        assert_eq!(body.matches("*Quality:").count(), 1);
    }

    #[test]
    fn test_markdown_header_without_scores() {
        let session = Session::new();
        let summary = SessionSummary::of(Some("empty"), &session);
        let report = render_markdown(&summary, &session);
        assert!(report.starts_with("# Session Report: empty\n\n"));
        assert!(report.contains("**Model:** n/a\n"));
        assert!(report.contains("**Quality Score:** n/a\n"));
    }

    #[test]
    fn test_markdown_header_with_scores() {
        let mut session = sample();
        session.model_used = Some("extractive".to_string());
        let summary = SessionSummary::of(Some("s"), &session);
        let report = render_markdown(&summary, &session);
        let header: Vec<&str> = report.lines().take(7).collect();
        assert_eq!(header[0], "# Session Report: s");
        assert_eq!(header[1], "");
        assert!(header[2].starts_with("**Created:** "));
        assert!(header[3].starts_with("**Updated:** "));
        assert_eq!(header[4], "**Model:** extractive");
        assert_eq!(header[5], "**Quality Score:** 0.72");
        assert_eq!(header[6], "");
        assert!(report.ends_with(&render_transcript(&session)));
    }

    #[test]
    fn test_json_is_the_record() {
        let session = sample();
        let json = render_json(&session).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["documents_loaded"][0]["chunks"], 3);
        assert!(value["conversations"][1]["quality_score"].is_null());
        assert!(value["model_used"].is_null());
    }
}
