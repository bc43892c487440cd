//! Durable session records.
//!
//! A session is one JSON file per id under the configured directory:
//!
//! ```json
//! {
//!   "created_at": "...",
//!   "updated_at": "...",
//!   "documents_loaded": [{"name": "...", "path": "...", "chunks": 3, "loaded_at": "..."}],
//!   "conversations": [{"question": "...", "answer": "...", "model": "...",
//!                      "quality_score": 0.72, "timestamp": "..."}],
//!   "model_used": "gpt-3.5-turbo"
//! }
//! ```
//!
//! [`SessionStore`] holds one session in memory at a time. Persistence
//! operations report failure as `false` and log the cause, so a broken
//! disk never blocks an answer from being shown. Saves write a sibling
//! temp file and rename it over the record, leaving the previous record
//! intact if the write is interrupted.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::export::{self, ExportFormat};

/// One uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "chunks")]
    pub chunk_count: usize,
    pub loaded_at: DateTime<Utc>,
}

/// One answered question. Never edited after it is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub model: String,
    pub quality_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// The persisted record. The id is the file stem, not a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub documents_loaded: Vec<DocumentEntry>,
    #[serde(default)]
    pub conversations: Vec<ConversationTurn>,
    #[serde(default)]
    pub model_used: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            documents_loaded: Vec::new(),
            conversations: Vec::new(),
            model_used: None,
        }
    }

    /// Mean of the turns that carry a score; `None` if none do.
    pub fn average_quality_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self
            .conversations
            .iter()
            .filter_map(|c| c.quality_score)
            .collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub num_documents: usize,
    pub documents: Vec<DocumentEntry>,
    pub num_conversations: usize,
    pub model_used: Option<String>,
    pub average_quality_score: Option<f64>,
}

impl SessionSummary {
    pub fn of(session_id: Option<&str>, session: &Session) -> Self {
        Self {
            session_id: session_id.map(str::to_string),
            created_at: session.created_at,
            updated_at: session.updated_at,
            num_documents: session.documents_loaded.len(),
            documents: session.documents_loaded.clone(),
            num_conversations: session.conversations.len(),
            model_used: session.model_used.clone(),
            average_quality_score: session.average_quality_score(),
        }
    }
}

/// File-backed store holding the current session in memory.
pub struct SessionStore {
    dir: PathBuf,
    current: Option<String>,
    data: Session,
}

impl SessionStore {
    /// Open (and create if needed) the session directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create session directory: {}", dir.display()))?;
        Ok(Self {
            dir,
            current: None,
            data: Session::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Start a fresh in-memory session. Nothing is written until [`save`](Self::save).
    ///
    /// Without a name the id is `session_YYYYMMDD_HHMMSS` in local time.
    pub fn create(&mut self, name: Option<&str>) -> Result<String> {
        let id = match name {
            Some(name) => {
                let name = name.trim();
                if !is_valid_id(name) {
                    bail!(
                        "Invalid session name '{}': use letters, digits, '-', '_' or '.'",
                        name
                    );
                }
                name.to_string()
            }
            None => Local::now().format("session_%Y%m%d_%H%M%S").to_string(),
        };

        self.current = Some(id.clone());
        self.data = Session::new();
        tracing::info!(session = %id, "created session");
        Ok(id)
    }

    /// Replace the in-memory session with the record for `id`.
    ///
    /// On failure the in-memory state is left unchanged.
    pub fn load(&mut self, id: &str) -> bool {
        let Some(path) = self.record_path(id) else {
            tracing::warn!(session = %id, "rejected invalid session id");
            return false;
        };
        if !path.exists() {
            return false;
        }

        match read_record(&path) {
            Ok(session) => {
                self.data = session;
                self.current = Some(id.to_string());
                true
            }
            Err(e) => {
                tracing::warn!(session = %id, error = %format!("{:#}", e), "failed to load session");
                false
            }
        }
    }

    /// Persist the in-memory session, refreshing `updated_at`.
    pub fn save(&mut self) -> bool {
        let Some(id) = self.current.clone() else {
            tracing::warn!("save requested with no current session");
            return false;
        };
        let Some(path) = self.record_path(&id) else {
            return false;
        };

        self.data.updated_at = Utc::now();
        match write_record(&path, &self.data) {
            Ok(()) => {
                tracing::info!(session = %id, path = %path.display(), "saved session");
                true
            }
            Err(e) => {
                tracing::warn!(session = %id, error = %format!("{:#}", e), "failed to save session");
                false
            }
        }
    }

    /// Known session ids, sorted. Files whose stem is not a valid id are
    /// skipped since [`load`](Self::load) could never open them.
    pub fn list(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "failed to list sessions");
                return Vec::new();
            }
        };

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().to_string()))
            .filter(|id| is_valid_id(id))
            .collect();
        ids.sort();
        ids
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let Some(path) = self.record_path(id) else {
            return false;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => {
                if self.current.as_deref() == Some(id) {
                    self.current = None;
                }
                tracing::info!(session = %id, "deleted session");
                true
            }
            Err(e) => {
                tracing::warn!(session = %id, error = %e, "failed to delete session");
                false
            }
        }
    }

    pub fn add_document(&mut self, name: &str, path: &str, chunk_count: usize) {
        self.data.documents_loaded.push(DocumentEntry {
            name: name.to_string(),
            path: path.to_string(),
            chunk_count,
            loaded_at: Utc::now(),
        });
    }

    pub fn add_conversation(
        &mut self,
        question: &str,
        answer: &str,
        model: &str,
        quality_score: Option<f64>,
    ) {
        self.data.conversations.push(ConversationTurn {
            question: question.to_string(),
            answer: answer.to_string(),
            model: model.to_string(),
            quality_score,
            timestamp: Utc::now(),
        });
        self.data.model_used = Some(model.to_string());
    }

    pub fn conversation_history(&self) -> &[ConversationTurn] {
        &self.data.conversations
    }

    pub fn documents(&self) -> &[DocumentEntry] {
        &self.data.documents_loaded
    }

    pub fn current_session(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn session(&self) -> &Session {
        &self.data
    }

    pub fn get_session_summary(&self) -> SessionSummary {
        SessionSummary::of(self.current.as_deref(), &self.data)
    }

    /// Write session `id` to `path` in `format`, loading it first if it is
    /// not the current session.
    pub fn export(&mut self, id: &str, path: &Path, format: ExportFormat) -> bool {
        if self.current.as_deref() != Some(id) && !self.load(id) {
            tracing::warn!(session = %id, "cannot export unknown session");
            return false;
        }

        let rendered = match export::render(format, &self.data, &self.get_session_summary()) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!(session = %id, error = %e, "failed to render session");
                return false;
            }
        };
        match std::fs::write(path, rendered) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to write export");
                false
            }
        }
    }

    fn record_path(&self, id: &str) -> Option<PathBuf> {
        is_valid_id(id).then(|| self.dir.join(format!("{}.json", id)))
    }
}

/// Ids become file names, so only a conservative character set is allowed.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn read_record(path: &Path) -> Result<Session> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Malformed session {}", path.display()))
}

fn write_record(path: &Path, session: &Session) -> Result<()> {
    let json = serde_json::to_string_pretty(session)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, SessionStore) {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::open(tmp.path().join("sessions")).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_create_named_and_auto() {
        let (_tmp, mut s) = store();
        assert_eq!(s.create(Some("alpha")).unwrap(), "alpha");
        assert_eq!(s.current_session(), Some("alpha"));

        let auto = s.create(None).unwrap();
        assert!(auto.starts_with("session_"));
        assert_eq!(auto.len(), "session_20240101_120000".len());
    }

    #[test]
    fn test_create_rejects_path_names() {
        let (_tmp, mut s) = store();
        assert!(s.create(Some("../escape")).is_err());
        assert!(s.create(Some("a/b")).is_err());
        assert!(s.create(Some("")).is_err());
        assert!(s.create(Some(".hidden")).is_err());
    }

    #[test]
    fn test_create_resets_state() {
        let (_tmp, mut s) = store();
        s.create(Some("one")).unwrap();
        s.add_document("a.md", "/a.md", 2);
        s.add_conversation("q", "a", "m", Some(0.5));
        s.create(Some("two")).unwrap();
        assert!(s.documents().is_empty());
        assert!(s.conversation_history().is_empty());
        assert_eq!(s.session().model_used, None);
    }

    #[test]
    fn test_save_without_session_fails() {
        let (_tmp, mut s) = store();
        assert!(!s.save());
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let (_tmp, mut s) = store();
        assert!(!s.load("ghost"));
        std::fs::write(s.dir().join("broken.json"), "{not json").unwrap();
        assert!(!s.load("broken"));
        assert_eq!(s.current_session(), None);
        assert!(!s.load("../etc/passwd"));
    }

    #[test]
    fn test_save_refreshes_updated_at_and_leaves_no_tmp() {
        let (_tmp, mut s) = store();
        s.create(Some("keep")).unwrap();
        let created = s.session().created_at;
        assert!(s.save());
        assert!(s.session().updated_at >= created);
        assert!(s.dir().join("keep.json").exists());
        assert!(!s.dir().join("keep.json.tmp").exists());
    }

    #[test]
    fn test_list_sorted_json_only() {
        let (_tmp, mut s) = store();
        for name in ["zeta", "alpha", "mid"] {
            s.create(Some(name)).unwrap();
            assert!(s.save());
        }
        std::fs::write(s.dir().join("notes.txt"), "x").unwrap();
        assert_eq!(s.list(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_list_skips_unloadable_names() {
        let (_tmp, mut s) = store();
        s.create(Some("real")).unwrap();
        assert!(s.save());
        std::fs::write(s.dir().join(".hidden.json"), "{}").unwrap();
        std::fs::write(s.dir().join("has space.json"), "{}").unwrap();
        assert_eq!(s.list(), vec!["real"]);
        for id in s.list() {
            assert!(s.load(&id));
        }
    }

    #[test]
    fn test_delete_clears_current() {
        let (_tmp, mut s) = store();
        s.create(Some("gone")).unwrap();
        assert!(s.save());
        assert!(s.delete("gone"));
        assert_eq!(s.current_session(), None);
        assert!(!s.delete("gone"));
        assert!(s.list().is_empty());
    }

    #[test]
    fn test_add_conversation_tracks_model_and_order() {
        let (_tmp, mut s) = store();
        s.create(Some("chat")).unwrap();
        s.add_conversation("first", "one", "model-a", None);
        s.add_conversation("second", "two", "model-b", Some(0.8));
        let turns = s.conversation_history();
        assert_eq!(turns[0].question, "first");
        assert_eq!(turns[1].question, "second");
        assert_eq!(s.session().model_used.as_deref(), Some("model-b"));
    }

    #[test]
    fn test_summary_average_excludes_null() {
        let (_tmp, mut s) = store();
        s.create(Some("avg")).unwrap();
        assert_eq!(s.get_session_summary().average_quality_score, None);
        s.add_conversation("q1", "a1", "m", None);
        assert_eq!(s.get_session_summary().average_quality_score, None);
        s.add_conversation("q2", "a2", "m", Some(0.4));
        s.add_conversation("q3", "a3", "m", Some(0.8));
        let avg = s.get_session_summary().average_quality_score.unwrap();
        assert!((avg - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_export_unknown_session() {
        let (tmp, mut s) = store();
        assert!(!s.export("nope", &tmp.path().join("out.json"), ExportFormat::Json));
    }
}
