//! Local document loading.
//!
//! `gate docs add` accepts files and directories. Directories are walked
//! with `walkdir` and filtered through include/exclude glob sets;
//! explicit files only need a supported extension. Text formats are read
//! as UTF-8; PDF, DOCX and XLSX go through [`crate::extract`] first. The
//! text is then cut into passages with the core chunker.
//!
//! At question time [`build_retriever`] re-reads every document in a
//! session's manifest and indexes the passages with the configured
//! backend. Documents that have since disappeared are skipped with a
//! warning.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use answer_gate_core::chunk::chunk_text;
use answer_gate_core::collab::embedding::EmbeddingRetriever;
use answer_gate_core::collab::memory::InMemoryRetriever;
use answer_gate_core::collab::Retriever;
use answer_gate_core::models::SourcePassage;

use crate::config::Config;
use crate::embedding::OpenAiEmbedder;
use crate::extract;
use crate::session::{DocumentEntry, SessionStore};

/// Text formats read directly, followed by the extracted binary formats.
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "md", "markdown", "txt", "rst", "text", "csv", "pdf", "docx", "xlsx",
];

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// A document read from disk and cut into passages.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub name: String,
    pub path: PathBuf,
    pub passages: Vec<SourcePassage>,
}

/// Expand `inputs` into a sorted, de-duplicated list of supported files.
pub fn collect_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(
        &SUPPORTED_EXTENSIONS
            .iter()
            .map(|ext| format!("**/*.{}", ext))
            .collect::<Vec<_>>(),
    )?;
    let exclude_set = build_globset(
        &DEFAULT_EXCLUDES
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>(),
    )?;

    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            if !is_supported(input) {
                bail!(
                    "Unsupported file type: {} (supported: {})",
                    input.display(),
                    SUPPORTED_EXTENSIONS.join(", ")
                );
            }
            files.push(input.clone());
            continue;
        }
        if !input.is_dir() {
            bail!("Path does not exist: {}", input.display());
        }

        for entry in WalkDir::new(input) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(input).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Read and chunk one file.
pub fn load_document(path: &Path, max_tokens: usize) -> Result<LoadedDocument> {
    let kind = file_kind(path);
    let body = if extract::is_binary_kind(&kind) {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read document: {}", path.display()))?;
        extract::extract_text(&bytes, &kind)
            .with_context(|| format!("Failed to extract text from {}", path.display()))?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read document: {}", path.display()))?
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let passages = chunk_text(&name, &kind, &body, max_tokens);
    tracing::debug!(document = %name, passages = passages.len(), "chunked document");

    Ok(LoadedDocument {
        name,
        path: path.to_path_buf(),
        passages,
    })
}

/// Re-read and chunk every document in a session's manifest.
pub fn load_passages(documents: &[DocumentEntry], max_tokens: usize) -> Vec<SourcePassage> {
    let mut passages = Vec::new();
    for doc in documents {
        match load_document(Path::new(&doc.path), max_tokens) {
            Ok(loaded) => {
                if loaded.passages.len() != doc.chunk_count {
                    tracing::debug!(
                        document = %doc.name,
                        recorded = doc.chunk_count,
                        current = loaded.passages.len(),
                        "document changed since it was added"
                    );
                }
                passages.extend(loaded.passages);
            }
            Err(e) => {
                tracing::warn!(document = %doc.name, error = %format!("{:#}", e), "skipping document");
            }
        }
    }
    passages
}

/// Build the passage index for a session's manifest with the configured
/// `retrieval.backend`.
///
/// | Backend | Retriever |
/// |---------|-----------|
/// | `"keyword"` | [`InMemoryRetriever`] (term overlap, offline) |
/// | `"embedding"` | [`EmbeddingRetriever`] over [`OpenAiEmbedder`] |
pub async fn build_retriever(
    config: &Config,
    documents: &[DocumentEntry],
) -> Result<Box<dyn Retriever>> {
    let passages = load_passages(documents, config.chunking.max_tokens);
    match config.retrieval.backend.as_str() {
        "keyword" => Ok(Box::new(InMemoryRetriever::with_passages(passages))),
        "embedding" => {
            let retriever = EmbeddingRetriever::new(OpenAiEmbedder::new(&config.embedding)?);
            retriever
                .index(passages)
                .await
                .context("Failed to embed session documents")?;
            Ok(Box::new(retriever))
        }
        other => bail!("Unknown retrieval backend: {}", other),
    }
}

/// `gate docs add`: chunk each file and append it to the session manifest.
pub fn run_add_docs(config: &Config, session_id: &str, inputs: &[PathBuf]) -> Result<()> {
    let mut store = SessionStore::open(&config.session.dir)?;
    if !store.load(session_id) {
        bail!("Session not found: {}", session_id);
    }

    let files = collect_files(inputs)?;
    if files.is_empty() {
        println!("No supported documents found.");
        return Ok(());
    }

    let mut total_chunks = 0;
    for file in &files {
        let absolute = std::fs::canonicalize(file)
            .with_context(|| format!("Failed to resolve path: {}", file.display()))?;
        let doc = load_document(&absolute, config.chunking.max_tokens)?;
        println!("  {} ({} chunks)", doc.name, doc.passages.len());
        total_chunks += doc.passages.len();
        store.add_document(
            &doc.name,
            &absolute.to_string_lossy(),
            doc.passages.len(),
        );
    }

    if !store.save() {
        bail!("Failed to save session '{}'", session_id);
    }
    println!(
        "Added {} documents ({} chunks) to session '{}'.",
        files.len(),
        total_chunks,
        session_id
    );
    Ok(())
}

fn is_supported(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&file_kind(path).as_str())
}

fn file_kind(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("docs/nested")).unwrap();
        fs::create_dir_all(root.join("docs/.git")).unwrap();
        fs::write(root.join("docs/a.md"), "Alpha notes.\n\nMore alpha.").unwrap();
        fs::write(root.join("docs/nested/b.txt"), "Beta text.").unwrap();
        fs::write(root.join("docs/image.png"), [0u8, 1, 2]).unwrap();
        fs::write(root.join("docs/.git/c.md"), "ignored").unwrap();
        tmp
    }

    #[test]
    fn test_collect_walks_and_filters() {
        let tmp = tree();
        let files = collect_files(&[tmp.path().join("docs")]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
    }

    #[test]
    fn test_collect_rejects_unsupported_file() {
        let tmp = tree();
        assert!(collect_files(&[tmp.path().join("docs/image.png")]).is_err());
        assert!(collect_files(&[tmp.path().join("missing")]).is_err());
    }

    #[test]
    fn test_collect_dedups_overlapping_inputs() {
        let tmp = tree();
        let docs = tmp.path().join("docs");
        let files = collect_files(&[docs.clone(), docs.join("a.md")]).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_load_document_tags_passages() {
        let tmp = tree();
        let doc = load_document(&tmp.path().join("docs/a.md"), 250).unwrap();
        assert_eq!(doc.name, "a.md");
        assert_eq!(doc.passages.len(), 1);
        assert_eq!(doc.passages[0].metadata.document_id, "a.md");
        assert_eq!(doc.passages[0].metadata.file_kind, "md");
    }

    #[test]
    fn test_collect_accepts_binary_formats() {
        let tmp = tree();
        let docs = tmp.path().join("docs");
        fs::write(docs.join("report.docx"), crate::extract::tests::docx_bytes(&["x"])).unwrap();
        fs::write(docs.join("data.csv"), "region,sales\nnorth,42\n").unwrap();
        let files = collect_files(&[docs]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "data.csv", "b.txt", "report.docx"]);
    }

    #[test]
    fn test_load_docx_document() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Guide.DOCX");
        let bytes = crate::extract::tests::docx_bytes(&[
            "Tokio schedules async tasks.",
            "Idle workers steal queued work.",
        ]);
        fs::write(&path, bytes).unwrap();

        let doc = load_document(&path, 250).unwrap();
        assert_eq!(doc.name, "Guide.DOCX");
        assert_eq!(doc.passages.len(), 1);
        assert_eq!(doc.passages[0].metadata.file_kind, "docx");
        assert!(doc.passages[0].content.contains("Idle workers steal queued work."));
    }

    #[test]
    fn test_load_corrupt_binary_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.pdf");
        fs::write(&path, b"not a pdf").unwrap();
        let err = load_document(&path, 250).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to extract text"));
    }

    #[tokio::test]
    async fn test_build_retriever_skips_missing() {
        let tmp = tree();
        let entry = |name: &str, path: PathBuf| DocumentEntry {
            name: name.to_string(),
            path: path.to_string_lossy().to_string(),
            chunk_count: 1,
            loaded_at: Utc::now(),
        };
        let docs = vec![
            entry("a.md", tmp.path().join("docs/a.md")),
            entry("gone.md", tmp.path().join("docs/gone.md")),
        ];
        assert_eq!(load_passages(&docs, 250).len(), 1);

        let retriever = build_retriever(&Config::default(), &docs).await.unwrap();
        let hits = retriever.search("alpha", 4).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_build_retriever_rejects_unknown_backend() {
        let mut config = Config::default();
        config.retrieval.backend = "faiss".to_string();
        assert!(build_retriever(&config, &[]).await.is_err());
    }
}
