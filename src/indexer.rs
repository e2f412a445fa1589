//! Background indexing of a codebase into the vector store.
//!
//! Walks a directory, chunks every code file, embeds the chunks in batches
//! and adds them to the store. Failures are counted per file or batch and
//! never abort the run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use walkdir::WalkDir;

use crate::backends::SemanticBackend;
use crate::chunking;
use crate::models::IndexedChunk;

/// Chunks embedded and stored per request.
const BATCH_SIZE: usize = 50;

/// Files larger than this are skipped.
const MAX_FILE_BYTES: u64 = 1_048_576;

/// A code file read from the indexed tree.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub relative_path: String,
    pub content: String,
    pub language: &'static str,
}

/// Summary of one indexing run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    pub path: String,
    pub files: usize,
    pub failed_files: usize,
    pub chunks: usize,
    pub indexed_chunks: usize,
    pub failed_batches: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// State of the most recent run, shared with `/stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IndexRun {
    Running {
        path: String,
        started_at: DateTime<Utc>,
    },
    Finished(IndexReport),
    Failed {
        path: String,
        error: String,
    },
}

#[derive(Debug, Default)]
pub struct IndexStatus {
    last: RwLock<Option<IndexRun>>,
}

impl IndexStatus {
    pub fn last_run(&self) -> Option<IndexRun> {
        self.last.read().clone()
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.last.read(), Some(IndexRun::Running { .. }))
    }

    /// Mark a run of `path` as started unless one is already running.
    pub fn try_begin(&self, path: &str) -> bool {
        let mut last = self.last.write();
        if matches!(*last, Some(IndexRun::Running { .. })) {
            return false;
        }
        *last = Some(IndexRun::Running {
            path: path.to_string(),
            started_at: Utc::now(),
        });
        true
    }

    fn set(&self, run: IndexRun) {
        *self.last.write() = Some(run);
    }
}

/// Index `root`, recording progress in `status`.
pub async fn run(root: PathBuf, semantic: SemanticBackend, use_treesitter: bool, status: &IndexStatus) {
    let path = root.display().to_string();
    let started_at = Utc::now();
    status.set(IndexRun::Running {
        path: path.clone(),
        started_at,
    });
    tracing::info!("Indexing {path}");

    let walked = tokio::task::spawn_blocking(move || {
        let (files, failed_files) = walk_code_files(&root);
        let chunks: Vec<IndexedChunk> = files
            .iter()
            .flat_map(|file| chunk_file(file, use_treesitter))
            .collect();
        (files.len(), failed_files, chunks)
    })
    .await;
    let (file_count, failed_files, chunks) = match walked {
        Ok(walked) => walked,
        Err(e) => {
            tracing::warn!("Walking {path} failed: {e}");
            status.set(IndexRun::Failed {
                path,
                error: e.to_string(),
            });
            return;
        }
    };

    let mut report = IndexReport {
        path: path.clone(),
        files: file_count,
        failed_files,
        chunks: chunks.len(),
        started_at: Some(started_at),
        ..Default::default()
    };
    tracing::info!("Chunked {} files into {} chunks", report.files, report.chunks);

    for (i, batch) in chunks.chunks(BATCH_SIZE).enumerate() {
        let first = i * BATCH_SIZE;
        match index_batch(&semantic, batch).await {
            Ok(()) => {
                report.indexed_chunks += batch.len();
                tracing::info!("Indexed chunks {}-{}/{}", first + 1, first + batch.len(), report.chunks);
            }
            Err(e) => {
                report.failed_batches += 1;
                tracing::warn!("Failed to index chunks {}-{}: {e:#}", first + 1, first + batch.len());
            }
        }
    }

    report.finished_at = Some(Utc::now());
    tracing::info!(
        "Indexing of {path} complete: {} chunks indexed, {} failed batches, {} unreadable files",
        report.indexed_chunks,
        report.failed_batches,
        report.failed_files
    );
    status.set(IndexRun::Finished(report));
}

async fn index_batch(semantic: &SemanticBackend, batch: &[IndexedChunk]) -> anyhow::Result<()> {
    let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
    let embeddings = semantic.embedder.embed_batch(&texts).await?;
    semantic.store.add(batch, &embeddings).await
}

/// Chunk one file into storable chunks.
///
/// Ids depend only on path and line range, so re-indexing an unchanged tree
/// adds nothing new to the store.
pub fn chunk_file(file: &SourceFile, use_treesitter: bool) -> Vec<IndexedChunk> {
    chunking::chunk_code(&file.content, file.language, use_treesitter)
        .into_iter()
        .map(|chunk| IndexedChunk {
            id: chunk_id(&file.relative_path, chunk.start_line, chunk.end_line),
            file_name: file.relative_path.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            kind: chunk.kind,
            language: file.language.to_string(),
            content: chunk.content,
        })
        .collect()
}

/// Stable id for the lines `start..=end` of `path`.
pub fn chunk_id(path: &str, start: usize, end: usize) -> String {
    let key = format!("{path}:{start}-{end}");
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
}

/// Every code file under `root`, and the number that could not be read.
pub fn walk_code_files(root: &Path) -> (Vec<SourceFile>, usize) {
    let mut files = Vec::new();
    let mut failed = 0;

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden_or_ignored(e))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(language) = code_language(path) else {
            continue;
        };
        if entry.metadata().map(|m| m.len() > MAX_FILE_BYTES).unwrap_or(false) {
            tracing::debug!("Skipping large file {}", path.display());
            continue;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => files.push(SourceFile {
                relative_path: path
                    .strip_prefix(root)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .to_string(),
                content,
                language,
            }),
            Err(e) => {
                failed += 1;
                tracing::warn!("Failed to read {}: {e}", path.display());
            }
        }
    }

    (files, failed)
}

fn is_hidden_or_ignored(entry: &walkdir::DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.')
        || matches!(
            name.as_ref(),
            "node_modules" | "target" | "dist" | "build" | "__pycache__" | "vendor" | "venv"
        )
}

/// Language tag for a code file, or None for anything that is not code.
fn code_language(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    let language = match ext.as_str() {
        "go" => "go",
        "js" | "jsx" => "javascript",
        "ts" => "typescript",
        "tsx" => "tsx",
        "py" => "python",
        "rs" => "rust",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" => "kotlin",
        "scala" => "scala",
        _ => return None,
    };
    Some(language)
}
