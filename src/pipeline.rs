//! The indexing phase: walk the extracted sources, partition the file list,
//! run tokenizer workers in parallel, aggregate, compress, and write.

use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::IndexConfig;
use crate::error::{JamdexError, Result};
use crate::index::{compress, merge, CompressedIndex, PartialIndex};
use crate::tokenizer::tokenize_files;

/// Summary of one index build.
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub files: usize,
    pub projects: usize,
    pub tokens_seen: usize,
    pub tokens_kept: usize,
    pub duration_ms: u64,
}

/// Split `items` into `parts` chunks whose sizes differ by at most one,
/// covering the input exactly once and preserving order across the
/// concatenation. Chunking is by item count, not by byte size; a chunk with
/// a few very large files can dominate runtime.
pub fn split_chunks<T>(items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    let parts = parts.max(1);
    let total = items.len();
    let base = total / parts;
    let extra = total % parts;

    let mut chunks = Vec::with_capacity(parts);
    let mut remaining = items.into_iter();
    for i in 0..parts {
        let size = base + usize::from(i < extra);
        chunks.push(remaining.by_ref().take(size).collect());
    }
    chunks
}

/// Collect every file under the extraction root. Unreadable entries are
/// logged and skipped. Sorted so chunk assignment is reproducible.
pub fn collect_source_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable directory entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort_unstable();
    files
}

/// Run the full tokenization phase and write the compressed artifact.
///
/// Workers are a fixed pool of blocking tasks, one chunk each, joined once;
/// aggregation after the join is single-threaded. A worker that dies fails
/// the whole phase and nothing is written, since a missing chunk would
/// silently break the coverage guarantee of the merged index.
pub async fn build_index(config: &IndexConfig) -> Result<(CompressedIndex, IndexStats)> {
    let start = Instant::now();
    let sources_root = config.sources_dir();

    let files = collect_source_files(&sources_root);
    let file_count = files.len();
    info!(
        "Found {} source files under {}",
        file_count,
        sources_root.display()
    );

    let worker_count = config.tokenizer.worker_count.max(1);
    info!("Tokenizing across {} workers...", worker_count);

    let mut handles = Vec::with_capacity(worker_count);
    for chunk in split_chunks(files, worker_count) {
        let root = sources_root.clone();
        let tokenizer_config = config.tokenizer.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            tokenize_files(&chunk, &root, &tokenizer_config)
        }));
    }

    let mut partials: Vec<PartialIndex> = Vec::with_capacity(handles.len());
    for handle in handles {
        let partial = handle.await.map_err(|e| JamdexError::WorkerFailed {
            message: e.to_string(),
        })?;
        partials.push(partial);
    }

    info!("Aggregating results from {} workers...", partials.len());
    let global = merge(partials);
    let compressed = compress(&global, config.tokenizer.min_project_count);
    compressed.write(&config.tokens_file())?;

    let stats = IndexStats {
        files: file_count,
        projects: global.projects.len(),
        tokens_seen: global.tokens.len(),
        tokens_kept: compressed.tokens.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Saved token index to {} ({} of {} tokens kept)",
        config.tokens_file().display(),
        stats.tokens_kept,
        stats.tokens_seen
    );

    Ok((compressed, stats))
}
