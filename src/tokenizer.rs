//! Tokenization: noise stripping, identifier filtering, and the worker
//! function that turns a chunk of files into a `PartialIndex`.
//!
//! This is a cross-language heuristic over word characters, not a lexer;
//! the same rules run over scripts and markup alike.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::config::TokenizerConfig;
use crate::index::PartialIndex;

/// Noise stripped before token extraction, in order: base64 payloads, then
/// quoted base64-ish runs, then quoted runs over a broader hash/key
/// alphabet. Matches are replaced with a single space, never deleted, so
/// adjacent identifiers cannot merge across a removed literal.
static NOISE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"base64,[A-Za-z0-9+/=]+").unwrap(),
        Regex::new(r#"["'`][A-Za-z0-9+/=]{40,}["'`]"#).unwrap(),
        Regex::new(r#"["'`][A-Za-z0-9_@#%$*^!<>?:;.,\\|~`-]{40,}["'`]"#).unwrap(),
    ]
});

/// Maximal word-character runs; boundaries are implicit because the class
/// is closed under itself.
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9_]+").unwrap());

/// Replace noisy non-code literals with spaces.
pub fn strip_noise(text: &str) -> String {
    let mut cleaned = text.to_string();
    for pattern in NOISE_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, " ").into_owned();
    }
    cleaned
}

/// Whether a word run is worth indexing as an identifier.
pub fn is_indexable_token(token: &str, config: &TokenizerConfig) -> bool {
    if token.len() < config.min_token_len || token.len() > config.max_token_len {
        return false;
    }
    match token.as_bytes().first() {
        Some(b'0'..=b'9') | Some(b'_') => return false,
        _ => {}
    }
    // A token with no lowercase letters reads as a constant, not an API name.
    if token == token.to_uppercase() {
        return false;
    }
    true
}

/// Resolve the owning project: the path segment immediately under the
/// extraction root. Files outside the root cannot be attributed.
pub fn project_for_path(path: &Path, sources_root: &Path) -> Option<String> {
    let relative = path.strip_prefix(sources_root).ok()?;
    match relative.components().next()? {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    }
}

/// Tokenize one chunk of files into a fresh `PartialIndex`.
///
/// Pure apart from reads: the worker owns its chunk, writes nothing shared,
/// and reports its result exactly once through the return value. Per-file
/// failures are logged and skipped; they never abort the chunk.
pub fn tokenize_files(
    files: &[PathBuf],
    sources_root: &Path,
    config: &TokenizerConfig,
) -> PartialIndex {
    let mut partial = PartialIndex::default();

    for path in files {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Skipping {}: stat failed: {}", path.display(), e);
                continue;
            }
        };
        if metadata.len() > config.max_file_size {
            debug!(
                "Skipping {}: {} bytes exceeds the {} byte ceiling",
                path.display(),
                metadata.len(),
                config.max_file_size
            );
            continue;
        }

        let Some(project) = project_for_path(path, sources_root) else {
            debug!("Skipping {}: not under the sources root", path.display());
            continue;
        };
        partial.observe_project(&project);

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping {}: read failed: {}", path.display(), e);
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        let cleaned = strip_noise(&text);

        // Dedupe within the file: fifty uses in one file count once.
        let mut seen: HashSet<&str> = HashSet::new();
        for run in WORD_RE.find_iter(&cleaned) {
            let token = run.as_str();
            if !is_indexable_token(token, config) {
                continue;
            }
            if seen.insert(token) {
                partial.insert(token.to_string(), &project);
            }
        }
    }

    partial
}
