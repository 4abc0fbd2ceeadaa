//! Index aggregation, compression, and artifact writing.
//!
//! Workers each produce a `PartialIndex`; merging is a pure union-of-sets
//! fold, so the merged result does not depend on worker count, chunk
//! boundaries, or completion order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// Token -> project-name mapping scoped to one worker's chunk, plus the set
/// of projects that worker saw. Produced once, never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct PartialIndex {
    pub tokens: HashMap<String, HashSet<String>>,
    pub projects: HashSet<String>,
}

impl PartialIndex {
    /// Record that `project` uses `token`.
    pub fn insert(&mut self, token: String, project: &str) {
        self.tokens
            .entry(token)
            .or_default()
            .insert(project.to_string());
    }

    pub fn observe_project(&mut self, project: &str) {
        self.projects.insert(project.to_string());
    }
}

/// Union of all partial indexes for one run.
#[derive(Debug, Clone, Default)]
pub struct GlobalIndex {
    pub tokens: HashMap<String, HashSet<String>>,
    pub projects: HashSet<String>,
}

/// Merge partial indexes into one global index. Set union is commutative
/// and associative, so any input order yields the same result.
pub fn merge(partials: impl IntoIterator<Item = PartialIndex>) -> GlobalIndex {
    let mut global = GlobalIndex::default();
    for partial in partials {
        global.projects.extend(partial.projects);
        for (token, projects) in partial.tokens {
            global.tokens.entry(token).or_default().extend(projects);
        }
    }
    global
}

/// One `[token, [project ids]]` entry of the persisted artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenEntry(pub String, pub Vec<u32>);

/// The persisted artifact: project names replaced by integer ids, tokens
/// below the project-count threshold removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressedIndex {
    pub repos: Vec<String>,
    pub tokens: Vec<TokenEntry>,
}

impl CompressedIndex {
    /// Serialize and atomically replace the artifact at `path`: on any
    /// failure the previous artifact is left untouched.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        write_atomic(path, &json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Project names referenced by a token entry, decoded back from ids.
    pub fn projects_for(&self, entry: &TokenEntry) -> Vec<&str> {
        entry
            .1
            .iter()
            .filter_map(|&id| self.repos.get(id as usize))
            .map(String::as_str)
            .collect()
    }
}

/// Compress a global index.
///
/// Ids are assigned by lexicographic project-name order and recomputed fresh
/// on every run; corpus membership can change between runs, so cached ids
/// would go stale. Token entries are sorted by token so the artifact diffs
/// cleanly.
pub fn compress(index: &GlobalIndex, min_project_count: usize) -> CompressedIndex {
    let repos: Vec<String> = index
        .projects
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let id_of: HashMap<&str, u32> = repos
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i as u32))
        .collect();

    let mut tokens: Vec<TokenEntry> = index
        .tokens
        .iter()
        .filter(|(_, projects)| projects.len() >= min_project_count)
        .map(|(token, projects)| {
            let mut ids: Vec<u32> = projects
                .iter()
                .filter_map(|name| id_of.get(name.as_str()).copied())
                .collect();
            ids.sort_unstable();
            TokenEntry(token.clone(), ids)
        })
        .collect();
    tokens.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    CompressedIndex { repos, tokens }
}

/// Write `bytes` to `path` through a sibling temp file and a rename, so the
/// caller observes either the old content or the complete new content.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)
}
