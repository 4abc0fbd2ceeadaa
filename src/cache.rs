//! Freshness cache and change detection.
//!
//! The cache records, per project, the `updated_at` marker that was current
//! when the last index build completed. It is only rewritten after a
//! successful build, so a cache entry always means "this project's tokens
//! are in the artifact on disk".

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::error::Result;
use crate::index::write_atomic;
use crate::types::{Project, RunPlan};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FreshnessCache {
    entries: BTreeMap<String, DateTime<Utc>>,
}

impl FreshnessCache {
    /// Load the cache from disk. A missing file means no previous run; a
    /// corrupt file is logged and treated the same way, never made fatal.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str::<BTreeMap<String, DateTime<Utc>>>(&raw) {
            Ok(entries) => Self { entries },
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Persist the cache. Uses the same write-then-rename scheme as the
    /// index artifact so an interrupted run leaves the old cache intact.
    pub fn store(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.entries)?;
        write_atomic(path, &json)?;
        Ok(())
    }

    /// Build the marker set that a successful run over `projects` would
    /// record, restricted to projects that were actually materialized.
    pub fn from_projects<'a>(projects: impl IntoIterator<Item = &'a Project>) -> Self {
        let entries = projects
            .into_iter()
            .map(|p| (p.name.clone(), p.updated_at))
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Cached marker for a project name, if any.
    pub fn get(&self, name: &str) -> Option<&DateTime<Utc>> {
        self.entries.get(name)
    }

    /// Whether the cached marker for this project matches its current one.
    pub fn is_fresh(&self, project: &Project) -> bool {
        self.entries.get(&project.name) == Some(&project.updated_at)
    }

    /// Compare the cached markers against the current project list.
    ///
    /// `SkipAll` requires the name sets to be equal and every marker to
    /// match: a project that disappeared still invalidates the run, because
    /// project-id assignment in the compressed artifact depends on corpus
    /// membership.
    pub fn plan(&self, projects: &[Project]) -> RunPlan {
        if self.entries.is_empty() {
            return RunPlan::Process(projects.iter().map(|p| p.name.clone()).collect());
        }

        let stale: Vec<String> = projects
            .iter()
            .filter(|p| !self.is_fresh(p))
            .map(|p| p.name.clone())
            .collect();

        let membership_changed = self.entries.len() != projects.len();
        if stale.is_empty() && !membership_changed {
            RunPlan::SkipAll
        } else {
            RunPlan::Process(stale)
        }
    }
}
