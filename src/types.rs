//! Core records shared across pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One analyzed game project. Built fresh from GitHub metadata on every
/// discovery run; immutable for the rest of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// Account owning the upstream (pre-fork) repository.
    pub owner: String,
    /// Star count of the upstream repository.
    pub stars: u32,
    /// Publication year, recovered from the repo description or creation date.
    pub year: i32,
    pub default_branch: String,
    /// Last-push marker consulted by the change detector.
    pub updated_at: DateTime<Utc>,
}

/// Outcome of comparing the freshness cache against the current project list.
#[derive(Debug, Clone, PartialEq)]
pub enum RunPlan {
    /// Nothing changed anywhere; the previous artifact stands.
    SkipAll,
    /// Names of projects whose marker changed or that are new. Downloads are
    /// needed only for these; tokenization reruns over the full corpus. The
    /// list can be empty when corpus membership shrank but every surviving
    /// marker still matches.
    Process(Vec<String>),
}
