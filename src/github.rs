//! GitHub discovery: lists the game catalog and builds `Project` records
//! from per-repo metadata.

use chrono::{DateTime, Datelike, Utc};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::GithubConfig;
use crate::error::{JamdexError, Result};
use crate::types::Project;

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    name: String,
    default_branch: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    pushed_at: DateTime<Utc>,
    parent: Option<ParentRepo>,
}

#[derive(Debug, Deserialize)]
struct ParentRepo {
    full_name: String,
    stargazers_count: u32,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    rate: RateWindow,
}

#[derive(Debug, Deserialize)]
struct RateWindow {
    limit: u32,
    remaining: u32,
}

/// Client for the GitHub REST API, authenticated with a bearer credential.
pub struct GithubClient {
    client: reqwest::Client,
    config: GithubConfig,
}

impl GithubClient {
    /// Build a client. Fails before any network call when the credential is
    /// missing.
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let token = config.token.as_deref().ok_or_else(|| {
            JamdexError::config("GITHUB_TOKEN environment variable is not set")
        })?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| JamdexError::config("GITHUB_TOKEN contains invalid characters"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("jamdex/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// List the game directories of the catalog repository.
    pub async fn list_catalog(&self) -> Result<Vec<String>> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.config.api_root, self.config.org, self.config.catalog_repo, self.config.catalog_branch
        );
        info!(
            "Fetching directory tree from {}/{}...",
            self.config.org, self.config.catalog_repo
        );

        let response: TreeResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Top-level directories under "games/" name one game each.
        let names: Vec<String> = response
            .tree
            .iter()
            .filter(|entry| entry.kind == "tree")
            .filter_map(|entry| entry.path.strip_prefix("games/"))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            return Err(JamdexError::response("catalog tree lists no game directories"));
        }
        Ok(names)
    }

    /// Fetch metadata for every named repo with bounded concurrency.
    /// Non-forks and per-repo request failures are logged and skipped; the
    /// result is sorted by stars descending.
    pub async fn fetch_projects(&self, names: &[String]) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = stream::iter(names)
            .map(|name| self.fetch_project(name))
            .buffer_unordered(self.config.api_concurrency.max(1))
            .filter_map(futures::future::ready)
            .collect()
            .await;

        projects.sort_by(|a, b| b.stars.cmp(&a.stars).then_with(|| a.name.cmp(&b.name)));
        Ok(projects)
    }

    async fn fetch_project(&self, name: &str) -> Option<Project> {
        match self.try_fetch_project(name).await {
            Ok(project) => project,
            Err(e) => {
                warn!("Error fetching metadata for '{}': {}", name, e);
                None
            }
        }
    }

    async fn try_fetch_project(&self, name: &str) -> Result<Option<Project>> {
        let url = format!("{}/repos/{}/{}", self.config.api_root, self.config.org, name);
        let repo: RepoResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Only forks carry an upstream to attribute stars and author to.
        let Some(parent) = repo.parent else {
            debug!("Skipping orphaned '{}'", name);
            return Ok(None);
        };

        let year = publication_year(&repo.name, repo.description.as_deref(), repo.created_at);
        Ok(Some(Project {
            owner: owner_of(&parent.full_name).to_string(),
            stars: parent.stargazers_count,
            year,
            name: repo.name,
            default_branch: repo.default_branch,
            updated_at: repo.pushed_at,
        }))
    }

    /// Log the current API quota; best-effort only.
    pub async fn log_rate_limit(&self) {
        let url = format!("{}/rate_limit", self.config.api_root);
        let result: std::result::Result<RateLimitResponse, reqwest::Error> = async {
            self.client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        }
        .await;

        match result {
            Ok(response) => info!(
                "GitHub API rate limit: {}/{} remaining",
                response.rate.remaining, response.rate.limit
            ),
            Err(e) => warn!("Could not fetch GitHub API rate limit: {}", e),
        }
    }
}

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(20\d{2})\b").unwrap());

/// Account segment of an "owner/repo" name.
fn owner_of(full_name: &str) -> &str {
    full_name.split('/').next().unwrap_or("unknown")
}

/// Recover the publication year: prefer a year in the description that is
/// not already part of the repo name, then any year in the description,
/// then the creation date.
fn publication_year(name: &str, description: Option<&str>, created_at: DateTime<Utc>) -> i32 {
    if let Some(description) = description {
        let candidates: Vec<&str> = YEAR_RE
            .find_iter(description)
            .map(|m| m.as_str())
            .collect();
        for candidate in &candidates {
            if !name.contains(candidate) {
                if let Ok(year) = candidate.parse() {
                    return year;
                }
            }
        }
        if let Some(first) = candidates.first() {
            if let Ok(year) = first.parse() {
                return year;
            }
        }
    }
    created_at.year()
}
