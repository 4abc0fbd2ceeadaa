//! Stage application: one method per CLI stage, each checking its
//! prerequisites before doing any work.

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::cache::FreshnessCache;
use crate::config::IndexConfig;
use crate::fetch;
use crate::github::GithubClient;
use crate::index::write_atomic;
use crate::pipeline;
use crate::types::{Project, RunPlan};

pub struct CliApp {
    config: IndexConfig,
}

impl CliApp {
    pub fn new(config: IndexConfig) -> Self {
        Self { config }
    }

    /// Stage 1: discover game projects and write `games.json`.
    pub async fn games(&self) -> Result<()> {
        info!("--- Stage 1: discovering game projects ---");
        let client =
            GithubClient::new(&self.config.github).context("Failed to create GitHub client")?;

        client.log_rate_limit().await;
        let names = client
            .list_catalog()
            .await
            .context("Failed to list the game catalog")?;
        info!(
            "Found {} candidate game repos; fetching metadata...",
            names.len()
        );

        let projects = client.fetch_projects(&names).await?;

        std::fs::create_dir_all(&self.config.work_dir)?;
        let json = serde_json::to_vec_pretty(&projects)?;
        write_atomic(&self.config.games_file(), &json)
            .context("Failed to write the games file")?;
        info!(
            "Saved {} games to {}",
            projects.len(),
            self.config.games_file().display()
        );
        client.log_rate_limit().await;
        Ok(())
    }

    /// Stage 2: download one source archive per listed game.
    pub async fn fetch(&self) -> Result<()> {
        info!("--- Stage 2: downloading game sources ---");
        if self.config.github.token.is_none() {
            bail!("GITHUB_TOKEN environment variable is not set");
        }
        let projects = self.load_games()?;
        let cache = FreshnessCache::load(&self.config.cache_file());

        let present = fetch::download_all(&self.config, &projects, &cache).await?;
        info!(
            "Download complete: {}/{} archives present under {}",
            present,
            projects.len(),
            self.config.archives_dir().display()
        );
        Ok(())
    }

    /// Stage 3: extract downloaded archives into per-game source trees.
    pub async fn extract(&self) -> Result<()> {
        info!("--- Stage 3: extracting game sources ---");
        let projects = self.load_games()?;

        let archives = self.config.archives_dir();
        if dir_is_empty(&archives) {
            bail!(
                "{} is empty or missing. Run the 'fetch' stage first.",
                archives.display()
            );
        }

        let cache = FreshnessCache::load(&self.config.cache_file());
        let present = fetch::extract_all(&self.config, &projects, &cache).await?;
        info!(
            "Extraction complete: {}/{} source trees present under {}",
            present,
            projects.len(),
            self.config.sources_dir().display()
        );
        Ok(())
    }

    /// Stage 4: tokenize the extracted sources and write `tokens.json`.
    pub async fn index(&self) -> Result<()> {
        info!("--- Stage 4: building the token index ---");
        let projects = self.load_games()?;

        let sources = self.config.sources_dir();
        if dir_is_empty(&sources) {
            bail!(
                "{} is empty or missing. Run the 'extract' stage first.",
                sources.display()
            );
        }

        let cache = FreshnessCache::load(&self.config.cache_file());
        match cache.plan(&projects) {
            RunPlan::SkipAll if self.config.tokens_file().exists() => {
                info!(
                    "No project changed since the last run; {} left untouched",
                    self.config.tokens_file().display()
                );
                return Ok(());
            }
            RunPlan::SkipAll => {
                info!(
                    "Cache is fresh but {} is missing; rebuilding",
                    self.config.tokens_file().display()
                );
            }
            RunPlan::Process(stale) if !stale.is_empty() => {
                info!("{} project(s) changed since the last run", stale.len());
            }
            RunPlan::Process(_) => {}
        }

        let (_, stats) = pipeline::build_index(&self.config).await?;
        info!(
            "Indexed {} files across {} projects in {} ms",
            stats.files, stats.projects, stats.duration_ms
        );

        // Record freshness only for projects whose sources were actually on
        // disk for this build; everything else stays stale.
        let materialized: Vec<&Project> = projects
            .iter()
            .filter(|p| sources.join(&p.name).is_dir())
            .collect();
        FreshnessCache::from_projects(materialized)
            .store(&self.config.cache_file())
            .context("Failed to write the freshness cache")?;
        Ok(())
    }

    fn load_games(&self) -> Result<Vec<Project>> {
        let path = self.config.games_file();
        let raw = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "{} not found. Run the 'games' stage first.",
                path.display()
            )
        })?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

fn dir_is_empty(path: &std::path::Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}
