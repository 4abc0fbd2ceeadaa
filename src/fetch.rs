//! Archive download and extraction.
//!
//! Both stages run with bounded concurrency; a failure on one project is
//! logged and skipped without cancelling its siblings. Downloads are
//! incremental per project: an archive is only re-fetched when the cached
//! freshness marker disagrees with the current one.

use flate2::read::GzDecoder;
use futures::stream::{self, StreamExt};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cache::FreshnessCache;
use crate::config::IndexConfig;
use crate::error::Result;
use crate::types::Project;

/// Download the source tarball of every project that needs one. Returns the
/// number of archives present afterwards.
pub async fn download_all(
    config: &IndexConfig,
    projects: &[Project],
    cache: &FreshnessCache,
) -> Result<usize> {
    tokio::fs::create_dir_all(config.archives_dir()).await?;
    let client = reqwest::Client::new();

    let results: Vec<bool> = stream::iter(projects)
        .map(|project| download_project(&client, config, project, cache))
        .buffer_unordered(config.fetch.concurrency.max(1))
        .collect()
        .await;

    Ok(results.into_iter().filter(|ok| *ok).count())
}

async fn download_project(
    client: &reqwest::Client,
    config: &IndexConfig,
    project: &Project,
    cache: &FreshnessCache,
) -> bool {
    let archive = archive_path(config, &project.name);

    // A cached marker that disagrees with the current one forces a
    // re-download; otherwise an existing archive is reused as-is, which is
    // also what lets an interrupted first run resume.
    let known_stale = cache
        .get(&project.name)
        .is_some_and(|marker| *marker != project.updated_at);
    if archive.exists() && !known_stale {
        return true;
    }

    let url = format!(
        "{}/{}/{}/tar.gz/refs/heads/{}",
        config.fetch.archive_root, config.github.org, project.name, project.default_branch
    );
    info!("Downloading: {}", project.name);

    let result = async {
        let bytes = client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok::<_, reqwest::Error>(bytes)
    }
    .await;

    match result {
        Ok(bytes) => match tokio::fs::write(&archive, &bytes).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to store archive for {}: {}", project.name, e);
                let _ = tokio::fs::remove_file(&archive).await;
                false
            }
        },
        Err(e) => {
            warn!("Failed to download {}: {}", project.name, e);
            let _ = tokio::fs::remove_file(&archive).await;
            false
        }
    }
}

/// Extract every downloaded archive into its own source tree. Returns the
/// number of source trees present afterwards.
pub async fn extract_all(
    config: &IndexConfig,
    projects: &[Project],
    cache: &FreshnessCache,
) -> Result<usize> {
    tokio::fs::create_dir_all(config.sources_dir()).await?;

    let results: Vec<bool> = stream::iter(projects)
        .map(|project| extract_project(config, project, cache))
        .buffer_unordered(config.fetch.concurrency.max(1))
        .collect()
        .await;

    Ok(results.into_iter().filter(|ok| *ok).count())
}

async fn extract_project(config: &IndexConfig, project: &Project, cache: &FreshnessCache) -> bool {
    let archive = archive_path(config, &project.name);
    let dest = config.sources_dir().join(&project.name);

    if !archive.exists() {
        warn!("Archive for {} not found, skipping extraction", project.name);
        return false;
    }

    let known_stale = cache
        .get(&project.name)
        .is_some_and(|marker| *marker != project.updated_at);
    if dest.is_dir() && !known_stale {
        return true;
    }
    if dest.exists() {
        if let Err(e) = tokio::fs::remove_dir_all(&dest).await {
            warn!("Could not clear {}: {}", dest.display(), e);
            return false;
        }
    }

    info!("Extracting: {}", project.name);
    let extensions = config.fetch.source_extensions.clone();
    let task_archive = archive.clone();
    let task_dest = dest.clone();
    let unpacked = tokio::task::spawn_blocking(move || {
        unpack_archive(&task_archive, &task_dest, &extensions)
    })
    .await;

    match unpacked {
        Ok(Ok(count)) => {
            debug!("Extracted {} source files for {}", count, project.name);
            true
        }
        Ok(Err(e)) => {
            warn!("Failed to extract {}: {}", project.name, e);
            let _ = tokio::fs::remove_dir_all(&dest).await;
            false
        }
        Err(e) => {
            warn!("Extraction task for {} did not complete: {}", project.name, e);
            let _ = tokio::fs::remove_dir_all(&dest).await;
            false
        }
    }
}

fn archive_path(config: &IndexConfig, name: &str) -> PathBuf {
    config.archives_dir().join(format!("{}.tar.gz", name))
}

/// Unpack a branch tarball into `dest`, stripping the tarball's top-level
/// directory and materializing only regular files whose extension is in
/// `extensions`. Symlinks, `node_modules/` trees, and path-traversing
/// entries are dropped.
fn unpack_archive(archive: &Path, dest: &Path, extensions: &[String]) -> std::io::Result<usize> {
    let file = std::fs::File::open(archive)?;
    let mut reader = tar::Archive::new(GzDecoder::new(file));

    let mut count = 0usize;
    for entry in reader.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let relative: PathBuf = entry.path()?.components().skip(1).collect();
        if relative.as_os_str().is_empty() {
            continue;
        }
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir) || c.as_os_str() == "node_modules")
        {
            continue;
        }
        if !has_wanted_extension(&relative, extensions) {
            continue;
        }

        let out = dest.join(&relative);
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&out)?;
        count += 1;
    }
    Ok(count)
}

fn has_wanted_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .is_some_and(|ext| extensions.iter().any(|wanted| *wanted == ext))
}
