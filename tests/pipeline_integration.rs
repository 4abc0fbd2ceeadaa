// Integration tests for the tokenization pipeline and its caching layer.
use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use std::path::Path;
use tempfile::TempDir;

use jamdex::{
    build_index, collect_source_files, merge, split_chunks, CliApp, CompressedIndex,
    FreshnessCache, GlobalIndex, IndexConfig, Project, RunPlan, TokenEntry, VERSION,
};
use jamdex::tokenizer::tokenize_files;

fn write_source(work: &Path, project: &str, file: &str, contents: &str) {
    let dir = work.join("sources").join(project);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(file), contents).unwrap();
}

fn project(name: &str, hour: u32) -> Project {
    Project {
        name: name.to_string(),
        owner: "owner".to_string(),
        stars: 5,
        year: 2021,
        default_branch: "main".to_string(),
        updated_at: Utc.with_ymd_and_hms(2021, 9, 13, hour, 0, 0).unwrap(),
    }
}

fn write_games(work: &Path, projects: &[Project]) {
    let json = serde_json::to_vec_pretty(projects).unwrap();
    std::fs::write(work.join("games.json"), json).unwrap();
}

fn tokenize_whole(work: &Path) -> GlobalIndex {
    let config = IndexConfig::new(work);
    let sources = config.sources_dir();
    let files = collect_source_files(&sources);
    merge(vec![tokenize_files(&files, &sources, &config.tokenizer)])
}

#[test]
fn test_public_api_exports() {
    let _version: &str = VERSION;
    let _config: IndexConfig = IndexConfig::default();
    let _cache: FreshnessCache = FreshnessCache::default();
    let _plan: RunPlan = RunPlan::SkipAll;
    let _entry = TokenEntry("draw".to_string(), vec![0, 1]);
}

#[tokio::test]
async fn test_idempotent_across_worker_counts() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "alpha", "main.js", "let fetchData = 1; render(); spawnWave();");
    write_source(dir.path(), "beta", "app.js", "fetchData(); render(); let physicsStep = 0;");
    write_source(dir.path(), "gamma", "index.html", "<script>render(); spawnWave();</script>");

    let mut outputs = Vec::new();
    for workers in [1, 2, 8] {
        let mut config = IndexConfig::new(dir.path());
        config.tokenizer.worker_count = workers;
        build_index(&config).await.unwrap();
        outputs.push(std::fs::read_to_string(config.tokens_file()).unwrap());
    }

    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[1], outputs[2]);
}

#[tokio::test]
async fn test_merge_of_chunks_equals_whole_set() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "alpha", "a.js", "tick(); tock(); shared();");
    write_source(dir.path(), "beta", "b.js", "shared(); let uniqueBeta = 2;");
    write_source(dir.path(), "gamma", "c.js", "tick(); let uniqueGamma = 3;");

    let config = IndexConfig::new(dir.path());
    let sources = config.sources_dir();
    let files = collect_source_files(&sources);

    let whole = tokenize_whole(dir.path());
    for parts in [2, 3, 5] {
        let partials: Vec<_> = split_chunks(files.clone(), parts)
            .into_iter()
            .map(|chunk| tokenize_files(&chunk, &sources, &config.tokenizer))
            .collect();
        let merged = merge(partials);
        assert_eq!(merged.tokens, whole.tokens, "partition into {} chunks", parts);
        assert_eq!(merged.projects, whole.projects);
    }
}

#[tokio::test]
async fn test_two_project_scenario() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "A", "main.js", "fetchData(); const KEY = 1;");
    write_source(dir.path(), "B", "main.js", "fetchData();");

    let config = IndexConfig::new(dir.path());
    let (compressed, stats) = build_index(&config).await.unwrap();

    assert_eq!(compressed.repos, vec!["A".to_string(), "B".to_string()]);
    assert!(compressed
        .tokens
        .contains(&TokenEntry("fetchData".to_string(), vec![0, 1])));
    // All-uppercase names are constants, never indexed.
    assert!(!compressed.tokens.iter().any(|t| t.0 == "KEY"));
    assert_eq!(stats.projects, 2);
}

#[tokio::test]
async fn test_single_project_tokens_are_dropped() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "A", "main.js", "shared(); onlyInA();");
    write_source(dir.path(), "B", "main.js", "shared(); onlyInB();");

    let config = IndexConfig::new(dir.path());
    let (compressed, _) = build_index(&config).await.unwrap();

    let tokens: Vec<&str> = compressed.tokens.iter().map(|t| t.0.as_str()).collect();
    assert!(tokens.contains(&"shared"));
    assert!(!tokens.contains(&"onlyInA"));
    assert!(!tokens.contains(&"onlyInB"));
}

#[tokio::test]
async fn test_noise_literal_contributes_no_tokens() {
    let hex: String = "deadbeef0123456789abcdef".repeat(3).chars().take(60).collect();
    let dir = TempDir::new().unwrap();
    write_source(
        dir.path(),
        "A",
        "main.js",
        &format!("let digestValue = \"{}\"; present();", hex),
    );
    write_source(
        dir.path(),
        "B",
        "main.js",
        &format!("let digestValue = \"{}\"; present();", hex),
    );

    let config = IndexConfig::new(dir.path());
    let (compressed, _) = build_index(&config).await.unwrap();

    for entry in &compressed.tokens {
        assert!(
            !hex.contains(&entry.0),
            "token '{}' leaked from the stripped literal",
            entry.0
        );
    }
    let tokens: Vec<&str> = compressed.tokens.iter().map(|t| t.0.as_str()).collect();
    assert!(tokens.contains(&"present"));
    assert!(tokens.contains(&"digestValue"));
}

#[tokio::test]
async fn test_id_round_trip_on_built_artifact() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "alpha", "a.js", "render(); update(); input();");
    write_source(dir.path(), "beta", "b.js", "render(); update();");
    write_source(dir.path(), "gamma", "c.js", "render(); input();");

    let config = IndexConfig::new(dir.path());
    let (compressed, _) = build_index(&config).await.unwrap();
    let loaded = CompressedIndex::load(&config.tokens_file()).unwrap();
    assert_eq!(loaded, compressed);

    let whole = tokenize_whole(dir.path());
    for entry in &loaded.tokens {
        for &id in &entry.1 {
            assert!((id as usize) < loaded.repos.len());
        }
        let decoded: HashSet<String> = loaded
            .projects_for(entry)
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(decoded, whole.tokens[&entry.0]);
    }
}

#[tokio::test]
async fn test_unchanged_markers_skip_retokenization() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "A", "main.js", "fetchData(); render();");
    write_source(dir.path(), "B", "main.js", "fetchData(); render();");
    let projects = vec![project("A", 1), project("B", 2)];
    write_games(dir.path(), &projects);

    let config = IndexConfig::new(dir.path());
    let app = CliApp::new(config.clone());
    app.index().await.unwrap();
    let first = std::fs::read_to_string(config.tokens_file()).unwrap();

    // Edit a source file without touching the freshness markers. If the
    // second run re-tokenized, the artifact would pick up the new token.
    write_source(dir.path(), "A", "main.js", "fetchData(); render(); sneaky();");
    write_source(dir.path(), "B", "extra.js", "sneaky();");

    app.index().await.unwrap();
    let second = std::fs::read_to_string(config.tokens_file()).unwrap();
    assert_eq!(first, second, "artifact must be left untouched");

    // Once a marker moves, the run is live again and sees the edit.
    let bumped = vec![project("A", 3), project("B", 2)];
    write_games(dir.path(), &bumped);
    app.index().await.unwrap();
    let third = std::fs::read_to_string(config.tokens_file()).unwrap();
    assert!(third.contains("sneaky"));
}

#[tokio::test]
async fn test_cache_only_claims_materialized_projects() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "A", "main.js", "fetchData();");
    // B is listed but was never extracted.
    let projects = vec![project("A", 1), project("B", 2)];
    write_games(dir.path(), &projects);

    let config = IndexConfig::new(dir.path());
    CliApp::new(config.clone()).index().await.unwrap();

    let cache = FreshnessCache::load(&config.cache_file());
    assert!(cache.is_fresh(&projects[0]));
    assert!(!cache.is_fresh(&projects[1]));
}

#[tokio::test]
async fn test_empty_corpus_produces_empty_artifact() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("sources")).unwrap();

    let config = IndexConfig::new(dir.path());
    let (compressed, stats) = build_index(&config).await.unwrap();
    assert!(compressed.repos.is_empty());
    assert!(compressed.tokens.is_empty());
    assert_eq!(stats.files, 0);
}
