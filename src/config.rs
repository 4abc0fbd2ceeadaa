//! Runtime configuration for jamdex components.
//!
//! Every component takes its knobs from this struct at construction time.
//! Nothing reads module-level constants or process globals; the credential
//! is injected once by the binary and carried here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// GitHub discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Base URL of the GitHub REST API.
    pub api_root: String,
    /// Organization hosting the game forks.
    pub org: String,
    /// Repository whose tree lists one directory per game.
    pub catalog_repo: String,
    /// Branch of the catalog repository to read.
    pub catalog_branch: String,
    /// Maximum simultaneous metadata requests.
    pub api_concurrency: usize,
    /// Bearer credential for the GitHub API.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_root: "https://api.github.com".to_string(),
            org: "js13kGames".to_string(),
            catalog_repo: "games".to_string(),
            catalog_branch: "main".to_string(),
            api_concurrency: 10,
            token: None,
        }
    }
}

/// Archive download and extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Base URL serving branch tarballs.
    pub archive_root: String,
    /// Maximum simultaneous downloads or extractions.
    pub concurrency: usize,
    /// File extensions (lowercase, without dot) kept during extraction.
    pub source_extensions: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            archive_root: "https://codeload.github.com".to_string(),
            concurrency: 10,
            source_extensions: vec![
                "js".to_string(),
                "ts".to_string(),
                "html".to_string(),
                "htm".to_string(),
            ],
        }
    }
}

/// Tokenization pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Number of parallel tokenizer workers.
    pub worker_count: usize,
    /// Files larger than this many bytes are skipped.
    pub max_file_size: u64,
    /// Inclusive token length bounds.
    pub min_token_len: usize,
    pub max_token_len: usize,
    /// Tokens seen in fewer than this many projects are dropped.
    pub min_project_count: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            max_file_size: 500 * 1024,
            min_token_len: 3,
            max_token_len: 50,
            min_project_count: 2,
        }
    }
}

/// Top-level configuration shared by all stages.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndexConfig {
    /// Directory holding every artifact this tool produces.
    pub work_dir: PathBuf,
    pub github: GithubConfig,
    pub fetch: FetchConfig,
    pub tokenizer: TokenizerConfig,
}

impl IndexConfig {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.github.token = token;
        self
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.work_dir.join("archives")
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.work_dir.join("sources")
    }

    pub fn games_file(&self) -> PathBuf {
        self.work_dir.join("games.json")
    }

    pub fn tokens_file(&self) -> PathBuf {
        self.work_dir.join("tokens.json")
    }

    pub fn cache_file(&self) -> PathBuf {
        self.work_dir.join("cache.json")
    }
}
