pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod github;
pub mod index;
pub mod pipeline;
pub mod tokenizer;
pub mod types;

// Re-export commonly used types
pub use cache::FreshnessCache;
pub use cli::CliApp;
pub use config::{FetchConfig, GithubConfig, IndexConfig, TokenizerConfig};
pub use error::{JamdexError, Result};
pub use github::GithubClient;
pub use index::{compress, merge, CompressedIndex, GlobalIndex, PartialIndex, TokenEntry};
pub use pipeline::{build_index, collect_source_files, split_chunks, IndexStats};
pub use types::{Project, RunPlan};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
