use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use jamdex::{CliApp, IndexConfig};

#[derive(Parser)]
#[command(
    name = "jamdex",
    version,
    about = "Build a searchable token index over js13kGames entries",
    after_help = "Each stage depends on the previous one: games -> fetch -> extract -> index."
)]
struct Cli {
    /// Directory for archives, extracted sources, and artifacts.
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    work_dir: PathBuf,

    /// GitHub bearer credential; required by the network stages.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover game repos and write games.json
    Games,
    /// Download one source archive per listed game
    Fetch,
    /// Extract downloaded archives into per-game source trees
    Extract,
    /// Tokenize extracted sources and write tokens.json
    Index {
        /// Override the tokenizer worker count
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage errors exit 1 rather than clap's default 2; help and
            // version output still exit 0.
            let is_usage_error = e.use_stderr();
            let _ = e.print();
            std::process::exit(if is_usage_error { 1 } else { 0 });
        }
    };

    // Stop promptly on Ctrl-C. Nothing is partially persisted: every
    // artifact write goes through a rename.
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; exiting");
            std::process::exit(130);
        }
    });

    if let Err(e) = run(cli).await {
        error!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = IndexConfig::new(cli.work_dir).with_token(cli.token);

    match cli.command {
        Command::Games => CliApp::new(config).games().await,
        Command::Fetch => CliApp::new(config).fetch().await,
        Command::Extract => CliApp::new(config).extract().await,
        Command::Index { workers } => {
            if let Some(workers) = workers {
                config.tokenizer.worker_count = workers.max(1);
            }
            CliApp::new(config).index().await
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
