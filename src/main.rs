//! # History Digest CLI (`hdigest`)
//!
//! Reads local browser histories and writes daily and weekly Markdown
//! digests of what was browsed, searched, and watched.
//!
//! ## Usage
//!
//! ```bash
//! hdigest --config ./config/hdigest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hdigest run` | Read all browsers and write today's digests (default) |
//! | `hdigest sources` | List history sources and where they were found |
//! | `hdigest classify "<title>"` | Classify one page title / URL |
//! | `hdigest tagger init <name>` | Scaffold a Lua tagger script |
//! | `hdigest tagger test <path> "<text>"` | Run a tagger script once |
//! | `hdigest service install` | Schedule a daily run via launchd (macOS) |
//! | `hdigest service remove` | Remove the scheduled run |
//!
//! ## Examples
//!
//! ```bash
//! # Write digests for today
//! hdigest
//!
//! # Rebuild the digest for a past day
//! hdigest run --date 2024-03-05
//!
//! # Check how a URL would be classified
//! hdigest classify "" --url "https://www.google.com/search?q=rust+ownership" --json
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG`
//! (default `hdigest=info,history_digest=info`).

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use history_digest::config::{self, Config};
use history_digest::{pipeline, service, sources, tagger};

const DEFAULT_CONFIG: &str = "./config/hdigest.toml";

/// History Digest: daily and weekly summaries of local browser history.
#[derive(Parser)]
#[command(
    name = "hdigest",
    about = "History Digest: daily and weekly summaries of local browser history",
    version,
    long_about = "History Digest reads the history databases of Brave, Chrome, Safari and \
    Firefox through private snapshots, merges them into one timeline, classifies each visit \
    by topic and tags, and writes Markdown digests."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/hdigest.toml`. If the default file does not
    /// exist, built-in defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Read all sources and write the daily and weekly digests.
    ///
    /// This is the default when no command is given.
    Run {
        /// Day to summarize (YYYY-MM-DD). Defaults to today.
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// List history sources, their resolved paths, and status.
    Sources,

    /// Classify a single page.
    Classify {
        /// Page title (ignored when the URL is a recognized search).
        text: String,

        /// Page URL.
        #[arg(long, default_value = "")]
        url: String,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage Lua tagger scripts.
    Tagger {
        #[command(subcommand)]
        action: TaggerAction,
    },

    /// Manage the scheduled daily run (macOS LaunchAgent).
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },
}

/// Tagger management subcommands.
#[derive(Subcommand)]
enum TaggerAction {
    /// Scaffold a new tagger from a template.
    ///
    /// Creates `taggers/<name>.lua` with a commented template.
    Init {
        /// Name for the new tagger (e.g., `work`).
        name: String,
    },
    /// Run a tagger script once and print its tags.
    Test {
        /// Path to the `.lua` tagger script.
        path: PathBuf,
        /// Text to tag (a page title or search query).
        text: String,
        /// URL passed to the tagger.
        #[arg(long, default_value = "")]
        url: String,
    },
}

/// Service management subcommands.
#[derive(Subcommand)]
enum ServiceAction {
    /// Install and load the LaunchAgent.
    Install,
    /// Unload and remove the LaunchAgent.
    Remove,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {}", s, e))
}

/// Load the config file, falling back to defaults only when the default
/// path was not overridden and does not exist.
fn resolve_config(explicit: Option<&Path>) -> Result<(Config, PathBuf)> {
    match explicit {
        Some(path) => Ok((config::load_config(path)?, path.to_path_buf())),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG);
            if path.exists() {
                Ok((config::load_config(&path)?, path))
            } else {
                Ok((Config::default(), path))
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hdigest=info,history_digest=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run { date: None });

    // Commands that don't require config
    if let Commands::Tagger {
        action: TaggerAction::Init { name },
    } = &command
    {
        tagger::scaffold_tagger(name)?;
        return Ok(());
    }

    let (cfg, config_path) = resolve_config(cli.config.as_deref())?;

    match command {
        Commands::Run { date } => {
            // The pipeline future (and any live snapshot) is dropped when
            // select! returns, before the exit below.
            let interrupted = tokio::select! {
                result = pipeline::run_digest(&cfg, date) => {
                    result?;
                    false
                }
                _ = tokio::signal::ctrl_c() => true,
            };
            if interrupted {
                tracing::warn!("interrupted");
                std::process::exit(130);
            }
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Classify { text, url, json } => {
            let classifier = pipeline::build_classifier(&cfg)?;
            let result = classifier.classify_visit(&text, &url);
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("topic:  {}", result.topic);
                println!("tags:   {}", result.tags.join(", "));
                match &result.search {
                    Some(search) => println!("search: {} ({})", search.query, search.engine),
                    None => println!("search: -"),
                }
            }
        }
        Commands::Tagger { action } => match action {
            TaggerAction::Test { path, text, url } => {
                let timeout = cfg.tagger.as_ref().map(|t| t.timeout_secs);
                tagger::test_tagger(&path, &text, &url, timeout)?;
            }
            TaggerAction::Init { .. } => {
                // Handled above (before config loading)
                unreachable!()
            }
        },
        Commands::Service { action } => match action {
            ServiceAction::Install => {
                service::install(&cfg.service, &config_path)
                    .context("Failed to install LaunchAgent")?;
            }
            ServiceAction::Remove => {
                service::remove(&cfg.service)?;
            }
        },
    }

    Ok(())
}
