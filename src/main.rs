//! Forum-Scanner main entry point
//!
//! This is the command-line interface for the Forum-Scanner incremental
//! forum watcher.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use forum_scanner::config::{load_config, ForumConfig};
use forum_scanner::scanner::{build_http_client, ScanSummary, Scanner, Throttle};
use forum_scanner::storage::ScanStorage;
use forum_scanner::ScanError;

/// Forum-Scanner: an incremental forum watcher
///
/// Forum-Scanner walks configured forums topic by topic, remembers what it
/// has already seen, and emails a notification for every new post.
#[derive(Parser, Debug)]
#[command(name = "forum-scanner")]
#[command(version)]
#[command(about = "An incremental forum watcher", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Scan and log notifications without transmitting them
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    let mut storage = ScanStorage::open(Path::new(&config.database_path))
        .with_context(|| format!("failed to open database {}", config.database_path))?;

    // One-time schema upgrade for databases predating tenant-prefixed ids.
    // Runs before any crawling; a current schema makes this a no-op.
    if let Some(tenant) = config.forums.keys().next() {
        storage
            .migrate_marker_ids(tenant, config.forums.len())
            .context("schema migration failed")?;
    }

    let throttle = Throttle::new(config.max_bandwidth_bytes_per_sec);

    for (tenant, forum) in &config.forums {
        tracing::info!("Processing {}...", tenant);

        match scan_forum(tenant, forum, &mut storage, throttle, cli.dry_run) {
            Ok(summary) => {
                tracing::info!(
                    "{}: {} pages fetched, {} new posts, {} notifications sent",
                    tenant,
                    summary.pages_fetched,
                    summary.new_posts,
                    summary.notifications_sent
                );
            }
            Err(ScanError::EmailLimitReached) => {
                // A planned stop, not a failure: markers persisted so far
                // stay valid and the next run picks up where this one ended.
                tracing::info!("Send cap reached; ending this run");
                break;
            }
            Err(error) => {
                tracing::error!("Scan of {} failed: {}", tenant, error);
            }
        }
    }

    Ok(())
}

/// Scans one configured forum with its own HTTP client and session
fn scan_forum(
    tenant: &str,
    forum: &ForumConfig,
    storage: &mut ScanStorage,
    throttle: Throttle,
    dry_run: bool,
) -> forum_scanner::Result<ScanSummary> {
    let client = build_http_client()?;
    let mut scanner = Scanner::new(tenant, forum, &client, storage, throttle, dry_run)?;
    scanner.scan()
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("forum_scanner=info,warn"),
            1 => EnvFilter::new("forum_scanner=debug,info"),
            2 => EnvFilter::new("forum_scanner=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
