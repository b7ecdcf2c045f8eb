//! Zokuhen CLI: find missing anime sequels for an AniList user.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use zokuhen_api::traits::MediaListStatus;
use zokuhen_api::{AniListClient, Cache, CatalogError, GraphQlTransport};
use zokuhen_core::{
    add_to_list, find_missing_sequels_with, AppConfig, FinderOptions, SequelReport, ZokuhenError,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Find missing anime sequels for an AniList user")]
struct Args {
    /// AniList username
    #[arg(short, long)]
    user: String,

    /// AniList access token (Bearer). Required for --push.
    #[arg(long)]
    token: Option<String>,

    /// Drop this user's cached list pages before fetching
    #[arg(long)]
    force_refresh: bool,

    /// Write the full report as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Add every discovered sequel to the user's PLANNING list
    #[arg(long)]
    push: bool,

    /// Clear the whole response cache before running
    #[arg(long)]
    clear_cache: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_not_found() => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), ZokuhenError> {
    let config = AppConfig::load()?;

    let cache = Arc::new(Cache::open(config.cache.resolved_dir()));
    if args.clear_cache {
        info!("clearing response cache");
        cache.clear();
    }

    let transport = GraphQlTransport::new(&config.api.url, config.api.max_retries)
        .map_err(CatalogError::from)?;
    let client = AniListClient::new(transport, Arc::clone(&cache))
        .with_token(args.token.clone())
        .with_ttls(
            config.cache.user_list_ttl(),
            config.cache.media_details_ttl(),
        );

    let opts = FinderOptions {
        per_page: config.finder.per_page,
        batch_size: config.finder.batch_size,
        list_concurrency: config.finder.list_concurrency,
    };

    let report =
        find_missing_sequels_with(&client, &args.user, args.force_refresh, &opts).await?;

    print_report(&report);

    if let Some(path) = &args.json {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "report written");
    }

    if args.push {
        if args.token.is_none() {
            eprintln!("--push requires --token; skipping");
            return Ok(());
        }
        push_to_planning(&client, &args.user, &report).await;
    }

    Ok(())
}

fn print_report(report: &SequelReport) {
    if report.missing_sequels.is_empty() {
        println!("No missing sequels found for {}. All caught up!", report.user.name);
        return;
    }

    println!(
        "{} missing sequel(s) for {}:\n",
        report.missing_sequels.len(),
        report.user.name
    );
    println!("{:<6} {:<8} {:<40} {:<10} {}", "depth", "id", "title", "format", "sequel of");
    for record in &report.missing_sequels {
        println!(
            "{:<6} {:<8} {:<40} {:<10} {}",
            record.depth,
            record.missing_id,
            record.missing_title.as_deref().unwrap_or("(unknown title)"),
            record.format,
            record.base_title.as_deref().unwrap_or("(unknown title)"),
        );
    }
}

/// Push every discovery to PLANNING. Per-item failures are logged and
/// skipped; the cache invalidation inside `add_to_list` keeps later
/// list reads fresh.
async fn push_to_planning(client: &AniListClient, username: &str, report: &SequelReport) {
    let mut pushed = 0usize;
    let mut failed = 0usize;

    for record in &report.missing_sequels {
        match add_to_list(client, username, record.missing_id, MediaListStatus::Planning).await {
            Ok(result) => {
                info!(
                    media_id = record.missing_id,
                    entry_id = result.entry_id,
                    title = record.missing_title.as_deref().unwrap_or(""),
                    "added to planning"
                );
                pushed += 1;
            }
            Err(e) => {
                warn!(media_id = record.missing_id, error = %e, "failed to add to planning");
                failed += 1;
            }
        }
    }

    println!("\nPush summary: {pushed} added, {failed} failed");
}
