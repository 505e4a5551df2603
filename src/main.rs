//! CLI entry point for the chapter queue tool.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chapter_queue::queue::EntrySnapshot;
use chapter_queue::{Database, DownloadQueue, DownloadQueueEntry, DownloadQueueStatus, QueueConfig};
use clap::Parser;
use tracing::{debug, info};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so `--json` output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = match &args.config {
        Some(path) => QueueConfig::load(path)?,
        None => QueueConfig::load_default()?,
    };
    let db_path = args.db.clone().unwrap_or_else(|| config.db_path.clone());

    let db = Database::new(&db_path)
        .await
        .with_context(|| format!("Failed to open queue database '{}'", db_path.display()))?;
    let queue = DownloadQueue::new(db.clone()).with_backoff_policy(config.backoff_policy());

    let outcome = run(&args.command, &queue, &config).await;
    db.close().await;
    outcome
}

async fn run(command: &Command, queue: &DownloadQueue, config: &QueueConfig) -> Result<()> {
    match command {
        Command::Add {
            manga_id,
            chapter_id,
            priority,
        } => match queue.add(*manga_id, *chapter_id, *priority).await? {
            Some(id) => println!("Queued chapter {chapter_id} as entry {id} ({priority})"),
            None => println!("Chapter {chapter_id} is already queued"),
        },
        Command::List {
            status,
            ready,
            manga,
            json,
        } => {
            let mut entries = if *ready {
                queue.get_pending_with_backoff().await?
            } else if let Some(manga_id) = manga {
                queue.get_by_manga_id(*manga_id).await?
            } else {
                queue.get_all().await?
            };
            if let Some(status) = status {
                entries.retain(|entry| entry.status() == *status);
            }
            if let (true, Some(manga_id)) = (*ready, manga) {
                entries.retain(|entry| entry.manga_id == *manga_id);
            }
            print_entries(&entries, *json)?;
        }
        Command::Counts { json } => {
            let mut counts = BTreeMap::new();
            for status in DownloadQueueStatus::ALL {
                counts.insert(status.as_str(), queue.count_by_status(status).await?);
            }
            if *json {
                println!("{}", serde_json::to_string_pretty(&counts)?);
            } else {
                for status in DownloadQueueStatus::ALL {
                    println!("{:<12} {}", status.as_str(), counts[status.as_str()]);
                }
            }
        }
        Command::Complete { chapter_id } => {
            if !queue.mark_completed(*chapter_id).await? {
                bail!("Chapter {chapter_id} is not queued");
            }
            println!("Marked chapter {chapter_id} completed");
        }
        Command::Fail {
            chapter_id,
            error_type,
            message,
        } => {
            if !queue.record_failure(*chapter_id, message, *error_type).await? {
                bail!("Chapter {chapter_id} is not queued");
            }
            let entry = queue.get_by_chapter_id(*chapter_id).await?;
            match entry.as_ref().and_then(|entry| queue.backoff_policy().retry_due_at(entry)) {
                Some(due_at) => println!(
                    "Recorded {error_type} failure for chapter {chapter_id}; retry after {due_at}"
                ),
                None => println!(
                    "Recorded {error_type} failure for chapter {chapter_id}; it will not be retried"
                ),
            }
        }
        Command::Priority { id, priority } => {
            queue
                .update_priority(*id, *priority)
                .await
                .with_context(|| format!("Failed to change priority of entry {id}"))?;
            println!("Entry {id} priority set to {priority}");
        }
        Command::Remove { id, chapter, manga } => {
            let removed = match (id, chapter, manga) {
                (Some(id), _, _) => queue.remove_by_id(*id).await?,
                (_, Some(chapter_id), _) => queue.remove_by_chapter_id(*chapter_id).await?,
                (_, _, Some(manga_id)) => queue.remove_by_manga_id(*manga_id).await?,
                (None, None, None) => bail!("Nothing to remove: pass --id, --chapter or --manga"),
            };
            println!("Removed {removed} entries");
        }
        Command::RetryAll => {
            let reset = queue.reset_failed_to_pending().await?;
            println!("Reset {reset} failed entries to pending");
        }
        Command::ResetStuck { older_than } => {
            let threshold = older_than.map_or_else(|| config.stuck_threshold(), Duration::from_secs);
            let recovered = queue.reset_stuck_downloads(threshold).await?;
            info!(recovered, threshold_secs = threshold.as_secs(), "stuck downloads reset");
            println!("Recovered {recovered} stuck downloads");
        }
        Command::ClearCompleted => {
            let removed = queue.clear_completed().await?;
            println!("Removed {removed} completed entries");
        }
        Command::ClearAll => {
            let removed = queue.clear_all().await?;
            println!("Removed {removed} entries");
        }
    }
    Ok(())
}

fn print_entries(entries: &[DownloadQueueEntry], json: bool) -> Result<()> {
    if json {
        let snapshots: Vec<EntrySnapshot> = entries.iter().map(EntrySnapshot::from).collect();
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Queue is empty");
        return Ok(());
    }

    println!(
        "{:>6} {:>8} {:>8} {:<8} {:<12} {:>7}  ERROR",
        "ID", "MANGA", "CHAPTER", "PRIORITY", "STATUS", "RETRIES"
    );
    for entry in entries {
        let error = match (entry.error_type(), entry.last_error_message.as_deref()) {
            (Some(error_type), Some(message)) if !message.is_empty() => {
                format!("{error_type}: {message}")
            }
            (Some(error_type), _) => error_type.to_string(),
            (None, Some(message)) => message.to_string(),
            (None, None) => String::new(),
        };
        println!(
            "{:>6} {:>8} {:>8} {:<8} {:<12} {:>7}  {}",
            entry.id,
            entry.manga_id,
            entry.chapter_id,
            entry.download_priority().as_str(),
            entry.status().as_str(),
            entry.retry_count,
            error
        );
    }
    Ok(())
}
