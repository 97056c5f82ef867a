//! syn-inbox - Reconcile and inspect the cross-platform comment inbox

use clap::{Parser, Subcommand};
use libsyndica::config::{resolve_data_path, Config};
use libsyndica::logging::{LogFormat, LoggingConfig};
use libsyndica::{
    AdapterRegistry, Comment, CommentStore, Coordinator, FileCredentialStore, PlatformId, PostStore,
    Reconciler, Result, SyndicaError,
};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "syn-inbox")]
#[command(version)]
#[command(about = "Reconcile and inspect the cross-platform comment inbox")]
#[command(long_about = "\
syn-inbox - Reconcile and inspect the cross-platform comment inbox

DESCRIPTION:
    Pulls comments for every post published through syn-post, merges the
    direct comment fetches with entries derived from each platform's
    activity feed, deduplicates them, and prints the reconciled inbox.

USAGE:
    # Fetch and print the inbox across all platforms
    syn-inbox sync

    # Only one platform
    syn-inbox sync --platform facebook

    # Account statistics per platform
    syn-inbox stats

CONFIGURATION:
    Configuration file: ~/.config/syndica/config.toml (or $SYNDICA_CONFIG)
    Post state file:    ~/.local/share/syndica/posts.json (or $SYNDICA_DATA)

EXIT CODES:
    0 - Success
    1 - Runtime error
    2 - Authentication or credential error
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a reconciliation cycle and print the inbox
    Sync {
        /// Limit output to one platform
        #[arg(short, long)]
        platform: Option<String>,
    },
    /// Print aggregate account statistics per platform
    Stats,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    LoggingConfig::new(LogFormat::Text, level.to_string(), cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let credentials = FileCredentialStore::new(config.clone());
    let registry = Arc::new(AdapterRegistry::build(&config, &credentials)?);

    match cli.command {
        Command::Sync { platform } => {
            let filter = platform
                .as_deref()
                .map(|name| name.parse::<PlatformId>())
                .transpose()
                .map_err(SyndicaError::InvalidInput)?;

            let posts = Arc::new(PostStore::load(&resolve_data_path()?)?);
            let comments = Arc::new(CommentStore::new());
            let reconciler = Reconciler::new(registry, posts, comments.clone());

            let report = reconciler.run_cycle().await;
            for (platform, cycle) in &report.platforms {
                if cycle.failed {
                    eprintln!("warning: {} fetch failed, showing nothing for it", platform);
                }
            }

            let inbox: Vec<Comment> = comments
                .all()
                .into_iter()
                .filter(|c| filter.map_or(true, |p| c.platform == p))
                .collect();
            print_inbox(&inbox, &cli.format);
        }
        Command::Stats => {
            let coordinator = Coordinator::new(registry);
            let stats = coordinator.collect_stats().await;
            print_stats(stats, &cli.format);
        }
    }
    Ok(())
}

fn print_inbox(inbox: &[Comment], format: &str) {
    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(inbox).unwrap_or_default()
        );
        return;
    }

    if inbox.is_empty() {
        println!("inbox empty");
        return;
    }
    for comment in inbox {
        let author = comment
            .author
            .handle
            .as_deref()
            .or(comment.author.display_name.as_deref())
            .unwrap_or("unknown");
        let mut flags = String::new();
        if comment.replied {
            flags.push_str(" [replied]");
        }
        if comment.hidden {
            flags.push_str(" [hidden]");
        }
        if comment.spam {
            flags.push_str(" [spam]");
        }
        println!(
            "[{}] {}  {}  {:?}  ({} likes){}",
            comment.platform,
            format_time(comment.created_at),
            author,
            comment.text,
            comment.like_count,
            flags
        );
    }
    println!("{} comment(s)", inbox.len());
}

fn print_stats(
    stats: std::collections::BTreeMap<PlatformId, Result<libsyndica::AccountStats>>,
    format: &str,
) {
    if format == "json" {
        let map: std::collections::BTreeMap<String, serde_json::Value> = stats
            .iter()
            .map(|(platform, result)| {
                let value = match result {
                    Ok(stats) => serde_json::to_value(stats).unwrap_or_default(),
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                };
                (platform.to_string(), value)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&map).unwrap_or_default());
        return;
    }

    for (platform, result) in stats {
        match result {
            Ok(stats) => {
                println!(
                    "{}: {} posts, {} comments, engagement {:.2}",
                    platform, stats.total_posts, stats.total_comments, stats.engagement_rate
                );
                for event in &stats.recent_activity {
                    println!(
                        "  {}  {:?} on {}",
                        format_time(event.occurred_at),
                        event.summary,
                        event.platform_post_id
                    );
                }
            }
            Err(e) => println!("{}: unavailable ({})", platform, e),
        }
    }
}

fn format_time(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(1714564800), "2024-05-01 12:00");
    }
}
