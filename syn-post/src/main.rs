//! syn-post - Publish a post to the configured social platforms

use clap::Parser;
use libsyndica::config::{resolve_data_path, Config};
use libsyndica::logging::{LogFormat, LoggingConfig};
use libsyndica::{
    AdapterRegistry, Coordinator, FileCredentialStore, MediaKind, MediaRef, PlatformId, Post,
    PostStatus, PostStore, Result, SyndicaError,
};
use std::io::Read;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "syn-post")]
#[command(version)]
#[command(about = "Publish a post to the configured social platforms")]
#[command(long_about = "\
syn-post - Publish a post to the configured social platforms

DESCRIPTION:
    Fans one post out to every targeted platform. Platforms fail
    independently: the post counts as published when at least one
    platform accepts it, and the per-platform results are printed
    so partial failures are visible.

USAGE:
    # Post to all enabled platforms
    syn-post \"hello world\"

    # Post to specific platforms
    syn-post --platform facebook,twitter \"hello\"

    # Attach media by public URL
    syn-post --media-url https://cdn.example.com/a.jpg \"look at this\"

    # Read content from stdin
    echo \"hello\" | syn-post

CONFIGURATION:
    Configuration file: ~/.config/syndica/config.toml (or $SYNDICA_CONFIG)
    Post state file:    ~/.local/share/syndica/posts.json (or $SYNDICA_DATA)

EXIT CODES:
    0 - Published on at least one platform
    1 - Runtime error, or every platform failed
    2 - Authentication or credential error
    3 - Invalid input
")]
struct Cli {
    /// Content to post (reads from stdin if not provided)
    content: Option<String>,

    /// Target specific platform(s) (comma-separated)
    #[arg(short, long)]
    platform: Option<String>,

    /// Public URL of media to attach
    #[arg(long, value_name = "URL")]
    media_url: Option<String>,

    /// Kind of the attached media (image or video)
    #[arg(long, value_name = "KIND", default_value = "image")]
    media_kind: String,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
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
    let content = read_content(cli.content)?;
    let config = Config::load()?;
    let platforms = resolve_platforms(cli.platform.as_deref(), &config)?;
    let media = parse_media(cli.media_url, &cli.media_kind)?;

    let mut post = Post::new(content, platforms);
    if let Some(media) = media {
        post = post.with_media(media);
    }

    let data_path = resolve_data_path()?;
    let store = PostStore::load(&data_path)?;
    store.insert(post.clone());

    let credentials = FileCredentialStore::new(config.clone());
    let registry = Arc::new(AdapterRegistry::build(&config, &credentials)?);
    let coordinator = Coordinator::new(registry);

    info!(post = %post.id, platforms = ?post.platforms, "publishing");
    let result = coordinator.publish(&post).await;
    let status = store.apply_publish_result(&post.id, &result)?;
    store.save(&data_path)?;

    match cli.format.as_str() {
        "json" => {
            let out = serde_json::json!({
                "post_id": post.id,
                "status": status,
                "results": result,
            });
            println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
        }
        _ => {
            for (platform, outcome) in &result {
                match outcome {
                    Some(id) => println!("{:<10} ok      {}", platform.to_string(), id),
                    None => println!("{:<10} failed", platform.to_string()),
                }
            }
            println!(
                "post {}: {}",
                post.id,
                match status {
                    PostStatus::Published => "published",
                    PostStatus::Failed => "failed",
                    PostStatus::Draft => "draft",
                    PostStatus::Scheduled => "scheduled",
                }
            );
        }
    }

    if status == PostStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}

fn read_content(arg: Option<String>) -> Result<String> {
    let content = match arg {
        Some(content) => content,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| SyndicaError::InvalidInput(format!("failed to read stdin: {}", e)))?;
            buffer
        }
    };
    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(SyndicaError::InvalidInput(
            "post content must not be empty".to_string(),
        ));
    }
    Ok(content)
}

fn resolve_platforms(arg: Option<&str>, config: &Config) -> Result<Vec<PlatformId>> {
    let names: Vec<String> = match arg {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
        None => config.defaults.platforms.clone(),
    };

    let platforms = if names.is_empty() {
        config.enabled_platforms()
    } else {
        names
            .iter()
            .map(|name| name.parse::<PlatformId>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(SyndicaError::InvalidInput)?
    };

    if platforms.is_empty() {
        return Err(SyndicaError::InvalidInput(
            "no target platforms: pass --platform or enable platforms in the config".to_string(),
        ));
    }
    Ok(platforms)
}

fn parse_media(url: Option<String>, kind: &str) -> Result<Option<MediaRef>> {
    let Some(url) = url else {
        return Ok(None);
    };
    let kind = match kind {
        "image" => MediaKind::Image,
        "video" => MediaKind::Video,
        other => {
            return Err(SyndicaError::InvalidInput(format!(
                "unknown media kind '{}': expected image or video",
                other
            )))
        }
    };
    Ok(Some(MediaRef { url, kind }))
}
