use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;

mod app;
mod ui;

use app::{App, AppEvent};
use feedpane::config::Config;
use feedpane::storage::{Database, DatabaseError};

/// Get the config directory path (~/.config/feedpane/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedpane"))
}

/// Restrict the config directory to the current user.
#[cfg(unix)]
fn restrict_permissions(config_dir: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(config_dir) {
        Ok(metadata) => {
            let mut perms = metadata.permissions();
            perms.set_mode(0o700);
            if let Err(e) = std::fs::set_permissions(config_dir, perms) {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to set config directory permissions to 0700"
                );
            }
        }
        Err(e) => {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to read config directory metadata"
            );
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "feedpane",
    about = "Terminal feed reader with paged, filterable article views"
)]
struct Args {
    /// Database file (defaults to ~/.config/feedpane/feeds.db)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Config file (defaults to ~/.config/feedpane/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Rebuild the full-text search index and exit
    #[arg(long)]
    rebuild_search: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", config_dir.display());
    }
    #[cfg(unix)]
    restrict_permissions(&config_dir);

    let config_path = args
        .config
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = args.db.unwrap_or_else(|| config_dir.join("feeds.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of feedpane appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    if args.rebuild_search {
        tracing::info!("Rebuilding search index...");
        let count = db
            .rebuild_search_index()
            .await
            .context("Failed to rebuild search index")?;
        tracing::info!(articles = count, "Search index rebuilt");
        println!("Search index rebuilt: {} articles indexed", count);
        return Ok(());
    }

    let mut app = App::new(db, config);
    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    ui::run(&mut app, event_tx, event_rx).await?;

    println!("Goodbye!");
    Ok(())
}
