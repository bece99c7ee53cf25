//! Labkeeper application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Open the SQLite database (optionally seeding demo data)
//! 4. Load or generate the API bearer token
//! 5. Serve the REST API until Ctrl-C

mod cli;

use std::path::PathBuf;

use clap::Parser;

use labkeeper_api::auth::load_or_generate_token;
use labkeeper_api::{start_server, AppState};
use labkeeper_core::config::LabConfig;
use labkeeper_storage::{seed_demo, Database};

use cli::{home_dir, CliArgs};

/// Expand a leading `~` to the home directory.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if let Some(rest) = data_dir
        .strip_prefix("~/")
        .or_else(|| data_dir.strip_prefix("~\\"))
    {
        home_dir().unwrap_or_else(|| PathBuf::from(".")).join(rest)
    } else {
        PathBuf::from(data_dir)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = LabConfig::load_or_default(&config_file);
    config.general.port = args.resolve_port(config.general.port);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(ref level) = args.log_level {
        config.general.log_level = level.clone();
    }

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.general.log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Labkeeper v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("labkeeper.db");
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    if args.seed_demo {
        let today = chrono::Local::now().date_naive();
        let summary = seed_demo(&db, today)?;
        tracing::info!(
            users = summary.users,
            chemicals = summary.chemicals,
            equipment = summary.equipment,
            schedules = summary.schedules,
            "Demo data seeded"
        );
    }

    // Auth.
    let token_path = data_dir.join(&config.api.token_file);
    let api_token = load_or_generate_token(&token_path);
    tracing::info!(path = %token_path.display(), "API token ready");

    // === API server ===

    let port = config.general.port;
    let state = AppState::new(config, db, api_token);
    if let Err(e) = start_server(state, shutdown_signal()).await {
        tracing::error!(error = %e, "API server failed");
        tracing::error!("Try: LABKEEPER_PORT={} labkeeper", port.wrapping_add(1));
        return Err(e.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_data_dir_keeps_plain_paths() {
        assert_eq!(resolve_data_dir("/var/lib/labkeeper"), PathBuf::from("/var/lib/labkeeper"));
        assert_eq!(resolve_data_dir("data"), PathBuf::from("data"));
    }

    #[test]
    fn test_resolve_data_dir_expands_home() {
        let resolved = resolve_data_dir("~/.labkeeper/data");
        assert!(resolved.ends_with(".labkeeper/data"));
        assert!(!resolved.starts_with("~"));
    }
}
