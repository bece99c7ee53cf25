//! Command-line arguments for the Labkeeper server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Labkeeper - a chat assistant and REST API for a teaching lab's inventory.
#[derive(Parser, Debug)]
#[command(name = "labkeeper", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory for the SQLite database and API token.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Load demo users, chemicals, equipment, and lectures into an empty database.
    #[arg(long = "seed-demo")]
    pub seed_demo: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > LABKEEPER_CONFIG env var > ~/.labkeeper/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("LABKEEPER_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > LABKEEPER_PORT env var > config file value > 3030.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("LABKEEPER_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        3030
    }

    /// Data directory override from --data-dir, if given.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }
}

fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".labkeeper").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

pub fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");
    home.ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_parse() {
        let args = CliArgs::parse_from([
            "labkeeper",
            "--config",
            "/tmp/lab.toml",
            "-p",
            "4040",
            "--seed-demo",
        ]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/lab.toml"));
        assert_eq!(args.resolve_port(3030), 4040);
        assert!(args.seed_demo);
        assert!(args.resolve_data_dir().is_none());
    }

    #[test]
    fn test_port_flag_wins_over_config() {
        let args = CliArgs::parse_from(["labkeeper", "--port", "5050"]);
        assert_eq!(args.resolve_port(8080), 5050);
    }
}
