use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LabError, Result};

/// Top-level configuration for the Labkeeper application.
///
/// Loaded from `~/.labkeeper/config.toml` by default. Every section falls
/// back to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Upper bound for every day-count window, about ten years.
pub const MAX_WINDOW_DAYS: i64 = 3650;

impl LabConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LabConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the rest of the system cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.chat.max_message_length == 0 {
            return Err(LabError::Config(
                "chat.max_message_length must be greater than zero".to_string(),
            ));
        }
        if self.chat.search_limit == 0 {
            return Err(LabError::Config(
                "chat.search_limit must be greater than zero".to_string(),
            ));
        }
        if self.chat.listing_cache_capacity == 0 || self.chat.search_cache_capacity == 0 {
            return Err(LabError::Config(
                "chat cache capacities must be greater than zero".to_string(),
            ));
        }
        let windows = [
            ("chat.booking_window_days", self.chat.booking_window_days),
            ("inventory.expiry_warning_days", self.inventory.expiry_warning_days),
            ("inventory.calibration_warning_days", self.inventory.calibration_warning_days),
        ];
        for (name, days) in windows {
            if !(0..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(LabError::Config(format!(
                    "{} must be between 0 and {}",
                    name, MAX_WINDOW_DAYS
                )));
            }
        }
        if self.inventory.default_low_stock_threshold < 0.0 {
            return Err(LabError::Config(
                "inventory.default_low_stock_threshold must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the SQLite database and the API token.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// API server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.labkeeper/data".to_string(),
            log_level: "info".to_string(),
            port: 3030,
        }
    }
}

/// Chat assistant configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum accepted message length in characters.
    pub max_message_length: usize,
    /// Maximum number of rows returned by a search.
    pub search_limit: usize,
    /// Capacity of the listing cache (chemical and equipment lists).
    pub listing_cache_capacity: usize,
    /// Listing cache time-to-live in seconds.
    pub listing_cache_ttl_secs: u64,
    /// Capacity of the search-result caches.
    pub search_cache_capacity: usize,
    /// Search cache time-to-live in seconds.
    pub search_cache_ttl_secs: u64,
    /// Number of days checked for booking conflicts when no date is given.
    pub booking_window_days: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 1000,
            search_limit: 20,
            listing_cache_capacity: 100,
            listing_cache_ttl_secs: 300,
            search_cache_capacity: 50,
            search_cache_ttl_secs: 60,
            booking_window_days: 7,
        }
    }
}

/// Inventory alert thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Threshold applied to chemicals without their own low-stock threshold.
    pub default_low_stock_threshold: f64,
    /// Chemicals expiring within this many days are reported as expiring.
    pub expiry_warning_days: i64,
    /// Equipment due for calibration within this many days is reported.
    pub calibration_warning_days: i64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            default_low_stock_threshold: 10.0,
            expiry_warning_days: 30,
            calibration_warning_days: 14,
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// File name (inside the data directory) of the bearer token.
    pub token_file: String,
    /// Extra origins allowed by CORS besides localhost on the API port.
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            token_file: "api_token".to_string(),
            cors_origins: vec![],
        }
    }
}
