//! # Client Configuration
//!
//! Configuration for the network-facing parts of the client.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MENU_CATALOG_URL=http://10.0.0.5:5000                              │
//! │     MENU_AUTO_REPLAY=true                                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/menu-admin/config.toml (Linux)                           │
//! │     ~/Library/Application Support/com.menu.admin/config.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     localhost services, 5 MiB storage, 30 s probe interval             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [api]
//! catalog_url = "http://localhost:5000"
//! auth_url = "http://localhost:5002/api"
//!
//! [timeouts]
//! probe_secs = 5
//! read_secs = 5
//! write_secs = 15
//! replay_secs = 10
//!
//! [monitor]
//! interval_secs = 30
//! auto_replay = false
//!
//! [storage]
//! capacity_bytes = 5242880
//!
//! [images]
//! primary_max_width = 800
//! primary_max_height = 600
//! primary_quality = 70
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// API Endpoints
// =============================================================================

/// Base URLs of the remote services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Catalog service (menu items).
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,

    /// User-management service, including its `/api` prefix.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
}

fn default_catalog_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_auth_url() -> String {
    "http://localhost:5002/api".to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            catalog_url: default_catalog_url(),
            auth_url: default_auth_url(),
        }
    }
}

// =============================================================================
// Timeouts
// =============================================================================

/// Per-request time budgets, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// Connectivity probe.
    #[serde(default = "default_probe_secs")]
    pub probe_secs: u64,

    /// Catalog reads.
    #[serde(default = "default_read_secs")]
    pub read_secs: u64,

    /// Direct creates, updates and deletes.
    #[serde(default = "default_write_secs")]
    pub write_secs: u64,

    /// Each create during replay.
    #[serde(default = "default_replay_secs")]
    pub replay_secs: u64,
}

fn default_probe_secs() -> u64 {
    5
}
fn default_read_secs() -> u64 {
    5
}
fn default_write_secs() -> u64 {
    15
}
fn default_replay_secs() -> u64 {
    10
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        TimeoutSettings {
            probe_secs: default_probe_secs(),
            read_secs: default_read_secs(),
            write_secs: default_write_secs(),
            replay_secs: default_replay_secs(),
        }
    }
}

impl TimeoutSettings {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }

    pub fn replay(&self) -> Duration {
        Duration::from_secs(self.replay_secs)
    }
}

// =============================================================================
// Monitor Settings
// =============================================================================

/// Background connectivity monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Seconds between probes.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Replay the pending queue when the service comes back.
    #[serde(default)]
    pub auto_replay: bool,
}

fn default_interval() -> u64 {
    30
}

impl Default for MonitorSettings {
    fn default() -> Self {
        MonitorSettings {
            interval_secs: default_interval(),
            auto_replay: false,
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Local store location and quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Database file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Quota in bytes.
    #[serde(default = "default_capacity")]
    pub capacity_bytes: u64,
}

fn default_capacity() -> u64 {
    menu_store::DEFAULT_CAPACITY_BYTES
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            path: None,
            capacity_bytes: default_capacity(),
        }
    }
}

impl StorageSettings {
    /// Configured path, or `<data_dir>/menu.db`.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "menu", "admin")
                .map(|dirs| dirs.data_dir().join("menu.db"))
        })
    }
}

// =============================================================================
// Image Settings
// =============================================================================

/// Bounds used when embedding images into pending items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSettings {
    #[serde(default = "default_primary_width")]
    pub primary_max_width: u32,

    #[serde(default = "default_primary_height")]
    pub primary_max_height: u32,

    #[serde(default = "default_primary_quality")]
    pub primary_quality: u8,

    /// Used instead of the primary bounds under quota pressure.
    #[serde(default = "default_fallback_width")]
    pub fallback_max_width: u32,

    #[serde(default = "default_fallback_height")]
    pub fallback_max_height: u32,

    #[serde(default = "default_fallback_quality")]
    pub fallback_quality: u8,

    /// Largest accepted upload.
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,

    /// Embedded data URLs longer than this are dropped.
    #[serde(default = "default_max_embedded")]
    pub max_embedded_chars: usize,
}

fn default_primary_width() -> u32 {
    800
}
fn default_primary_height() -> u32 {
    600
}
fn default_primary_quality() -> u8 {
    70
}
fn default_fallback_width() -> u32 {
    400
}
fn default_fallback_height() -> u32 {
    300
}
fn default_fallback_quality() -> u8 {
    50
}
fn default_max_upload() -> usize {
    5 * 1024 * 1024
}
fn default_max_embedded() -> usize {
    500_000
}

impl Default for ImageSettings {
    fn default() -> Self {
        ImageSettings {
            primary_max_width: default_primary_width(),
            primary_max_height: default_primary_height(),
            primary_quality: default_primary_quality(),
            fallback_max_width: default_fallback_width(),
            fallback_max_height: default_fallback_height(),
            fallback_quality: default_fallback_quality(),
            max_upload_bytes: default_max_upload(),
            max_embedded_chars: default_max_embedded(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MenuConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub timeouts: TimeoutSettings,

    #[serde(default)]
    pub monitor: MonitorSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub images: ImageSettings,
}

impl MenuConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (config.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        for (name, raw) in [
            ("catalog_url", &self.api.catalog_url),
            ("auth_url", &self.api.auth_url),
        ] {
            let parsed = url::Url::parse(raw)
                .map_err(|e| SyncError::InvalidUrl(format!("{} '{}': {}", name, raw, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(SyncError::InvalidUrl(format!(
                    "{} must start with http:// or https://, got: {}",
                    name, raw
                )));
            }
        }

        let t = &self.timeouts;
        if t.probe_secs == 0 || t.read_secs == 0 || t.write_secs == 0 || t.replay_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "timeouts must be greater than 0".into(),
            ));
        }

        if self.monitor.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "monitor.interval_secs must be greater than 0".into(),
            ));
        }

        if self.storage.capacity_bytes == 0 {
            return Err(SyncError::InvalidConfig(
                "storage.capacity_bytes must be greater than 0".into(),
            ));
        }

        let img = &self.images;
        if img.primary_max_width == 0
            || img.primary_max_height == 0
            || img.fallback_max_width == 0
            || img.fallback_max_height == 0
        {
            return Err(SyncError::InvalidConfig(
                "image bounds must be greater than 0".into(),
            ));
        }
        for quality in [img.primary_quality, img.fallback_quality] {
            if !(1..=100).contains(&quality) {
                return Err(SyncError::InvalidConfig(format!(
                    "image quality must be between 1 and 100, got {}",
                    quality
                )));
            }
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("MENU_CATALOG_URL") {
            debug!(url = %url, "Overriding catalog URL from environment");
            self.api.catalog_url = url;
        }

        if let Ok(url) = std::env::var("MENU_AUTH_URL") {
            debug!(url = %url, "Overriding auth URL from environment");
            self.api.auth_url = url;
        }

        if let Ok(path) = std::env::var("MENU_STORAGE_PATH") {
            self.storage.path = Some(PathBuf::from(path));
        }

        if let Ok(capacity) = std::env::var("MENU_STORAGE_CAPACITY") {
            match capacity.parse::<u64>() {
                Ok(c) => self.storage.capacity_bytes = c,
                Err(_) => warn!(value = %capacity, "Ignoring invalid MENU_STORAGE_CAPACITY"),
            }
        }

        if let Ok(interval) = std::env::var("MENU_PROBE_INTERVAL_SECS") {
            if let Ok(secs) = interval.parse::<u64>() {
                debug!(secs, "Overriding probe interval from environment");
                self.monitor.interval_secs = secs;
            }
        }

        if let Ok(flag) = std::env::var("MENU_AUTO_REPLAY") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.monitor.auto_replay = true,
                "0" | "false" | "no" | "off" => self.monitor.auto_replay = false,
                _ => warn!(value = %flag, "Unknown MENU_AUTO_REPLAY value"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "menu", "admin")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn catalog_url(&self) -> &str {
        &self.api.catalog_url
    }

    pub fn auth_url(&self) -> &str {
        &self.api.auth_url
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.interval_secs)
    }
}
