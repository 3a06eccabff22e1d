//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CAMPUS_SYNC_MODE=manual                                            │
//! │     CAMPUS_REMOTE_URL=https://school.example/api                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/campus/sync.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.campus.campus/sync.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     SyncMode::Periodic, hourly, linear backoff                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Front Office Tablet"
//!
//! [remote]
//! base_url = "https://school.example/api/v1"
//! api_token = "..."
//! request_timeout_secs = 30
//!
//! [sync]
//! mode = "periodic"  # periodic | manual | offline
//! interval_hours = 1
//! unit_timeout_secs = 30
//! requires_network = true
//! retry_on_partial_failure = false
//!
//! [retry]
//! kind = "linear"    # linear | exponential
//! base_delay_secs = 30
//! max_delay_secs = 3600
//! max_attempts = 5
//!
//! [network]
//! probe_addr = "1.1.1.1:443"
//! probe_timeout_ms = 3000
//!
//! [database]
//! path = "/var/lib/campus/campus.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::retry::{BackoffKind, RetryPolicy};

// =============================================================================
// Sync Mode
// =============================================================================

/// How the daemon triggers sync passes.
///
/// ```text
/// PERIODIC (Default)  registers a recurring pass every `interval_hours`
/// MANUAL              passes only run when requested (`campus-syncd once`)
/// OFFLINE             sync disabled, the app works from the cache only
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Recurring background passes.
    #[default]
    Periodic,

    /// On-demand passes only.
    Manual,

    /// Sync disabled.
    Offline,
}

impl SyncMode {
    /// Returns true if sync is enabled at all.
    pub fn is_sync_enabled(&self) -> bool {
        !matches!(self, SyncMode::Offline)
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Periodic => write!(f, "periodic"),
            SyncMode::Manual => write!(f, "manual"),
            SyncMode::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for SyncMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "periodic" | "auto" => Ok(SyncMode::Periodic),
            "manual" | "on-demand" => Ok(SyncMode::Manual),
            "offline" | "disabled" => Ok(SyncMode::Offline),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown sync mode: '{}'. Valid options: periodic, manual, offline",
                other
            ))),
        }
    }
}

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4), generated on first run.
    pub id: String,

    /// Human-readable device name.
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "Campus Device".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Remote Settings
// =============================================================================

/// Where the authoritative document store lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL of the document API. Required unless sync is offline.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token for the document API.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Per-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            base_url: None,
            api_token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Trigger mode.
    #[serde(default)]
    pub mode: SyncMode,

    /// Hours between periodic passes.
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Bound on each unit's remote fetch (seconds).
    #[serde(default = "default_unit_timeout")]
    pub unit_timeout_secs: u64,

    /// Skip periodic passes while the network probe reports offline.
    #[serde(default = "default_true")]
    pub requires_network: bool,

    /// Retry passes that ended in PartialFailure.
    #[serde(default)]
    pub retry_on_partial_failure: bool,

    /// Cap on units running at once. Unset = all units in parallel.
    #[serde(default)]
    pub max_concurrent_units: Option<usize>,
}

fn default_interval_hours() -> u64 {
    1
}

fn default_unit_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            mode: SyncMode::default(),
            interval_hours: default_interval_hours(),
            unit_timeout_secs: default_unit_timeout(),
            requires_network: true,
            retry_on_partial_failure: false,
            max_concurrent_units: None,
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Backoff applied by the scheduler between pass attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Linear or exponential growth.
    #[serde(default)]
    pub kind: BackoffKind,

    /// First retry delay (seconds).
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,

    /// Upper bound on any single delay (seconds).
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,

    /// Retries after the first attempt. 0 disables retrying.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay() -> u64 {
    30
}

fn default_max_delay() -> u64 {
    3600
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            kind: BackoffKind::default(),
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

// =============================================================================
// Network Settings
// =============================================================================

/// Connectivity probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// host:port the probe connects to. Unset = derive from the remote URL.
    #[serde(default)]
    pub probe_addr: Option<String>,

    /// Probe connect timeout (milliseconds).
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

fn default_probe_timeout() -> u64 {
    3000
}

impl Default for NetworkSettings {
    fn default() -> Self {
        NetworkSettings {
            probe_addr: None,
            probe_timeout_ms: default_probe_timeout(),
        }
    }
}

/// Local cache location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Unset = platform data dir.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Device-specific configuration.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Remote document API.
    #[serde(default)]
    pub remote: RemoteSettings,

    /// Sync behavior settings.
    #[serde(default)]
    pub sync: SyncSettings,

    /// Pass retry backoff.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Connectivity probe.
    #[serde(default)]
    pub network: NetworkSettings,

    /// Local cache.
    #[serde(default)]
    pub database: DatabaseSettings,
}

/// Placeholder written into template configs.
pub const TEMPLATE_BASE_URL: &str = "https://school.example/api/v1";

impl SyncConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starter config for `config --write`.
    ///
    /// Sync stays offline until the operator points `remote.base_url` at a
    /// real server and picks a mode, so the written file always loads.
    pub fn template() -> Self {
        let mut config = Self::default();
        config.remote.base_url = Some(TEMPLATE_BASE_URL.to_string());
        config.sync.mode = SyncMode::Offline;
        config
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
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
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Sync config saved");
        Ok(path)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("device.id must not be empty".into()));
        }

        match &self.remote.base_url {
            Some(raw) => {
                let url = Url::parse(raw)?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(SyncError::InvalidUrl(format!(
                        "Remote URL must start with http:// or https://, got: {}",
                        raw
                    )));
                }
            }
            None if self.sync.mode.is_sync_enabled() => {
                return Err(SyncError::InvalidConfig(
                    "remote.base_url is required unless sync.mode is offline".into(),
                ));
            }
            None => {}
        }

        if self.sync.interval_hours == 0 {
            return Err(SyncError::InvalidConfig(
                "interval_hours must be greater than 0".into(),
            ));
        }

        if self.sync.unit_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "unit_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.sync.max_concurrent_units == Some(0) {
            return Err(SyncError::InvalidConfig(
                "max_concurrent_units must be greater than 0 when set".into(),
            ));
        }

        if self.retry.base_delay_secs > self.retry.max_delay_secs {
            return Err(SyncError::InvalidConfig(
                "retry.base_delay_secs must not exceed retry.max_delay_secs".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("CAMPUS_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Ok(mode) = std::env::var("CAMPUS_SYNC_MODE") {
            match mode.parse() {
                Ok(parsed) => {
                    debug!(mode = %mode, "Overriding sync mode from environment");
                    self.sync.mode = parsed;
                }
                Err(_) => warn!(mode = %mode, "Unknown sync mode in environment"),
            }
        }

        if let Ok(url) = std::env::var("CAMPUS_REMOTE_URL") {
            debug!(url = %url, "Overriding remote URL from environment");
            self.remote.base_url = Some(url);
        }

        if let Ok(token) = std::env::var("CAMPUS_API_TOKEN") {
            self.remote.api_token = Some(token);
        }

        if let Ok(hours) = std::env::var("CAMPUS_SYNC_INTERVAL_HOURS") {
            if let Ok(h) = hours.parse::<u64>() {
                self.sync.interval_hours = h;
            }
        }

        if let Ok(path) = std::env::var("CAMPUS_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "campus", "campus")
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the device ID.
    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Returns the sync mode.
    pub fn mode(&self) -> SyncMode {
        self.sync.mode
    }

    /// Returns true if sync is enabled.
    pub fn is_sync_enabled(&self) -> bool {
        self.sync.mode.is_sync_enabled()
    }

    /// Interval between periodic passes.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_hours * 3600)
    }

    /// Bound on each unit's remote fetch.
    pub fn unit_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.unit_timeout_secs)
    }

    /// Scheduler retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            kind: self.retry.kind,
            base_delay: Duration::from_secs(self.retry.base_delay_secs),
            max_delay: Duration::from_secs(self.retry.max_delay_secs),
            max_attempts: self.retry.max_attempts,
        }
    }

    /// The address the connectivity probe dials.
    ///
    /// Falls back to the remote API's host and port.
    pub fn probe_addr(&self) -> Option<String> {
        if let Some(addr) = &self.network.probe_addr {
            return Some(addr.clone());
        }

        let url = Url::parse(self.remote.base_url.as_deref()?).ok()?;
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        Some(format!("{}:{}", host, port))
    }

    /// Probe connect timeout.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.network.probe_timeout_ms)
    }

    /// SQLite path, defaulting to the platform data dir.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database
            .path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("campus.db")))
    }
}
