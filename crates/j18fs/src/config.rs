//! Configuration file parsing and structures.
//!
//! j18fs uses a single TOML file. Everything except `[octoprint]` is optional:
//! - `[octoprint]`: where the host lives and whether to follow its push socket
//! - `[widget]`: identity the host routes plugin messages by, polling cadence
//! - `[popup]`: which renderer shows popups and how long auto-hiding ones stay
//! - `[api]`: optional local HTTP API for on-demand refreshes
//! - `[plugins.<identity>]`: the host's settings trees, keyed by plugin identity

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;
use url::Url;

use crate::host::HostSettings;

/// Identity the host assigns to the filament sensor plugin.
pub const DEFAULT_IDENTITY: &str = "Julia2018FilamentSensor";

/// Title shown on every popup.
pub const DEFAULT_DISPLAY_NAME: &str = "Julia 2018 Filament Sensor";

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    pub octoprint: OctoPrintConfig,
    #[serde(default)]
    pub widget: WidgetConfig,
    #[serde(default)]
    pub popup: PopupConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub plugins: HostSettings,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"j18fs::host::socket" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

/// Where the host application lives
#[derive(Debug, Clone, Deserialize)]
pub struct OctoPrintConfig {
    /// Base URL of the host, e.g. "http://octopi.local"
    pub base_url: String,

    /// Follow the host's push socket for plugin messages
    #[serde(default = "default_true")]
    pub push_socket: bool,

    /// Seconds to wait before reopening a closed push socket
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WidgetConfig {
    /// Plugin identity; used as the status endpoint namespace and the push filter
    #[serde(default = "default_identity")]
    pub identity: String,

    /// Popup title
    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// Fetch status periodically. Absent means only at bind time and on demand.
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            identity: default_identity(),
            display_name: default_display_name(),
            poll_interval_secs: None,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Write popups to the log
    #[default]
    Log,
    /// Desktop notifications (requires the `desktop` feature)
    Desktop,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PopupConfig {
    #[serde(default)]
    pub renderer: RendererKind,

    /// How long auto-hiding popups stay visible
    #[serde(default = "default_auto_hide_ms")]
    pub auto_hide_ms: u32,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            renderer: RendererKind::default(),
            auto_hide_ms: default_auto_hide_ms(),
        }
    }
}

/// Local HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_listen(),
            port: default_port(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_identity() -> String {
    DEFAULT_IDENTITY.to_string()
}

fn default_display_name() -> String {
    DEFAULT_DISPLAY_NAME.to_string()
}

fn default_auto_hide_ms() -> u32 {
    8000
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8566
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.octoprint.url()?;

        if self.widget.identity.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "widget.identity",
                message: "must not be empty".to_string(),
            });
        }

        if self.widget.poll_interval_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "widget.poll_interval_secs",
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

impl OctoPrintConfig {
    /// Parsed base URL; only http and https are accepted
    pub fn url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|e| ConfigError::Invalid {
            field: "octoprint.base_url",
            message: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::Invalid {
                field: "octoprint.base_url",
                message: format!("unsupported scheme '{}'", other),
            }),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl WidgetConfig {
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}
