use serde::Deserialize;

pub const SAFETY_MARGIN_SECONDS_DEFAULT: u64 = 300;
pub const MASK_PREFIX_LEN_DEFAULT: usize = 6;
pub const DEFAULT_DELAY_MS_DEFAULT: u64 = 60_000;
pub const BACKGROUND_RETRY_DELAY_MS_DEFAULT: u64 = 30_000;

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    #[serde(default)]
    pub mode: RefreshMode,
    /// subtracted from the endpoint-reported lifetime
    #[serde(default = "default_safety_margin_seconds")]
    pub safety_margin_seconds: u64,
    /// visible part of the token in logs and notifications
    #[serde(default = "default_mask_prefix_len")]
    pub mask_prefix_len: usize,
    /// foreign mode: used when the computed delay is not positive
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,
    /// background mode: wait used after a failed cycle or a stale expiry
    #[serde(default = "default_background_retry_delay_ms")]
    pub background_retry_delay_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub server: Option<ServerConfig>,
    pub logging: Option<LoggingConfig>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            mode: RefreshMode::default(),
            safety_margin_seconds: default_safety_margin_seconds(),
            mask_prefix_len: default_mask_prefix_len(),
            default_delay_ms: default_delay_ms(),
            background_retry_delay_ms: default_background_retry_delay_ms(),
            retry: RetryConfig::default(),
            metrics: MetricsConfig::default(),
            server: None,
            logging: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    /// an external loop calls `ensure_valid`, exhaustion is fatal
    #[default]
    Foreign,
    /// a spawned task refreshes on its own timer, exhaustion is logged
    Background,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// fixed pause between attempts
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
    /// stop retrying as soon as the endpoint answers with an error code
    #[serde(default)]
    pub abort_on_remote_error: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_ms: default_retry_delay_ms(),
            abort_on_remote_error: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { path: default_metrics_path(), is_enabled: false }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// ================================
/// Persistence
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceConfig {
    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_connect_retry_ms")]
    pub connect_retry_ms: u64,
    /// 0 keeps retrying forever
    #[serde(default)]
    pub connect_attempts: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            connect_retry_ms: default_connect_retry_ms(),
            connect_attempts: 0,
        }
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
    /// optional daily-rolling log file, written in addition to stdout
    #[serde(default)]
    pub file: Option<String>,
}

impl LoggingConfig {
    pub fn new (level: String, format: LogFormat, file: Option<String>) -> Self {
        Self { level, format, file }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_safety_margin_seconds() -> u64 {
    SAFETY_MARGIN_SECONDS_DEFAULT
}

fn default_mask_prefix_len() -> usize {
    MASK_PREFIX_LEN_DEFAULT
}

fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS_DEFAULT
}

fn default_background_retry_delay_ms() -> u64 {
    BACKGROUND_RETRY_DELAY_MS_DEFAULT
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2_000
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_db_path() -> String {
    "token-keeper.db".to_string()
}

fn default_connect_retry_ms() -> u64 {
    5_000
}
