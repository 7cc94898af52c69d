//! Configuration management for expensedesk
//!
//! This module handles loading, validation, and management of
//! expensedesk configuration from YAML files.

pub mod error;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use error::ConfigError;

// ==================== Configuration Types ====================

/// REST backend the console talks to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Scheme, host and port of the backend (plain http)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Context path every endpoint lives under
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Raw `Cookie` header value forwarded with every request (e.g. `jwt=...`)
    #[serde(default)]
    pub session_cookie: Option<String>,
    /// Log in with these on start instead of relying on `session_cookie`
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            base_path: default_base_path(),
            session_cookie: None,
            username: None,
            password: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_base_path() -> String {
    "/api/expense-tracker".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Development backend settings (`expensedesk serve`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Fill the in-memory store with sample expenses on start
    #[serde(default = "default_true")]
    pub seed_demo_data: bool,
    /// When set, requests must carry this value in the `jwt` cookie
    #[serde(default)]
    pub session_token: Option<String>,
    /// Password of the built-in `demo` user at `/auth/login`
    #[serde(default = "default_demo_password")]
    pub demo_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            seed_demo_data: true,
            session_token: None,
            demo_password: default_demo_password(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_demo_password() -> String {
    "demo".to_string()
}

fn default_true() -> bool {
    true
}

/// Pagination settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Rows per page when the URL carries no `size`
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    /// Sizes offered by the page-size selector
    #[serde(default = "default_page_size_options")]
    pub page_size_options: Vec<u32>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            page_size_options: default_page_size_options(),
        }
    }
}

fn default_page_size() -> u32 {
    5
}

fn default_page_size_options() -> Vec<u32> {
    vec![2, 3, 5, 7, 11, 13, 17, 19]
}

/// Column filter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Quiet period after the last filter edit before a fetch is issued
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

/// Currency and number formatting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// Symbol printed in front of amounts
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Number of decimal places
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
    /// Thousands separator
    #[serde(default = "default_thousands_sep")]
    pub thousands_separator: String,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            decimal_places: default_decimal_places(),
            thousands_separator: default_thousands_sep(),
        }
    }
}

fn default_symbol() -> String {
    "₹".to_string()
}

fn default_decimal_places() -> u32 {
    2
}

fn default_thousands_sep() -> String {
    ",".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Backend settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Development server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Pagination settings
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Filter settings
    #[serde(default)]
    pub filter: FilterConfig,
    /// Currency settings
    #[serde(default)]
    pub currency: CurrencyConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::IoError)?;
        Self::from_yaml(&content)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::FileNotFound { path }) => {
                log::warn!("Config file {} not found, using defaults", path);
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse and validate YAML text
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content).map_err(|e| ConfigError::InvalidYaml {
            message: e.to_string(),
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api.base_url.starts_with("http://") {
            return Err(ConfigError::InvalidValue {
                field: "api.base_url".to_string(),
                reason: "Base URL must start with http://".to_string(),
            });
        }

        if !self.api.base_path.is_empty() && !self.api.base_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "api.base_path".to_string(),
                reason: "Base path must be empty or start with '/'".to_string(),
            });
        }

        if self.api.username.is_some() != self.api.password.is_some() {
            return Err(ConfigError::InvalidValue {
                field: "api.password".to_string(),
                reason: "api.username and api.password must be set together".to_string(),
            });
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                reason: "Port must be greater than 0".to_string(),
            });
        }

        if self.pagination.default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pagination.default_page_size".to_string(),
                reason: "Page size must be greater than 0".to_string(),
            });
        }

        if self.pagination.page_size_options.iter().any(|size| *size == 0) {
            return Err(ConfigError::InvalidValue {
                field: "pagination.page_size_options".to_string(),
                reason: "Every page size option must be greater than 0".to_string(),
            });
        }

        if self.filter.debounce_ms > 10_000 {
            return Err(ConfigError::InvalidValue {
                field: "filter.debounce_ms".to_string(),
                reason: "Quiet period must be at most 10000 ms".to_string(),
            });
        }

        if self.currency.decimal_places > 10 {
            return Err(ConfigError::InvalidValue {
                field: "currency.decimal_places".to_string(),
                reason: "Decimal places must be between 0 and 10".to_string(),
            });
        }

        Ok(())
    }

    /// Generate a default configuration file
    pub fn generate_default() -> &'static str {
        include_str!("../templates/default_config.yaml")
    }

    /// Full URL prefix for REST calls, e.g. `http://127.0.0.1:8080/api/expense-tracker`
    pub fn api_root(&self) -> String {
        format!(
            "{}{}",
            self.api.base_url.trim_end_matches('/'),
            self.api.base_path.trim_end_matches('/')
        )
    }
}
