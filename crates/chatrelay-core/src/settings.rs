//! Settings domain types and validation.
//!
//! This module contains the service settings used across the workspace.
//! These are plain values; the binary fills them from CLI flags and the
//! environment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default upstream API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default API name reported at startup.
pub const DEFAULT_API_NAME: &str = "chatrelay";

/// Default API description.
pub const DEFAULT_API_DESCRIPTION: &str =
    "WebSocket relay streaming chat completions from an OpenAI-compatible provider";

/// Service log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Parse a level name, case-insensitively. `WARN` is accepted.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARNING" | "WARN" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            "CRITICAL" => Some(Self::Critical),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Equivalent `tracing` filter directive.
    #[must_use]
    pub const fn as_filter_directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| SettingsError::InvalidLogLevel(s.to_string()))
    }
}

/// Service settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Bearer key for the upstream provider.
    pub openai_api_key: String,
    /// Upstream API base URL, without a trailing `/chat/completions`.
    pub openai_base_url: String,
    pub host: String,
    pub port: u16,
    pub log_level: LogLevel,
    pub api_name: String,
    pub api_version: String,
    pub api_description: String,
    /// CORS origins; empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_level: LogLevel::default(),
            api_name: DEFAULT_API_NAME.to_string(),
            api_version: env!("CARGO_PKG_VERSION").to_string(),
            api_description: DEFAULT_API_DESCRIPTION.to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.openai_api_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("Settings")
            .field("openai_api_key", &key)
            .field("openai_base_url", &self.openai_base_url)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("api_name", &self.api_name)
            .field("api_version", &self.api_version)
            .field("api_description", &self.api_description)
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

impl Settings {
    /// Default settings with the given API key.
    #[must_use]
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            openai_api_key: key.into(),
            ..Self::default()
        }
    }

    /// `host:port` string for binding the listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split a comma-separated origin list, dropping blanks.
#[must_use]
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("OPENAI_API_KEY is required")]
    MissingApiKey,

    #[error("Upstream base URL must start with http:// or https://, got {0}")]
    InvalidBaseUrl(String),

    #[error("Port must be non-zero, got {0}")]
    InvalidPort(u16),

    #[error("Log level must be one of DEBUG, INFO, WARNING, ERROR, CRITICAL, got {0}")]
    InvalidLogLevel(String),
}

/// Validate settings values.
///
/// # Errors
///
/// Returns the first `SettingsError` found.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if settings.openai_api_key.trim().is_empty() {
        return Err(SettingsError::MissingApiKey);
    }

    let url = settings.openai_base_url.as_str();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(SettingsError::InvalidBaseUrl(url.to_string()));
    }

    if settings.port == 0 {
        return Err(SettingsError::InvalidPort(settings.port));
    }

    Ok(())
}
