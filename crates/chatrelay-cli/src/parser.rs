//! Command-line and environment configuration.

use clap::Parser;

use chatrelay_core::{
    DEFAULT_API_DESCRIPTION, DEFAULT_API_NAME, DEFAULT_HOST, DEFAULT_OPENAI_BASE_URL, DEFAULT_PORT,
    LogLevel, Settings, parse_origins,
};

/// Relay OpenAI chat completions to WebSocket clients.
#[derive(Debug, Parser)]
#[command(name = "chatrelay")]
#[command(version)]
#[command(about = "Stream OpenAI chat completions to WebSocket clients")]
pub struct Cli {
    /// Interface to bind
    #[arg(long, env = "CHATRELAY_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "CHATRELAY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[arg(long, env = "LOGGING_LEVEL", default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Bearer key for the upstream provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    pub openai_api_key: String,

    /// Upstream API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    pub openai_base_url: String,

    /// Service name reported at startup
    #[arg(long, env = "API_NAME", default_value = DEFAULT_API_NAME)]
    pub api_name: String,

    /// Service version reported at startup
    #[arg(long, env = "API_VERSION")]
    pub api_version: Option<String>,

    #[arg(long, env = "API_DESCRIPTION", default_value = DEFAULT_API_DESCRIPTION)]
    pub api_description: String,

    /// Allowed CORS origin; repeat for several. Any origin when omitted
    #[arg(long = "allowed-origin", env = "CHATRELAY_ALLOWED_ORIGINS")]
    pub allowed_origins: Vec<String>,
}

impl Cli {
    /// Resolve into service settings.
    #[must_use]
    pub fn into_settings(self) -> Settings {
        let defaults = Settings::default();
        Settings {
            openai_api_key: self.openai_api_key,
            openai_base_url: self.openai_base_url,
            host: self.host,
            port: self.port,
            log_level: self.log_level,
            api_name: self.api_name,
            api_version: self.api_version.unwrap_or(defaults.api_version),
            api_description: self.api_description,
            allowed_origins: self
                .allowed_origins
                .iter()
                .flat_map(|raw| parse_origins(raw))
                .collect(),
        }
    }
}
