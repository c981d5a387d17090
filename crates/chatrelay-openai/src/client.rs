//! Streaming Chat Completions client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chatrelay_core::{FragmentStream, GenerationParams, GenerationPort, Settings, UpstreamError};
use reqwest::Client;
use tracing::{debug, error};

use crate::models::provider_message;
use crate::params::CompletionRequest;
use crate::sse::fragment_stream;

/// Connection settings for an OpenAI-compatible provider.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Base URL such as `https://api.openai.com/v1`.
    pub base_url: String,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.openai_api_key, &settings.openai_base_url)
    }

    /// Full URL of the chat completions endpoint.
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// [`GenerationPort`] backed by an OpenAI-compatible HTTP API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Build a client with a pooled HTTP connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(config: OpenAiConfig) -> reqwest::Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub const fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

#[async_trait]
impl GenerationPort for OpenAiClient {
    async fn open_stream(&self, params: GenerationParams) -> Result<FragmentStream, UpstreamError> {
        let url = self.config.completions_url();
        let body = CompletionRequest::from_params(params);
        debug!(model = %body.model, "Opening upstream stream at {url}");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach upstream provider: {e}");
                UpstreamError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = provider_message(status.as_u16(), &text);
            error!("Upstream error {status}: {message}");
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(fragment_stream(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_joins_base() {
        let config = OpenAiConfig::new("k", "https://api.openai.com/v1");
        assert_eq!(
            config.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
        let config = OpenAiConfig::new("k", "http://localhost:8080/v1/");
        assert_eq!(
            config.completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn debug_redacts_key() {
        let config = OpenAiConfig::new("sk-very-secret", "https://api.openai.com/v1");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-very-secret"));
    }

    #[test]
    fn client_builds_from_config() {
        let config = OpenAiConfig::new("sk-test", "http://127.0.0.1:9/v1");
        let client = tokio_test::assert_ok!(OpenAiClient::new(config));
        assert_eq!(client.config().base_url, "http://127.0.0.1:9/v1");
    }

    #[test]
    fn from_settings_copies_connection_fields() {
        let settings = Settings {
            openai_base_url: "http://127.0.0.1:9/v1".to_string(),
            ..Settings::with_api_key("sk-test")
        };
        let config = OpenAiConfig::from_settings(&settings);
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.base_url, "http://127.0.0.1:9/v1");
    }
}
