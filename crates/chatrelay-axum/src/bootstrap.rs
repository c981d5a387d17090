//! Axum server bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the Axum web adapter. The OpenAI client is instantiated here and
//! handed to the relay as a [`GenerationPort`] trait object.

use std::sync::Arc;

use anyhow::{Context, Result};
use chatrelay_core::{GenerationPort, Relay, Settings};
use chatrelay_openai::{OpenAiClient, OpenAiConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::routes::{ROUTES, create_router};

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

impl CorsConfig {
    /// An empty origin list allows every origin.
    #[must_use]
    pub fn from_origins(origins: &[String]) -> Self {
        if origins.is_empty() {
            Self::AllowAll
        } else {
            Self::AllowOrigins(origins.to_vec())
        }
    }
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port for the HTTP server.
    pub port: u16,
    /// CORS configuration.
    pub cors: CorsConfig,
}

impl ServerConfig {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            cors: CorsConfig::from_origins(&settings.allowed_origins),
        }
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Service identity reported at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl ApiInfo {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            name: settings.api_name.clone(),
            version: settings.api_version.clone(),
            description: settings.api_description.clone(),
        }
    }
}

/// Initialized context for the Axum server.
///
/// Shared by every connection behind [`crate::AppState`].
#[derive(Debug)]
pub struct AxumContext {
    /// Relay driving every WebSocket session.
    pub relay: Relay,
    pub api: ApiInfo,
}

impl AxumContext {
    pub fn new(upstream: Arc<dyn GenerationPort>, api: ApiInfo) -> Self {
        Self {
            relay: Relay::new(upstream),
            api,
        }
    }
}

/// Bootstrap the relay against the configured OpenAI-compatible provider.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be constructed.
pub fn bootstrap(settings: &Settings) -> Result<AxumContext> {
    let config = OpenAiConfig::from_settings(settings);
    info!(base_url = %config.base_url, "Initializing upstream client");

    let client = OpenAiClient::new(config).context("Failed to build upstream HTTP client")?;
    let upstream: Arc<dyn GenerationPort> = Arc::new(client);

    Ok(AxumContext::new(upstream, ApiInfo::from_settings(settings)))
}

/// Serve the router on an already-bound listener until `cancel` fires.
///
/// Open WebSocket sessions are left to finish on their own; the listener
/// stops accepting as soon as the token is cancelled.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve(
    listener: TcpListener,
    ctx: AxumContext,
    cors: &CorsConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let app = create_router(ctx, cors);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Start the web server described by `settings`.
///
/// Shuts down gracefully on Ctrl-C.
///
/// # Errors
///
/// Returns an error if bootstrapping fails, the address cannot be bound,
/// or the server stops with an error.
pub async fn start_server(settings: Settings) -> Result<()> {
    let server = ServerConfig::from_settings(&settings);
    let ctx = bootstrap(&settings)?;

    let addr = server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        name = %ctx.api.name,
        version = %ctx.api.version,
        "{}", ctx.api.description
    );
    for (method, path) in ROUTES {
        info!("Route: {method} {path}");
    }
    info!("chatrelay listening on http://{}", listener.local_addr()?);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        on_signal.cancel();
    });

    serve(listener, ctx, &server.cors, cancel).await
}
