//! CLI entry point - the composition root.

use clap::Parser;

use chatrelay_cli::{Cli, init_tracing};
use chatrelay_core::validate_settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = Cli::parse().into_settings();
    validate_settings(&settings)?;

    init_tracing(settings.log_level);
    tracing::debug!(?settings, "Resolved settings");

    chatrelay_axum::start_server(settings).await
}
