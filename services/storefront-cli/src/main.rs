//! Storefront command-line client
//!
//! Customer commands (cart, login, register) run on a challenge executor: a
//! rejected call opens a login prompt on the terminal and is replayed once the
//! user has signed in. Seller admin commands run on a force-reauth executor:
//! a rejected call signs the seller out and reports where to sign in again.

mod commands;
mod config;
mod error;
mod prompt;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{Command, take_flag};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; LOG_LEVEL wins over RUST_LOG. LOG_FORMAT=json for structured output.
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let cli_config_path = take_flag(&mut args, "--config");
    let command = Command::parse(&args)?;

    let config_path = Config::resolve_path(cli_config_path.as_deref());
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    info!(
        path = %config_path.display(),
        base_url = %config.api.base_url,
        credentials = %config.storage.credentials_path.display(),
        store_credential = config.api.store_credential.is_some(),
        "configuration loaded"
    );

    commands::run(command, &config).await
}
