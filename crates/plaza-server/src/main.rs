//! # Plaza server
//!
//! Runs the Plaza gateway from a TOML configuration file.
//!
//! ```bash
//! # Run with ./config.toml
//! plaza-server
//!
//! # Custom file, overridden bind address, JSON logs
//! plaza-server --config production.toml --bind 0.0.0.0:3001 --json-logs
//! ```
//!
//! The server stops accepting connections on SIGINT or SIGTERM.

use std::time::Duration;

use plaza::prelude::*;

mod cli;
mod config;
mod logging;
mod signals;

use cli::CliArgs;
use config::{AppConfig, AuthSource};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("plaza-server: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let mut config = AppConfig::load_from_file(&args.config_path).await?;
    config.apply_cli(&args);
    config.validate()?;

    logging::setup_logging(&config.logging)?;

    let spaces = config.space_table()?;
    let registry = RoomRegistry::new();
    tracing::info!(
        config = %args.config_path.display(),
        spaces = spaces.len(),
        bind_address = %config.server.bind_address,
        "configuration loaded"
    );

    match config.auth_source() {
        AuthSource::Jwt(secret) => {
            serve(&config, registry, JwtVerifier::new(secret), spaces).await
        }
        AuthSource::Static(verifier) => {
            tracing::warn!(tokens = verifier.len(), "using static development tokens");
            serve(&config, registry, verifier, spaces).await
        }
    }
}

async fn serve<V: IdentityVerifier>(
    config: &AppConfig,
    registry: RoomRegistry,
    verifier: V,
    spaces: StaticSpaces,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = PlazaServer::<V, StaticSpaces, _>::builder()
        .bind(&config.server.bind_address)
        .idle_timeout(Duration::from_secs(config.server.idle_timeout_secs))
        .handshake_timeout(Duration::from_secs(config.server.handshake_timeout_secs))
        .registry(registry)
        .build(verifier, spaces)
        .await?;

    server.run_until(signals::shutdown_signal()).await?;
    Ok(())
}
