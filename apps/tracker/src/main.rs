//! Kill tracker entry point.

mod app;
mod config;
mod monitor;
mod view;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        client_ver = killtrack_protocol::CLIENT_VERSION,
        "starting kill tracker"
    );

    let config = config::Config::load()?;
    tracing::info!(
        path = %config::config_path().display(),
        commander = config.commander_heartbeat,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("tracker shut down cleanly");
    Ok(())
}
