use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use quaiscan_dashboard::api::{self, AppState};
use quaiscan_dashboard::config::{Config, Secrets};
use quaiscan_dashboard::dashboard::{Dashboard, DashboardSettings};
use quaiscan_dashboard::explorer::ExplorerClient;
use quaiscan_dashboard::mirror::{MirrorStore, PgMirror};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Initialize structured logging (set RUST_LOG=debug for more output)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    tracing::info!("QuaiScan Dashboard starting");

    // Secrets may come from a local .env file
    dotenv::dotenv().ok();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;
    tracing::info!(
        explorer = %config.explorer.base_url,
        reference_wallet = %config.dashboard.reference_wallet,
        "Configuration loaded"
    );

    let secrets = Secrets::from_env()?;

    let explorer = ExplorerClient::new(&config.explorer, &secrets.api_key)?;
    let mirror = PgMirror::connect(&config.database, &secrets)?;

    if config.database.run_migrations {
        mirror.migrate().await?;
        tracing::info!("Database migrations complete");
    }

    match mirror.ping().await {
        Ok(()) => tracing::info!("Mirror store reachable"),
        Err(e) => tracing::warn!(error = %e, "Mirror store unreachable, continuing without fallback"),
    }

    let dashboard = Dashboard::new(explorer, mirror, DashboardSettings::from(&config));

    if config.dashboard.sync_on_startup {
        dashboard.sync(&config.dashboard.reference_wallet).await;
    }

    let state = Arc::new(AppState {
        dashboard,
        reference_wallet: config.dashboard.reference_wallet.clone(),
        refresh_secs: config.dashboard.refresh_secs,
    });

    // Create shutdown signal
    let shutdown = CancellationToken::new();

    let server = {
        let shutdown = shutdown.clone();
        let host = config.api.host.clone();
        let port = config.api.port;
        tokio::spawn(async move {
            if let Err(e) = api::serve(state, &host, port, shutdown).await {
                tracing::error!(error = %e, "Dashboard server failed");
            }
        })
    };

    tracing::info!("Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping server...");
    shutdown.cancel();

    let _ = server.await;

    tracing::info!("QuaiScan Dashboard stopped gracefully");
    Ok(())
}
