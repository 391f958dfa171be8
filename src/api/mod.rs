pub mod handlers;
pub mod page;
pub mod types;

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::dashboard::Dashboard;
use crate::explorer::ExplorerSource;
use crate::mirror::MirrorStore;

pub struct AppState<U, S> {
    pub dashboard: Dashboard<U, S>,
    /// Wallet shown when `/` is requested without `?address=`.
    pub reference_wallet: String,
    pub refresh_secs: u64,
}

pub fn router<U, S>(state: Arc<AppState<U, S>>) -> Router
where
    U: ExplorerSource + 'static,
    S: MirrorStore + 'static,
{
    Router::new()
        .route("/", get(handlers::index::<U, S>))
        .route("/api/v1/health", get(handlers::health::<U, S>))
        .route("/api/v1/dashboard", get(handlers::dashboard::<U, S>))
        .route("/api/v1/wallet/{address}", get(handlers::wallet::<U, S>))
        .route(
            "/api/v1/wallet/{address}/transactions",
            get(handlers::transactions::<U, S>),
        )
        .route("/api/v1/tx/{hash}", get(handlers::transaction::<U, S>))
        .route("/api/v1/blocks", get(handlers::blocks::<U, S>))
        .route("/api/v1/block/{number}", get(handlers::block::<U, S>))
        .route("/api/v1/stats", get(handlers::stats::<U, S>))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve until `shutdown` is cancelled.
pub async fn serve<U, S>(
    state: Arc<AppState<U, S>>,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> eyre::Result<()>
where
    U: ExplorerSource + 'static,
    S: MirrorStore + 'static,
{
    let app = router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Dashboard server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    tracing::info!("Dashboard server stopped");
    Ok(())
}
