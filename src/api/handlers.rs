use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;
use chrono::Utc;
use std::sync::Arc;

use super::page::render_dashboard;
use super::types::*;
use super::AppState;
use crate::explorer::ExplorerSource;
use crate::mirror::MirrorStore;
use crate::normalize::coerce::{is_hex_address, is_hex_hash};
use crate::normalize::{Block, NetworkStats, Transaction, Wallet};

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Upper bound for `?limit=` on list sections.
const MAX_LIMIT: u32 = 100;

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
        }),
    )
}

fn parse_address(address: &str) -> Result<&str, ApiError> {
    let address = address.trim();
    if is_hex_address(address) {
        Ok(address)
    } else {
        Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid wallet address: {}", address),
        ))
    }
}

fn parse_hash(hash: &str) -> Result<&str, ApiError> {
    let hash = hash.trim();
    if is_hex_hash(hash) {
        Ok(hash)
    } else {
        Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid transaction hash: {}", hash),
        ))
    }
}

fn clamp_limit(limit: Option<u32>, default: u32) -> u32 {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

// ============================================================
// Page & health
// ============================================================

pub async fn index<U, S>(
    State(state): State<Arc<AppState<U, S>>>,
    Query(params): Query<AddressParam>,
) -> Result<Html<String>, ApiError>
where
    U: ExplorerSource + 'static,
    S: MirrorStore + 'static,
{
    let view = dashboard_view(&state, params.address.as_deref()).await?;
    Ok(Html(render_dashboard(&view)))
}

pub async fn health<U, S>(State(state): State<Arc<AppState<U, S>>>) -> Json<HealthResponse>
where
    U: ExplorerSource + 'static,
    S: MirrorStore + 'static,
{
    let store_reachable = match state.dashboard.mirror().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Mirror store unreachable");
            false
        }
    };

    Json(HealthResponse {
        status: if store_reachable { "ok" } else { "degraded" }.to_string(),
        store_reachable,
        checked_at: Utc::now(),
    })
}

// ============================================================
// Sections
// ============================================================

pub async fn dashboard<U, S>(
    State(state): State<Arc<AppState<U, S>>>,
    Query(params): Query<AddressParam>,
) -> ApiResult<DashboardView>
where
    U: ExplorerSource + 'static,
    S: MirrorStore + 'static,
{
    dashboard_view(&state, params.address.as_deref())
        .await
        .map(Json)
}

pub async fn wallet<U, S>(
    State(state): State<Arc<AppState<U, S>>>,
    Path(address): Path<String>,
) -> ApiResult<Section<Wallet>>
where
    U: ExplorerSource + 'static,
    S: MirrorStore + 'static,
{
    let address = parse_address(&address)?;
    Ok(Json(state.dashboard.wallet(address).await.into()))
}

pub async fn transactions<U, S>(
    State(state): State<Arc<AppState<U, S>>>,
    Path(address): Path<String>,
    Query(params): Query<LimitParam>,
) -> ApiResult<Section<Vec<Transaction>>>
where
    U: ExplorerSource + 'static,
    S: MirrorStore + 'static,
{
    let address = parse_address(&address)?;
    let limit = clamp_limit(params.limit, state.dashboard.settings().tx_page_size);
    Ok(Json(
        state.dashboard.transactions(address, limit).await.into(),
    ))
}

/// `?address=` picks the wallet the direction is taken relative to.
pub async fn transaction<U, S>(
    State(state): State<Arc<AppState<U, S>>>,
    Path(hash): Path<String>,
    Query(params): Query<AddressParam>,
) -> ApiResult<Section<Transaction>>
where
    U: ExplorerSource + 'static,
    S: MirrorStore + 'static,
{
    let hash = parse_hash(&hash)?;
    let wallet = match params.address.as_deref() {
        Some(address) => parse_address(address)?,
        None => state.reference_wallet.as_str(),
    };
    Ok(Json(state.dashboard.transaction(wallet, hash).await.into()))
}

pub async fn blocks<U, S>(
    State(state): State<Arc<AppState<U, S>>>,
    Query(params): Query<LimitParam>,
) -> Json<Section<Vec<Block>>>
where
    U: ExplorerSource + 'static,
    S: MirrorStore + 'static,
{
    let default = state.dashboard.settings().latest_blocks as u32;
    let limit = clamp_limit(params.limit, default);
    Json(state.dashboard.latest_blocks(limit as usize).await.into())
}

pub async fn block<U, S>(
    State(state): State<Arc<AppState<U, S>>>,
    Path(number): Path<u64>,
) -> Json<Section<Block>>
where
    U: ExplorerSource + 'static,
    S: MirrorStore + 'static,
{
    Json(state.dashboard.block(number).await.into())
}

pub async fn stats<U, S>(State(state): State<Arc<AppState<U, S>>>) -> Json<Section<NetworkStats>>
where
    U: ExplorerSource + 'static,
    S: MirrorStore + 'static,
{
    let settings = state.dashboard.settings();
    let blocks = state.dashboard.latest_blocks(settings.latest_blocks).await;
    let transactions = state
        .dashboard
        .transactions(&state.reference_wallet, settings.tx_page_size)
        .await;
    Json(
        state
            .dashboard
            .network_stats(&blocks, &transactions)
            .await
            .into(),
    )
}

async fn dashboard_view<U, S>(
    state: &AppState<U, S>,
    address: Option<&str>,
) -> Result<DashboardView, ApiError>
where
    U: ExplorerSource,
    S: MirrorStore,
{
    let address = match address {
        Some(address) => parse_address(address)?,
        None => state.reference_wallet.as_str(),
    };
    let overview = state.dashboard.overview(address).await;
    Ok(DashboardView::new(overview, state.refresh_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert!(parse_address("0x002624Fa55DFf0ca53aF9166B4d44c16a294C4e0").is_ok());
        let (status, body) = parse_address("0x1234").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.0.error.contains("0x1234"));
    }

    #[test]
    fn test_parse_hash() {
        assert_eq!(parse_hash(" 0xFEED ").unwrap(), "0xFEED");
        for bad in ["feed", "0x", "0xabc", "0xzz"] {
            let (status, _) = parse_hash(bad).unwrap_err();
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None, 25), 25);
        assert_eq!(clamp_limit(Some(0), 25), 1);
        assert_eq!(clamp_limit(Some(5000), 25), MAX_LIMIT);
    }
}
