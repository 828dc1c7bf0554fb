use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::alerts::WalletAlerts;
use crate::bus::CHANNELS;
use crate::coordinator::{TaskState, TaskStatusRecord};
use crate::store::TRACKED_WALLETS_KEY;

use super::types::*;
use super::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn api_error(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
        }),
    )
}

fn parse_address(value: &str) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    normalize_address(value).map_err(|e| api_error(StatusCode::BAD_REQUEST, e))
}

fn store_error(e: crate::store::StoreError) -> (StatusCode, Json<ErrorResponse>) {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    let tracked = state
        .store
        .smembers(TRACKED_WALLETS_KEY)
        .await
        .map_err(store_error)?;
    let channels = CHANNELS
        .iter()
        .map(|name| ChannelStatus {
            channel: name.to_string(),
            subscribers: state.bus.subscriber_count(name),
        })
        .collect();
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        tracked_wallets: tracked.len(),
        channels,
    }))
}

// ============================================================
// Stored alerts
// ============================================================

pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlertsParams>,
) -> ApiResult<WalletAlerts> {
    let wallet = parse_address(&params.wallet_address)?;
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    state
        .alerts
        .alerts_for(&wallet, limit)
        .await
        .map(Json)
        .map_err(store_error)
}

pub async fn undelivered_alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WalletParams>,
) -> ApiResult<UndeliveredResponse> {
    let wallet = parse_address(&params.wallet_address)?;
    let undelivered = state
        .alerts
        .undelivered(&wallet)
        .await
        .map_err(store_error)?;
    Ok(Json(UndeliveredResponse {
        wallet_address: wallet,
        total: undelivered.len(),
        undelivered,
    }))
}

pub async fn mark_delivered(
    State(state): State<Arc<AppState>>,
    Path(alert_id): Path<String>,
    Query(params): Query<MarkDeliveredParams>,
) -> ApiResult<DeliveryResponse> {
    let wallet = parse_address(&params.wallet_address)?;
    let method = params.delivery_method.unwrap_or_else(|| "api".to_string());
    let found = state
        .alerts
        .mark_delivered(&wallet, &alert_id, &method)
        .await
        .map_err(store_error)?;
    if !found {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("alert {} not found for wallet {}", alert_id, wallet),
        ));
    }
    Ok(Json(DeliveryResponse {
        alert_id,
        wallet_address: wallet,
        delivery_method: method,
    }))
}

// ============================================================
// Coordination tasks
// ============================================================

fn task_accepted(task_id: Uuid) -> TaskAccepted {
    TaskAccepted {
        task_id,
        state: TaskState::Pending,
        status_path: format!("/api/v1/alerts/task-status/{}", task_id),
    }
}

pub async fn start_coordination(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CoordinateRequest>,
) -> ApiResult<TaskAccepted> {
    let wallet = parse_address(&req.wallet_address)?;
    let task_id = state.registry.create().await;

    let registry = state.registry.clone();
    let coordinator = state.coordinator.clone();
    let analysis_types = req.analysis_types;
    tokio::spawn(async move {
        registry
            .update(task_id, TaskState::Processing, Value::Null)
            .await;
        match coordinator
            .coordinate(&wallet, analysis_types.as_deref())
            .await
        {
            Ok(result) => {
                let payload = serde_json::to_value(&result).unwrap_or(Value::Null);
                registry.update(task_id, TaskState::Success, payload).await;
            }
            Err(e) => {
                registry
                    .update(task_id, TaskState::Failure, json!({"error": e.to_string()}))
                    .await;
            }
        }
    });

    Ok(Json(task_accepted(task_id)))
}

pub async fn start_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchRequest>,
) -> ApiResult<TaskAccepted> {
    if req.wallet_addresses.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "wallet_addresses must not be empty",
        ));
    }
    let mut wallets = Vec::with_capacity(req.wallet_addresses.len());
    for address in &req.wallet_addresses {
        wallets.push(parse_address(address)?);
    }
    let task_id = state.registry.create().await;

    let registry = state.registry.clone();
    let coordinator = state.coordinator.clone();
    tokio::spawn(async move {
        registry
            .update(task_id, TaskState::Processing, Value::Null)
            .await;
        let result = coordinator.coordinate_batch(&wallets).await;
        let payload = serde_json::to_value(&result).unwrap_or(Value::Null);
        registry.update(task_id, TaskState::Success, payload).await;
    });

    Ok(Json(task_accepted(task_id)))
}

/// One immediate sweep over the tracked set, same shape as the periodic
/// monitor pass.
pub async fn monitor_now(State(state): State<Arc<AppState>>) -> ApiResult<TaskAccepted> {
    let task_id = state.registry.create().await;

    let registry = state.registry.clone();
    let coordinator = state.coordinator.clone();
    let store = state.store.clone();
    tokio::spawn(async move {
        registry
            .update(task_id, TaskState::Processing, Value::Null)
            .await;
        match store.smembers(TRACKED_WALLETS_KEY).await {
            Ok(wallets) => {
                let result = coordinator.coordinate_batch(&wallets).await;
                let payload = serde_json::to_value(&result).unwrap_or(Value::Null);
                registry.update(task_id, TaskState::Success, payload).await;
            }
            Err(e) => {
                registry
                    .update(task_id, TaskState::Failure, json!({"error": e.to_string()}))
                    .await;
            }
        }
    });

    Ok(Json(task_accepted(task_id)))
}

pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<TaskStatusRecord> {
    match state.registry.get(task_id).await {
        Some(record) => Ok(Json(record)),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("unknown task {}", task_id),
        )),
    }
}

// ============================================================
// Tracked wallets
// ============================================================

pub async fn track_wallet(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WalletParams>,
) -> ApiResult<TrackResponse> {
    let wallet = parse_address(&params.wallet_address)?;
    let added = state
        .store
        .sadd(TRACKED_WALLETS_KEY, &wallet)
        .await
        .map_err(store_error)?;
    let total = state
        .store
        .smembers(TRACKED_WALLETS_KEY)
        .await
        .map_err(store_error)?
        .len();
    tracing::info!(wallet = %wallet, added, "Track wallet request");
    Ok(Json(TrackResponse {
        wallet_address: wallet,
        added,
        total_tracked: total,
    }))
}

pub async fn untrack_wallet(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WalletParams>,
) -> ApiResult<UntrackResponse> {
    let wallet = parse_address(&params.wallet_address)?;
    let removed = state
        .store
        .srem(TRACKED_WALLETS_KEY, &wallet)
        .await
        .map_err(store_error)?;
    let total = state
        .store
        .smembers(TRACKED_WALLETS_KEY)
        .await
        .map_err(store_error)?
        .len();
    tracing::info!(wallet = %wallet, removed, "Untrack wallet request");
    Ok(Json(UntrackResponse {
        wallet_address: wallet,
        removed,
        total_tracked: total,
    }))
}

pub async fn tracked_wallets(
    State(state): State<Arc<AppState>>,
) -> ApiResult<TrackedWalletsResponse> {
    let mut wallets = state
        .store
        .smembers(TRACKED_WALLETS_KEY)
        .await
        .map_err(store_error)?;
    wallets.sort();
    Ok(Json(TrackedWalletsResponse {
        total: wallets.len(),
        wallets,
    }))
}

// ============================================================
// Wallet history
// ============================================================

pub async fn wallet_transactions(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<HistoryResponse> {
    let wallet = parse_address(&address)?;
    let limit = params.limit.unwrap_or(25).clamp(1, 100);
    let mut transactions = state
        .portfolios
        .transaction_history(&wallet)
        .await
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e.to_string()))?;
    transactions.truncate(limit);
    Ok(Json(HistoryResponse {
        wallet_address: wallet,
        total: transactions.len(),
        transactions,
    }))
}

// ============================================================
// Digest
// ============================================================

pub async fn digest_entries(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DigestParams>,
) -> ApiResult<DigestResponse> {
    let limit = params.limit.unwrap_or(20).clamp(1, 200);
    let entries = state.digest.entries(limit).await.map_err(store_error)?;
    Ok(Json(DigestResponse {
        total: entries.len(),
        entries,
    }))
}
