pub mod handlers;
pub mod types;
pub mod ws;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::alerts::AlertStore;
use crate::bus::EventBus;
use crate::coordinator::{AlertCoordinator, TaskRegistry};
use crate::digest::DigestLog;
use crate::sources::PortfolioSource;
use crate::store::SharedStore;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub alerts: AlertStore,
    pub coordinator: Arc<AlertCoordinator>,
    pub registry: TaskRegistry,
    pub bus: EventBus,
    pub portfolios: Arc<dyn PortfolioSource>,
    pub digest: DigestLog,
}

pub fn router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/alerts", get(handlers::list_alerts))
        .route(
            "/api/v1/alerts/undelivered",
            get(handlers::undelivered_alerts),
        )
        .route(
            "/api/v1/alerts/mark-delivered/{alert_id}",
            post(handlers::mark_delivered),
        )
        .route(
            "/api/v1/alerts/coordinate",
            post(handlers::start_coordination),
        )
        .route("/api/v1/alerts/batch", post(handlers::start_batch))
        .route(
            "/api/v1/alerts/task-status/{task_id}",
            get(handlers::task_status),
        )
        .route(
            "/api/v1/alerts/track-wallet",
            post(handlers::track_wallet).delete(handlers::untrack_wallet),
        )
        .route(
            "/api/v1/alerts/tracked-wallets",
            get(handlers::tracked_wallets),
        )
        .route("/api/v1/alerts/monitor-now", post(handlers::monitor_now))
        .route(
            "/api/v1/wallet/{address}/transactions",
            get(handlers::wallet_transactions),
        )
        .route("/api/v1/digest", get(handlers::digest_entries))
        .route("/ws", get(ws::smart_money_ws))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    let app = router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
