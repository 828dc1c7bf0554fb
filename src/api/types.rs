use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::alerts::Alert;
use crate::coordinator::TaskState;
use crate::sources::TxSummary;

// ============================================================
// Address normalization
// ============================================================

/// Canonical wallet-address form used for store keys: 0x-prefixed,
/// lowercase. Accepts the bare 40-hex-digit form too.
pub fn normalize_address(value: &str) -> Result<String, String> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    if stripped.len() != 40 || hex::decode(stripped).is_err() {
        return Err(format!("invalid wallet address: {}", value));
    }
    Ok(format!("0x{}", stripped.to_ascii_lowercase()))
}

// ============================================================
// Query params & request bodies
// ============================================================

#[derive(Debug, Deserialize)]
pub struct AlertsParams {
    pub wallet_address: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct WalletParams {
    pub wallet_address: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkDeliveredParams {
    pub wallet_address: String,
    pub delivery_method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CoordinateRequest {
    pub wallet_address: String,
    /// Subset of analysis agents to run; omitted means all of them.
    pub analysis_types: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub wallet_addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct DigestParams {
    pub limit: Option<usize>,
}

// ============================================================
// Response types
// ============================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub tracked_wallets: usize,
    pub channels: Vec<ChannelStatus>,
}

#[derive(Debug, Serialize)]
pub struct ChannelStatus {
    pub channel: String,
    pub subscribers: usize,
}

#[derive(Debug, Serialize)]
pub struct UndeliveredResponse {
    pub wallet_address: String,
    pub undelivered: Vec<Alert>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct DeliveryResponse {
    pub alert_id: String,
    pub wallet_address: String,
    pub delivery_method: String,
}

/// Acknowledgement for a background coordination run; poll `status_path`
/// for PENDING -> PROCESSING -> SUCCESS | FAILURE.
#[derive(Debug, Serialize)]
pub struct TaskAccepted {
    pub task_id: Uuid,
    pub state: TaskState,
    pub status_path: String,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub wallet_address: String,
    pub added: bool,
    pub total_tracked: usize,
}

#[derive(Debug, Serialize)]
pub struct UntrackResponse {
    pub wallet_address: String,
    pub removed: bool,
    pub total_tracked: usize,
}

#[derive(Debug, Serialize)]
pub struct TrackedWalletsResponse {
    pub wallets: Vec<String>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub wallet_address: String,
    pub transactions: Vec<TxSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct DigestResponse {
    pub entries: Vec<Value>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
