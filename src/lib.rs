//! WhaleWatch: on-chain whale movement monitor with multi-agent alerting.
//!
//! A transfer watcher decodes ERC-20 logs from the configured chain and
//! publishes them to an in-process event bus. A classifier marks movements
//! above per-token USD thresholds, an orchestrator fans each whale movement
//! out to concurrent analysis checks and dispatches an alert, and a
//! coordinator consolidates per-wallet portfolio analyses into stored,
//! cooldown-gated alert records served over an HTTP/websocket API.

pub mod alerts;
pub mod api;
pub mod bus;
pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod digest;
pub mod movements;
pub mod orchestrator;
pub mod sources;
pub mod store;
pub mod watcher;
