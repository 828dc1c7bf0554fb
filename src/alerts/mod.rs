//! Alert domain: typed alerts, cooldown gating, trigger rules, and the
//! per-wallet consolidated alert store.

pub mod cooldown;
pub mod manager;
pub mod store;
pub mod types;

pub use cooldown::CooldownTracker;
pub use manager::AlertManager;
pub use store::{AlertStore, WalletAlerts};
pub use types::{AgentSection, Alert, AlertType, ConsolidatedAlert, Severity};
