use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub chain: ChainConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    #[serde(default)]
    pub cooldowns: CooldownConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_http: String,
    pub rpc_ws: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    pub tokens: Vec<TokenConfig>,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_digest_cap")]
    pub digest_cap: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "whalewatch".to_string(),
            digest_cap: 500,
        }
    }
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    "whalewatch".to_string()
}

fn default_digest_cap() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
        }
    }
}

fn default_channel_capacity() -> usize {
    1000
}

// ============================================================
// Classifier Config
// ============================================================

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClassifierConfig {
    /// Per-symbol USD thresholds; the "default" key covers unlisted symbols.
    #[serde(default)]
    pub whale_thresholds: HashMap<String, f64>,
}

// ============================================================
// Orchestration Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct OrchestrationConfig {
    #[serde(default = "default_workflow_threshold")]
    pub workflow_threshold_usd: f64,
    #[serde(default = "default_check_timeout_secs")]
    pub check_timeout_secs: u64,
    #[serde(default = "default_summary_attempts")]
    pub summary_attempts: u32,
    #[serde(default = "default_summary_backoff_secs")]
    pub summary_backoff_secs: u64,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            workflow_threshold_usd: 2_000_000.0,
            check_timeout_secs: 10,
            summary_attempts: 4,
            summary_backoff_secs: 5,
        }
    }
}

fn default_workflow_threshold() -> f64 {
    2_000_000.0
}

fn default_check_timeout_secs() -> u64 {
    10
}

fn default_summary_attempts() -> u32 {
    4
}

fn default_summary_backoff_secs() -> u64 {
    5
}

// ============================================================
// Cooldown Config
// ============================================================

/// Suppression windows in minutes, one per alert category.
#[derive(Debug, Deserialize, Clone)]
pub struct CooldownConfig {
    #[serde(default = "default_critical_risk_window")]
    pub critical_risk: u64,
    #[serde(default = "default_high_risk_window")]
    pub high_risk: u64,
    #[serde(default = "default_concentration_window")]
    pub concentration: u64,
    #[serde(default = "default_liquidity_window")]
    pub liquidity: u64,
    #[serde(default = "default_contract_risk_window")]
    pub contract_risk: u64,
    #[serde(default = "default_market_stress_window")]
    pub market_stress: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            critical_risk: 60,
            high_risk: 120,
            concentration: 180,
            liquidity: 240,
            contract_risk: 360,
            market_stress: 120,
        }
    }
}

fn default_critical_risk_window() -> u64 {
    60
}

fn default_high_risk_window() -> u64 {
    120
}

fn default_concentration_window() -> u64 {
    180
}

fn default_liquidity_window() -> u64 {
    240
}

fn default_contract_risk_window() -> u64 {
    360
}

fn default_market_stress_window() -> u64 {
    120
}

// ============================================================
// Monitoring Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct MonitoringConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_monitor_interval")]
    pub interval_minutes: u64,
    #[serde(default = "default_symbol")]
    pub default_symbol: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 15,
            default_symbol: "MNT".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_monitor_interval() -> u64 {
    15
}

fn default_symbol() -> String {
    "MNT".to_string()
}

// ============================================================
// Sources Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_dexscreener_url")]
    pub dexscreener_url: String,
    #[serde(default = "default_sim_api_url")]
    pub sim_api_url: String,
    #[serde(default)]
    pub sim_api_key: String,
    #[serde(default = "default_gemini_url")]
    pub gemini_url: String,
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            dexscreener_url: "https://api.dexscreener.com".to_string(),
            sim_api_url: "https://api.sim.dune.com".to_string(),
            sim_api_key: String::new(),
            gemini_url: "https://generativelanguage.googleapis.com".to_string(),
            gemini_api_key: String::new(),
            gemini_model: "gemini-2.5-flash".to_string(),
            http_timeout_secs: 15,
        }
    }
}

fn default_dexscreener_url() -> String {
    "https://api.dexscreener.com".to_string()
}

fn default_sim_api_url() -> String {
    "https://api.sim.dune.com".to_string()
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_http_timeout_secs() -> u64 {
    15
}

// ============================================================
// API Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_api_host")]
    pub host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

fn default_api_port() -> u16 {
    3000
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.chain.rpc_http.is_empty() {
            return Err(eyre::eyre!(
                "Chain '{}' must have an HTTP RPC endpoint",
                self.chain.name
            ));
        }
        if self.chain.tokens.is_empty() {
            return Err(eyre::eyre!(
                "Chain '{}' must have at least one token configured",
                self.chain.name
            ));
        }
        for token in &self.chain.tokens {
            if !token.address.starts_with("0x") || token.address.len() != 42 {
                return Err(eyre::eyre!(
                    "Invalid token address '{}' for {} on chain '{}'",
                    token.address,
                    token.symbol,
                    self.chain.name
                ));
            }
        }
        match self.store.backend.as_str() {
            "memory" | "redis" => {}
            other => {
                return Err(eyre::eyre!(
                    "Unknown store backend '{}' (expected 'memory' or 'redis')",
                    other
                ));
            }
        }
        if self.orchestration.summary_attempts == 0 {
            return Err(eyre::eyre!("orchestration.summary_attempts must be >= 1"));
        }
        if self.monitoring.interval_minutes == 0 {
            return Err(eyre::eyre!("monitoring.interval_minutes must be >= 1"));
        }
        Ok(())
    }
}
