use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use whalewatch::alerts::{AlertManager, AlertStore, CooldownTracker};
use whalewatch::api::{self, AppState};
use whalewatch::bus::EventBus;
use whalewatch::classifier::{run_classifier, WhaleClassifier};
use whalewatch::config::Config;
use whalewatch::coordinator::{
    run_periodic_monitor, AlertCoordinator, AnalysisTask, MacroTask, RiskTask, SocialTask,
    TaskRegistry,
};
use whalewatch::digest::{run_digest_agent, DigestLog};
use whalewatch::movements::MovementLog;
use whalewatch::orchestrator::{
    run_orchestrator, AlertOrchestrator, Check, ManipulationCheck, MarketCheck, PortfolioCheck,
    SocialCheck,
};
use whalewatch::sources::{
    DexScreenerFeed, FixedSentimentFeed, GeminiClient, HeuristicRiskScorer, PortfolioSource,
    PriceFeed, SimApiClient, SocialFeed, StaticMacroFeed,
};
use whalewatch::store::{MemoryStore, RedisStore, SharedStore};
use whalewatch::watcher::run_watcher;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Initialize structured logging (set RUST_LOG=info for output)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    tracing::info!("WhaleWatch starting");

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;
    tracing::info!(
        chain = %config.chain.name,
        tokens = config.chain.tokens.len(),
        "Configuration loaded from {}",
        config_path
    );

    // State store: in-memory by default, Redis when configured
    let store: SharedStore = match config.store.backend.as_str() {
        "redis" => {
            let redis = RedisStore::connect(&config.store.redis_url, &config.store.key_prefix)
                .await
                .map_err(|e| eyre::eyre!("Failed to connect to Redis: {}", e))?;
            tracing::info!(url = %config.store.redis_url, "Connected to Redis store");
            Arc::new(redis)
        }
        _ => {
            tracing::info!("Using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let bus = EventBus::new(config.bus.channel_capacity);
    let movements = MovementLog::new(store.clone());

    // External sources behind their trait seams
    let http_timeout = Duration::from_secs(config.sources.http_timeout_secs);
    let prices: Arc<dyn PriceFeed> =
        Arc::new(DexScreenerFeed::new(&config.sources.dexscreener_url, http_timeout)?);
    let portfolios: Arc<dyn PortfolioSource> = Arc::new(SimApiClient::new(
        &config.sources.sim_api_url,
        &config.sources.sim_api_key,
        config.chain.chain_id,
        &config.chain.name,
        http_timeout,
    )?);
    let generator = GeminiClient::new(
        &config.sources.gemini_url,
        &config.sources.gemini_api_key,
        &config.sources.gemini_model,
        http_timeout,
    )?;
    if !generator.is_configured() {
        tracing::warn!("No generative API key configured, summaries will use the fallback template");
    }
    let social: Arc<dyn SocialFeed> = Arc::new(FixedSentimentFeed::neutral());
    let macro_feed = Arc::new(StaticMacroFeed::default());
    let scorer = Arc::new(HeuristicRiskScorer);

    // Scatter checks for the whale-movement orchestrator
    let checks: Vec<Arc<dyn Check>> = vec![
        Arc::new(MarketCheck::new(prices.clone())),
        Arc::new(SocialCheck::new(social.clone())),
        Arc::new(ManipulationCheck::new(movements.clone())),
        Arc::new(PortfolioCheck::new(store.clone(), portfolios.clone())),
    ];
    let orchestrator = Arc::new(AlertOrchestrator::new(
        checks,
        Arc::new(generator),
        bus.clone(),
        &config.orchestration,
    ));

    // Portfolio analysis group behind the coordinator
    let alert_manager = AlertManager::new(CooldownTracker::new(store.clone()), config.cooldowns.clone());
    let alert_store = AlertStore::new(store.clone());
    let tasks: Vec<Arc<dyn AnalysisTask>> = vec![
        Arc::new(RiskTask::new(
            portfolios.clone(),
            scorer,
            alert_manager.clone(),
        )),
        Arc::new(SocialTask::new(
            portfolios.clone(),
            social,
            config.monitoring.default_symbol.clone(),
        )),
        Arc::new(MacroTask::new(macro_feed, alert_manager)),
    ];
    let coordinator = Arc::new(AlertCoordinator::new(tasks, alert_store.clone()));
    let registry = TaskRegistry::new();
    let digest = DigestLog::new(store.clone(), config.store.digest_cap);

    // Create shutdown signal
    let shutdown = CancellationToken::new();
    let mut handles = Vec::new();

    // Transfer watcher: chain logs -> onchain channel
    {
        let chain = config.chain.clone();
        let prices = prices.clone();
        let bus = bus.clone();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_watcher(chain, prices, bus, shutdown).await {
                tracing::error!(error = %e, "Transfer watcher failed");
            }
        }));
    }

    // Classifier: onchain -> whale_movement / smart_money
    {
        let classifier = WhaleClassifier::new(config.classifier.whale_thresholds.clone());
        let bus = bus.clone();
        let movements = movements.clone();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_classifier(classifier, bus, movements, shutdown).await {
                tracing::error!(error = %e, "Classifier agent failed");
            }
        }));
    }

    // Orchestrator: whale_movement -> checks -> automation / x402
    {
        let orchestrator = orchestrator.clone();
        let bus = bus.clone();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_orchestrator(orchestrator, bus, shutdown).await {
                tracing::error!(error = %e, "Alert orchestrator failed");
            }
        }));
    }

    // Digest agent: automation -> daily digest list
    {
        let digest = digest.clone();
        let bus = bus.clone();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_digest_agent(digest, bus, shutdown).await {
                tracing::error!(error = %e, "Digest agent failed");
            }
        }));
    }

    // Periodic portfolio monitoring over the tracked-wallet set
    if config.monitoring.enabled {
        let coordinator = coordinator.clone();
        let store = store.clone();
        let interval = config.monitoring.interval_minutes;
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_periodic_monitor(coordinator, store, interval, shutdown).await {
                tracing::error!(error = %e, "Periodic monitor failed");
            }
        }));
    }

    // Spawn API server
    if config.api.enabled {
        let state = AppState {
            store: store.clone(),
            alerts: alert_store,
            coordinator,
            registry,
            bus: bus.clone(),
            portfolios,
            digest,
        };
        let host = config.api.host.clone();
        let port = config.api.port;
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = api::serve(state, &host, port, shutdown).await {
                tracing::error!(error = %e, "API server failed");
            }
        }));
    }

    tracing::info!("All agents started. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping all agents...");
    shutdown.cancel();

    // Wait for all tasks to finish
    for handle in handles {
        let _ = handle.await;
    }

    tracing::info!("WhaleWatch stopped gracefully");
    Ok(())
}
