//! Chain listener: subscribes to ERC-20 Transfer logs for the watched tokens
//! over WebSocket (falling back to HTTP polling), decodes each log, resolves
//! its USD value through the price feed, and publishes the result on the
//! `onchain` channel.

pub mod decoder;
pub mod txkind;
pub mod types;

use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::{Filter, Log};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::bus::{self, EventBus};
use crate::config::ChainConfig;
use crate::sources::PriceFeed;
use types::{build_watched_tokens, raw_to_human, TokenMeta, TransferEvent};

const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";

/// Main entry point for the transfer watcher task.
pub async fn run_watcher(
    config: ChainConfig,
    price_feed: Arc<dyn PriceFeed>,
    bus: EventBus,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    tracing::info!(chain = %config.name, chain_id = config.chain_id, "Starting transfer watcher");

    let watched = build_watched_tokens(&config);
    if watched.is_empty() {
        tracing::warn!(chain = %config.name, "No valid tokens configured, exiting");
        return Ok(());
    }

    tracing::info!(
        chain = %config.name,
        tokens = watched.len(),
        "Watching tokens: {:?}",
        watched.values().map(|t| &t.symbol).collect::<Vec<_>>()
    );

    if let Some(ws_url) = config.rpc_ws.clone() {
        match watch_ws(&config, &ws_url, &watched, &price_feed, &bus, &shutdown).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!(
                    chain = %config.name,
                    error = %e,
                    "WebSocket connection failed, falling back to HTTP polling"
                );
            }
        }
    }

    watch_http(&config, &watched, &price_feed, &bus, &shutdown).await
}

/// Live log subscription via WebSocket.
async fn watch_ws(
    config: &ChainConfig,
    ws_url: &str,
    watched: &HashMap<Address, TokenMeta>,
    price_feed: &Arc<dyn PriceFeed>,
    bus: &EventBus,
    shutdown: &CancellationToken,
) -> eyre::Result<()> {
    let ws = WsConnect::new(ws_url);
    let provider = ProviderBuilder::new().connect_ws(ws).await?;

    let filter = transfer_filter(watched);
    let sub = provider.subscribe_logs(&filter).await?;
    let mut stream = sub.into_stream();

    tracing::info!(chain = %config.name, "WebSocket log subscription active");

    loop {
        tokio::select! {
            maybe_log = stream.next() => {
                match maybe_log {
                    Some(log) => {
                        handle_log(&log, watched, price_feed, bus, &config.name).await;
                    }
                    None => {
                        tracing::warn!(chain = %config.name, "Log stream ended");
                        break;
                    }
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!(chain = %config.name, "Shutdown received, stopping watcher");
                break;
            }
        }
    }

    Ok(())
}

/// Polling fallback when no WebSocket endpoint is available.
async fn watch_http(
    config: &ChainConfig,
    watched: &HashMap<Address, TokenMeta>,
    price_feed: &Arc<dyn PriceFeed>,
    bus: &EventBus,
    shutdown: &CancellationToken,
) -> eyre::Result<()> {
    let provider = ProviderBuilder::new().connect_http(
        config
            .rpc_http
            .parse()
            .map_err(|e| eyre::eyre!("Invalid RPC URL: {}", e))?,
    );

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let mut last_block = retry_rpc(|| provider.get_block_number()).await?;

    tracing::info!(
        chain = %config.name,
        poll_interval_ms = config.poll_interval_ms,
        last_block,
        "HTTP polling active"
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = shutdown.cancelled() => {
                tracing::info!(chain = %config.name, "Shutdown received, stopping poller");
                break;
            }
        }

        let current = match retry_rpc(|| provider.get_block_number()).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(chain = %config.name, error = %e, "Failed to get block number");
                continue;
            }
        };

        if current <= last_block {
            continue;
        }

        let filter = transfer_filter(watched)
            .from_block(last_block + 1)
            .to_block(current);
        let logs = retry_rpc(|| provider.get_logs(&filter)).await?;

        for log in &logs {
            if shutdown.is_cancelled() {
                break;
            }
            handle_log(log, watched, price_feed, bus, &config.name).await;
        }

        last_block = current;
    }

    Ok(())
}

/// Decode one log, price it, and publish the transfer on `onchain`.
/// Every failure mode drops the single log and keeps the loop alive.
async fn handle_log(
    log: &Log,
    watched: &HashMap<Address, TokenMeta>,
    price_feed: &Arc<dyn PriceFeed>,
    bus: &EventBus,
    chain: &str,
) {
    let Some(decoded) = decoder::decode_transfer_log(log, watched) else {
        return;
    };

    let token = decoded.token.to_string();
    let amount = raw_to_human(&decoded.amount, decoded.decimals);

    let quote = match price_feed.token_price(&token).await {
        Ok(Some(quote)) => quote,
        Ok(None) => {
            tracing::debug!(
                chain = %chain,
                symbol = %decoded.symbol,
                "No market price for token, dropping transfer"
            );
            return;
        }
        Err(e) => {
            tracing::warn!(
                chain = %chain,
                symbol = %decoded.symbol,
                error = %e,
                "Price lookup failed, dropping transfer"
            );
            return;
        }
    };

    let event = TransferEvent {
        token,
        symbol: decoded.symbol.clone(),
        amount,
        amount_usd: amount * quote.price,
        from_address: decoded.from.to_string(),
        to_address: decoded.to.to_string(),
        transaction_hash: decoded.tx_hash.to_string(),
        block_number: decoded.block_number,
    };

    match bus.publish(bus::ONCHAIN, &event) {
        Ok(_) => {
            tracing::debug!(
                chain = %chain,
                symbol = %event.symbol,
                amount_usd = event.amount_usd,
                tx = %event.transaction_hash,
                "Published transfer"
            );
        }
        Err(e) => {
            tracing::warn!(chain = %chain, error = %e, "Failed to publish transfer");
        }
    }
}

fn transfer_filter(watched: &HashMap<Address, TokenMeta>) -> Filter {
    let addresses: Vec<Address> = watched.keys().copied().collect();
    Filter::new().address(addresses).event(TRANSFER_EVENT)
}

/// Retry an async operation with exponential backoff.
/// Handles transient RPC errors (rate limits, network issues).
pub async fn retry_rpc<F, Fut, T, E>(mut f: F) -> eyre::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = Duration::from_millis(500);
    let max_retries = 5;

    for attempt in 0..max_retries {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "RPC call failed, retrying..."
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }
        }
    }

    // Final attempt, propagating the error this time.
    f().await
        .map_err(|e| eyre::eyre!("RPC call failed after {} retries: {}", max_retries, e))
}
