/// Daemon wiring: load config, open the store, build the clients, start
/// the scheduler and wait for shutdown.
use crate::aggregator::Aggregator;
use crate::arguments;
use crate::chain_client::ChainClient;
use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::database::Database;
use crate::logger::{self, LogTag};
use crate::network_stats::NetworkStatsClient;
use crate::scheduler::start_sync_scheduler;
use crate::sync::SyncEngine;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Notify;

pub async fn run_daemon() -> Result<()> {
    let config_path = arguments::config_path().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;

    logger::info(
        LogTag::System,
        &format!(
            "Tracking {} address(es) against {}",
            config.addresses.len(),
            config.api_base_url
        ),
    );

    let db = Arc::new(
        Database::open(&config.database_path)
            .with_context(|| format!("failed to open store at {}", config.database_path))?,
    );
    let client = Arc::new(ChainClient::new(&config)?);
    let stats = Arc::new(NetworkStatsClient::new(&config)?);
    let engine = Arc::new(SyncEngine::new(db.clone(), client.clone(), &config));
    let aggregator = Aggregator::new(db.clone(), config.addresses.clone());

    // One-shot mode for cron-style usage
    if arguments::is_once_enabled() {
        let outcome = engine.trigger_sync().await;
        logger::info(LogTag::System, &outcome.message);
        db.optimize().ok();
        return Ok(());
    }

    let shutdown = Arc::new(Notify::new());
    let mut handles = Vec::new();

    if config.sync.enabled {
        handles.push(start_sync_scheduler(
            engine.clone(),
            shutdown.clone(),
            config.sync.sync_interval_secs,
        ));
    } else {
        logger::warn(LogTag::System, "Sync disabled by config; serving stored data only");
    }

    // Warm the stats caches once at startup; failures are non-fatal
    if let Err(e) = stats.combined().await {
        logger::warn(LogTag::Stats, &format!("Initial stats warm-up failed: {}", e));
    }

    // Touch the read side once so a broken store surfaces at startup
    let totals = aggregator.totals()?;
    logger::info(
        LogTag::System,
        &format!("Store ready: totals loaded for {} address(es)", totals.len()),
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    logger::info(LogTag::System, "Shutdown signal received");

    shutdown.notify_waiters();
    for handle in handles {
        let _ = handle.await;
    }

    logger::debug(
        LogTag::Chain,
        &format!(
            "Cache state at shutdown: {} block(s), {} resolved address(es)",
            client.cached_blocks(),
            client.cached_addresses()
        ),
    );

    // Final optimization hook before the handle drops
    if let Err(e) = db.optimize() {
        logger::warn(LogTag::Store, &format!("Final store optimization failed: {}", e));
    }
    logger::success(LogTag::System, "Shut down cleanly");
    Ok(())
}
