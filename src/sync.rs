/// Sync engine: plans and executes cyclic sync rounds.
///
/// Each cycle maintains two frontiers under one block budget: forward
/// toward the chain tip and backward toward the retention floor. Blocks are
/// fetched in parallel batches, analyzed for payments to watched addresses,
/// senders resolved, and everything committed atomically per batch. Only
/// one cycle runs at a time.
use crate::block_analyzer::{analyze_block, Payment, SenderRef};
use crate::chain_client::ChainClient;
use crate::config::Config;
use crate::constants::SENDER_RESOLVE_CAP;
use crate::database::{BlockRow, Database, Frontier, TransactionRow};
use crate::errors::TrackerResult;
use crate::logger::{self, LogTag};
use crate::utils::{format_duration_secs, now_secs};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::Semaphore;

// =============================================================================
// PUBLISHED STATUS
// =============================================================================

/// Live sync status snapshot, readable at any time by external consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub current_height: u64,
    pub highest_synced: Option<u64>,
    pub lowest_synced: Option<u64>,
    pub total_blocks_synced: u64,
    pub total_blocks_remaining: u64,
    pub new_blocks_remaining: u64,
    pub historical_blocks_remaining: u64,
    pub sync_progress: f64,
    pub is_online: bool,
    pub is_first_run: bool,
    pub has_completed_initial_sync: bool,
    pub is_complete: bool,
    pub is_syncing: bool,
    pub last_sync_message: String,
    /// Rolling blocks-per-second over the current or last cycle.
    pub sync_rate: f64,
    pub estimated_time_remaining_secs: Option<u64>,
    pub last_cycle_timestamp: Option<i64>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            current_height: 0,
            highest_synced: None,
            lowest_synced: None,
            total_blocks_synced: 0,
            total_blocks_remaining: 0,
            new_blocks_remaining: 0,
            historical_blocks_remaining: 0,
            sync_progress: 0.0,
            is_online: false,
            is_first_run: true,
            has_completed_initial_sync: false,
            is_complete: false,
            is_syncing: false,
            last_sync_message: "Not started".to_string(),
            sync_rate: 0.0,
            estimated_time_remaining_secs: None,
            last_cycle_timestamp: None,
        }
    }
}

static SYNC_STATUS: Lazy<RwLock<SyncStatus>> = Lazy::new(|| RwLock::new(SyncStatus::default()));

/// Consistent snapshot of the published status.
pub fn get_sync_status() -> SyncStatus {
    SYNC_STATUS.read().unwrap().clone()
}

fn publish_status<F: FnOnce(&mut SyncStatus)>(mutate: F) {
    let mut status = SYNC_STATUS.write().unwrap();
    mutate(&mut status);
}

// =============================================================================
// PLANNING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanPriority {
    /// First run: seed the last day of blocks before anything else.
    Initial,
    /// Normal operation: forward first, leftover budget goes backward.
    Hybrid,
    /// Near completion: small moves plus gap detection.
    NearCompletion,
}

/// One contiguous inclusive height range, walked in `direction` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPhase {
    pub direction: Direction,
    pub start: u64,
    pub end: u64,
}

impl SyncPhase {
    pub fn block_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Heights in execution order: ascending forward, descending backward.
    pub fn heights(&self) -> Vec<u64> {
        match self.direction {
            Direction::Forward => (self.start..=self.end).collect(),
            Direction::Backward => (self.start..=self.end).rev().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncPlan {
    pub phases: Vec<SyncPhase>,
    pub priority: PlanPriority,
    pub run_gap_fill: bool,
}

impl SyncPlan {
    pub fn total_blocks(&self) -> u64 {
        self.phases.iter().map(SyncPhase::block_count).sum()
    }
}

/// Inputs the planner needs beyond the live frontier.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext {
    pub budget: u64,
    pub blocks_per_day: u64,
    pub retention_days: u64,
    pub gap_fill_threshold_pct: f64,
}

impl PlanContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            budget: config.sync.max_blocks_per_sync,
            blocks_per_day: config.retention.blocks_per_day,
            retention_days: config.retention.retention_days,
            gap_fill_threshold_pct: config.sync.gap_fill_threshold_pct,
        }
    }

    pub fn target_lowest(&self, tip: u64) -> u64 {
        tip.saturating_sub(self.blocks_per_day * self.retention_days)
    }

    pub fn initial_sync_target(&self, tip: u64) -> u64 {
        tip.saturating_sub(self.blocks_per_day)
    }

    pub fn progress_pct(&self, block_count: u64) -> f64 {
        let target = self.blocks_per_day * self.retention_days;
        if target == 0 {
            return 100.0;
        }
        ((block_count as f64) / (target as f64) * 100.0).min(100.0)
    }
}

/// Decide what this cycle should fetch.
///
/// First run seeds from the initial sync target upward. Near completion the
/// moves shrink and gap detection takes over. Otherwise forward work is
/// funded first and whatever budget remains goes backward, never crossing
/// the retention floor.
pub fn build_plan(tip: u64, frontier: &Frontier, ctx: &PlanContext) -> SyncPlan {
    let target_lowest = ctx.target_lowest(tip);

    let highest = match frontier.highest {
        Some(h) => h,
        None => {
            // First run (also covers underflowed frontiers)
            let start = ctx.initial_sync_target(tip);
            let mut phases = Vec::new();
            if ctx.budget > 0 && start <= tip {
                let end = tip.min(start + ctx.budget - 1);
                phases.push(SyncPhase {
                    direction: Direction::Forward,
                    start,
                    end,
                });
            }
            return SyncPlan {
                phases,
                priority: PlanPriority::Initial,
                run_gap_fill: false,
            };
        }
    };

    let lowest = frontier.lowest.unwrap_or(highest);
    let new_remaining = tip.saturating_sub(highest);
    let historical_remaining = lowest.saturating_sub(target_lowest);
    let progress = ctx.progress_pct(frontier.block_count);

    if progress >= ctx.gap_fill_threshold_pct {
        let mut phases = Vec::new();
        if new_remaining > 0 {
            let take = new_remaining.min(500).min(ctx.budget);
            if take > 0 {
                phases.push(SyncPhase {
                    direction: Direction::Forward,
                    start: highest + 1,
                    end: highest + take,
                });
            }
        } else if historical_remaining > 0 {
            let take = historical_remaining.min(1_000).min(ctx.budget);
            if take > 0 {
                phases.push(SyncPhase {
                    direction: Direction::Backward,
                    start: lowest - take,
                    end: lowest - 1,
                });
            }
        }
        return SyncPlan {
            phases,
            priority: PlanPriority::NearCompletion,
            run_gap_fill: true,
        };
    }

    // Hybrid: forward first, remaining budget backward
    let mut phases = Vec::new();
    let forward_take = new_remaining.min(ctx.budget);
    if forward_take > 0 {
        phases.push(SyncPhase {
            direction: Direction::Forward,
            start: highest + 1,
            end: highest + forward_take,
        });
    }
    let backward_take = historical_remaining.min(ctx.budget - forward_take);
    if backward_take > 0 {
        phases.push(SyncPhase {
            direction: Direction::Backward,
            start: lowest - backward_take,
            end: lowest - 1,
        });
    }

    SyncPlan {
        phases,
        priority: PlanPriority::Hybrid,
        run_gap_fill: false,
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Counters for one completed cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleMetrics {
    pub planned_blocks: u64,
    pub processed_blocks: u64,
    pub inserted_blocks: u64,
    pub inserted_transactions: u64,
    pub failed_fetches: u64,
    pub gap_filled: u64,
    pub pruned_transactions: u64,
    pub pruned_blocks: u64,
    pub elapsed_secs: f64,
}

/// Result of a `trigger_sync` call. `ran == false` means a cycle was
/// already in progress; that is not an error.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub ran: bool,
    pub message: String,
    pub metrics: Option<CycleMetrics>,
}

pub struct SyncEngine {
    db: Arc<Database>,
    client: Arc<ChainClient>,
    watched: HashSet<String>,
    ctx: PlanContext,
    batch_size: usize,
    resolve_limit: usize,
    max_db_size_gb: f64,
    is_running: AtomicBool,
}

struct BatchResult {
    failed: u64,
    inserted_blocks: usize,
    inserted_transactions: usize,
}

impl SyncEngine {
    pub fn new(db: Arc<Database>, client: Arc<ChainClient>, config: &Config) -> Self {
        Self {
            db,
            client,
            watched: config.addresses.iter().cloned().collect(),
            ctx: PlanContext::from_config(config),
            batch_size: config.sync.batch_size.max(1),
            resolve_limit: config.http.max_concurrent_requests.min(SENDER_RESOLVE_CAP).max(1),
            max_db_size_gb: config.retention.max_db_size_gb,
            is_running: AtomicBool::new(false),
        }
    }

    /// Current tip as reported upstream.
    pub async fn current_tip(&self) -> TrackerResult<u64> {
        self.client.tip().await
    }

    /// Run one cycle unless one is already active.
    pub async fn trigger_sync(&self) -> SyncOutcome {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return SyncOutcome {
                ran: false,
                message: "Sync already in progress".to_string(),
                metrics: None,
            };
        }

        let result = self.run_cycle().await;
        self.is_running.store(false, Ordering::SeqCst);

        match result {
            Ok(metrics) => SyncOutcome {
                ran: true,
                message: get_sync_status().last_sync_message,
                metrics: Some(metrics),
            },
            Err(e) => {
                let message = format!("Sync cycle failed: {}", e);
                logger::error(LogTag::Sync, &message);
                publish_status(|s| {
                    s.is_syncing = false;
                    s.last_sync_message = message.clone();
                });
                SyncOutcome {
                    ran: true,
                    message,
                    metrics: None,
                }
            }
        }
    }

    async fn run_cycle(&self) -> TrackerResult<CycleMetrics> {
        let started = Instant::now();
        let mut metrics = CycleMetrics::default();

        publish_status(|s| {
            s.is_syncing = true;
            s.last_sync_message = "Sync cycle starting".to_string();
        });

        let tip = match self.client.tip().await {
            Ok(tip) => tip,
            Err(e) => {
                publish_status(|s| {
                    s.is_online = false;
                    s.is_syncing = false;
                });
                return Err(e);
            }
        };

        let frontier = self.db.frontier()?;
        self.publish_derived(tip, &frontier);

        let plan = build_plan(tip, &frontier, &self.ctx);
        metrics.planned_blocks = plan.total_blocks();
        logger::info(
            LogTag::Sync,
            &format!(
                "Cycle plan: {} blocks in {} phase(s), priority {:?}",
                plan.total_blocks(),
                plan.phases.len(),
                plan.priority
            ),
        );

        for phase in &plan.phases {
            self.execute_phase(phase, tip, started, &mut metrics).await?;
        }

        // Gap detection once the index is nearly complete
        let frontier = self.db.frontier()?;
        let progress = self.ctx.progress_pct(frontier.block_count);
        if plan.run_gap_fill || progress >= self.ctx.gap_fill_threshold_pct {
            let filled = self.gap_fill(tip, &mut metrics).await?;
            metrics.gap_filled = filled;
        }

        self.prune(&mut metrics)?;

        if self.db.is_over_size_cap(self.max_db_size_gb) {
            logger::warn(
                LogTag::Store,
                &format!(
                    "Store size {} bytes exceeds soft cap of {} GB",
                    self.db.file_size_bytes(),
                    self.max_db_size_gb
                ),
            );
        }

        metrics.elapsed_secs = started.elapsed().as_secs_f64();
        self.finish_cycle(tip, &metrics)?;
        Ok(metrics)
    }

    fn publish_derived(&self, tip: u64, frontier: &Frontier) {
        let target_lowest = self.ctx.target_lowest(tip);
        let new_remaining = frontier.highest.map(|h| tip.saturating_sub(h)).unwrap_or(0);
        let historical_remaining = frontier
            .lowest
            .map(|l| l.saturating_sub(target_lowest))
            .unwrap_or(0);
        let progress = self.ctx.progress_pct(frontier.block_count);

        publish_status(|s| {
            s.current_height = tip;
            s.highest_synced = frontier.highest;
            s.lowest_synced = frontier.lowest;
            s.total_blocks_synced = frontier.block_count;
            s.new_blocks_remaining = new_remaining;
            s.historical_blocks_remaining = historical_remaining;
            s.total_blocks_remaining = new_remaining + historical_remaining;
            s.sync_progress = progress;
            s.is_online = true;
            s.is_first_run = frontier.highest.is_none();
        });
    }

    async fn execute_phase(
        &self,
        phase: &SyncPhase,
        tip: u64,
        cycle_started: Instant,
        metrics: &mut CycleMetrics,
    ) -> TrackerResult<()> {
        let heights = phase.heights();
        let batches: Vec<&[u64]> = heights.chunks(self.batch_size).collect();
        let direction = match phase.direction {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        };
        logger::info(
            LogTag::Sync,
            &format!(
                "Phase {}: heights {}-{} in {} batch(es)",
                direction,
                phase.start,
                phase.end,
                batches.len()
            ),
        );

        for (index, batch) in batches.iter().enumerate() {
            match self.process_batch(batch).await {
                Ok(result) => {
                    metrics.failed_fetches += result.failed;
                    metrics.inserted_blocks += result.inserted_blocks as u64;
                    metrics.inserted_transactions += result.inserted_transactions as u64;
                }
                Err(e) => {
                    // Store-level failure halts the cycle; the next one retries
                    logger::error(
                        LogTag::Sync,
                        &format!("Batch commit failed, aborting cycle: {}", e),
                    );
                    return Err(e);
                }
            }

            // A failed batch still counts as processed so one bad range
            // cannot stall the cycle forever; gap fill recovers it later.
            metrics.processed_blocks += batch.len() as u64;

            if (index + 1) % 2 == 0 || index + 1 == batches.len() {
                let elapsed = cycle_started.elapsed().as_secs_f64();
                let rate = if elapsed > 0.0 {
                    (metrics.processed_blocks as f64) / elapsed
                } else {
                    0.0
                };
                let message = format!(
                    "Syncing {} {}/{} blocks ({:.1} blk/s)",
                    direction,
                    metrics.processed_blocks,
                    metrics.planned_blocks,
                    rate
                );
                let remaining = metrics.planned_blocks.saturating_sub(metrics.processed_blocks);
                publish_status(|s| {
                    s.sync_rate = rate;
                    s.last_sync_message = message;
                    s.estimated_time_remaining_secs = if rate > 0.0 {
                        Some(((remaining as f64) / rate) as u64)
                    } else {
                        None
                    };
                });
            }
        }

        // Keep the published frontier fresh between phases
        let frontier = self.db.frontier()?;
        self.publish_derived(tip, &frontier);
        Ok(())
    }

    /// Fetch, analyze, resolve and commit one batch of heights.
    async fn process_batch(&self, heights: &[u64]) -> TrackerResult<BatchResult> {
        let results = self.client.fetch_blocks(heights).await;

        let mut blocks = Vec::with_capacity(results.len());
        let mut payments: Vec<Payment> = Vec::new();
        let mut failed = 0u64;

        for (height, result) in results {
            match result {
                Ok(block) => {
                    payments.extend(analyze_block(&block, &self.watched));
                    blocks.push(BlockRow {
                        height,
                        hash: block.hash,
                        timestamp: block.time,
                    });
                }
                Err(e) => {
                    failed += 1;
                    logger::warn(LogTag::Sync, &format!("Block {} fetch failed: {}", height, e));
                }
            }
        }

        let rows = self.resolve_payments(payments).await;
        let (inserted_blocks, inserted_transactions) = self.db.insert_batch(&blocks, &rows)?;

        Ok(BatchResult {
            failed,
            inserted_blocks,
            inserted_transactions,
        })
    }

    /// Map provisional senders to stored values, resolving previous-output
    /// references through the chain client under a bounded fan-out.
    ///
    /// A failed lookup leaves the sender NULL so the out-of-band backfill
    /// can retry it; analyzer-level `Unknown` is stored as the literal
    /// string since no retry can improve it.
    async fn resolve_payments(&self, payments: Vec<Payment>) -> Vec<TransactionRow> {
        let semaphore = Arc::new(Semaphore::new(self.resolve_limit));

        let tasks = payments.into_iter().map(|payment| {
            let semaphore = semaphore.clone();
            async move {
                let from_address = match &payment.from {
                    SenderRef::Unresolved { txid, vout } => {
                        let _permit = semaphore.acquire().await;
                        self.client.try_resolve_sender(txid, *vout).await.ok()
                    }
                    resolved => resolved.as_stored(),
                };
                TransactionRow {
                    tx_hash: payment.tx_hash,
                    block_height: payment.block_height,
                    vout_index: payment.vout_index,
                    address: payment.address,
                    from_address,
                    value: payment.value,
                    timestamp: payment.timestamp,
                }
            }
        });

        futures::future::join_all(tasks).await
    }

    /// Detect and fill missing heights near the tip and just below the
    /// historical frontier. Returns how many blocks were filled.
    async fn gap_fill(&self, tip: u64, metrics: &mut CycleMetrics) -> TrackerResult<u64> {
        let frontier = self.db.frontier()?;
        let target_lowest = self.ctx.target_lowest(tip);

        let mut missing = Vec::new();

        // Recent window: the last three days of heights
        let recent_start = tip.saturating_sub(3 * self.ctx.blocks_per_day);
        missing.extend(self.db.missing_heights(recent_start, tip)?);

        // Historical window: seven days immediately below the low frontier
        if let Some(lowest) = frontier.lowest {
            if lowest > target_lowest {
                let start = lowest
                    .saturating_sub(7 * self.ctx.blocks_per_day)
                    .max(target_lowest);
                if start < lowest {
                    missing.extend(self.db.missing_heights(start, lowest - 1)?);
                }
            }
        }

        missing.sort_unstable();
        missing.dedup();

        if missing.is_empty() {
            let new_remaining = frontier.highest.map(|h| tip.saturating_sub(h)).unwrap_or(tip);
            if new_remaining == 0 {
                publish_status(|s| {
                    s.is_complete = true;
                    s.has_completed_initial_sync = true;
                });
                logger::success(LogTag::Sync, "Index complete: no gaps, tip reached");
            }
            return Ok(0);
        }

        logger::info(
            LogTag::Sync,
            &format!("Gap fill: {} missing height(s) detected", missing.len()),
        );

        let mut filled = 0u64;
        for batch in missing.chunks(self.batch_size) {
            let result = self.process_batch(batch).await?;
            filled += result.inserted_blocks as u64;
            metrics.processed_blocks += batch.len() as u64;
            metrics.inserted_transactions += result.inserted_transactions as u64;
            metrics.failed_fetches += result.failed;
        }

        // Completion check after filling
        let frontier = self.db.frontier()?;
        let new_remaining = frontier.highest.map(|h| tip.saturating_sub(h)).unwrap_or(tip);
        let recent_missing = self.db.missing_heights(recent_start, tip)?;
        if recent_missing.is_empty() && new_remaining == 0 {
            publish_status(|s| {
                s.is_complete = true;
                s.has_completed_initial_sync = true;
            });
        }

        Ok(filled)
    }

    /// Retention sweep keyed off the freshest stored block timestamp.
    fn prune(&self, metrics: &mut CycleMetrics) -> TrackerResult<()> {
        let tip_timestamp = match self.db.highest_block_timestamp()? {
            Some(ts) => ts,
            None => return Ok(()),
        };
        let cutoff =
            tip_timestamp - (self.ctx.retention_days as i64) * crate::constants::SECONDS_PER_DAY;
        let (txs, blocks) = self.db.prune_older_than(cutoff)?;
        metrics.pruned_transactions = txs as u64;
        metrics.pruned_blocks = blocks as u64;
        Ok(())
    }

    fn finish_cycle(&self, tip: u64, metrics: &CycleMetrics) -> TrackerResult<()> {
        let frontier = self.db.frontier()?;
        self.publish_derived(tip, &frontier);

        let message = if metrics.planned_blocks == 0 && metrics.gap_filled == 0 {
            "No new blocks to sync".to_string()
        } else {
            format!(
                "Cycle complete: {} blocks processed, {} inserted in {}",
                metrics.processed_blocks,
                metrics.inserted_blocks + metrics.gap_filled,
                format_duration_secs(metrics.elapsed_secs as u64)
            )
        };

        let rate = if metrics.elapsed_secs > 0.0 {
            (metrics.processed_blocks as f64) / metrics.elapsed_secs
        } else {
            0.0
        };

        publish_status(|s| {
            s.is_syncing = false;
            s.last_sync_message = message.clone();
            s.sync_rate = rate;
            s.last_cycle_timestamp = Some(now_secs());
            s.estimated_time_remaining_secs = if rate > 0.0 && s.total_blocks_remaining > 0 {
                Some(((s.total_blocks_remaining as f64) / rate) as u64)
            } else {
                None
            };
        });

        logger::success(LogTag::Sync, &message);
        Ok(())
    }

    // =========================================================================
    // SENDER BACKFILL (out-of-band)
    // =========================================================================

    /// Re-resolve senders for stored transactions that never got one.
    ///
    /// Groups candidates by block, fetches each block once, re-runs the
    /// analyzer to recover the provisional reference, then resolves and
    /// writes back. Returns the number of rows updated.
    pub async fn backfill_senders(&self, limit: u64) -> TrackerResult<u64> {
        let candidates = self.db.unresolved_transactions(limit)?;
        if candidates.is_empty() {
            return Ok(0);
        }

        let mut by_height: BTreeMap<u64, Vec<&crate::database::UnresolvedTransaction>> =
            BTreeMap::new();
        for candidate in &candidates {
            by_height.entry(candidate.block_height).or_default().push(candidate);
        }

        let heights: Vec<u64> = by_height.keys().copied().collect();
        logger::info(
            LogTag::Sync,
            &format!(
                "Backfilling senders: {} transaction(s) across {} block(s)",
                candidates.len(),
                heights.len()
            ),
        );

        let mut updated = 0u64;
        for chunk in heights.chunks(self.batch_size) {
            let fetched = self.client.fetch_blocks(chunk).await;
            for (height, result) in fetched {
                let block = match result {
                    Ok(block) => block,
                    Err(e) => {
                        logger::warn(
                            LogTag::Sync,
                            &format!("Backfill fetch of block {} failed: {}", height, e),
                        );
                        continue;
                    }
                };

                let payments = analyze_block(&block, &self.watched);
                let targets = match by_height.get(&height) {
                    Some(targets) => targets,
                    None => continue,
                };

                for target in targets {
                    let matched = payments.iter().find(|p| {
                        p.tx_hash == target.tx_hash
                            && p.vout_index == target.vout_index
                            && p.address == target.address
                    });
                    let sender = match matched.map(|p| &p.from) {
                        Some(SenderRef::Inline(address)) => address.clone(),
                        Some(SenderRef::Unresolved { txid, vout }) => {
                            self.client.resolve_sender(txid, *vout).await
                        }
                        Some(SenderRef::Unknown) | None => "Unknown".to_string(),
                    };
                    updated += self.db.backfill_sender(
                        &target.tx_hash,
                        target.block_height,
                        target.vout_index,
                        &sender,
                    )? as u64;
                }
            }
        }

        logger::success(LogTag::Sync, &format!("Backfill updated {} sender(s)", updated));
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(budget: u64, blocks_per_day: u64, retention_days: u64) -> PlanContext {
        PlanContext {
            budget,
            blocks_per_day,
            retention_days,
            gap_fill_threshold_pct: 95.0,
        }
    }

    fn frontier(count: u64, lowest: Option<u64>, highest: Option<u64>) -> Frontier {
        Frontier {
            block_count: count,
            lowest,
            highest,
        }
    }

    #[test]
    fn first_run_seeds_one_day_back() {
        // Fresh index, tip 1000, one day of blocks, budget 500
        let plan = build_plan(1_000, &frontier(0, None, None), &ctx(500, 720, 30));
        assert_eq!(plan.priority, PlanPriority::Initial);
        assert_eq!(plan.phases.len(), 1);
        assert_eq!(plan.phases[0].direction, Direction::Forward);
        assert_eq!(plan.phases[0].start, 280);
        assert_eq!(plan.phases[0].end, 779);
        assert_eq!(plan.total_blocks(), 500);
    }

    #[test]
    fn first_run_near_genesis_clamps_to_zero() {
        let plan = build_plan(100, &frontier(0, None, None), &ctx(500, 720, 30));
        assert_eq!(plan.phases[0].start, 0);
        assert_eq!(plan.phases[0].end, 100);
    }

    #[test]
    fn hybrid_funds_forward_then_backward() {
        // tip 2000, highest 1990, lowest 500, retention floor 200, budget 100
        let plan = build_plan(2_000, &frontier(1_491, Some(500), Some(1_990)), &ctx(100, 720, 30));
        // floor: 2000 - 720*30 saturates to 0; use smaller retention to hit 200
        let plan_exact =
            build_plan(2_000, &frontier(1_491, Some(500), Some(1_990)), &ctx(100, 600, 3));
        assert_eq!(plan.priority, PlanPriority::Hybrid);
        assert_eq!(plan_exact.phases.len(), 2);
        assert_eq!(plan_exact.phases[0].direction, Direction::Forward);
        assert_eq!(plan_exact.phases[0].start, 1_991);
        assert_eq!(plan_exact.phases[0].end, 2_000);
        assert_eq!(plan_exact.phases[1].direction, Direction::Backward);
        assert_eq!(plan_exact.phases[1].start, 410);
        assert_eq!(plan_exact.phases[1].end, 499);
        assert_eq!(plan_exact.total_blocks(), 100);
    }

    #[test]
    fn backward_never_crosses_retention_floor() {
        // floor = 1000 - 600 = 400; lowest 420 leaves only 20 backward
        let plan = build_plan(1_000, &frontier(581, Some(420), Some(1_000)), &ctx(100, 200, 3));
        assert_eq!(plan.phases.len(), 1);
        assert_eq!(plan.phases[0].direction, Direction::Backward);
        assert_eq!(plan.phases[0].start, 400);
        assert_eq!(plan.phases[0].end, 419);
    }

    #[test]
    fn zero_budget_plans_nothing() {
        let plan = build_plan(1_000, &frontier(0, None, None), &ctx(0, 720, 30));
        assert_eq!(plan.total_blocks(), 0);

        let plan = build_plan(1_000, &frontier(10, Some(500), Some(509)), &ctx(0, 720, 30));
        assert_eq!(plan.total_blocks(), 0);
    }

    #[test]
    fn near_completion_caps_forward_and_requests_gap_fill() {
        // 96% progress: 2074 of 2160 target blocks
        let ctx_small = ctx(2_000, 720, 3);
        let plan = build_plan(
            10_000,
            &frontier(2_074, Some(7_840), Some(9_300)),
            &ctx_small,
        );
        assert_eq!(plan.priority, PlanPriority::NearCompletion);
        assert!(plan.run_gap_fill);
        assert_eq!(plan.phases.len(), 1);
        assert_eq!(plan.phases[0].direction, Direction::Forward);
        // 700 new blocks remain but the near-completion move caps at 500
        assert_eq!(plan.phases[0].block_count(), 500);
    }

    #[test]
    fn near_completion_backward_when_tip_reached() {
        let ctx_small = ctx(2_000, 720, 3);
        // floor = 10000 - 2160 = 7840; lowest 9000 leaves 1160 backward
        let plan = build_plan(
            10_000,
            &frontier(2_100, Some(9_000), Some(10_000)),
            &ctx_small,
        );
        assert_eq!(plan.priority, PlanPriority::NearCompletion);
        assert_eq!(plan.phases.len(), 1);
        assert_eq!(plan.phases[0].direction, Direction::Backward);
        // capped at 1000 per near-completion rules
        assert_eq!(plan.phases[0].block_count(), 1_000);
        assert_eq!(plan.phases[0].end, 8_999);
    }

    #[test]
    fn phase_heights_follow_direction() {
        let forward = SyncPhase {
            direction: Direction::Forward,
            start: 5,
            end: 7,
        };
        assert_eq!(forward.heights(), vec![5, 6, 7]);

        let backward = SyncPhase {
            direction: Direction::Backward,
            start: 5,
            end: 7,
        };
        assert_eq!(backward.heights(), vec![7, 6, 5]);
    }

    #[test]
    fn progress_saturates_at_hundred() {
        let ctx = ctx(100, 10, 1);
        assert_eq!(ctx.progress_pct(5), 50.0);
        assert_eq!(ctx.progress_pct(20), 100.0);
    }
}
