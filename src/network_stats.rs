/// Network-wide fleet and utilization statistics.
///
/// Every endpoint sits behind its own TTL cache. A failed refresh with a
/// stale value present degrades to the stale value tagged `cache`; the
/// freshness stamp is left alone so the next read retries upstream.
use crate::cache::TtlSlot;
use crate::config::Config;
use crate::constants::SNAPSHOT_TOLERANCE_SECS;
use crate::database::{Database, NodeStatsRow, UtilizationRow};
use crate::errors::{TrackerError, TrackerResult};
use crate::logger::{self, LogTag};
use crate::utils::now_secs;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Api,
    Cache,
    Partial,
    Failed,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Api => "api",
            DataSource::Cache => "cache",
            DataSource::Partial => "partial",
            DataSource::Failed => "failed",
        }
    }
}

/// A stats value together with where it came from.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResult<T> {
    pub value: T,
    pub source: DataSource,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeCounts {
    pub total: u64,
    pub cumulus: u64,
    pub nimbus: u64,
    pub stratus: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UtilizationStats {
    pub total_cores: u64,
    pub total_ram_gb: f64,
    pub total_ssd_gb: f64,
    pub utilized_cores: f64,
    pub utilized_ram_gb: f64,
    pub cores_utilization_pct: f64,
    pub ram_utilization_pct: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CombinedStats {
    pub nodes: NodeCounts,
    pub arcane_nodes: u64,
    pub utilization: UtilizationStats,
    pub running_apps: u64,
}

/// What one snapshot collection actually did.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotReport {
    pub node_row_written: bool,
    pub utilization_row_written: bool,
    pub api_success_rate: f64,
    pub data_source: DataSource,
}

/// Unwrap one sub-result of a combined read, recording whether it came
/// from upstream or a stale cache. Failures contribute defaults.
fn unwrap_tracking<T: Default>(
    result: TrackerResult<StatsResult<T>>,
    any_api: &mut bool,
    any_cache: &mut bool,
) -> T {
    match result {
        Ok(stats) => {
            match stats.source {
                DataSource::Api => *any_api = true,
                _ => *any_cache = true,
            }
            stats.value
        }
        Err(_) => T::default(),
    }
}

pub struct NetworkStatsClient {
    http: reqwest::Client,
    api_base: String,
    stats_base: String,
    collection_timeout: Duration,
    node_cache: TtlSlot<NodeCounts>,
    arcane_cache: TtlSlot<u64>,
    utilization_cache: TtlSlot<UtilizationStats>,
    combined_cache: TtlSlot<CombinedStats>,
    running_apps_cache: TtlSlot<u64>,
}

impl NetworkStatsClient {
    pub fn new(config: &Config) -> TrackerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.connection_timeout_secs))
            .build()
            .map_err(|e| TrackerError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
            stats_base: config.stats_base_url.trim_end_matches('/').to_string(),
            collection_timeout: Duration::from_secs(config.http.collection_timeout_secs),
            node_cache: TtlSlot::new(Duration::from_secs(config.cache.node_stats_ttl_secs)),
            arcane_cache: TtlSlot::new(Duration::from_secs(config.cache.arcane_stats_ttl_secs)),
            utilization_cache: TtlSlot::new(Duration::from_secs(config.cache.utilization_ttl_secs)),
            combined_cache: TtlSlot::new(Duration::from_secs(config.cache.combined_stats_ttl_secs)),
            running_apps_cache: TtlSlot::new(Duration::from_secs(
                config.cache.running_apps_ttl_secs,
            )),
        })
    }

    async fn get_data(&self, url: &str) -> TrackerResult<Value> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TrackerError::network(url, e))?;
        if !resp.status().is_success() {
            return Err(TrackerError::network(url, format!("HTTP {}", resp.status())));
        }
        let mut body: Value = resp.json().await.map_err(|e| TrackerError::api(url, e))?;
        if body.get("status").and_then(Value::as_str) != Some("success") {
            return Err(TrackerError::api(url, "non-success status in envelope"));
        }
        match body.get_mut("data") {
            Some(data) => Ok(data.take()),
            None => Err(TrackerError::api(url, "missing data field in envelope")),
        }
    }

    async fn fetch_fluxinfo(&self, projection: &str) -> TrackerResult<Vec<Value>> {
        let url = format!("{}/fluxinfo?projection={}", self.stats_base, projection);
        let data = self.get_data(&url).await?;
        data.as_array()
            .cloned()
            .ok_or_else(|| TrackerError::api(&url, "fluxinfo data is not an array"))
    }

    /// Serve from the cache, refresh on expiry, degrade to stale on failure.
    async fn cached<T, F>(
        &self,
        cache: &TtlSlot<T>,
        what: &str,
        fetch: F,
    ) -> TrackerResult<StatsResult<T>>
    where
        T: Clone,
        F: std::future::Future<Output = TrackerResult<T>>,
    {
        if let Some(value) = cache.fresh() {
            return Ok(StatsResult {
                value,
                source: DataSource::Api,
            });
        }

        match fetch.await {
            Ok(value) => {
                cache.store(value.clone());
                Ok(StatsResult {
                    value,
                    source: DataSource::Api,
                })
            }
            Err(e) => match cache.stale() {
                Some(value) => {
                    logger::warn(
                        LogTag::Stats,
                        &format!("{} refresh failed, serving stale value: {}", what, e),
                    );
                    Ok(StatsResult {
                        value,
                        source: DataSource::Cache,
                    })
                }
                None => Err(e),
            },
        }
    }

    /// Fleet node counts by tier (5-minute cache).
    pub async fn node_counts(&self) -> TrackerResult<StatsResult<NodeCounts>> {
        self.cached(&self.node_cache, "node counts", self.fetch_node_counts())
            .await
    }

    async fn fetch_node_counts(&self) -> TrackerResult<NodeCounts> {
        let url = format!("{}/daemon/getfluxnodecount", self.api_base);
        let data = self.get_data(&url).await?;
        Ok(NodeCounts {
            total: data.get("total").and_then(Value::as_u64).unwrap_or(0),
            cumulus: data
                .get("cumulus-enabled")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            nimbus: data
                .get("nimbus-enabled")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            stratus: data
                .get("stratus-enabled")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        })
    }

    /// Count of nodes running ArcaneOS (10-minute cache).
    pub async fn arcane_nodes(&self) -> TrackerResult<StatsResult<u64>> {
        self.cached(&self.arcane_cache, "arcane stats", self.fetch_arcane_nodes())
            .await
    }

    async fn fetch_arcane_nodes(&self) -> TrackerResult<u64> {
        let records = self.fetch_fluxinfo("flux").await?;
        let count = records
            .iter()
            .filter(|record| {
                record
                    .get("flux")
                    .and_then(|f| f.get("arcaneVersion"))
                    .map(|v| !v.is_null())
                    .unwrap_or(false)
            })
            .count();
        Ok(count as u64)
    }

    /// Fleet resource totals and utilization (3-minute cache).
    pub async fn utilization(&self) -> TrackerResult<StatsResult<UtilizationStats>> {
        self.cached(&self.utilization_cache, "utilization", self.fetch_utilization())
            .await
    }

    async fn fetch_utilization(&self) -> TrackerResult<UtilizationStats> {
        let records = self.fetch_fluxinfo("benchmark,apps").await?;

        let mut stats = UtilizationStats::default();
        for record in &records {
            let bench = record.get("benchmark").and_then(|b| b.get("bench"));
            if let Some(bench) = bench {
                stats.total_cores += bench.get("cores").and_then(Value::as_u64).unwrap_or(0);
                stats.total_ram_gb += bench.get("ram").and_then(Value::as_f64).unwrap_or(0.0);
                stats.total_ssd_gb += bench.get("ssd").and_then(Value::as_f64).unwrap_or(0.0);
            }
            if let Some(apps) = record.get("apps").and_then(|a| a.get("resources")) {
                stats.utilized_cores += apps.get("appsCpusLocked").and_then(Value::as_f64).unwrap_or(0.0);
                stats.utilized_ram_gb +=
                    apps.get("appsRamLocked").and_then(Value::as_f64).unwrap_or(0.0) / 1024.0;
            }
        }

        if stats.total_cores > 0 {
            stats.cores_utilization_pct =
                (stats.utilized_cores / stats.total_cores as f64 * 100.0).min(100.0);
        }
        if stats.total_ram_gb > 0.0 {
            stats.ram_utilization_pct =
                (stats.utilized_ram_gb / stats.total_ram_gb * 100.0).min(100.0);
        }
        Ok(stats)
    }

    /// Count of running application instances (2-minute cache).
    pub async fn running_apps(&self) -> TrackerResult<StatsResult<u64>> {
        self.cached(&self.running_apps_cache, "running apps", self.fetch_running_apps())
            .await
    }

    async fn fetch_running_apps(&self) -> TrackerResult<u64> {
        let records = self.fetch_fluxinfo("apps").await?;
        let count: usize = records
            .iter()
            .filter_map(|record| {
                record
                    .get("apps")
                    .and_then(|a| a.get("runningapps"))
                    .and_then(Value::as_array)
                    .map(|apps| apps.len())
            })
            .sum();
        Ok(count as u64)
    }

    /// Everything above in one struct (5-minute cache over the composite).
    pub async fn combined(&self) -> TrackerResult<StatsResult<CombinedStats>> {
        if let Some(value) = self.combined_cache.fresh() {
            return Ok(StatsResult {
                value,
                source: DataSource::Api,
            });
        }

        let mut any_api = false;
        let mut any_cache = false;

        let combined = CombinedStats {
            nodes: unwrap_tracking(self.node_counts().await, &mut any_api, &mut any_cache),
            arcane_nodes: unwrap_tracking(self.arcane_nodes().await, &mut any_api, &mut any_cache),
            utilization: unwrap_tracking(self.utilization().await, &mut any_api, &mut any_cache),
            running_apps: unwrap_tracking(self.running_apps().await, &mut any_api, &mut any_cache),
        };

        let source = match (any_api, any_cache) {
            (true, false) => DataSource::Api,
            (true, true) => DataSource::Partial,
            (false, true) => DataSource::Cache,
            (false, false) => DataSource::Failed,
        };
        if source == DataSource::Api {
            self.combined_cache.store(combined.clone());
        }

        Ok(StatsResult {
            value: combined,
            source,
        })
    }

    // =========================================================================
    // SNAPSHOT COLLECTION
    // =========================================================================

    /// Collect one snapshot pair and persist it, unless a row already
    /// exists within the one-hour tolerance. Bounded by the collection
    /// timeout as a whole.
    pub async fn collect_snapshot(&self, db: &Database) -> TrackerResult<SnapshotReport> {
        match tokio::time::timeout(self.collection_timeout, self.collect_inner(db)).await {
            Ok(result) => result,
            Err(_) => Err(TrackerError::network(
                "network-stats collection",
                "outer deadline exceeded",
            )),
        }
    }

    async fn collect_inner(&self, db: &Database) -> TrackerResult<SnapshotReport> {
        let timestamp = now_secs();

        let nodes = self.fetch_node_counts().await;
        let arcane = self.fetch_arcane_nodes().await;
        let utilization = self.fetch_utilization().await;
        let running_apps = self.fetch_running_apps().await;

        let attempts = 4usize;
        let successes = [
            nodes.is_ok(),
            arcane.is_ok(),
            utilization.is_ok(),
            running_apps.is_ok(),
        ]
        .iter()
        .filter(|ok| **ok)
        .count();
        let api_success_rate = (successes as f64) / (attempts as f64) * 100.0;

        let data_source = if successes == attempts {
            DataSource::Api
        } else if successes > 0 {
            DataSource::Partial
        } else {
            DataSource::Failed
        };
        let note = if successes < attempts {
            Some(format!("{}/{} upstream fetches succeeded", successes, attempts))
        } else {
            None
        };

        let mut node_row_written = false;
        if !db.node_stats_exist_within(timestamp, SNAPSHOT_TOLERANCE_SECS)? {
            let counts = nodes.unwrap_or_default();
            db.insert_node_stats(&NodeStatsRow {
                timestamp,
                total_nodes: counts.total,
                cumulus: counts.cumulus,
                nimbus: counts.nimbus,
                stratus: counts.stratus,
                arcane_nodes: arcane.unwrap_or(0),
                data_source: data_source.as_str().to_string(),
                api_success_rate,
                note: note.clone(),
            })?;
            node_row_written = true;
        }

        let mut utilization_row_written = false;
        if !db.utilization_stats_exist_within(timestamp, SNAPSHOT_TOLERANCE_SECS)? {
            let u = utilization.unwrap_or_default();
            db.insert_utilization_stats(&UtilizationRow {
                timestamp,
                total_cores: u.total_cores,
                total_ram_gb: u.total_ram_gb,
                total_ssd_gb: u.total_ssd_gb,
                utilized_cores: u.utilized_cores,
                utilized_ram_gb: u.utilized_ram_gb,
                cores_utilization_pct: u.cores_utilization_pct,
                ram_utilization_pct: u.ram_utilization_pct,
                running_apps: running_apps.unwrap_or(0),
                data_source: data_source.as_str().to_string(),
                api_success_rate,
                note,
            })?;
            utilization_row_written = true;
        }

        logger::info(
            LogTag::Stats,
            &format!(
                "Snapshot collected (source {}, success rate {:.0}%)",
                data_source.as_str(),
                api_success_rate
            ),
        );

        Ok(SnapshotReport {
            node_row_written,
            utilization_row_written,
            api_success_rate,
            data_source,
        })
    }
}
