use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "fluxtracker.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Watched recipient addresses.
    pub addresses: Vec<String>,
    pub api_base_url: String,
    pub stats_base_url: String,
    pub database_path: String,
    #[serde(default)]
    pub optimization_level: OptimizationLevel,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub retention: RetentionSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    #[default]
    Conservative,
    Aggressive,
    Maximum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    pub enabled: bool,
    pub sync_interval_secs: u64,
    /// Per-cycle block budget.
    pub max_blocks_per_sync: u64,
    pub batch_size: usize,
    pub parallel_batches: usize,
    /// Progress percentage at which the gap-fill pass starts running.
    pub gap_fill_threshold_pct: f64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_interval_secs: 120,
            max_blocks_per_sync: 2_000,
            batch_size: 50,
            parallel_batches: 1,
            gap_fill_threshold_pct: 95.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    pub max_concurrent_requests: usize,
    pub connection_timeout_secs: u64,
    /// Optional pacing delay between request waves, in milliseconds.
    pub request_delay_ms: u64,
    /// Outer deadline for one network-stats collection.
    pub collection_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            connection_timeout_secs: 30,
            request_delay_ms: 0,
            collection_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub address_cache_size: usize,
    pub address_cache_ttl_secs: u64,
    pub block_cache_size: usize,
    pub block_cache_ttl_secs: u64,
    pub node_stats_ttl_secs: u64,
    pub arcane_stats_ttl_secs: u64,
    pub utilization_ttl_secs: u64,
    pub combined_stats_ttl_secs: u64,
    pub running_apps_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            address_cache_size: 10_000,
            address_cache_ttl_secs: 3_600,
            block_cache_size: 500,
            block_cache_ttl_secs: 600,
            node_stats_ttl_secs: 300,
            arcane_stats_ttl_secs: 600,
            utilization_ttl_secs: 180,
            combined_stats_ttl_secs: 300,
            running_apps_ttl_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionSettings {
    pub retention_days: u64,
    pub blocks_per_day: u64,
    pub max_db_size_gb: f64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            retention_days: 30,
            blocks_per_day: crate::constants::BLOCKS_PER_DAY,
            max_db_size_gb: 4.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            api_base_url: "https://api.runonflux.io".to_string(),
            stats_base_url: "https://stats.runonflux.io".to_string(),
            database_path: "fluxtracker.db".to_string(),
            optimization_level: OptimizationLevel::Conservative,
            sync: SyncSettings::default(),
            http: HttpSettings::default(),
            cache: CacheSettings::default(),
            retention: RetentionSettings::default(),
        }
    }
}

impl Config {
    /// Load the config file, writing a default one when missing, then apply
    /// the optimization preset and environment overrides on top.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {path}"))?;
            serde_json::from_str::<Self>(&content)
                .with_context(|| format!("Failed to parse config file: {path}"))?
        } else {
            let default_config = Self::default();
            default_config.save(path)?;
            default_config
        };

        config.apply_optimization_level();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write config file: {path}"))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.addresses.is_empty() {
            return Err(anyhow::anyhow!(
                "at least one watched address is required (addresses / FLUXTRACKER_ADDRESSES)"
            ));
        }
        if self.retention.blocks_per_day == 0 {
            return Err(anyhow::anyhow!("blocks_per_day must be positive"));
        }
        Ok(())
    }

    /// Presets override the tuning knobs; explicit env vars still win after.
    fn apply_optimization_level(&mut self) {
        match self.optimization_level {
            OptimizationLevel::Conservative => {}
            OptimizationLevel::Aggressive => {
                self.sync.max_blocks_per_sync = 5_000;
                self.sync.batch_size = 100;
                self.sync.sync_interval_secs = 60;
                self.http.max_concurrent_requests = 20;
            }
            OptimizationLevel::Maximum => {
                self.sync.max_blocks_per_sync = 10_000;
                self.sync.batch_size = 200;
                self.sync.sync_interval_secs = 30;
                self.http.max_concurrent_requests = 40;
                self.http.request_delay_ms = 0;
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("FLUXTRACKER_ADDRESSES") {
            let addrs: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !addrs.is_empty() {
                self.addresses = addrs;
            }
        }
        if let Ok(v) = env::var("FLUXTRACKER_API_URL") {
            self.api_base_url = v;
        }
        if let Ok(v) = env::var("FLUXTRACKER_STATS_URL") {
            self.stats_base_url = v;
        }
        if let Ok(v) = env::var("FLUXTRACKER_DATABASE_PATH") {
            self.database_path = v;
        }
        if let Ok(v) = env::var("FLUXTRACKER_OPTIMIZATION_LEVEL") {
            match v.to_lowercase().as_str() {
                "conservative" => self.optimization_level = OptimizationLevel::Conservative,
                "aggressive" => {
                    self.optimization_level = OptimizationLevel::Aggressive;
                    self.apply_optimization_level();
                }
                "maximum" => {
                    self.optimization_level = OptimizationLevel::Maximum;
                    self.apply_optimization_level();
                }
                _ => {}
            }
        }

        parse_env("FLUXTRACKER_SYNC_INTERVAL", &mut self.sync.sync_interval_secs);
        parse_env("FLUXTRACKER_MAX_BLOCKS_PER_SYNC", &mut self.sync.max_blocks_per_sync);
        parse_env("FLUXTRACKER_BATCH_SIZE", &mut self.sync.batch_size);
        parse_env("FLUXTRACKER_PARALLEL_BATCHES", &mut self.sync.parallel_batches);
        parse_env("FLUXTRACKER_GAP_FILL_THRESHOLD", &mut self.sync.gap_fill_threshold_pct);
        parse_env("FLUXTRACKER_MAX_CONCURRENT", &mut self.http.max_concurrent_requests);
        parse_env("FLUXTRACKER_CONNECTION_TIMEOUT", &mut self.http.connection_timeout_secs);
        parse_env("FLUXTRACKER_REQUEST_DELAY", &mut self.http.request_delay_ms);
        parse_env("FLUXTRACKER_COLLECTION_TIMEOUT", &mut self.http.collection_timeout_secs);
        parse_env("FLUXTRACKER_RETENTION_DAYS", &mut self.retention.retention_days);
        parse_env("FLUXTRACKER_BLOCKS_PER_DAY", &mut self.retention.blocks_per_day);
        parse_env("FLUXTRACKER_MAX_DB_SIZE_GB", &mut self.retention.max_db_size_gb);
        parse_env("FLUXTRACKER_ADDRESS_CACHE_SIZE", &mut self.cache.address_cache_size);
        parse_env("FLUXTRACKER_BLOCK_CACHE_SIZE", &mut self.cache.block_cache_size);
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, target: &mut T) {
    if let Ok(v) = env::var(name) {
        if let Ok(parsed) = v.parse::<T>() {
            *target = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.sync.max_blocks_per_sync, 2_000);
        assert_eq!(config.retention.blocks_per_day, 720);
        assert_eq!(config.cache.node_stats_ttl_secs, 300);
        assert_eq!(config.cache.running_apps_ttl_secs, 120);
    }

    #[test]
    fn presets_override_tuning() {
        let mut config = Config::default();
        config.optimization_level = OptimizationLevel::Maximum;
        config.apply_optimization_level();
        assert_eq!(config.sync.max_blocks_per_sync, 10_000);
        assert_eq!(config.http.max_concurrent_requests, 40);
    }

    #[test]
    fn env_override_applies() {
        std::env::set_var("FLUXTRACKER_BATCH_SIZE", "77");
        let mut config = Config::default();
        config.apply_env_overrides();
        std::env::remove_var("FLUXTRACKER_BATCH_SIZE");
        assert_eq!(config.sync.batch_size, 77);
    }
}
