/// HTTP client for the Flux daemon/explorer JSON API.
///
/// All endpoints answer a `{ status, data }` envelope; anything other than
/// `status == "success"` is treated as a per-request error. Block and
/// resolved-address lookups are cached; batch fetches fan out under a
/// semaphore so at most `max_concurrent_requests` are in flight.
use crate::cache::LruCache;
use crate::config::Config;
use crate::constants::UNITS_PER_FLUX;
use crate::errors::{TrackerError, TrackerResult};
use crate::logger::{self, LogTag};
use crate::utils::short_hash;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Deserialize)]
pub struct ChainBlock {
    pub height: u64,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub confirmations: i64,
    #[serde(default)]
    pub tx: Vec<ChainTx>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainTx {
    #[serde(default)]
    pub txid: String,
    #[serde(default)]
    pub vin: Vec<TxInput>,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxInput {
    #[serde(default)]
    pub coinbase: Option<String>,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    #[serde(default, alias = "address")]
    pub addr: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxOutput {
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
    #[serde(default, rename = "scriptPubKey")]
    pub script_pub_key: Option<ScriptPubKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
}

impl TxOutput {
    /// Decoded recipient addresses, wherever the daemon put them.
    pub fn recipient_addresses(&self) -> &[String] {
        if let Some(addrs) = &self.addresses {
            return addrs;
        }
        if let Some(spk) = &self.script_pub_key {
            if let Some(addrs) = &spk.addresses {
                return addrs;
            }
        }
        &[]
    }
}

pub struct ChainClient {
    http: reqwest::Client,
    api_base: String,
    semaphore: Arc<Semaphore>,
    request_delay: Duration,
    address_cache: LruCache<String, String>,
    block_cache: LruCache<u64, ChainBlock>,
}

impl ChainClient {
    pub fn new(config: &Config) -> TrackerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.connection_timeout_secs))
            .build()
            .map_err(|e| TrackerError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
            semaphore: Arc::new(Semaphore::new(config.http.max_concurrent_requests.max(1))),
            request_delay: Duration::from_millis(config.http.request_delay_ms),
            address_cache: LruCache::with_ttl(
                config.cache.address_cache_size,
                Duration::from_secs(config.cache.address_cache_ttl_secs),
            ),
            block_cache: LruCache::with_ttl(
                config.cache.block_cache_size,
                Duration::from_secs(config.cache.block_cache_ttl_secs),
            ),
        })
    }

    /// GET an enveloped endpoint and return its `data` payload.
    async fn get_data(&self, url: &str) -> TrackerResult<Value> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TrackerError::network(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TrackerError::network(url, format!("HTTP {}", status)));
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

    /// Current chain tip, with `getblockcount` as fallback.
    pub async fn tip(&self) -> TrackerResult<u64> {
        let url = format!("{}/daemon/getinfo", self.api_base);
        match self.get_data(&url).await {
            Ok(data) => {
                if let Some(height) = data.get("blocks").and_then(Value::as_u64) {
                    return Ok(height);
                }
                logger::warn(LogTag::Chain, "getinfo missing blocks field, using fallback");
            }
            Err(e) => {
                logger::warn(LogTag::Chain, &format!("getinfo failed ({}), using fallback", e));
            }
        }

        let url = format!("{}/daemon/getblockcount", self.api_base);
        let data = self.get_data(&url).await?;
        data.as_u64()
            .ok_or_else(|| TrackerError::api(&url, "block count is not a number"))
    }

    /// Fetch one block by height, going through the block cache.
    pub async fn fetch_block(&self, height: u64) -> TrackerResult<ChainBlock> {
        if let Some(block) = self.block_cache.get(&height) {
            return Ok(block);
        }

        let url = format!("{}/daemon/getblock?hashheight={}", self.api_base, height);
        let data = self.get_data(&url).await?;
        let block: ChainBlock =
            serde_json::from_value(data).map_err(|e| TrackerError::api(&url, e))?;

        self.block_cache.insert(height, block.clone());
        Ok(block)
    }

    /// Fetch many blocks in parallel. Results are order-preserving by input;
    /// individual failures do not poison the batch.
    pub async fn fetch_blocks(&self, heights: &[u64]) -> Vec<(u64, TrackerResult<ChainBlock>)> {
        let tasks = heights.iter().map(|&height| async move {
            let _permit = match self.semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (
                        height,
                        Err(TrackerError::network("semaphore", "request pool closed")),
                    );
                }
            };
            if !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
            (height, self.fetch_block(height).await)
        });

        futures::future::join_all(tasks).await
    }

    /// Resolve the sender behind a previous output, caching successes only.
    /// A failure is left uncached so callers can retry later.
    pub async fn try_resolve_sender(
        &self,
        prev_txid: &str,
        vout_index: u32,
    ) -> TrackerResult<String> {
        let key = format!("{}:{}", prev_txid, vout_index);
        if let Some(address) = self.address_cache.get(&key) {
            return Ok(address);
        }

        let address = self.lookup_output_address(prev_txid, vout_index).await?;
        self.address_cache.insert(key, address.clone());
        Ok(address)
    }

    /// Resolve the sender behind a previous output. Any failure resolves to
    /// `"Unknown"`, which is cached like a real answer.
    pub async fn resolve_sender(&self, prev_txid: &str, vout_index: u32) -> String {
        match self.try_resolve_sender(prev_txid, vout_index).await {
            Ok(address) => address,
            Err(e) => {
                logger::debug(
                    LogTag::Chain,
                    &format!("sender lookup {} failed: {}", short_hash(prev_txid), e),
                );
                let key = format!("{}:{}", prev_txid, vout_index);
                self.address_cache.insert(key, "Unknown".to_string());
                "Unknown".to_string()
            }
        }
    }

    async fn lookup_output_address(&self, txid: &str, vout_index: u32) -> TrackerResult<String> {
        let url = format!(
            "{}/daemon/getrawtransaction?txid={}&decrypt=1",
            self.api_base, txid
        );
        let data = self.get_data(&url).await?;
        let tx: ChainTx = serde_json::from_value(data).map_err(|e| TrackerError::api(&url, e))?;

        tx.vout
            .get(vout_index as usize)
            .and_then(|out| out.recipient_addresses().first().cloned())
            .ok_or_else(|| TrackerError::api(&url, "referenced output has no address"))
    }

    /// Current balance of an address in FLUX.
    pub async fn balance(&self, address: &str) -> TrackerResult<f64> {
        let url = format!("{}/explorer/balance/{}", self.api_base, address);
        let data = self.get_data(&url).await?;
        let units = data
            .as_f64()
            .ok_or_else(|| TrackerError::api(&url, "balance is not a number"))?;
        Ok(units / UNITS_PER_FLUX)
    }

    pub fn cached_blocks(&self) -> usize {
        self.block_cache.len()
    }

    pub fn cached_addresses(&self) -> usize {
        self.address_cache.len()
    }
}
