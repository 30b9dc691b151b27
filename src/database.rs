/// SQLite store for blocks, matched transactions and network snapshots.
///
/// Single shared connection behind a mutex; batch writes commit as one
/// rusqlite transaction and duplicate rows are ignored, which makes every
/// insert path idempotent. Readers observe only committed state.
use crate::errors::TrackerResult;
use crate::logger::{self, LogTag};
use crate::utils::now_secs;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Mutex;

const SCHEMA_BLOCKS: &str = r#"
CREATE TABLE IF NOT EXISTS blocks (
    height INTEGER PRIMARY KEY,
    hash TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    synced_at INTEGER NOT NULL
);
"#;

const SCHEMA_TRANSACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tx_hash TEXT NOT NULL,
    block_height INTEGER NOT NULL,
    vout_index INTEGER NOT NULL,
    address TEXT NOT NULL,
    from_address TEXT,
    value REAL NOT NULL,
    timestamp INTEGER NOT NULL,
    UNIQUE(tx_hash, vout_index, address)
);
"#;

const SCHEMA_NODE_STATS: &str = r#"
CREATE TABLE IF NOT EXISTS network_node_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    total_nodes INTEGER NOT NULL,
    cumulus INTEGER NOT NULL,
    nimbus INTEGER NOT NULL,
    stratus INTEGER NOT NULL,
    arcane_nodes INTEGER NOT NULL,
    data_source TEXT NOT NULL,
    api_success_rate REAL NOT NULL,
    note TEXT
);
"#;

const SCHEMA_UTILIZATION_STATS: &str = r#"
CREATE TABLE IF NOT EXISTS network_utilization_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    total_cores INTEGER NOT NULL,
    total_ram_gb REAL NOT NULL,
    total_ssd_gb REAL NOT NULL,
    utilized_cores REAL NOT NULL,
    utilized_ram_gb REAL NOT NULL,
    cores_utilization_pct REAL NOT NULL,
    ram_utilization_pct REAL NOT NULL,
    running_apps INTEGER NOT NULL,
    data_source TEXT NOT NULL,
    api_success_rate REAL NOT NULL,
    note TEXT
);
"#;

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_transactions_address_time ON transactions(address, timestamp DESC);",
    "CREATE INDEX IF NOT EXISTS idx_transactions_address_height ON transactions(address, block_height DESC);",
    "CREATE INDEX IF NOT EXISTS idx_transactions_height ON transactions(block_height);",
    "CREATE INDEX IF NOT EXISTS idx_transactions_hash_vout ON transactions(tx_hash, vout_index);",
    "CREATE INDEX IF NOT EXISTS idx_node_stats_time ON network_node_stats(timestamp DESC);",
    "CREATE INDEX IF NOT EXISTS idx_utilization_stats_time ON network_utilization_stats(timestamp DESC);",
];

/// One block row as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRow {
    pub height: u64,
    pub hash: String,
    pub timestamp: i64,
}

/// One matched-payment row as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRow {
    pub tx_hash: String,
    pub block_height: u64,
    pub vout_index: u32,
    pub address: String,
    pub from_address: Option<String>,
    pub value: f64,
    pub timestamp: i64,
}

/// A stored transaction read back for listings.
#[derive(Debug, Clone, Serialize)]
pub struct StoredTransaction {
    pub id: i64,
    pub tx_hash: String,
    pub block_height: u64,
    pub vout_index: u32,
    pub address: String,
    pub from_address: Option<String>,
    pub value: f64,
    pub timestamp: i64,
}

/// Transaction with no resolved sender yet, for the backfill pass.
#[derive(Debug, Clone)]
pub struct UnresolvedTransaction {
    pub tx_hash: String,
    pub block_height: u64,
    pub vout_index: u32,
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RevenueTotal {
    pub total: f64,
    pub count: u64,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRevenue {
    pub date: String,
    pub total: f64,
    pub count: u64,
}

/// Store frontier: row count plus lowest/highest synced heights.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frontier {
    pub block_count: u64,
    pub lowest: Option<u64>,
    pub highest: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct NodeStatsRow {
    pub timestamp: i64,
    pub total_nodes: u64,
    pub cumulus: u64,
    pub nimbus: u64,
    pub stratus: u64,
    pub arcane_nodes: u64,
    pub data_source: String,
    pub api_success_rate: f64,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UtilizationRow {
    pub timestamp: i64,
    pub total_cores: u64,
    pub total_ram_gb: f64,
    pub total_ssd_gb: f64,
    pub utilized_cores: f64,
    pub utilized_ram_gb: f64,
    pub cores_utilization_pct: f64,
    pub ram_utilization_pct: f64,
    pub running_apps: u64,
    pub data_source: String,
    pub api_success_rate: f64,
    pub note: Option<String>,
}

pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    pub fn open(path: &str) -> TrackerResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
            path: Some(PathBuf::from(path)),
        };
        db.initialize()?;
        Ok(db)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> TrackerResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> TrackerResult<()> {
        let conn = self.conn.lock().unwrap();

        // Performance pragmas; correctness does not depend on them.
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.pragma_update(None, "cache_size", -64_000).ok();

        conn.execute_batch(SCHEMA_BLOCKS)?;
        conn.execute_batch(SCHEMA_TRANSACTIONS)?;
        conn.execute_batch(SCHEMA_NODE_STATS)?;
        conn.execute_batch(SCHEMA_UTILIZATION_STATS)?;
        for index in INDEXES {
            conn.execute_batch(index)?;
        }
        Ok(())
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Insert blocks and transactions as one atomic unit.
    ///
    /// Duplicate heights and duplicate `(tx_hash, vout_index, address)`
    /// triples are ignored row by row. Returns (blocks, transactions)
    /// actually inserted.
    pub fn insert_batch(
        &self,
        blocks: &[BlockRow],
        transactions: &[TransactionRow],
    ) -> TrackerResult<(usize, usize)> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let synced_at = now_secs();

        let mut inserted_blocks = 0;
        let mut inserted_txs = 0;
        {
            let mut block_stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO blocks (height, hash, timestamp, synced_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for block in blocks {
                inserted_blocks += block_stmt.execute(params![
                    block.height as i64,
                    block.hash,
                    block.timestamp,
                    synced_at
                ])?;
            }

            let mut tx_stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO transactions
                 (tx_hash, block_height, vout_index, address, from_address, value, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in transactions {
                inserted_txs += tx_stmt.execute(params![
                    row.tx_hash,
                    row.block_height as i64,
                    row.vout_index,
                    row.address,
                    row.from_address,
                    row.value,
                    row.timestamp
                ])?;
            }
        }
        tx.commit()?;

        Ok((inserted_blocks, inserted_txs))
    }

    /// Fill in a sender resolved after the original insert.
    pub fn backfill_sender(
        &self,
        tx_hash: &str,
        block_height: u64,
        vout_index: u32,
        from_address: &str,
    ) -> TrackerResult<usize> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE transactions SET from_address = ?1
             WHERE tx_hash = ?2 AND block_height = ?3 AND vout_index = ?4",
            params![from_address, tx_hash, block_height as i64, vout_index],
        )?;
        Ok(updated)
    }

    /// Retention sweep. Transactions go first; blocks only reference them
    /// advisorily, so the order keeps listings consistent mid-sweep.
    pub fn prune_older_than(&self, cutoff: i64) -> TrackerResult<(usize, usize)> {
        let conn = self.conn.lock().unwrap();
        let txs = conn.execute("DELETE FROM transactions WHERE timestamp < ?1", params![cutoff])?;
        let blocks = conn.execute("DELETE FROM blocks WHERE timestamp < ?1", params![cutoff])?;
        if txs > 0 || blocks > 0 {
            logger::info(
                LogTag::Store,
                &format!("Retention sweep removed {} transactions, {} blocks", txs, blocks),
            );
        }
        Ok((txs, blocks))
    }

    // =========================================================================
    // FRONTIER AND GAP QUERIES
    // =========================================================================

    pub fn frontier(&self) -> TrackerResult<Frontier> {
        let conn = self.conn.lock().unwrap();
        let row = conn.query_row(
            "SELECT COUNT(*), MIN(height), MAX(height) FROM blocks",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            },
        )?;
        Ok(Frontier {
            block_count: row.0 as u64,
            lowest: row.1.map(|h| h as u64),
            highest: row.2.map(|h| h as u64),
        })
    }

    /// Heights in `[start, end]` with no stored block, ascending.
    pub fn missing_heights(&self, start: u64, end: u64) -> TrackerResult<Vec<u64>> {
        if start > end {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT height FROM blocks WHERE height BETWEEN ?1 AND ?2 ORDER BY height",
        )?;
        let existing: std::collections::HashSet<u64> = stmt
            .query_map(params![start as i64, end as i64], |row| {
                row.get::<_, i64>(0).map(|h| h as u64)
            })?
            .collect::<Result<_, _>>()?;

        Ok((start..=end).filter(|h| !existing.contains(h)).collect())
    }

    /// Timestamp of the highest stored block, the prune reference point.
    pub fn highest_block_timestamp(&self) -> TrackerResult<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let ts = conn
            .query_row(
                "SELECT timestamp FROM blocks ORDER BY height DESC LIMIT 1",
                [],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(ts)
    }

    // =========================================================================
    // REVENUE QUERIES
    // =========================================================================

    /// Per-calendar-day revenue for one address since a timestamp.
    pub fn daily_revenue(&self, address: &str, since_ts: i64) -> TrackerResult<Vec<DailyRevenue>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT date(timestamp, 'unixepoch') AS day, SUM(value), COUNT(*)
             FROM transactions
             WHERE address = ?1 AND timestamp >= ?2
             GROUP BY day
             ORDER BY day",
        )?;
        let rows = stmt
            .query_map(params![address, since_ts], |row| {
                Ok(DailyRevenue {
                    date: row.get(0)?,
                    total: row.get(1)?,
                    count: row.get::<_, i64>(2)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn total_revenue(&self, address: &str) -> TrackerResult<RevenueTotal> {
        let conn = self.conn.lock().unwrap();
        let row = conn.query_row(
            "SELECT COALESCE(SUM(value), 0), COUNT(*), MIN(timestamp), MAX(timestamp)
             FROM transactions WHERE address = ?1",
            params![address],
            |row| {
                Ok(RevenueTotal {
                    total: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                    first_timestamp: row.get(2)?,
                    last_timestamp: row.get(3)?,
                })
            },
        )?;
        Ok(row)
    }

    pub fn revenue_in_block_range(
        &self,
        address: &str,
        start_height: u64,
        end_height: u64,
    ) -> TrackerResult<(f64, u64)> {
        let conn = self.conn.lock().unwrap();
        let row = conn.query_row(
            "SELECT COALESCE(SUM(value), 0), COUNT(*)
             FROM transactions
             WHERE address = ?1 AND block_height BETWEEN ?2 AND ?3",
            params![address, start_height as i64, end_height as i64],
            |row| Ok((row.get::<_, f64>(0)?, row.get::<_, i64>(1)? as u64)),
        )?;
        Ok((row.0, row.1))
    }

    /// Paginated transaction listing, newest first, with optional substring
    /// search over hash, sender and stringified value.
    pub fn transactions_page(
        &self,
        address: Option<&str>,
        page: u64,
        limit: u64,
        search: Option<&str>,
    ) -> TrackerResult<(Vec<StoredTransaction>, u64)> {
        let limit = limit.clamp(1, 500);
        let page = page.max(1);
        let offset = (page - 1) * limit;

        let mut where_clauses: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();
        if let Some(address) = address {
            where_clauses.push(format!("address = ?{}", args.len() + 1));
            args.push(address.to_string());
        }
        if let Some(needle) = search.filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", needle);
            let base = args.len();
            where_clauses.push(format!(
                "(tx_hash LIKE ?{} OR COALESCE(from_address, '') LIKE ?{} OR CAST(value AS TEXT) LIKE ?{})",
                base + 1,
                base + 2,
                base + 3
            ));
            args.push(pattern.clone());
            args.push(pattern.clone());
            args.push(pattern);
        }
        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_clauses.join(" AND "))
        };

        let conn = self.conn.lock().unwrap();

        let count_sql = format!("SELECT COUNT(*) FROM transactions {}", where_sql);
        let total: i64 =
            conn.query_row(&count_sql, params_from_iter(args.iter()), |row| row.get(0))?;

        let page_sql = format!(
            "SELECT id, tx_hash, block_height, vout_index, address, from_address, value, timestamp
             FROM transactions {}
             ORDER BY timestamp DESC, block_height DESC, id DESC
             LIMIT {} OFFSET {}",
            where_sql, limit, offset
        );
        let mut stmt = conn.prepare(&page_sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(StoredTransaction {
                    id: row.get(0)?,
                    tx_hash: row.get(1)?,
                    block_height: row.get::<_, i64>(2)? as u64,
                    vout_index: row.get::<_, i64>(3)? as u32,
                    address: row.get(4)?,
                    from_address: row.get(5)?,
                    value: row.get(6)?,
                    timestamp: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total as u64))
    }

    /// Transactions whose sender was never resolved, oldest block first.
    pub fn unresolved_transactions(&self, limit: u64) -> TrackerResult<Vec<UnresolvedTransaction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT tx_hash, block_height, vout_index, address
             FROM transactions
             WHERE from_address IS NULL
             ORDER BY block_height
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(UnresolvedTransaction {
                    tx_hash: row.get(0)?,
                    block_height: row.get::<_, i64>(1)? as u64,
                    vout_index: row.get::<_, i64>(2)? as u32,
                    address: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // =========================================================================
    // NETWORK SNAPSHOTS
    // =========================================================================

    pub fn insert_node_stats(&self, row: &NodeStatsRow) -> TrackerResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO network_node_stats
             (timestamp, total_nodes, cumulus, nimbus, stratus, arcane_nodes,
              data_source, api_success_rate, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.timestamp,
                row.total_nodes as i64,
                row.cumulus as i64,
                row.nimbus as i64,
                row.stratus as i64,
                row.arcane_nodes as i64,
                row.data_source,
                row.api_success_rate,
                row.note
            ],
        )?;
        Ok(())
    }

    pub fn insert_utilization_stats(&self, row: &UtilizationRow) -> TrackerResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO network_utilization_stats
             (timestamp, total_cores, total_ram_gb, total_ssd_gb, utilized_cores,
              utilized_ram_gb, cores_utilization_pct, ram_utilization_pct,
              running_apps, data_source, api_success_rate, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                row.timestamp,
                row.total_cores as i64,
                row.total_ram_gb,
                row.total_ssd_gb,
                row.utilized_cores,
                row.utilized_ram_gb,
                row.cores_utilization_pct,
                row.ram_utilization_pct,
                row.running_apps as i64,
                row.data_source,
                row.api_success_rate,
                row.note
            ],
        )?;
        Ok(())
    }

    /// Whether either snapshot table already has a row within the tolerance
    /// window around `timestamp`.
    pub fn node_stats_exist_within(&self, timestamp: i64, tolerance: i64) -> TrackerResult<bool> {
        self.snapshot_exists("network_node_stats", timestamp, tolerance)
    }

    pub fn utilization_stats_exist_within(
        &self,
        timestamp: i64,
        tolerance: i64,
    ) -> TrackerResult<bool> {
        self.snapshot_exists("network_utilization_stats", timestamp, tolerance)
    }

    fn snapshot_exists(&self, table: &str, timestamp: i64, tolerance: i64) -> TrackerResult<bool> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE timestamp BETWEEN ?1 AND ?2",
            table
        );
        let count: i64 = conn.query_row(
            &sql,
            params![timestamp - tolerance, timestamp + tolerance],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    pub fn file_size_bytes(&self) -> u64 {
        self.path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0)
    }

    pub fn is_over_size_cap(&self, max_gb: f64) -> bool {
        let cap = (max_gb * 1024.0 * 1024.0 * 1024.0) as u64;
        cap > 0 && self.file_size_bytes() > cap
    }

    /// Final optimization hook, called on shutdown.
    pub fn optimize(&self) -> TrackerResult<()> {
        let conn = self.conn.lock().unwrap();
        // wal_checkpoint reports a result row, so it cannot go through
        // execute_batch
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        conn.execute_batch("PRAGMA optimize;")?;
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}
