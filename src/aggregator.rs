/// Read-side composition of store queries into the shapes external
/// consumers expect. Purely derived; never writes.
use crate::constants::{blocks_to_period_label, period_to_blocks};
use crate::database::{DailyRevenue, Database, RevenueTotal, StoredTransaction};
use crate::errors::{TrackerError, TrackerResult};
use crate::utils::now_secs;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct AddressBreakdown {
    pub total: f64,
    pub count: u64,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    pub daily: Vec<DailyRevenue>,
}

/// Calendar-windowed revenue across one or more addresses.
#[derive(Debug, Clone, Serialize)]
pub struct RevenueReport {
    pub days: u64,
    /// Combined series, one row per calendar day, sorted ascending.
    pub daily: Vec<DailyRevenue>,
    pub total: f64,
    pub count: u64,
    pub breakdown: Option<BTreeMap<String, AddressBreakdown>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressRangeRevenue {
    pub total: f64,
    pub count: u64,
}

/// Block-windowed revenue resolved against the stored tip.
#[derive(Debug, Clone, Serialize)]
pub struct BlockRangeReport {
    pub blocks: u64,
    pub period: String,
    pub start_height: u64,
    pub end_height: u64,
    pub total: f64,
    pub count: u64,
    pub per_address: BTreeMap<String, AddressRangeRevenue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<StoredTransaction>,
    pub pagination: Pagination,
}

pub struct Aggregator {
    db: Arc<Database>,
    watched: Vec<String>,
}

impl Aggregator {
    pub fn new(db: Arc<Database>, watched: Vec<String>) -> Self {
        Self { db, watched }
    }

    /// Daily revenue over the trailing `days`, combined across `addresses`
    /// (or the full watch set). The combined series sums per-address rows
    /// keyed by date, so the caller sees one sorted series.
    pub fn revenue_by_days(
        &self,
        days: u64,
        addresses: Option<&[String]>,
        with_breakdown: bool,
    ) -> TrackerResult<RevenueReport> {
        let addresses: Vec<String> = match addresses {
            Some(list) if !list.is_empty() => list.to_vec(),
            _ => self.watched.clone(),
        };
        let since_ts = now_secs() - (days as i64) * crate::constants::SECONDS_PER_DAY;

        let mut merged: BTreeMap<String, (f64, u64)> = BTreeMap::new();
        let mut breakdown: BTreeMap<String, AddressBreakdown> = BTreeMap::new();

        for address in &addresses {
            let daily = self.db.daily_revenue(address, since_ts)?;
            for row in &daily {
                let entry = merged.entry(row.date.clone()).or_insert((0.0, 0));
                entry.0 += row.total;
                entry.1 += row.count;
            }
            if with_breakdown {
                let totals: RevenueTotal = self.db.total_revenue(address)?;
                breakdown.insert(
                    address.clone(),
                    AddressBreakdown {
                        total: totals.total,
                        count: totals.count,
                        first_timestamp: totals.first_timestamp,
                        last_timestamp: totals.last_timestamp,
                        daily,
                    },
                );
            }
        }

        let daily: Vec<DailyRevenue> = merged
            .into_iter()
            .map(|(date, (total, count))| DailyRevenue { date, total, count })
            .collect();
        let total = daily.iter().map(|d| d.total).sum();
        let count = daily.iter().map(|d| d.count).sum();

        Ok(RevenueReport {
            days,
            daily,
            total,
            count,
            breakdown: if with_breakdown { Some(breakdown) } else { None },
        })
    }

    /// Revenue over the trailing `blocks` ending at the stored tip.
    pub fn revenue_by_blocks(
        &self,
        blocks: u64,
        address: Option<&str>,
    ) -> TrackerResult<BlockRangeReport> {
        let frontier = self.db.frontier()?;
        let end_height = frontier.highest.unwrap_or(0);
        let start_height = end_height.saturating_sub(blocks);

        let addresses: Vec<String> = match address {
            Some(addr) => vec![addr.to_string()],
            None => self.watched.clone(),
        };

        let mut per_address = BTreeMap::new();
        let mut total = 0.0;
        let mut count = 0u64;
        for addr in &addresses {
            let (sum, n) = self.db.revenue_in_block_range(addr, start_height, end_height)?;
            total += sum;
            count += n;
            per_address.insert(addr.clone(), AddressRangeRevenue { total: sum, count: n });
        }

        Ok(BlockRangeReport {
            blocks,
            period: blocks_to_period_label(blocks),
            start_height,
            end_height,
            total,
            count,
            per_address,
        })
    }

    /// Named-period variant of the block window query. Accepts `day`,
    /// `week`, `month`, `year` or a raw block count.
    pub fn revenue_by_period(
        &self,
        period: &str,
        address: Option<&str>,
    ) -> TrackerResult<BlockRangeReport> {
        let blocks = period_to_blocks(period)
            .ok_or_else(|| TrackerError::Config(format!("unknown period: {}", period)))?;
        self.revenue_by_blocks(blocks, address)
    }

    /// All-time totals for every watched address.
    pub fn totals(&self) -> TrackerResult<BTreeMap<String, RevenueTotal>> {
        let mut totals = BTreeMap::new();
        for address in &self.watched {
            totals.insert(address.clone(), self.db.total_revenue(address)?);
        }
        Ok(totals)
    }

    /// Paginated listing with optional substring search.
    pub fn list_transactions(
        &self,
        address: Option<&str>,
        page: u64,
        limit: u64,
        search: Option<&str>,
    ) -> TrackerResult<TransactionPage> {
        let limit = limit.clamp(1, 500);
        let page = page.max(1);
        let (transactions, total) = self.db.transactions_page(address, page, limit, search)?;
        let total_pages = total.div_ceil(limit).max(1);

        Ok(TransactionPage {
            transactions,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages,
            },
        })
    }
}
