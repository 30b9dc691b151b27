/// Chain-wide constants shared across modules.
///
/// Flux targets a 2-minute block time, which gives the canonical block
/// counts used for block-based period queries.

/// Blocks produced per day at the 2-minute target spacing.
pub const BLOCKS_PER_DAY: u64 = 720;

/// Block counts for the named query periods.
pub const BLOCKS_PER_WEEK: u64 = 5_040;
pub const BLOCKS_PER_MONTH: u64 = 21_600;
pub const BLOCKS_PER_YEAR: u64 = 262_800;

/// Base units per FLUX (satoshi-style, 8 decimals).
pub const UNITS_PER_FLUX: f64 = 100_000_000.0;

/// Seconds in a day, used by the retention sweep.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Snapshot de-duplication tolerance in seconds (one hour).
pub const SNAPSHOT_TOLERANCE_SECS: i64 = 3_600;

/// Hard ceiling on concurrent sender resolutions inside one batch.
pub const SENDER_RESOLVE_CAP: usize = 15;

/// Resolve a named period to its block count, or parse a raw block count.
pub fn period_to_blocks(period: &str) -> Option<u64> {
    match period {
        "day" => Some(BLOCKS_PER_DAY),
        "week" => Some(BLOCKS_PER_WEEK),
        "month" => Some(BLOCKS_PER_MONTH),
        "year" => Some(BLOCKS_PER_YEAR),
        other => other.parse().ok(),
    }
}

/// Human label for a block count, used in query responses.
pub fn blocks_to_period_label(blocks: u64) -> String {
    match blocks {
        BLOCKS_PER_DAY => "day".to_string(),
        BLOCKS_PER_WEEK => "week".to_string(),
        BLOCKS_PER_MONTH => "month".to_string(),
        BLOCKS_PER_YEAR => "year".to_string(),
        other => format!("{} blocks", other),
    }
}
