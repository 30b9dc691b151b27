/// Current wall-clock seconds since the Unix epoch.
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Compact duration formatting for progress messages.
pub fn format_duration_secs(total_seconds: u64) -> String {
    if total_seconds < 60 {
        format!("{}s", total_seconds)
    } else if total_seconds < 3_600 {
        format!("{}m {}s", total_seconds / 60, total_seconds % 60)
    } else if total_seconds < 86_400 {
        let hours = total_seconds / 3_600;
        let minutes = (total_seconds % 3_600) / 60;
        format!("{}h {}m", hours, minutes)
    } else {
        let days = total_seconds / 86_400;
        let hours = (total_seconds % 86_400) / 3_600;
        format!("{}d {}h", days, hours)
    }
}

/// Shorten a transaction hash for log lines.
pub fn short_hash(hash: &str) -> String {
    if hash.chars().count() > 12 {
        let head: String = hash.chars().take(8).collect();
        format!("{}...", head)
    } else {
        hash.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration_secs(45), "45s");
        assert_eq!(format_duration_secs(125), "2m 5s");
        assert_eq!(format_duration_secs(7_260), "2h 1m");
        assert_eq!(format_duration_secs(90_000), "1d 1h");
    }

    #[test]
    fn hash_shortening() {
        assert_eq!(short_hash("abc"), "abc");
        assert_eq!(short_hash("0123456789abcdef"), "01234567...");
    }
}
