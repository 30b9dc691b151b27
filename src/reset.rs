/// Clean reset: the store file is the only durable state, so deleting it
/// (plus the WAL sidecars) returns the indexer to a fresh install.
use crate::logger::{self, LogTag};
use anyhow::Result;
use std::io::Write;
use std::path::Path;

pub fn execute_reset(database_path: &str, force: bool) -> Result<()> {
    if !Path::new(database_path).exists() {
        logger::info(LogTag::System, "No store file found, nothing to reset");
        return Ok(());
    }

    if !force {
        print!("Delete {} and all synced data? [y/N] ", database_path);
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            logger::info(LogTag::System, "Reset cancelled");
            return Ok(());
        }
    }

    std::fs::remove_file(database_path)?;
    for suffix in ["-wal", "-shm"] {
        let sidecar = format!("{}{}", database_path, suffix);
        if Path::new(&sidecar).exists() {
            std::fs::remove_file(&sidecar)?;
        }
    }

    logger::success(LogTag::System, &format!("Removed {}", database_path));
    Ok(())
}
