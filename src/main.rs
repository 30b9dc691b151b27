use fluxtracker::arguments::{
    self, is_force_enabled, is_help_requested, is_reset_enabled, is_run_enabled, print_help,
};
use fluxtracker::config::{Config, DEFAULT_CONFIG_PATH};
use fluxtracker::logger::{self, LogTag};

/// Main entry point for the indexer.
///
/// Routes execution based on command-line arguments:
/// - `--help`: display help and exit
/// - `--reset [--force]`: delete the local store and exit
/// - `--run [--once]`: start the indexer
#[tokio::main]
async fn main() {
    logger::init();

    if is_help_requested() {
        print_help();
        std::process::exit(0);
    }

    if is_reset_enabled() {
        let config_path =
            arguments::config_path().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let database_path = Config::load(&config_path)
            .map(|c| c.database_path)
            .unwrap_or_else(|_| "fluxtracker.db".to_string());

        match fluxtracker::reset::execute_reset(&database_path, is_force_enabled()) {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                logger::error(LogTag::System, &format!("Reset failed: {}", e));
                std::process::exit(1);
            }
        }
    }

    if !is_run_enabled() {
        logger::error(LogTag::System, "No execution mode specified");
        print_help();
        std::process::exit(1);
    }

    logger::info(LogTag::System, "fluxtracker starting up");
    match fluxtracker::run::run_daemon().await {
        Ok(()) => {
            logger::info(LogTag::System, "fluxtracker exited");
        }
        Err(e) => {
            logger::error(LogTag::System, &format!("fluxtracker failed: {:#}", e));
            std::process::exit(1);
        }
    }
}
