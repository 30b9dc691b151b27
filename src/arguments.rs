/// Centralized argument handling.
///
/// Stores the process arguments once so binaries and tests can override
/// them, and exposes flag helpers used across the codebase.
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage.
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments (used by tests).
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments.
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present on the command line.
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value following a flag, if any.
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    for (i, arg) in args.iter().enumerate() {
        if arg == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

pub fn is_run_enabled() -> bool {
    has_arg("--run")
}

pub fn is_reset_enabled() -> bool {
    has_arg("--reset")
}

pub fn is_force_enabled() -> bool {
    has_arg("--force")
}

pub fn is_help_requested() -> bool {
    has_arg("--help") || has_arg("-h")
}

/// Verbose debug logging across all modules.
pub fn is_debug_enabled() -> bool {
    has_arg("--debug")
}

/// One-shot mode: run a single sync cycle and exit.
pub fn is_once_enabled() -> bool {
    has_arg("--once")
}

/// Custom config file path (`--config <path>`).
pub fn config_path() -> Option<String> {
    get_arg_value("--config")
}

pub fn print_help() {
    println!("fluxtracker - revenue indexer for watched Flux addresses");
    println!();
    println!("USAGE:");
    println!("    fluxtracker --run [OPTIONS]");
    println!("    fluxtracker --reset [--force]");
    println!();
    println!("OPTIONS:");
    println!("    --run              Start the indexer daemon");
    println!("    --once             Run a single sync cycle and exit");
    println!("    --config <path>    Config file path (default: fluxtracker.json)");
    println!("    --reset            Delete the local store and exit");
    println!("    --force            Skip the reset confirmation");
    println!("    --debug            Verbose debug logging");
    println!("    --help             Show this help");
}
