/// Structured error types for the indexer.
///
/// Network and upstream-payload failures are per-item and recoverable; the
/// sync engine collects them inside a batch without aborting siblings.
/// Store failures are fatal to the current cycle.

#[derive(Debug)]
pub enum TrackerError {
    /// Transport-level failure: timeout, refused connection, non-2xx.
    Network {
        endpoint: String,
        message: String,
    },

    /// Upstream answered but the payload was not the expected shape,
    /// including a missing or non-success `{ status, data }` envelope.
    Api {
        endpoint: String,
        message: String,
    },

    /// SQLite-level failure.
    Database(rusqlite::Error),

    /// Bad or missing configuration.
    Config(String),
}

impl std::fmt::Display for TrackerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerError::Network { endpoint, message } => {
                write!(f, "Network error ({}): {}", endpoint, message)
            }
            TrackerError::Api { endpoint, message } => {
                write!(f, "API error ({}): {}", endpoint, message)
            }
            TrackerError::Database(e) => write!(f, "Database error: {}", e),
            TrackerError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for TrackerError {}

impl From<rusqlite::Error> for TrackerError {
    fn from(e: rusqlite::Error) -> Self {
        TrackerError::Database(e)
    }
}

impl TrackerError {
    pub fn network(endpoint: &str, err: impl std::fmt::Display) -> Self {
        TrackerError::Network {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }

    pub fn api(endpoint: &str, err: impl std::fmt::Display) -> Self {
        TrackerError::Api {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
