// ── Core error types ──
//
// Poll-level errors from wanwatch-core. Consumers never see HTTP status
// codes or JSON parse failures directly; `From<wanwatch_api::Error>` folds
// them into the small taxonomy the monitor reports upward.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Console rejected the API key: {message}")]
    Unauthorized { message: String },

    #[error("Console unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("Unexpected response from console: {message}")]
    Unexpected { message: String },

    // ── Device errors ────────────────────────────────────────────────
    #[error("No gateway device found in site '{site}'")]
    NoGatewayFound { site: String },

    // ── Speedtest errors ─────────────────────────────────────────────
    #[error("A speedtest is already running")]
    AlreadyRunning,

    #[error("Speedtest did not complete within {after_secs}s")]
    SpeedtestTimedOut { after_secs: u64 },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Monitor has been shut down")]
    ShutDown,
}

impl CoreError {
    /// Errors that should stop setup/validation instead of being retried on the next tick.
    pub fn is_setup_fatal(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. } | Self::NoGatewayFound { .. } | Self::Config { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<wanwatch_api::Error> for CoreError {
    fn from(err: wanwatch_api::Error) -> Self {
        match err {
            wanwatch_api::Error::InvalidApiKey { message } => CoreError::Unauthorized { message },
            wanwatch_api::Error::Transport(ref e) => {
                if e.is_decode() {
                    CoreError::Unexpected {
                        message: e.to_string(),
                    }
                } else {
                    CoreError::Unreachable {
                        reason: e.to_string(),
                    }
                }
            }
            wanwatch_api::Error::Tls(reason) => CoreError::Unreachable {
                reason: format!("TLS error: {reason}"),
            },
            wanwatch_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            wanwatch_api::Error::Http { status, message } => CoreError::Unexpected {
                message: format!("HTTP {status}: {message}"),
            },
            wanwatch_api::Error::Api { message } => CoreError::Unexpected { message },
            wanwatch_api::Error::Deserialization { message, body: _ } => CoreError::Unexpected {
                message: format!("Deserialization error: {message}"),
            },
            wanwatch_api::Error::NoGatewayFound { site } => CoreError::NoGatewayFound { site },
        }
    }
}
