use thiserror::Error;

/// Top-level error type for the `wanwatch-api` crate.
///
/// Covers every failure mode of the three gateway operations.
/// `wanwatch-core` folds these into its smaller poll-level taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// API key rejected by the console (HTTP 401/403 or UniFi OS 401 body).
    #[error("Invalid API key: {message}")]
    InvalidApiKey { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Console responses ───────────────────────────────────────────
    /// Non-2xx response other than an auth rejection.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Error reported inside the `{meta: {rc, msg}}` envelope.
    #[error("API error: {message}")]
    Api { message: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Gateway lookup ──────────────────────────────────────────────
    /// The site has no gateway-class device, or the MAC lookup came back empty.
    #[error("No gateway device found in site '{site}'")]
    NoGatewayFound { site: String },
}

impl Error {
    /// Returns `true` if the console rejected our credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::InvalidApiKey { .. })
    }

    /// Returns `true` if this is a transient error worth retrying on the next tick.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
