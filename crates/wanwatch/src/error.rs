//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use wanwatch_config::ConfigError;
use wanwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the console: {reason}")]
    #[diagnostic(
        code(wanwatch::connection_failed),
        help(
            "Check that the console is running and reachable.\n\
             Self-signed certificate? Try: wanwatch validate --insecure"
        )
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("The console rejected the API key")]
    #[diagnostic(
        code(wanwatch::auth_failed),
        help(
            "Create a key under Settings > Control Plane > Integrations,\n\
             then store it with: wanwatch config init"
        )
    )]
    AuthFailed { message: String },

    #[error("No API key configured for '{host}'")]
    #[diagnostic(
        code(wanwatch::no_credentials),
        help(
            "Configure credentials with: wanwatch config init\n\
             Or pass --api-key / set WANWATCH_API_KEY."
        )
    )]
    NoCredentials { host: String },

    // ── Gateway ──────────────────────────────────────────────────────
    #[error("No gateway found in site '{site}'")]
    #[diagnostic(
        code(wanwatch::gateway_not_found),
        help("Check the site name (--site) and that the site has an adopted gateway.")
    )]
    GatewayNotFound { site: String },

    #[error("Unexpected response from the console: {message}")]
    #[diagnostic(code(wanwatch::unexpected_response))]
    UnexpectedResponse { message: String },

    // ── Speedtest ────────────────────────────────────────────────────
    #[error("A speedtest is already running")]
    #[diagnostic(
        code(wanwatch::speedtest_running),
        help("Wait for it to finish, then try again.")
    )]
    SpeedtestRunning,

    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(wanwatch::timeout),
        help("Increase the limit (--timeout / --wait-timeout) or check the gateway.")
    )]
    Timeout { seconds: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(wanwatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No console configured")]
    #[diagnostic(
        code(wanwatch::no_config),
        help(
            "Create a config with: wanwatch config init\n\
             Expected at: {path}\n\
             Or pass --host and --api-key."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(wanwatch::config))]
    Config(ConfigError),

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Interrupted")]
    #[diagnostic(code(wanwatch::interrupted))]
    Interrupted,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(wanwatch::json))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    #[diagnostic(code(wanwatch::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::GatewayNotFound { .. } => exit_code::NOT_FOUND,
            Self::SpeedtestRunning => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Interrupted => exit_code::INTERRUPTED,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unauthorized { message } => CliError::AuthFailed { message },
            CoreError::Unreachable { reason } => CliError::ConnectionFailed { reason },
            CoreError::Unexpected { message } => CliError::UnexpectedResponse { message },
            CoreError::NoGatewayFound { site } => CliError::GatewayNotFound { site },
            CoreError::AlreadyRunning => CliError::SpeedtestRunning,
            CoreError::SpeedtestTimedOut { after_secs } => CliError::Timeout {
                seconds: after_secs,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::ShutDown => CliError::Interrupted,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { host } => CliError::NoCredentials { host },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}
