// ── Runtime monitor configuration ──
//
// Describes *what* to monitor and how often. Carries the API key but never
// touches disk; wanwatch-config (or any other front end) builds a
// `MonitorConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use wanwatch_api::transport::{TlsMode, TransportConfig};

use crate::error::CoreError;

/// How long a triggered speedtest may take before it is declared timed out.
pub const DEFAULT_SPEEDTEST_TIMEOUT: Duration = Duration::from_secs(120);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed consoles).
    DangerAcceptInvalid,
}

impl TlsVerification {
    pub(crate) fn to_transport(&self) -> TlsMode {
        match self {
            Self::SystemDefaults => TlsMode::System,
            Self::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            Self::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Everything the monitor needs to poll one gateway.
///
/// Mutable at runtime through [`Monitor::update_config`](crate::Monitor::update_config).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Console host (`192.168.1.1`, `console.lan:8443`, or a full URL).
    pub host: String,
    pub api_key: SecretString,
    /// Site name (defaults to "default").
    pub site: String,
    pub tls: TlsVerification,
    /// Per-request transport timeout.
    pub request_timeout: Duration,
    /// Interval of the heavy `stat/device` poll.
    pub full_interval: Duration,
    /// Interval of the cheap `stat/device/<mac>` poll.
    pub fast_interval: Duration,
    pub auto_speedtest: bool,
    pub auto_speedtest_interval: Duration,
    pub speedtest_timeout: Duration,
}

impl MonitorConfig {
    /// Config with the usual defaults for everything but the connection.
    pub fn new(host: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            host: host.into(),
            api_key,
            site: "default".into(),
            tls: TlsVerification::default(),
            request_timeout: Duration::from_secs(30),
            full_interval: Duration::from_secs(30),
            fast_interval: Duration::from_secs(2),
            auto_speedtest: true,
            auto_speedtest_interval: Duration::from_secs(60 * 60),
            speedtest_timeout: DEFAULT_SPEEDTEST_TIMEOUT,
        }
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.host.trim().is_empty() {
            return Err(config_error("host must not be empty"));
        }
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(config_error("API key must not be empty"));
        }
        if self.site.trim().is_empty() {
            return Err(config_error("site must not be empty"));
        }
        for (name, value) in [
            ("full poll interval", self.full_interval),
            ("fast poll interval", self.fast_interval),
            ("auto speedtest interval", self.auto_speedtest_interval),
            ("speedtest timeout", self.speedtest_timeout),
            ("request timeout", self.request_timeout),
        ] {
            if value.is_zero() {
                return Err(config_error(&format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.to_transport(),
            timeout: self.request_timeout,
        }
    }

    /// Settings that require a new HTTP client.
    pub(crate) fn same_connection(&self, other: &Self) -> bool {
        self.host.trim() == other.host.trim()
            && self.site == other.site
            && self.tls == other.tls
            && self.request_timeout == other.request_timeout
            && self.api_key.expose_secret() == other.api_key.expose_secret()
    }

    /// Settings that identify which gateway is being watched.
    pub(crate) fn same_target(&self, other: &Self) -> bool {
        self.host.trim() == other.host.trim() && self.site == other.site
    }
}

fn config_error(message: &str) -> CoreError {
    CoreError::Config {
        message: message.to_owned(),
    }
}
