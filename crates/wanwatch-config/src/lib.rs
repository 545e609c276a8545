//! Configuration for wanwatch.
//!
//! A single TOML file merged with `WANWATCH_*` environment variables,
//! normalized to the ranges the monitor accepts, plus credential resolution
//! (env + keyring + plaintext) and translation to
//! `wanwatch_core::MonitorConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use wanwatch_core::{MonitorConfig, TlsVerification};

/// Keyring service name; entries are keyed `<host>/api-key`.
pub const KEYRING_SERVICE: &str = "wanwatch";

/// Env var that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "WANWATCH_CONFIG";

pub const MIN_FULL_INTERVAL_SECS: u64 = 5;
pub const MIN_FAST_INTERVAL_SECS: u64 = 1;
pub const MIN_AUTO_SPEEDTEST_MINUTES: u64 = 1;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API key configured for '{host}'")]
    NoCredentials { host: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Everything the config file can hold.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Console host (`192.168.1.1`, `console.lan:8443`, or a full URL).
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_site")]
    pub site: String,

    /// API key (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// Path to a custom CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Full `stat/device` poll. Older configs call this `device_interval`.
    #[serde(default = "default_full_interval", alias = "device_interval")]
    pub full_interval_secs: u64,

    /// Fast single-device poll.
    #[serde(default = "default_fast_interval")]
    pub fast_interval_secs: u64,

    #[serde(default = "default_true")]
    pub auto_speedtest: bool,

    #[serde(default = "default_auto_speedtest_minutes")]
    pub auto_speedtest_minutes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: String::new(),
            site: default_site(),
            api_key: None,
            api_key_env: None,
            verify_tls: true,
            ca_cert: None,
            timeout_secs: default_timeout(),
            full_interval_secs: default_full_interval(),
            fast_interval_secs: default_fast_interval(),
            auto_speedtest: true,
            auto_speedtest_minutes: default_auto_speedtest_minutes(),
        }
    }
}

fn default_site() -> String {
    "default".into()
}
fn default_true() -> bool {
    true
}
fn default_timeout() -> u64 {
    30
}
fn default_full_interval() -> u64 {
    30
}
fn default_fast_interval() -> u64 {
    2
}
fn default_auto_speedtest_minutes() -> u64 {
    60
}

impl Settings {
    /// Clamp intervals to their minimums and tidy host/site.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.host = self.host.trim().trim_end_matches('/').to_owned();
        self.site = self.site.trim().to_owned();
        if self.site.is_empty() {
            self.site = default_site();
        }
        self.full_interval_secs = self.full_interval_secs.max(MIN_FULL_INTERVAL_SECS);
        self.fast_interval_secs = self.fast_interval_secs.max(MIN_FAST_INTERVAL_SECS);
        self.auto_speedtest_minutes = self.auto_speedtest_minutes.max(MIN_AUTO_SPEEDTEST_MINUTES);
        self.timeout_secs = self.timeout_secs.max(1);
        self
    }

    pub fn tls(&self) -> TlsVerification {
        match (self.verify_tls, &self.ca_cert) {
            (false, _) => TlsVerification::DangerAcceptInvalid,
            (true, Some(ca_path)) => TlsVerification::CustomCa(ca_path.clone()),
            (true, None) => TlsVerification::SystemDefaults,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `$WANWATCH_CONFIG`, else platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "wanwatch", "wanwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("wanwatch");
    p
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load settings from the canonical path + environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&config_path())
}

/// Load settings from `path` (missing file is fine) + environment.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("WANWATCH_").ignore(&["config"]));

    let settings: Settings = figment.extract()?;
    debug!(path = %path.display(), "settings loaded");
    Ok(settings.normalized())
}

// ── Saving ──────────────────────────────────────────────────────────

/// Serialize settings to TOML at the canonical path.
pub fn save_settings(settings: &Settings) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_settings_to(&path, settings)?;
    Ok(path)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(settings)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credentials ─────────────────────────────────────────────────────

/// Resolve the API key: `api_key_env` var, then keyring, then plaintext.
pub fn resolve_api_key(settings: &Settings) -> Result<SecretString, ConfigError> {
    // 1. Named env var
    if let Some(ref env_name) = settings.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            if !val.trim().is_empty() {
                return Ok(SecretString::from(val));
            }
        }
    }

    // 2. System keyring
    if !settings.host.is_empty() {
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(&settings.host)) {
            if let Ok(secret) = entry.get_password() {
                return Ok(SecretString::from(secret));
            }
        }
    }

    // 3. Plaintext in config
    if let Some(ref key) = settings.api_key {
        if !key.trim().is_empty() {
            return Ok(SecretString::from(key.clone()));
        }
    }

    Err(ConfigError::NoCredentials {
        host: settings.host.clone(),
    })
}

/// Store the API key for `host` in the system keyring.
pub fn store_api_key(host: &str, api_key: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(host))?;
    entry.set_password(api_key)?;
    Ok(())
}

fn keyring_user(host: &str) -> String {
    format!("{}/api-key", host.trim().trim_end_matches('/'))
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `MonitorConfig`, resolving the API key from the credential chain.
pub fn settings_to_monitor_config(settings: &Settings) -> Result<MonitorConfig, ConfigError> {
    let api_key = resolve_api_key(settings)?;
    settings_with_key(settings, api_key)
}

/// Build a `MonitorConfig` with an already-resolved API key.
pub fn settings_with_key(
    settings: &Settings,
    api_key: SecretString,
) -> Result<MonitorConfig, ConfigError> {
    let settings = settings.clone().normalized();
    if settings.host.is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "no console host configured".into(),
        });
    }

    let mut config = MonitorConfig::new(settings.host.clone(), api_key);
    config.site = settings.site.clone();
    config.tls = settings.tls();
    config.request_timeout = Duration::from_secs(settings.timeout_secs);
    config.full_interval = Duration::from_secs(settings.full_interval_secs);
    config.fast_interval = Duration::from_secs(settings.fast_interval_secs);
    config.auto_speedtest = settings.auto_speedtest;
    config.auto_speedtest_interval = Duration::from_secs(settings.auto_speedtest_minutes * 60);
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.site, "default");
        assert!(settings.verify_tls);
        assert!(settings.auto_speedtest);
        assert_eq!(settings.full_interval_secs, 30);
        assert_eq!(settings.fast_interval_secs, 2);
        assert_eq!(settings.auto_speedtest_minutes, 60);
    }

    #[test]
    fn legacy_interval_key_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "host = \"192.168.1.1\"\ndevice_interval = 45\n");
        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.full_interval_secs, 45);
    }

    #[test]
    fn intervals_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "host = \" https://10.0.0.1/ \"\nsite = \"  \"\nfull_interval_secs = 1\n\
             fast_interval_secs = 0\nauto_speedtest_minutes = 0\n",
        );
        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.host, "https://10.0.0.1");
        assert_eq!(settings.site, "default");
        assert_eq!(settings.full_interval_secs, MIN_FULL_INTERVAL_SECS);
        assert_eq!(settings.fast_interval_secs, MIN_FAST_INTERVAL_SECS);
        assert_eq!(settings.auto_speedtest_minutes, MIN_AUTO_SPEEDTEST_MINUTES);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let settings = Settings {
            host: "192.168.1.1".into(),
            site: "branch".into(),
            verify_tls: false,
            auto_speedtest_minutes: 120,
            ..Settings::default()
        };
        save_settings_to(&path, &settings).unwrap();
        assert_eq!(load_settings_from(&path).unwrap(), settings);
    }

    #[test]
    fn tls_policy_follows_flags() {
        let mut settings = Settings::default();
        assert_eq!(settings.tls(), TlsVerification::SystemDefaults);
        settings.ca_cert = Some(PathBuf::from("/etc/ca.pem"));
        assert_eq!(
            settings.tls(),
            TlsVerification::CustomCa(PathBuf::from("/etc/ca.pem"))
        );
        settings.verify_tls = false;
        assert_eq!(settings.tls(), TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn monitor_config_from_settings() {
        let settings = Settings {
            host: "console.lan".into(),
            full_interval_secs: 20,
            fast_interval_secs: 3,
            auto_speedtest: false,
            auto_speedtest_minutes: 30,
            ..Settings::default()
        };
        let config =
            settings_with_key(&settings, SecretString::from("k".to_owned())).unwrap();
        assert_eq!(config.host, "console.lan");
        assert_eq!(config.site, "default");
        assert_eq!(config.full_interval, Duration::from_secs(20));
        assert_eq!(config.fast_interval, Duration::from_secs(3));
        assert!(!config.auto_speedtest);
        assert_eq!(config.auto_speedtest_interval, Duration::from_secs(1_800));
        assert_eq!(config.api_key.expose_secret(), "k");
    }

    #[test]
    fn missing_host_is_rejected() {
        let err = settings_with_key(&Settings::default(), SecretString::from("k".to_owned()));
        assert!(matches!(err, Err(ConfigError::Validation { ref field, .. }) if field == "host"));
    }

    #[test]
    fn unset_env_var_falls_through() {
        let settings = Settings {
            api_key_env: Some("WANWATCH_TEST_KEY_NEVER_SET".into()),
            api_key: Some("plaintext".into()),
            ..Settings::default()
        };
        assert_eq!(resolve_api_key(&settings).unwrap().expose_secret(), "plaintext");
    }

    #[test]
    fn plaintext_key_is_last_resort() {
        let settings = Settings {
            api_key: Some("plaintext".into()),
            ..Settings::default()
        };
        assert_eq!(resolve_api_key(&settings).unwrap().expose_secret(), "plaintext");

        let err = resolve_api_key(&Settings::default());
        assert!(matches!(err, Err(ConfigError::NoCredentials { .. })));
    }
}
