//! CLI-side settings resolution: config file + global flags → `MonitorConfig`.
//!
//! wanwatch-config owns the file format and the credential chain; this module
//! only layers command-line overrides on top.

use std::time::Duration;

use secrecy::SecretString;

use wanwatch_config::Settings;
use wanwatch_core::MonitorConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load settings from disk + env and apply flag overrides.
pub fn resolve_settings(global: &GlobalOpts) -> Result<Settings, CliError> {
    let settings = wanwatch_config::load_settings()?;
    Ok(apply_overrides(settings, global))
}

/// Flags beat env vars beat the config file.
pub fn apply_overrides(mut settings: Settings, global: &GlobalOpts) -> Settings {
    if let Some(ref host) = global.host {
        settings.host.clone_from(host);
    }
    if let Some(ref site) = global.site {
        settings.site.clone_from(site);
    }
    if global.insecure {
        settings.verify_tls = false;
    }
    if let Some(timeout) = global.timeout {
        settings.timeout_secs = timeout;
    }
    settings.normalized()
}

/// Build the runtime monitor config for commands that talk to a console.
pub fn build_monitor_config(global: &GlobalOpts) -> Result<MonitorConfig, CliError> {
    let settings = resolve_settings(global)?;
    monitor_config_from(&settings, global.api_key.as_deref())
}

pub fn monitor_config_from(
    settings: &Settings,
    api_key_flag: Option<&str>,
) -> Result<MonitorConfig, CliError> {
    if settings.host.is_empty() {
        return Err(CliError::NoConfig {
            path: wanwatch_config::config_path().display().to_string(),
        });
    }

    let config = match api_key_flag.filter(|k| !k.trim().is_empty()) {
        Some(key) => {
            wanwatch_config::settings_with_key(settings, SecretString::from(key.to_owned()))
        }
        None => wanwatch_config::settings_to_monitor_config(settings),
    };
    config.map_err(CliError::from)
}

/// Parse and apply a `config set` assignment.
pub fn set_value(settings: &mut Settings, key: &str, value: &str) -> Result<(), CliError> {
    match key {
        "host" => value.clone_into(&mut settings.host),
        "site" => value.clone_into(&mut settings.site),
        "api_key_env" => settings.api_key_env = non_empty(value),
        "ca_cert" => settings.ca_cert = non_empty(value).map(Into::into),
        "verify_tls" => settings.verify_tls = parse_bool(key, value)?,
        "auto_speedtest" => settings.auto_speedtest = parse_bool(key, value)?,
        "timeout_secs" => settings.timeout_secs = parse_secs(key, value)?,
        "full_interval_secs" | "device_interval" => {
            settings.full_interval_secs = parse_secs(key, value)?;
        }
        "fast_interval_secs" => settings.fast_interval_secs = parse_secs(key, value)?,
        "auto_speedtest_minutes" => {
            settings.auto_speedtest_minutes = parse_u64(key, value)?;
        }
        "api_key" => {
            return Err(CliError::Validation {
                field: key.into(),
                reason: "store API keys with `wanwatch config init` (keyring) \
                         or point api_key_env at an environment variable"
                    .into(),
            });
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: "unknown config key".into(),
            });
        }
    }
    Ok(())
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, CliError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(CliError::Validation {
            field: key.into(),
            reason: format!("expected true or false, got '{value}'"),
        }),
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, CliError> {
    value.trim().parse().map_err(|_| CliError::Validation {
        field: key.into(),
        reason: format!("expected a whole number, got '{value}'"),
    })
}

/// Seconds, either bare (`30`) or humantime (`30s`, `2m`).
fn parse_secs(key: &str, value: &str) -> Result<u64, CliError> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(value.trim())
        .map(|d: Duration| d.as_secs())
        .map_err(|e| CliError::Validation {
            field: key.into(),
            reason: format!("expected seconds or a duration like '30s': {e}"),
        })
}
