//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Select};
use serde::Serialize;

use wanwatch_config::Settings;
use wanwatch_core::Monitor;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::util;
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Settings as shown by `config show`; the plaintext key never leaves disk.
#[derive(Debug, Serialize)]
struct SettingsView<'a> {
    path: String,
    #[serde(flatten)]
    settings: &'a Settings,
}

fn redacted(settings: &Settings) -> Settings {
    let mut shown = settings.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some("********".into());
    }
    shown
}

fn settings_detail(view: &SettingsView<'_>) -> String {
    let s = view.settings;
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".into());
    output::detail_lines(&[
        ("Config file", view.path.clone()),
        ("Host", if s.host.is_empty() { "-".into() } else { s.host.clone() }),
        ("Site", s.site.clone()),
        ("API key", or_dash(s.api_key.clone())),
        ("API key env", or_dash(s.api_key_env.clone())),
        ("Verify TLS", s.verify_tls.to_string()),
        ("CA cert", or_dash(s.ca_cert.as_ref().map(|p| p.display().to_string()))),
        ("Timeout", util::format_secs(s.timeout_secs)),
        ("Full poll", util::format_secs(s.full_interval_secs)),
        ("Fast poll", util::format_secs(s.fast_interval_secs)),
        ("Auto speedtest", s.auto_speedtest.to_string()),
        (
            "Auto interval",
            util::format_secs(s.auto_speedtest_minutes.saturating_mul(60)),
        ),
    ])
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global).await,

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let settings = redacted(&config::resolve_settings(global)?);
            let view = SettingsView {
                path: wanwatch_config::config_path().display().to_string(),
                settings: &settings,
            };
            let out = output::render_single(global.output, &view, settings_detail, |v| {
                v.settings.host.clone()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", wanwatch_config::config_path().display());
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            // File + env only; global flags must not leak into the saved file.
            let mut settings = wanwatch_config::load_settings()?;
            config::set_value(&mut settings, &key, &value)?;
            let path = wanwatch_config::save_settings(&settings.normalized())?;
            if !global.quiet {
                eprintln!("✓ Set {key} in {}", path.display());
            }
            Ok(())
        }
    }
}

// ── Init: interactive wizard ────────────────────────────────────────

async fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = wanwatch_config::config_path();
    let existing = wanwatch_config::load_settings().unwrap_or_default();
    eprintln!("✨ wanwatch configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    // 1. Console host
    let default_host = global
        .host
        .clone()
        .filter(|h| !h.is_empty())
        .or_else(|| (!existing.host.is_empty()).then(|| existing.host.clone()))
        .unwrap_or_else(|| "192.168.1.1".into());
    let host: String = Input::new()
        .with_prompt("Console host or URL")
        .default(default_host)
        .interact_text()
        .map_err(prompt_err)?;

    // 2. Site
    let site: String = Input::new()
        .with_prompt("Site name")
        .default(global.site.clone().unwrap_or_else(|| existing.site.clone()))
        .interact_text()
        .map_err(prompt_err)?;

    // 3. API key
    let key = rpassword::prompt_password("API key: ").map_err(prompt_err)?;
    let key = key.trim().to_owned();
    if key.is_empty() {
        return Err(CliError::Validation {
            field: "api_key".into(),
            reason: "API key cannot be empty".into(),
        });
    }

    let store_choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let store_selection = Select::new()
        .with_prompt("Where to store the API key?")
        .items(store_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    // 4. TLS
    let verify_tls = Confirm::new()
        .with_prompt("Verify the console's TLS certificate?")
        .default(existing.verify_tls && !global.insecure)
        .interact()
        .map_err(prompt_err)?;

    let mut settings = Settings {
        host,
        site,
        verify_tls,
        api_key: None,
        ..existing
    }
    .normalized();

    if store_selection == 0 {
        wanwatch_config::store_api_key(&settings.host, &key)?;
        eprintln!("   ✓ API key stored in system keyring");
    } else {
        settings.api_key = Some(key.clone());
    }

    // 5. Write config
    let path = wanwatch_config::save_settings(&settings)?;
    eprintln!("\n✓ Configuration written to {}", path.display());

    // 6. Optional connectivity check
    let check = Confirm::new()
        .with_prompt("Test the connection now?")
        .default(true)
        .interact()
        .map_err(prompt_err)?;
    if check {
        let monitor_config = config::monitor_config_from(&settings, Some(&key))?;
        let spinner = util::spinner("Contacting console...", global.quiet);
        let result = Monitor::validate_settings(&monitor_config).await;
        spinner.finish_and_clear();
        let identity = result?;
        eprintln!(
            "✓ Found {} ({})",
            identity.name.as_deref().unwrap_or("gateway"),
            identity.model_label()
        );
    } else {
        eprintln!("\n  Test it later: wanwatch validate");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_masks_plaintext_key() {
        let settings = Settings {
            host: "10.0.0.1".into(),
            api_key: Some("super-secret".into()),
            ..Settings::default()
        };
        let shown = redacted(&settings);
        assert_eq!(shown.api_key.as_deref(), Some("********"));

        let view = SettingsView {
            path: "/tmp/config.toml".into(),
            settings: &shown,
        };
        let detail = settings_detail(&view);
        assert!(!detail.contains("super-secret"));
        assert!(detail.contains("10.0.0.1"));
    }
}
