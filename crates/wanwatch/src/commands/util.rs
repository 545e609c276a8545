//! Shared helpers for command handlers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};

/// Human-readable duration from whole seconds (`90` → `1m 30s`).
pub fn format_secs(secs: u64) -> String {
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

/// `12.34 Mbps`, or `-` when the gateway never reported a figure.
pub fn format_mbps(value: Option<f64>) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{v:.2} Mbps"))
}

/// Timestamp plus a coarse "ago" suffix, relative to `now`.
pub fn format_when(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = at else {
        return "never".into();
    };
    let elapsed = (now - at).num_seconds().max(0).unsigned_abs();
    format!(
        "{} ({} ago)",
        at.format("%Y-%m-%d %H:%M:%S UTC"),
        format_secs(elapsed)
    )
}

/// Stderr spinner; hidden when `quiet` or stderr isn't a terminal.
pub fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} {elapsed}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_owned());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_durations_and_rates() {
        assert_eq!(format_secs(90), "1m 30s");
        assert_eq!(format_mbps(Some(94.456)), "94.46 Mbps");
        assert_eq!(format_mbps(None), "-");
    }

    #[test]
    fn format_when_handles_missing_and_past() {
        let now = DateTime::from_timestamp(1_700_000_060, 0).unwrap_or_default();
        let at = DateTime::from_timestamp(1_700_000_000, 0);
        assert_eq!(format_when(None, now), "never");
        assert!(format_when(at, now).ends_with("(1m ago)"));
    }
}
