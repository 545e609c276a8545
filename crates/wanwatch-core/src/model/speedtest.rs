// ── Speedtest domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Speedtest session lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Triggered,
    Polling,
    Completed,
    TimedOut,
    Failed,
}

impl SessionState {
    pub fn is_in_progress(self) -> bool {
        matches!(self, Self::Triggered | Self::Polling)
    }
}

/// What asked for the speedtest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriggerOrigin {
    Manual,
    Automatic,
}

/// Figures from the poll response that completed a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedtestResult {
    pub origin: TriggerOrigin,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub ping_ms: Option<f64>,
    pub last_run: i64,
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Speedtest lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SpeedtestEvent {
    Started { origin: TriggerOrigin },
    Completed(SpeedtestResult),
    TimedOut { origin: TriggerOrigin, after_secs: u64 },
    Failed { origin: TriggerOrigin, reason: String },
}

/// Published view of the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedtestStatus {
    pub state: SessionState,
    pub in_progress: bool,
    pub origin: Option<TriggerOrigin>,
    pub last_result: Option<SpeedtestResult>,
}
