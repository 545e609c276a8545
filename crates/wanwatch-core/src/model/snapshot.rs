// ── Published monitor snapshot ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::active_wan::ActiveWanResult;
use super::device::DeviceState;
use super::speedtest::SpeedtestStatus;

/// Outcome of recent poll ticks.
///
/// A failed tick keeps the previous `DeviceState` and marks it stale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollHealth {
    pub stale: bool,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl PollHealth {
    pub(crate) fn record_success(&mut self, at: DateTime<Utc>) {
        self.stale = false;
        self.consecutive_failures = 0;
        self.last_error = None;
        self.last_success_at = Some(at);
    }

    pub(crate) fn record_failure(&mut self, error: &impl std::fmt::Display) {
        self.stale = true;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.to_string());
    }
}

/// Everything a consumer needs, published once per poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub device: DeviceState,
    pub active_wan: ActiveWanResult,
    pub speedtest: SpeedtestStatus,
    pub health: PollHealth,
    pub auto_speedtest: bool,
}
