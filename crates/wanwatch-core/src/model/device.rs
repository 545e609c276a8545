// ── Gateway device state ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Who the gateway is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayIdentity {
    pub mac: Option<String>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub name: Option<String>,
    /// Where a human can manage the console.
    pub management_url: Option<String>,
}

impl GatewayIdentity {
    /// Model for display, with the generic fallback used when the console doesn't say.
    pub fn model_label(&self) -> &str {
        self.model.as_deref().unwrap_or("UDM/UGW")
    }
}

/// WAN slot labels as reported by the vendor API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum WanSlot {
    #[strum(serialize = "WAN1")]
    Wan1,
    #[strum(serialize = "WAN2")]
    Wan2,
    /// The undifferentiated section of legacy firmware.
    #[strum(serialize = "WAN")]
    Wan,
}

/// How the device represents its WAN links. Resolved once per device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WanLayout {
    /// No full poll with WAN sections has been seen yet.
    #[default]
    Undetected,
    /// `wan1`/`wan2` slots.
    Dual,
    /// A single `wan` section with no slot distinction.
    Legacy,
}

/// One WAN slot's latest known facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WanSection {
    pub up: Option<bool>,
    pub ip: Option<String>,
    pub ip6: Option<String>,
    pub ifname: Option<String>,
    pub name: Option<String>,
    pub comment: Option<String>,
    pub rx_bytes_per_sec: Option<f64>,
    pub tx_bytes_per_sec: Option<f64>,
}

impl WanSection {
    /// A slot with an address is considered to have internet.
    pub fn has_internet(&self) -> bool {
        self.ip.as_deref().is_some_and(|ip| !ip.is_empty())
    }

    pub fn download_mbps(&self) -> f64 {
        bytes_to_mbps(self.rx_bytes_per_sec)
    }

    pub fn upload_mbps(&self) -> f64 {
        bytes_to_mbps(self.tx_bytes_per_sec)
    }
}

/// Speedtest figures as last reported by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedtestFigures {
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub ping_ms: Option<f64>,
    /// Unix seconds; `0` or absent means no test has ever completed.
    pub last_run: Option<i64>,
    pub status: Option<String>,
}

impl SpeedtestFigures {
    /// Whether the gateway has ever completed a speedtest.
    pub fn has_run(&self) -> bool {
        self.last_run.is_some_and(|ts| ts > 0)
    }

    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        self.last_run
            .filter(|ts| *ts > 0)
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

/// The interface currently carrying internet traffic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Uplink {
    pub up: Option<bool>,
    pub name: Option<String>,
    pub comment: Option<String>,
    pub ifname: Option<String>,
    pub ip: Option<String>,
    pub ip6: Option<String>,
    pub rx_bytes_per_sec: Option<f64>,
    pub tx_bytes_per_sec: Option<f64>,
    pub speedtest: SpeedtestFigures,
}

impl Uplink {
    /// Human-readable name: `"comment (name)"` when both exist and differ.
    pub fn display_name(&self) -> Option<String> {
        let comment = self.comment.as_deref().map(str::trim).unwrap_or_default();
        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        match (comment.is_empty(), name.is_empty()) {
            (false, false) if !comment.eq_ignore_ascii_case(name) => {
                Some(format!("{comment} ({name})"))
            }
            (false, _) => Some(comment.to_owned()),
            (true, false) => Some(name.to_owned()),
            (true, true) => None,
        }
    }

    pub fn download_mbps(&self) -> f64 {
        bytes_to_mbps(self.rx_bytes_per_sec)
    }

    pub fn upload_mbps(&self) -> f64 {
        bytes_to_mbps(self.tx_bytes_per_sec)
    }
}

/// Latest known facts about the managed gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub identity: GatewayIdentity,
    pub layout: WanLayout,
    pub wan1: Option<WanSection>,
    pub wan2: Option<WanSection>,
    /// Only populated in legacy layout.
    pub wan: Option<WanSection>,
    pub uplink: Uplink,
    pub last_full_poll_at: Option<DateTime<Utc>>,
    pub last_fast_poll_at: Option<DateTime<Utc>>,
}

impl DeviceState {
    /// Empty state for a console reachable at `management_url`.
    pub fn new(management_url: Option<String>) -> Self {
        Self {
            identity: GatewayIdentity {
                management_url,
                ..GatewayIdentity::default()
            },
            ..Self::default()
        }
    }

    pub fn slot(&self, slot: WanSlot) -> Option<&WanSection> {
        match slot {
            WanSlot::Wan1 => self.wan1.as_ref(),
            WanSlot::Wan2 => self.wan2.as_ref(),
            WanSlot::Wan => self.wan.as_ref(),
        }
    }

    /// Slots currently present, in display order.
    pub fn slots(&self) -> impl Iterator<Item = (WanSlot, &WanSection)> {
        [WanSlot::Wan1, WanSlot::Wan2, WanSlot::Wan]
            .into_iter()
            .filter_map(|slot| self.slot(slot).map(|section| (slot, section)))
    }

    /// Whether any poll has ever succeeded.
    pub fn is_populated(&self) -> bool {
        self.last_full_poll_at.is_some() || self.last_fast_poll_at.is_some()
    }
}

/// Bytes/s to Mbit/s, rounded to two decimals.
pub fn bytes_to_mbps(bytes_per_sec: Option<f64>) -> f64 {
    let bits = bytes_per_sec.unwrap_or(0.0) * 8.0 / 1_000_000.0;
    (bits * 100.0).round() / 100.0
}
