// ── API-to-domain conversions ──
//
// Bridges raw `wanwatch_api` device objects into normalized `DeviceReport`
// values the merger consumes. Empty strings become `None`, IPv6 lists are
// reduced to the most useful address.

use std::net::Ipv6Addr;

use wanwatch_api::models::{GatewayDevice, Ipv6Field, UplinkStats, WanStats};

use crate::model::{SpeedtestFigures, Uplink, WanSection};

/// One poll response, normalized.
///
/// Both poll kinds produce the same shape; a fast (single-device) response
/// usually fills only the uplink and rate fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceReport {
    pub mac: Option<String>,
    /// `model`, falling back to the device `type`.
    pub model: Option<String>,
    pub name: Option<String>,
    pub firmware_version: Option<String>,
    pub uplink: Option<Uplink>,
    pub wan1: Option<WanSection>,
    pub wan2: Option<WanSection>,
    pub wan: Option<WanSection>,
}

impl DeviceReport {
    pub fn has_dual_sections(&self) -> bool {
        self.wan1.is_some() || self.wan2.is_some()
    }

    /// Speedtest figures carried by this response, if it has an uplink section.
    pub fn speedtest(&self) -> Option<&SpeedtestFigures> {
        self.uplink.as_ref().map(|u| &u.speedtest)
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn non_empty(raw: Option<&String>) -> Option<String> {
    raw.map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn parse_ipv6_text(raw: &str) -> Option<Ipv6Addr> {
    let candidate = raw.trim().split('/').next().unwrap_or(raw).trim();
    candidate.parse::<Ipv6Addr>().ok()
}

/// First global address, else the first link-local one.
fn pick_ipv6(field: &Ipv6Field) -> Option<String> {
    let mut first_link_local: Option<String> = None;

    for ipv6 in field.addresses().into_iter().filter_map(parse_ipv6_text) {
        if !ipv6.is_unicast_link_local() {
            return Some(ipv6.to_string());
        }
        if first_link_local.is_none() {
            first_link_local = Some(ipv6.to_string());
        }
    }

    first_link_local
}

// ── Conversions ────────────────────────────────────────────────────

impl From<&UplinkStats> for Uplink {
    fn from(u: &UplinkStats) -> Self {
        Self {
            up: u.up,
            name: non_empty(u.name.as_ref()),
            comment: non_empty(u.comment.as_ref()),
            ifname: non_empty(u.ifname.as_ref()),
            ip: non_empty(u.ip.as_ref()),
            ip6: non_empty(u.ip6.as_ref()),
            rx_bytes_per_sec: u.rx_bytes_r,
            tx_bytes_per_sec: u.tx_bytes_r,
            speedtest: SpeedtestFigures {
                download_mbps: u.xput_down,
                upload_mbps: u.xput_up,
                ping_ms: u.speedtest_ping,
                last_run: u.speedtest_lastrun,
                status: u.speedtest_status_text(),
            },
        }
    }
}

impl From<&WanStats> for WanSection {
    fn from(w: &WanStats) -> Self {
        Self {
            up: w.up,
            ip: non_empty(w.ip.as_ref()),
            ip6: non_empty(w.ip6.as_ref()).or_else(|| w.ipv6.as_ref().and_then(pick_ipv6)),
            ifname: non_empty(w.ifname.as_ref()),
            name: non_empty(w.name.as_ref()),
            comment: non_empty(w.comment.as_ref()),
            rx_bytes_per_sec: w.rx_bytes_r,
            tx_bytes_per_sec: w.tx_bytes_r,
        }
    }
}

impl From<&GatewayDevice> for DeviceReport {
    fn from(d: &GatewayDevice) -> Self {
        Self {
            mac: non_empty(d.mac.as_ref()).map(|m| m.to_lowercase()),
            model: non_empty(d.model.as_ref()).or_else(|| non_empty(d.device_type.as_ref())),
            name: non_empty(d.name.as_ref()),
            firmware_version: d.firmware().map(str::to_owned),
            uplink: d.uplink.as_ref().map(Uplink::from),
            wan1: d.wan1.as_ref().map(WanSection::from),
            wan2: d.wan2.as_ref().map(WanSection::from),
            wan: d.wan.as_ref().map(WanSection::from),
        }
    }
}
