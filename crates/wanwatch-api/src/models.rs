// Legacy API response types
//
// Models for the `stat/device` family of endpoints. Field presence varies
// wildly between firmware versions, so every field is optional and numeric
// fields accept either JSON numbers or numeric strings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Response Envelope ────────────────────────────────────────────────

/// Standard UniFi legacy API response envelope.
///
/// ```json
/// { "meta": { "rc": "ok", "msg": "optional" }, "data": [...] }
/// ```
#[derive(Debug, Deserialize)]
pub struct LegacyResponse<T> {
    pub meta: Meta,
    pub data: Vec<T>,
}

/// Metadata from the legacy envelope. `rc` == `"ok"` means success.
#[derive(Debug, Deserialize)]
pub struct Meta {
    pub rc: String,
    #[serde(default)]
    pub msg: Option<String>,
}

/// UniFi OS error shape, sometimes returned with HTTP 200.
#[derive(Debug, Deserialize)]
pub(crate) struct UnifiOsError {
    #[serde(default)]
    pub error: Option<UnifiOsErrorInner>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnifiOsErrorInner {
    pub code: u16,
    #[serde(default)]
    pub message: Option<String>,
}

// ── Device ───────────────────────────────────────────────────────────

/// Device object from `stat/device` or `stat/device/<mac>`.
///
/// Only the fields the WAN monitor reads are modeled; everything else lands
/// in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayDevice {
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub adopted: Option<bool>,
    #[serde(default)]
    pub uplink: Option<UplinkStats>,
    #[serde(default)]
    pub wan1: Option<WanStats>,
    #[serde(default)]
    pub wan2: Option<WanStats>,
    /// Single WAN section reported by older firmware.
    #[serde(default)]
    pub wan: Option<WanStats>,
    /// Keys are interface labels such as `WAN`, `WAN2`.
    #[serde(default)]
    pub last_wan_interfaces: Option<serde_json::Map<String, Value>>,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl GatewayDevice {
    /// Firmware version, preferring `version` over `firmware_version`.
    pub fn firmware(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or(self.firmware_version.as_deref())
            .filter(|v| !v.is_empty())
    }

    /// Returns `true` when the device reports at least one WAN section.
    pub fn has_wan_sections(&self) -> bool {
        self.wan1.is_some() || self.wan2.is_some() || self.wan.is_some()
    }
}

/// The `uplink` aggregate: whichever interface currently carries internet traffic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UplinkStats {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub up: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub ifname: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub ip6: Option<String>,
    #[serde(default, rename = "rx_bytes-r", deserialize_with = "lenient_f64")]
    pub rx_bytes_r: Option<f64>,
    #[serde(default, rename = "tx_bytes-r", deserialize_with = "lenient_f64")]
    pub tx_bytes_r: Option<f64>,
    /// Last speedtest download, already in Mbit/s.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub xput_down: Option<f64>,
    /// Last speedtest upload, already in Mbit/s.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub xput_up: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub speedtest_ping: Option<f64>,
    /// Unix seconds of the last completed speedtest; 0 when none has run.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub speedtest_lastrun: Option<i64>,
    #[serde(default)]
    pub speedtest_status: Option<Value>,
}

impl UplinkStats {
    /// `speedtest_status` rendered as text, whatever JSON type the firmware used.
    pub fn speedtest_status_text(&self) -> Option<String> {
        match self.speedtest_status.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// One WAN slot section (`wan1`, `wan2`, or legacy `wan`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WanStats {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub up: Option<bool>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub ip6: Option<String>,
    /// Gateways report `ipv6` as a list (global first, then link-local) or a string.
    #[serde(default)]
    pub ipv6: Option<Ipv6Field>,
    #[serde(default)]
    pub ifname: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, rename = "rx_bytes-r", deserialize_with = "lenient_f64")]
    pub rx_bytes_r: Option<f64>,
    #[serde(default, rename = "tx_bytes-r", deserialize_with = "lenient_f64")]
    pub tx_bytes_r: Option<f64>,
}

/// IPv6 addresses as either a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ipv6Field {
    One(String),
    Many(Vec<String>),
}

impl Ipv6Field {
    /// All reported addresses in order.
    pub fn addresses(&self) -> Vec<&str> {
        match self {
            Self::One(s) => vec![s.as_str()],
            Self::Many(list) => list.iter().map(String::as_str).collect(),
        }
    }
}

// ── Lenient field decoding ───────────────────────────────────────────

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

#[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.and_then(|v| match v {
        Value::Bool(b) => Some(b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "up" => Some(true),
            "false" | "0" | "down" => Some(false),
            _ => None,
        },
        _ => None,
    }))
}
