// Gateway device endpoints
//
// `stat/device` (full listing), `stat/device/<mac>` (single device) and the
// `cmd/devmgr` speedtest command. Gateway selection lives here too since the
// full listing is only useful once the gateway has been picked out of it.

use serde_json::json;
use tracing::{debug, warn};

use crate::client::{GatewayClient, parse_envelope};
use crate::error::Error;
use crate::models::GatewayDevice;

/// Device `type` values that identify a gateway, in preference order.
pub const GATEWAY_TYPES: &[&str] = &["udm", "ugw", "uxg"];

/// Model prefixes used as a fallback when `type` is missing or unfamiliar.
const GATEWAY_MODEL_PREFIXES: &[&str] = &["UDM", "UDR", "UXG", "UCG", "UGW", "UDW"];

/// Acknowledgement of a device command.
///
/// An ack only means the console accepted the command; it says nothing
/// about whether the command has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The console answered with an `rc: "ok"` envelope.
    Accepted,
    /// 2xx response without a parseable envelope (empty or non-JSON body).
    Unverified,
}

impl GatewayClient {
    /// Fetch the full site device listing and return the gateway.
    ///
    /// `GET /api/s/{site}/stat/device`
    pub async fn fetch_full_device_stats(&self, site: &str) -> Result<GatewayDevice, Error> {
        let url = self.site_url(site, "stat/device")?;
        let devices: Vec<GatewayDevice> = self.get(url).await?;
        debug!(site, count = devices.len(), "fetched device listing");

        select_gateway(devices).ok_or_else(|| Error::NoGatewayFound {
            site: site.to_owned(),
        })
    }

    /// Fetch a single device by MAC address.
    ///
    /// `GET /api/s/{site}/stat/device/{mac}`
    pub async fn fetch_gateway_stats(&self, site: &str, mac: &str) -> Result<GatewayDevice, Error> {
        let url = self.site_url(site, &format!("stat/device/{}", mac.to_lowercase()))?;
        let devices: Vec<GatewayDevice> = self.get(url).await?;

        devices.into_iter().next().ok_or_else(|| Error::NoGatewayFound {
            site: site.to_owned(),
        })
    }

    /// Ask the gateway to run a speedtest.
    ///
    /// `POST /api/s/{site}/cmd/devmgr` with `{"cmd": "speedtest", "mac": "..."}`
    pub async fn trigger_speedtest(&self, site: &str, mac: &str) -> Result<Ack, Error> {
        let url = self.site_url(site, "cmd/devmgr")?;
        debug!(site, mac, "requesting speedtest");

        let body = self
            .post_raw(
                url,
                &json!({
                    "cmd": "speedtest",
                    "mac": mac.to_lowercase(),
                }),
            )
            .await?;

        interpret_ack(&body)
    }
}

/// Decide whether a command response body is an acceptance.
fn interpret_ack(body: &str) -> Result<Ack, Error> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Ack::Unverified);
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        debug!("command response was not JSON, treating as accepted");
        return Ok(Ack::Unverified);
    };

    if value.get("meta").is_none() {
        return Ok(Ack::Unverified);
    }

    match parse_envelope::<serde_json::Value>(trimmed) {
        Ok(_) => Ok(Ack::Accepted),
        Err(Error::Deserialization { message, .. }) => {
            warn!(%message, "malformed command envelope, treating as accepted");
            Ok(Ack::Unverified)
        }
        Err(e) => Err(e),
    }
}

// ── Gateway selection ────────────────────────────────────────────────

/// Pick the gateway out of a site's device list.
///
/// Devices are ranked by `type` (see [`GATEWAY_TYPES`]), with a model-prefix
/// fallback for unfamiliar types. Within a rank, adopted devices win, then
/// devices that report an `uplink` section. Earlier entries win ties.
pub fn select_gateway(devices: Vec<GatewayDevice>) -> Option<GatewayDevice> {
    devices
        .into_iter()
        .filter_map(|dev| {
            let rank = gateway_rank(&dev)?;
            let not_adopted = !dev.adopted.unwrap_or(true);
            let no_uplink = dev.uplink.is_none();
            Some(((rank, not_adopted, no_uplink), dev))
        })
        .min_by_key(|(key, _)| *key)
        .map(|(_, dev)| dev)
}

fn gateway_rank(dev: &GatewayDevice) -> Option<usize> {
    if let Some(kind) = dev.device_type.as_deref() {
        if let Some(idx) = GATEWAY_TYPES
            .iter()
            .position(|t| t.eq_ignore_ascii_case(kind))
        {
            return Some(idx);
        }
    }

    let model = dev.model.as_deref()?.to_uppercase();
    GATEWAY_MODEL_PREFIXES
        .iter()
        .any(|p| model.starts_with(p))
        .then_some(GATEWAY_TYPES.len())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use serde_json::json;

    use super::*;

    fn dev(value: serde_json::Value) -> GatewayDevice {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn prefers_udm_over_ugw() {
        let picked = select_gateway(vec![
            dev(json!({"mac": "ugw", "type": "ugw", "uplink": {}})),
            dev(json!({"mac": "udm", "type": "udm", "uplink": {}})),
        ])
        .unwrap();
        assert_eq!(picked.mac.as_deref(), Some("udm"));
    }

    #[test]
    fn prefers_adopted_then_uplink() {
        let picked = select_gateway(vec![
            dev(json!({"mac": "a", "type": "udm", "adopted": false, "uplink": {}})),
            dev(json!({"mac": "b", "type": "udm", "adopted": true})),
            dev(json!({"mac": "c", "type": "udm", "adopted": true, "uplink": {}})),
        ])
        .unwrap();
        assert_eq!(picked.mac.as_deref(), Some("c"));
    }

    #[test]
    fn model_prefix_fallback() {
        let picked = select_gateway(vec![
            dev(json!({"mac": "sw", "type": "usw", "model": "USW-24"})),
            dev(json!({"mac": "gw", "model": "UCG-Max"})),
        ])
        .unwrap();
        assert_eq!(picked.mac.as_deref(), Some("gw"));
    }

    #[test]
    fn no_gateway_in_list() {
        assert!(select_gateway(vec![dev(json!({"type": "uap"}))]).is_none());
        assert!(select_gateway(Vec::new()).is_none());
    }

    #[test]
    fn ack_variants() {
        assert_eq!(interpret_ack("").unwrap(), Ack::Unverified);
        assert_eq!(interpret_ack("OK").unwrap(), Ack::Unverified);
        assert_eq!(interpret_ack("{}").unwrap(), Ack::Unverified);
        assert_eq!(
            interpret_ack(r#"{"meta":{"rc":"ok"},"data":[]}"#).unwrap(),
            Ack::Accepted
        );
        assert!(matches!(
            interpret_ack(r#"{"meta":{"rc":"error","msg":"api.err.UnknownDevice"},"data":[]}"#),
            Err(Error::Api { .. })
        ));
    }
}
