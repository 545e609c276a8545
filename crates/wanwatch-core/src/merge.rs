// ── Snapshot merger ──
//
// Folds a full (`stat/device`) and/or fast (`stat/device/<mac>`) response
// into the previous `DeviceState`. Pure: no I/O, no clock reads.
//
// Field ownership:
//   live   uplink up/name/comment/ifname/ip/ip6/rates, per-slot up/rates.
//          Taken from fast when present, else from full.
//   detail identity, per-slot ip/ip6/ifname/name/comment, speedtest figures.
//          Only from full.
// A full response decides which slot sections exist; the layout is detected
// once and never re-detected.

use chrono::{DateTime, Utc};

use crate::convert::DeviceReport;
use crate::model::{DeviceState, Uplink, WanLayout, WanSection};

/// Merge poll responses into `previous`.
///
/// With neither response the previous state is returned unchanged.
pub fn merge(
    previous: &DeviceState,
    full: Option<&DeviceReport>,
    fast: Option<&DeviceReport>,
    now: DateTime<Utc>,
) -> DeviceState {
    let mut next = previous.clone();
    if let Some(full) = full {
        apply_full(&mut next, full, now);
    }
    if let Some(fast) = fast {
        apply_live(&mut next, fast, now);
    }
    next
}

/// Layout implied by a full response, if it carries any WAN section.
fn detect_layout(full: &DeviceReport) -> WanLayout {
    if full.has_dual_sections() {
        WanLayout::Dual
    } else if full.wan.is_some() {
        WanLayout::Legacy
    } else {
        WanLayout::Undetected
    }
}

fn apply_full(state: &mut DeviceState, full: &DeviceReport, now: DateTime<Utc>) {
    let identity = &mut state.identity;
    replace_some(&mut identity.mac, full.mac.as_ref());
    replace_some(&mut identity.model, full.model.as_ref());
    replace_some(&mut identity.name, full.name.as_ref());
    replace_some(&mut identity.firmware_version, full.firmware_version.as_ref());

    if state.layout == WanLayout::Undetected {
        state.layout = detect_layout(full);
    }

    match state.layout {
        WanLayout::Dual => {
            // Firmware that renamed its single section still counts as WAN1.
            let wan1 = full.wan1.as_ref().or(full.wan.as_ref());
            state.wan1 = wan1.map(|s| full_section(state.wan1.as_ref(), s));
            state.wan2 = full
                .wan2
                .as_ref()
                .map(|s| full_section(state.wan2.as_ref(), s));
            state.wan = None;
        }
        WanLayout::Legacy => {
            let wan = full.wan.as_ref().or(full.wan1.as_ref());
            state.wan = wan.map(|s| full_section(state.wan.as_ref(), s));
            state.wan1 = None;
            state.wan2 = None;
        }
        WanLayout::Undetected => {}
    }

    if let Some(uplink) = &full.uplink {
        state.uplink.speedtest = uplink.speedtest.clone();
        apply_uplink_live(&mut state.uplink, uplink);
    }

    state.last_full_poll_at = Some(now);
}

fn apply_live(state: &mut DeviceState, fast: &DeviceReport, now: DateTime<Utc>) {
    if let Some(uplink) = &fast.uplink {
        apply_uplink_live(&mut state.uplink, uplink);
    }

    // Fast responses only refresh slots a full response has established.
    match state.layout {
        WanLayout::Dual => {
            let wan1 = fast.wan1.as_ref().or(fast.wan.as_ref());
            if let (Some(slot), Some(fresh)) = (state.wan1.as_mut(), wan1) {
                apply_section_live(slot, fresh);
            }
            if let (Some(slot), Some(fresh)) = (state.wan2.as_mut(), fast.wan2.as_ref()) {
                apply_section_live(slot, fresh);
            }
        }
        WanLayout::Legacy => {
            let wan = fast.wan.as_ref().or(fast.wan1.as_ref());
            if let (Some(slot), Some(fresh)) = (state.wan.as_mut(), wan) {
                apply_section_live(slot, fresh);
            }
        }
        WanLayout::Undetected => {}
    }

    state.last_fast_poll_at = Some(now);
}

/// Section as reported by a full response, keeping live fields it omits.
fn full_section(previous: Option<&WanSection>, fresh: &WanSection) -> WanSection {
    let mut section = fresh.clone();
    if let Some(previous) = previous {
        section.up = section.up.or(previous.up);
        section.rx_bytes_per_sec = section.rx_bytes_per_sec.or(previous.rx_bytes_per_sec);
        section.tx_bytes_per_sec = section.tx_bytes_per_sec.or(previous.tx_bytes_per_sec);
    }
    section
}

fn apply_section_live(slot: &mut WanSection, fresh: &WanSection) {
    replace_some(&mut slot.up, fresh.up.as_ref());
    replace_some(&mut slot.rx_bytes_per_sec, fresh.rx_bytes_per_sec.as_ref());
    replace_some(&mut slot.tx_bytes_per_sec, fresh.tx_bytes_per_sec.as_ref());
}

fn apply_uplink_live(uplink: &mut Uplink, fresh: &Uplink) {
    replace_some(&mut uplink.up, fresh.up.as_ref());
    replace_some(&mut uplink.name, fresh.name.as_ref());
    replace_some(&mut uplink.comment, fresh.comment.as_ref());
    replace_some(&mut uplink.ifname, fresh.ifname.as_ref());
    replace_some(&mut uplink.ip, fresh.ip.as_ref());
    replace_some(&mut uplink.ip6, fresh.ip6.as_ref());
    replace_some(&mut uplink.rx_bytes_per_sec, fresh.rx_bytes_per_sec.as_ref());
    replace_some(&mut uplink.tx_bytes_per_sec, fresh.tx_bytes_per_sec.as_ref());
}

fn replace_some<T: Clone>(slot: &mut Option<T>, fresh: Option<&T>) {
    if let Some(value) = fresh {
        *slot = Some(value.clone());
    }
}
