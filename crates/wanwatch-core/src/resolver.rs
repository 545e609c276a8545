// ── WAN identity resolver ──
//
// Decides which WAN slot carries traffic. The vendor reports the active
// uplink without saying which slot it is, so the answer comes from an
// ordered chain of heuristics; the first rule that matches wins.

use crate::model::{
    ActiveWanId, ActiveWanResult, DeviceState, MatchReason, Uplink, WanLayout, WanSection, WanSlot,
};

/// Resolve the active WAN for a merged device state.
pub fn resolve(state: &DeviceState) -> ActiveWanResult {
    let uplink = &state.uplink;
    let (id, reason) = by_link_state(state)
        .map(|slot| (ActiveWanId::from(slot), MatchReason::LinkState))
        .or_else(|| {
            by_ip(state, uplink).map(|slot| (ActiveWanId::from(slot), MatchReason::IpMatch))
        })
        .or_else(|| {
            by_interface(state, uplink)
                .map(|slot| (ActiveWanId::from(slot), MatchReason::InterfaceMatch))
        })
        .or_else(|| {
            (state.layout == WanLayout::Legacy)
                .then_some((ActiveWanId::Wan, MatchReason::LegacySingleWan))
        })
        .unwrap_or((ActiveWanId::Unknown, MatchReason::NoSignal));

    ActiveWanResult {
        id,
        name: uplink.display_name(),
        ip: uplink.ip.clone().or_else(|| uplink.ip6.clone()),
        reason,
    }
}

fn dual_slots(state: &DeviceState) -> [(WanSlot, Option<&WanSection>); 2] {
    [
        (WanSlot::Wan1, state.wan1.as_ref()),
        (WanSlot::Wan2, state.wan2.as_ref()),
    ]
}

/// Exactly one dual slot up; an absent flag counts as not up.
fn by_link_state(state: &DeviceState) -> Option<WanSlot> {
    let mut up = dual_slots(state)
        .into_iter()
        .filter(|(_, section)| section.is_some_and(|s| s.up == Some(true)))
        .map(|(slot, _)| slot);
    match (up.next(), up.next()) {
        (Some(slot), None) => Some(slot),
        _ => None,
    }
}

fn by_ip(state: &DeviceState, uplink: &Uplink) -> Option<WanSlot> {
    let ipv4: fn(&WanSection) -> Option<&str> = |s| s.ip.as_deref();
    let ipv6: fn(&WanSection) -> Option<&str> = |s| s.ip6.as_deref();

    for (wanted, field) in [(uplink.ip.as_deref(), ipv4), (uplink.ip6.as_deref(), ipv6)] {
        let Some(wanted) = wanted.map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };
        for (slot, section) in dual_slots(state) {
            if section.and_then(field).map(str::trim) == Some(wanted) {
                return Some(slot);
            }
        }
    }
    None
}

fn by_interface(state: &DeviceState, uplink: &Uplink) -> Option<WanSlot> {
    let wanted: Vec<&str> = [uplink.ifname.as_deref(), uplink.name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    if wanted.is_empty() {
        return None;
    }

    dual_slots(state).into_iter().find_map(|(slot, section)| {
        let section = section?;
        let matched = [section.ifname.as_deref(), section.name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .any(|have| wanted.iter().any(|w| w.eq_ignore_ascii_case(have)));
        matched.then_some(slot)
    })
}
