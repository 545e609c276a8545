//! `status`: one out-of-band poll cycle, then the merged WAN picture.

use chrono::Utc;
use tabled::Tabled;

use wanwatch_core::{
    ActiveWanId, Monitor, MonitorConfig, MonitorSnapshot, WanSection, WanSlot,
};

use crate::cli::GlobalOpts;
use crate::commands::util;
use crate::error::CliError;
use crate::output::{self, Painter};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct WanRow {
    #[tabled(rename = "WAN")]
    slot: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Link")]
    link: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Interface")]
    interface: String,
    #[tabled(rename = "Down")]
    down: String,
    #[tabled(rename = "Up")]
    up: String,
}

impl WanRow {
    fn new(slot: WanSlot, section: &WanSection, active: ActiveWanId, painter: Painter) -> Self {
        let link = match section.up {
            Some(true) => painter.good("up"),
            Some(false) => painter.bad("down"),
            None => painter.dim("?"),
        };
        let interface = match (section.name.as_deref(), section.ifname.as_deref()) {
            (Some(name), Some(ifname)) if name != ifname => format!("{name} ({ifname})"),
            (Some(name), _) => name.to_owned(),
            (None, Some(ifname)) => ifname.to_owned(),
            (None, None) => String::new(),
        };
        Self {
            slot: section
                .comment
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .map_or_else(|| slot.to_string(), |c| format!("{slot} · {c}")),
            active: if ActiveWanId::from(slot) == active {
                painter.good("●")
            } else {
                String::new()
            },
            link,
            ip: section.ip.clone().or_else(|| section.ip6.clone()).unwrap_or_default(),
            interface,
            down: format!("{:.2}", section.download_mbps()),
            up: format!("{:.2}", section.upload_mbps()),
        }
    }
}

// ── Detail view ─────────────────────────────────────────────────────

/// Multi-line human view of a snapshot, shared with `watch`.
pub fn snapshot_detail(snap: &MonitorSnapshot, painter: Painter) -> String {
    let now = Utc::now();
    let device = &snap.device;
    let identity = &device.identity;
    let active = &snap.active_wan;

    let active_label = match active.id {
        ActiveWanId::Unknown => painter.warn("unknown"),
        id => painter.good(&id.to_string()),
    };
    let mut active_line = active_label;
    if let Some(ref name) = active.name {
        active_line.push_str(&format!(" · {name}"));
    }
    if let Some(ref ip) = active.ip {
        active_line.push_str(&format!(" · {ip}"));
    }
    active_line.push_str(&painter.dim(&format!(" ({})", active.reason)));

    let test = &device.uplink.speedtest;
    let speedtest_line = if test.has_run() {
        format!(
            "↓ {}  ↑ {}  ping {}  at {}",
            util::format_mbps(test.download_mbps),
            util::format_mbps(test.upload_mbps),
            test.ping_ms.map_or_else(|| "-".into(), |p| format!("{p:.0} ms")),
            util::format_when(test.last_run_at(), now),
        )
    } else {
        painter.dim("never run")
    };
    let session = &snap.speedtest;
    let session_line = if session.in_progress {
        painter.warn(&format!(
            "{} ({})",
            session.state,
            session.origin.map(|o| o.to_string()).unwrap_or_default()
        ))
    } else {
        session.state.to_string()
    };

    let health = &snap.health;
    let health_line = if health.stale {
        painter.bad(&format!(
            "stale ({} failed poll(s): {})",
            health.consecutive_failures,
            health.last_error.as_deref().unwrap_or("unknown error")
        ))
    } else {
        painter.good("ok")
    };

    let mut out = output::detail_lines(&[
        (
            "Gateway",
            format!(
                "{} · {}",
                identity.name.as_deref().unwrap_or("-"),
                identity.model_label()
            ),
        ),
        ("MAC", identity.mac.clone().unwrap_or_else(|| "-".into())),
        (
            "Firmware",
            identity.firmware_version.clone().unwrap_or_else(|| "-".into()),
        ),
        ("Layout", device.layout.to_string()),
        ("Active WAN", active_line),
        (
            "Throughput",
            format!(
                "↓ {:.2} Mbps  ↑ {:.2} Mbps",
                device.uplink.download_mbps(),
                device.uplink.upload_mbps()
            ),
        ),
        ("Speedtest", speedtest_line),
        ("Session", session_line),
        (
            "Auto test",
            if snap.auto_speedtest { "on" } else { "off" }.into(),
        ),
        ("Health", health_line),
        ("Full poll", util::format_when(device.last_full_poll_at, now)),
        ("Fast poll", util::format_when(device.last_fast_poll_at, now)),
    ]);

    let rows: Vec<WanRow> = device
        .slots()
        .map(|(slot, section)| WanRow::new(slot, section, active.id, painter))
        .collect();
    if !rows.is_empty() {
        out.push_str("\n\n");
        out.push_str(&painter.heading("WAN links"));
        out.push('\n');
        out.push_str(&output::render_table(&rows));
    }
    out
}

/// Render a snapshot in the selected output format.
pub fn render_snapshot(snap: &MonitorSnapshot, global: &GlobalOpts) -> Result<String, CliError> {
    let painter = Painter::new(global.color);
    output::render_single(
        global.output,
        snap,
        |s| snapshot_detail(s, painter),
        |s| s.active_wan.id.to_string(),
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(config: MonitorConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let monitor = Monitor::new(config)?;
    let spinner = util::spinner("Polling gateway...", global.quiet);
    let result = monitor.refresh_now().await;
    spinner.finish_and_clear();
    monitor.shutdown().await;
    result?;

    let out = render_snapshot(&monitor.snapshot(), global)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
