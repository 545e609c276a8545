//! `watch`: run the monitor in the foreground until Ctrl-C.
//!
//! Table output prints one line whenever the WAN picture changes;
//! structured formats emit every published snapshot.

use std::time::Duration;

use chrono::Local;
use futures_util::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use wanwatch_core::{
    ActiveWanId, Monitor, MonitorConfig, MonitorSnapshot, SpeedtestEvent,
};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat, WatchArgs};
use crate::commands::status;
use crate::commands::util;
use crate::error::CliError;
use crate::output::{self, Painter};

/// One-line summary of a snapshot (without timestamp).
fn summary_line(snap: &MonitorSnapshot, painter: Painter) -> String {
    let active = &snap.active_wan;
    let id = match active.id {
        ActiveWanId::Unknown => painter.warn("unknown"),
        id => painter.good(&id.to_string()),
    };
    let mut line = id;
    if let Some(ref name) = active.name {
        line.push_str(&format!(" {name}"));
    }
    if let Some(ref ip) = active.ip {
        line.push_str(&format!(" {ip}"));
    }
    line.push_str(&format!(
        "  ↓ {:.2} ↑ {:.2} Mbps",
        snap.device.uplink.download_mbps(),
        snap.device.uplink.upload_mbps()
    ));
    if snap.speedtest.in_progress {
        line.push_str(&painter.warn("  [speedtest running]"));
    }
    if snap.health.stale {
        line.push_str(&painter.bad(&format!(
            "  [stale: {}]",
            snap.health.last_error.as_deref().unwrap_or("poll failed")
        )));
    }
    line.push_str(&painter.dim(&format!("  ({})", active.reason)));
    line
}

fn event_line(event: &SpeedtestEvent, painter: Painter) -> String {
    match event {
        SpeedtestEvent::Started { origin } => format!("speedtest started ({origin})"),
        SpeedtestEvent::Completed(result) => painter.good(&format!(
            "speedtest done: ↓ {} ↑ {} ping {}",
            util::format_mbps(result.download_mbps),
            util::format_mbps(result.upload_mbps),
            result
                .ping_ms
                .map_or_else(|| "-".into(), |p| format!("{p:.0} ms")),
        )),
        SpeedtestEvent::TimedOut { after_secs, .. } => painter.bad(&format!(
            "speedtest timed out after {}",
            util::format_secs(*after_secs)
        )),
        SpeedtestEvent::Failed { reason, .. } => {
            painter.bad(&format!("speedtest failed: {reason}"))
        }
    }
}

fn render_event(
    event: &SpeedtestEvent,
    format: OutputFormat,
    painter: Painter,
) -> Result<String, CliError> {
    if format == OutputFormat::Table {
        return Ok(timestamped(&event_line(event, painter)));
    }
    let plain = Painter::new(ColorMode::Never);
    output::render_single(format, event, |e| event_line(e, plain), |e| event_line(e, plain))
}

fn timestamped(line: &str) -> String {
    format!("{} {line}", Local::now().format("%H:%M:%S"))
}

pub async fn handle(
    mut config: MonitorConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(secs) = args.full_interval {
        config.full_interval = Duration::from_secs(secs.max(1));
    }
    if let Some(secs) = args.fast_interval {
        config.fast_interval = Duration::from_secs(secs.max(1));
    }
    if args.no_auto_speedtest {
        config.auto_speedtest = false;
    }

    let monitor = Monitor::new(config)?;
    let spinner = util::spinner("Connecting...", global.quiet);
    let started = monitor.start().await;
    spinner.finish_and_clear();
    started?;

    let result = run(&monitor, &args, global).await;
    monitor.shutdown().await;
    result
}

async fn run(monitor: &Monitor, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let painter = Painter::new(global.color);
    let mut snapshots = monitor.subscribe().into_stream();
    let mut events = monitor.speedtest_events();
    let mut last_line = String::new();
    let mut printed = 0usize;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            biased;
            _ = &mut ctrl_c => {
                debug!("interrupted, shutting down");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(event) => {
                    let out = render_event(&event, global.output, painter)?;
                    output::print_output(&out, global.quiet);
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "speedtest events lagged"),
                Err(RecvError::Closed) => return Ok(()),
            },
            snap = snapshots.next() => {
                let Some(snap) = snap else {
                    return Ok(());
                };
                if global.output == OutputFormat::Table {
                    let line = summary_line(&snap, painter);
                    if line == last_line {
                        continue;
                    }
                    output::print_output(&timestamped(&line), global.quiet);
                    last_line = line;
                } else {
                    let out = status::render_snapshot(&snap, global)?;
                    output::print_output(&out, global.quiet);
                }
                printed += 1;
                if args.count.is_some_and(|max| printed >= max) {
                    return Ok(());
                }
            }
        }
    }
}
