//! `speedtest`: trigger a gateway speedtest, optionally waiting for figures.

use std::time::Duration;

use serde::Serialize;

use wanwatch_core::{Monitor, MonitorConfig, SpeedtestResult};

use crate::cli::{GlobalOpts, SpeedtestArgs};
use crate::commands::util;
use crate::error::CliError;
use crate::output::{self, Painter};

#[derive(Debug, Serialize)]
struct Triggered {
    triggered: bool,
}

fn result_detail(result: &SpeedtestResult, painter: Painter) -> String {
    output::detail_lines(&[
        ("Download", painter.good(&util::format_mbps(result.download_mbps))),
        ("Upload", painter.good(&util::format_mbps(result.upload_mbps))),
        (
            "Ping",
            result
                .ping_ms
                .map_or_else(|| "-".into(), |p| format!("{p:.0} ms")),
        ),
        ("Finished", util::format_when(result.last_run_at, chrono::Utc::now())),
        ("Origin", result.origin.to_string()),
    ])
}

pub async fn handle(
    mut config: MonitorConfig,
    args: SpeedtestArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // This process only lives for one test.
    config.auto_speedtest = false;
    let monitor = Monitor::new(config)?;

    let result = if args.wait {
        wait_for_result(&monitor, Duration::from_secs(args.wait_timeout), global).await
    } else {
        trigger_only(&monitor, global).await
    };
    monitor.shutdown().await;
    result
}

async fn trigger_only(monitor: &Monitor, global: &GlobalOpts) -> Result<(), CliError> {
    monitor.trigger_speedtest_manually().await?;
    let out = output::render_single(
        global.output,
        &Triggered { triggered: true },
        |_| "✓ Speedtest started. Check results with: wanwatch status".into(),
        |_| "triggered".into(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

async fn wait_for_result(
    monitor: &Monitor,
    limit: Duration,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // Fast polls observe completion; start() also learns the gateway MAC.
    monitor.start().await?;

    let spinner = util::spinner("Running speedtest...", global.quiet);
    let outcome = tokio::select! {
        result = monitor.run_speedtest() => result.map_err(CliError::from),
        () = tokio::time::sleep(limit) => Err(CliError::Timeout { seconds: limit.as_secs() }),
        _ = tokio::signal::ctrl_c() => Err(CliError::Interrupted),
    };
    spinner.finish_and_clear();
    let result = outcome?;

    let painter = Painter::new(global.color);
    let out = output::render_single(
        global.output,
        &result,
        |r| result_detail(r, painter),
        |r| {
            format!(
                "{} {}",
                r.download_mbps.unwrap_or_default(),
                r.upload_mbps.unwrap_or_default()
            )
        },
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
