//! `validate`: one trial fetch with the resolved settings.

use wanwatch_core::{GatewayIdentity, Monitor, MonitorConfig};

use crate::cli::GlobalOpts;
use crate::commands::util;
use crate::error::CliError;
use crate::output;

fn identity_detail(identity: &GatewayIdentity) -> String {
    let dash = |v: Option<&str>| v.unwrap_or("-").to_owned();
    format!(
        "✓ Settings OK\n\n{}",
        output::detail_lines(&[
            ("Gateway", dash(identity.name.as_deref())),
            ("Model", identity.model_label().to_owned()),
            ("MAC", dash(identity.mac.as_deref())),
            ("Firmware", dash(identity.firmware_version.as_deref())),
            ("Console", dash(identity.management_url.as_deref())),
        ])
    )
}

pub async fn handle(config: &MonitorConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let spinner = util::spinner("Contacting console...", global.quiet);
    let result = Monitor::validate_settings(config).await;
    spinner.finish_and_clear();
    let identity = result?;

    let out = output::render_single(global.output, &identity, identity_detail, |i| {
        i.mac.clone().unwrap_or_default()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
