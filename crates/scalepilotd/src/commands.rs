//! Subcommand implementations.

use anyhow::{Context, bail};
use scalepilot_core::config::{apply_assignments, load_file};
use scalepilot_core::{ConfigMap, ScaleDirection, ScalingAction};
use scalepilot_target::Target;
use serde::Serialize;
use tracing::info;

use crate::ConfigArgs;

/// Build the configuration map: file first, then `--set` overrides.
pub fn load_config(args: &ConfigArgs) -> anyhow::Result<ConfigMap> {
    let mut config = match &args.config {
        Some(path) => load_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ConfigMap::new(),
    };
    apply_assignments(&mut config, &args.set)?;
    Ok(config)
}

pub fn scaling_action(
    direction: ScaleDirection,
    count: i64,
    dry_run: bool,
    reason: String,
) -> ScalingAction {
    let mut action = if dry_run {
        ScalingAction::dry_run(direction)
    } else {
        ScalingAction::new(direction, count)
    };
    action.reason = reason;
    action
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn configured_target(config: &ConfigMap) -> anyhow::Result<Target> {
    let mut target = Target::new();
    target
        .set_config(config)
        .context("configuring target")?;
    Ok(target)
}

pub fn info() -> anyhow::Result<()> {
    print_json(&Target::plugin_info())
}

pub async fn status(args: &ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let target = configured_target(&config)?;
    let status = target.status(&config).await?;
    print_json(&status)
}

pub async fn scale(args: &ConfigArgs, action: ScalingAction) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let target = configured_target(&config)?;
    let report = target.scale(action, &config).await?;
    print_json(&report)?;

    let failed = report.failed();
    if failed > 0 {
        bail!("{failed} of {} work units failed", report.outcomes.len());
    }
    info!(units = report.outcomes.len(), "scale completed");
    Ok(())
}
