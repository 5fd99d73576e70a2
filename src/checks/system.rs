//! Core system health: identity, uptime, CPU load, memory, disk.
//!
//! Each probe shells out to the standard coreutils present on any edge
//! image. Output the probe cannot parse is a `warn`, never a hard error:
//! a hostile or ancient userland should degrade the report, not abort it.

use async_trait::async_trait;
use tracing::debug;

use crate::checks::{CheckResult, Probe, ProbeContext};
use crate::error::Result;

/// Usage percentage below this is healthy.
const USAGE_OK_PCT: f64 = 70.0;
/// Usage percentage below this is a warning; at or above is a failure.
const USAGE_WARN_PCT: f64 = 85.0;

pub struct Hostname;

#[async_trait]
impl Probe for Hostname {
    fn name(&self) -> &'static str {
        "Hostname"
    }

    async fn run(&self, ctx: &ProbeContext<'_>) -> Result<Vec<CheckResult>> {
        let out = ctx.channel.run("hostname").await?;
        let hostname = out.stdout.trim();
        let result = if out.success() && !hostname.is_empty() {
            CheckResult::ok(self.name(), hostname)
        } else {
            CheckResult::warn(self.name(), "could not determine hostname")
        };
        Ok(vec![result])
    }
}

pub struct Uptime;

#[async_trait]
impl Probe for Uptime {
    fn name(&self) -> &'static str {
        "Uptime"
    }

    async fn run(&self, ctx: &ProbeContext<'_>) -> Result<Vec<CheckResult>> {
        let out = ctx.channel.run("uptime -p").await?;
        let uptime = out.stdout.trim();
        let result = if out.success() && !uptime.is_empty() {
            CheckResult::ok(self.name(), uptime)
        } else {
            CheckResult::warn(self.name(), "could not determine uptime")
        };
        Ok(vec![result])
    }
}

pub struct CpuLoad;

#[async_trait]
impl Probe for CpuLoad {
    fn name(&self) -> &'static str {
        "CPU Load"
    }

    async fn run(&self, ctx: &ProbeContext<'_>) -> Result<Vec<CheckResult>> {
        let load_out = ctx
            .channel
            .run("cat /proc/loadavg | awk '{print $1}'")
            .await?;
        let nproc_out = ctx.channel.run("nproc").await?;

        let load: Option<f64> = load_out.stdout.trim().parse().ok();
        let cores: Option<u32> = nproc_out.stdout.trim().parse().ok();

        let result = match (load, cores) {
            (Some(load), Some(cores)) if cores > 0 => {
                debug!(load, cores, "load sample");
                classify_load(self.name(), load, cores)
            }
            _ => CheckResult::warn(self.name(), "could not read load average"),
        };
        Ok(vec![result])
    }
}

/// Classify a 1-minute load average against the core count. The ratio
/// thresholds: below 0.7 per core is healthy, below 1.0 is elevated, at
/// or above 1.0 the box is saturated.
fn classify_load(name: &str, load: f64, cores: u32) -> CheckResult {
    let ratio = load / f64::from(cores);
    let message = format!("load {load:.2} across {cores} cores ({:.0}%)", ratio * 100.0);
    if ratio < 0.7 {
        CheckResult::ok(name, message)
    } else if ratio < 1.0 {
        CheckResult::warn(name, message)
    } else {
        CheckResult::fail(name, message)
    }
}

pub struct Memory;

#[async_trait]
impl Probe for Memory {
    fn name(&self) -> &'static str {
        "Memory"
    }

    async fn run(&self, ctx: &ProbeContext<'_>) -> Result<Vec<CheckResult>> {
        let out = ctx
            .channel
            .run(r#"free -m | awk 'NR==2{printf "%.0f", $3*100/$2}'"#)
            .await?;

        let result = match out.stdout.trim().parse::<f64>() {
            Ok(pct) if out.success() => classify_usage(self.name(), "memory", pct),
            _ => CheckResult::warn(self.name(), "could not read memory usage"),
        };
        Ok(vec![result])
    }
}

pub struct Disk;

#[async_trait]
impl Probe for Disk {
    fn name(&self) -> &'static str {
        "Disk"
    }

    async fn run(&self, ctx: &ProbeContext<'_>) -> Result<Vec<CheckResult>> {
        let out = ctx
            .channel
            .run("df -h / | tail -1 | awk '{print $5}' | tr -d '%'")
            .await?;

        let result = match out.stdout.trim().parse::<f64>() {
            Ok(pct) if out.success() => classify_usage(self.name(), "root filesystem", pct),
            _ => CheckResult::warn(self.name(), "could not read disk usage"),
        };
        Ok(vec![result])
    }
}

/// Shared percentage thresholds for memory and disk.
fn classify_usage(name: &str, what: &str, pct: f64) -> CheckResult {
    let message = format!("{what} at {pct:.0}% used");
    if pct < USAGE_OK_PCT {
        CheckResult::ok(name, message)
    } else if pct < USAGE_WARN_PCT {
        CheckResult::warn(name, message)
    } else {
        CheckResult::fail(name, message)
    }
}
