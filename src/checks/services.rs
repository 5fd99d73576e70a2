//! Service health: the Docker daemon, compose-managed containers, and
//! configured systemd units.
//!
//! Container discovery is config-driven, not remote-driven: the expected
//! set comes from the compose files under the inventory's `compose_dir`,
//! so a container that never started still shows up — as a failure.

use async_trait::async_trait;
use serde_yaml::Value;
use tracing::{debug, warn};

use crate::checks::{CheckResult, Probe, ProbeContext};
use crate::error::Result;
use crate::ssh::CommandChannel;

/// Lines of recent logs captured for any non-ok service or container.
const LOG_TAIL_LINES: u32 = 50;

async fn docker_is_active(channel: &dyn CommandChannel) -> Result<bool> {
    let out = channel.run("systemctl is-active docker").await?;
    Ok(out.stdout.trim() == "active")
}

pub struct DockerDaemon;

#[async_trait]
impl Probe for DockerDaemon {
    fn name(&self) -> &'static str {
        "Docker Daemon"
    }

    async fn run(&self, ctx: &ProbeContext<'_>) -> Result<Vec<CheckResult>> {
        let result = if docker_is_active(ctx.channel).await? {
            CheckResult::ok(self.name(), "active")
        } else {
            CheckResult::fail(self.name(), "docker daemon is not active")
        };
        Ok(vec![result])
    }
}

/// One result per container declared in the compose files under
/// `compose_dir`. Yields nothing when no compose dir is configured, and
/// nothing when the daemon is down — the daemon probe already reports
/// that failure, and every per-container result would be noise on top.
pub struct Containers;

#[async_trait]
impl Probe for Containers {
    fn name(&self) -> &'static str {
        "Containers"
    }

    async fn run(&self, ctx: &ProbeContext<'_>) -> Result<Vec<CheckResult>> {
        let Some(compose_dir) = ctx.host.services.compose_dir.as_deref() else {
            return Ok(Vec::new());
        };
        if !docker_is_active(ctx.channel).await? {
            debug!("docker inactive, skipping container checks");
            return Ok(Vec::new());
        }

        let names = discover_containers(ctx.channel, compose_dir).await?;
        debug!(count = names.len(), compose_dir, "containers discovered");

        let mut results = Vec::with_capacity(names.len());
        for name in names {
            results.push(check_container(ctx.channel, &name).await?);
        }
        Ok(results)
    }
}

/// Service names from every compose file directly under `dir`.
async fn discover_containers(channel: &dyn CommandChannel, dir: &str) -> Result<Vec<String>> {
    let find = channel
        .run(&format!(
            r"find {dir} -maxdepth 1 \( -name '*.yml' -o -name '*.yaml' \)"
        ))
        .await?;

    let mut names = Vec::new();
    for path in find.stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let cat = channel.run(&format!("cat {path}")).await?;
        if !cat.success() {
            warn!(path, "cannot read compose file, skipping");
            continue;
        }
        match compose_services(&cat.stdout) {
            Some(services) => names.extend(services),
            None => warn!(path, "compose file has no services section, skipping"),
        }
    }
    names.sort();
    names.dedup();
    Ok(names)
}

/// The keys of the top-level `services:` mapping, or `None` when the
/// document does not parse as a compose file.
fn compose_services(yaml: &str) -> Option<Vec<String>> {
    let doc: Value = serde_yaml::from_str(yaml).ok()?;
    let services = doc.get("services")?.as_mapping()?;
    Some(
        services
            .keys()
            .filter_map(|k| k.as_str().map(String::from))
            .collect(),
    )
}

async fn check_container(channel: &dyn CommandChannel, name: &str) -> Result<CheckResult> {
    let out = channel
        .run(&format!(
            "docker ps -a --filter 'name=^{name}$' --format '{{{{.State}}}} {{{{.Status}}}}'"
        ))
        .await?;

    let mut result = classify_container(name, out.stdout.trim());
    if result.status != crate::checks::Status::Ok {
        let logs = channel
            .run(&format!("docker logs --tail {LOG_TAIL_LINES} {name} 2>&1"))
            .await?;
        if !logs.stdout.trim().is_empty() {
            result = result.with_logs(logs.stdout);
        }
    }
    Ok(result)
}

/// Classify the `docker ps` state/status line for one container.
fn classify_container(name: &str, state_line: &str) -> CheckResult {
    let check = format!("Container: {name}");
    let lower = state_line.to_lowercase();

    if state_line.is_empty() {
        return CheckResult::fail(check, "container not found (never started?)");
    }
    if lower.starts_with("restarting") {
        return CheckResult::fail(check, format!("crash loop: {state_line}"));
    }
    if lower.starts_with("exited") || lower.starts_with("dead") {
        return CheckResult::fail(check, format!("stopped: {state_line}"));
    }
    if lower.contains("unhealthy") {
        return CheckResult::warn(check, format!("unhealthy: {state_line}"));
    }
    if lower.starts_with("running") || lower.starts_with("up") {
        return CheckResult::ok(check, state_line);
    }
    CheckResult::warn(check, format!("unexpected state: {state_line}"))
}

/// One result per systemd unit named in the inventory.
pub struct SystemdServices;

#[async_trait]
impl Probe for SystemdServices {
    fn name(&self) -> &'static str {
        "Systemd Services"
    }

    async fn run(&self, ctx: &ProbeContext<'_>) -> Result<Vec<CheckResult>> {
        let mut results = Vec::new();
        for unit in &ctx.host.services.systemd_services {
            let out = ctx.channel.run(&format!("systemctl is-active {unit}")).await?;
            let state = out.stdout.trim().to_string();
            let check = format!("Service: {unit}");

            let result = match state.as_str() {
                "active" => CheckResult::ok(check, "active"),
                "inactive" | "dead" | "failed" => {
                    let logs = ctx
                        .channel
                        .run(&format!("journalctl -u {unit} --no-pager -n {LOG_TAIL_LINES}"))
                        .await?;
                    let result = CheckResult::fail(check, format!("unit is {state}"));
                    if logs.stdout.trim().is_empty() {
                        result
                    } else {
                        result.with_logs(logs.stdout)
                    }
                }
                other => CheckResult::warn(check, format!("unit is {other}")),
            };
            results.push(result);
        }
        Ok(results)
    }
}
