//! Diagnostic probes and the registry that orders them.
//!
//! A probe inspects one aspect of a target and yields zero or more
//! classified results. Probes are registered per category; the
//! orchestrator walks the registry and never branches on probe names, so
//! adding a probe means registering a new variant here.

pub mod devices;
pub mod network;
pub mod services;
pub mod system;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::Serialize;

use crate::error::Result;
use crate::inventory::{HostConfig, Target};
use crate::ssh::CommandChannel;

/// Severity of one check. Probes classify; nothing downstream escalates
/// or demotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Warn,
    Fail,
}

/// One classified probe result. Append-only once produced: corrections
/// append a new result rather than rewriting history, preserving the
/// audit trail for the report.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub check: String,
    pub status: Status,
    pub message: String,
    /// Recent log lines for non-ok services/containers, keyed into the
    /// report bundle by check name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

impl CheckResult {
    pub fn ok(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check, Status::Ok, message)
    }

    pub fn warn(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check, Status::Warn, message)
    }

    pub fn fail(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check, Status::Fail, message)
    }

    pub fn new(check: impl Into<String>, status: Status, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            status,
            message: message.into(),
            logs: None,
        }
    }

    pub fn with_logs(mut self, logs: impl Into<String>) -> Self {
        self.logs = Some(logs.into());
        self
    }
}

/// A named group of probes, enabled or disabled as a unit per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    System,
    Network,
    Services,
    Devices,
}

impl Category {
    /// The fixed execution order. Requested subsets run in this order
    /// regardless of how the caller listed them.
    pub const ALL: [Category; 4] = [
        Category::System,
        Category::Network,
        Category::Services,
        Category::Devices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::System => "system",
            Category::Network => "network",
            Category::Services => "services",
            Category::Devices => "devices",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a probe may consult. Local probes (e.g. the VPN
/// reachability check) ignore the channel.
pub struct ProbeContext<'a> {
    pub channel: &'a dyn CommandChannel,
    pub target: &'a Target,
    pub host: &'a HostConfig,
}

/// A single diagnostic routine.
///
/// A probe returns `Err` only for infrastructure failures it cannot
/// classify itself; the orchestrator records that as a `warn` result and
/// continues with the remaining probes.
#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &ProbeContext<'_>) -> Result<Vec<CheckResult>>;
}

/// The fixed, ordered probe set.
pub struct CheckRegistry {
    entries: Vec<(Category, Box<dyn Probe>)>,
}

impl CheckRegistry {
    /// The standard battery, in display order within each category.
    pub fn standard() -> Self {
        let mut registry = Self {
            entries: Vec::new(),
        };
        registry.register(Category::System, Box::new(system::Hostname));
        registry.register(Category::System, Box::new(system::Uptime));
        registry.register(Category::System, Box::new(system::CpuLoad));
        registry.register(Category::System, Box::new(system::Memory));
        registry.register(Category::System, Box::new(system::Disk));
        registry.register(Category::Network, Box::new(network::TailscaleVpn));
        registry.register(Category::Network, Box::new(network::NetworkInterfaces));
        registry.register(Category::Services, Box::new(services::DockerDaemon));
        registry.register(Category::Services, Box::new(services::Containers));
        registry.register(Category::Services, Box::new(services::SystemdServices));
        registry.register(Category::Devices, Box::new(devices::UsbDevices));
        registry
    }

    pub fn register(&mut self, category: Category, probe: Box<dyn Probe>) {
        self.entries.push((category, probe));
    }

    /// Probes registered under `category`, in registration order.
    pub fn category(&self, category: Category) -> impl Iterator<Item = &dyn Probe> {
        self.entries
            .iter()
            .filter(move |(c, _)| *c == category)
            .map(|(_, p)| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::standard()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_covers_all_categories() {
        let registry = CheckRegistry::standard();
        for category in Category::ALL {
            assert!(
                registry.category(category).next().is_some(),
                "no probes registered for {category}"
            );
        }
    }

    #[test]
    fn system_probes_run_in_display_order() {
        let registry = CheckRegistry::standard();
        let names: Vec<_> = registry
            .category(Category::System)
            .map(|p| p.name())
            .collect();
        assert_eq!(names, vec!["Hostname", "Uptime", "CPU Load", "Memory", "Disk"]);
    }

    #[test]
    fn category_order_is_fixed() {
        assert_eq!(
            Category::ALL,
            [
                Category::System,
                Category::Network,
                Category::Services,
                Category::Devices
            ]
        );
    }

    #[test]
    fn check_result_constructors() {
        let r = CheckResult::warn("Memory", "83% used").with_logs("line1\nline2");
        assert_eq!(r.check, "Memory");
        assert_eq!(r.status, Status::Warn);
        assert_eq!(r.logs.as_deref(), Some("line1\nline2"));
    }
}
