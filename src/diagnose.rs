//! Per-target diagnostic runs.
//!
//! The orchestrator owns the run lifecycle: bootstrap the session, walk
//! the enabled categories in their fixed order, release the session, and
//! fold the accumulated results into a [`RunOutcome`]. Probes are
//! isolated from each other: one probe erroring out becomes a `warn`
//! result and the walk continues.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::checks::{Category, CheckRegistry, CheckResult, ProbeContext, Status};
use crate::inventory::{HostConfig, Target};
use crate::ssh::SessionBootstrap;

/// Name under which connection establishment itself is reported.
const CONNECTION_CHECK: &str = "SSH Connection";

#[derive(Debug)]
enum RunState {
    Connecting,
    Running(Category),
    Finished,
}

/// The aggregate of one diagnostic run against one target.
#[derive(Debug, Serialize)]
pub struct RunOutcome {
    pub target: String,
    pub results: Vec<CheckResult>,
    /// True iff no result failed. Warnings do not break a run.
    pub overall_success: bool,
}

impl RunOutcome {
    pub(crate) fn from_results(target: &Target, results: Vec<CheckResult>) -> Self {
        let overall_success = !results.iter().any(|r| r.status == Status::Fail);
        Self {
            target: target.name.clone(),
            results,
            overall_success,
        }
    }

    /// Captured log bundles, keyed by check name.
    pub fn logs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.results
            .iter()
            .filter_map(|r| r.logs.as_deref().map(|logs| (r.check.as_str(), logs)))
    }
}

pub struct Orchestrator {
    registry: CheckRegistry,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            registry: CheckRegistry::standard(),
        }
    }

    pub fn with_registry(registry: CheckRegistry) -> Self {
        Self { registry }
    }

    /// Run the enabled categories against one target.
    ///
    /// Never returns an error: a target that cannot be reached yields an
    /// outcome with a single failed connection result, so multi-target
    /// runs always produce one outcome per target.
    pub async fn run(
        &self,
        target: &Target,
        host: &HostConfig,
        categories: &[Category],
    ) -> RunOutcome {
        let mut state = RunState::Connecting;
        debug!(target = %target.name, ?state, "run started");

        let outcome = match SessionBootstrap::new(target).connect().await {
            Err(e) => {
                warn!(target = %target.name, %e, "bootstrap failed");
                return RunOutcome::from_results(
                    target,
                    vec![CheckResult::fail(CONNECTION_CHECK, e.to_string())],
                );
            }
            Ok(outcome) => outcome,
        };

        let mut results = vec![CheckResult::ok(
            CONNECTION_CHECK,
            outcome.messages.join("; "),
        )];
        let session = outcome.session;

        // Fixed category order regardless of how the caller listed them.
        for category in Category::ALL {
            if !categories.contains(&category) {
                continue;
            }
            state = RunState::Running(category);
            debug!(target = %target.name, ?state, "category started");

            let ctx = ProbeContext {
                channel: &session,
                target,
                host,
            };
            for probe in self.registry.category(category) {
                match probe.run(&ctx).await {
                    Ok(probe_results) => results.extend(probe_results),
                    // Probe isolation: an erroring probe degrades to a
                    // warning and the rest of the battery still runs.
                    Err(e) => {
                        warn!(target = %target.name, probe = probe.name(), %e, "probe errored");
                        results.push(CheckResult::warn(
                            probe.name(),
                            format!("check could not run: {e}"),
                        ));
                    }
                }
            }
        }

        // The session is released on every path that opened one.
        session.close().await;
        state = RunState::Finished;
        debug!(target = %target.name, ?state, "run finished");

        let outcome = RunOutcome::from_results(target, results);
        info!(
            target = %target.name,
            checks = outcome.results.len(),
            success = outcome.overall_success,
            "diagnostics complete"
        );
        outcome
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}
