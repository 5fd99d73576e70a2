//! Network reachability: VPN path and link state.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::checks::{CheckResult, Probe, ProbeContext};
use crate::error::Result;

/// Bound on the local `tailscale ping` invocation.
const VPN_PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Checks the VPN path from the operator's machine to the target. This is
/// the one probe that runs locally: if the target is only reachable over
/// the mesh, a remote self-ping would prove nothing.
pub struct TailscaleVpn;

#[async_trait]
impl Probe for TailscaleVpn {
    fn name(&self) -> &'static str {
        "Tailscale VPN"
    }

    async fn run(&self, ctx: &ProbeContext<'_>) -> Result<Vec<CheckResult>> {
        let address = &ctx.target.address;
        let invocation = Command::new("tailscale")
            .args(["ping", "-c", "1", address])
            .output();

        let result = match tokio::time::timeout(VPN_PING_TIMEOUT, invocation).await {
            Err(_) => CheckResult::warn(self.name(), format!("ping to {address} timed out")),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                CheckResult::warn(self.name(), "tailscale is not installed locally")
            }
            Ok(Err(e)) => CheckResult::warn(self.name(), format!("could not run tailscale: {e}")),
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                debug!(%address, ok = output.status.success(), "tailscale ping finished");
                if output.status.success() && stdout.contains("pong") {
                    CheckResult::ok(self.name(), format!("{address} reachable over the mesh"))
                } else {
                    CheckResult::warn(
                        self.name(),
                        format!("no pong from {address} (direct SSH may still work)"),
                    )
                }
            }
        };
        Ok(vec![result])
    }
}

/// Verifies at least one interface on the target is administratively and
/// operationally up.
pub struct NetworkInterfaces;

#[async_trait]
impl Probe for NetworkInterfaces {
    fn name(&self) -> &'static str {
        "Network Interfaces"
    }

    async fn run(&self, ctx: &ProbeContext<'_>) -> Result<Vec<CheckResult>> {
        let out = ctx
            .channel
            .run("ip link show | grep -c 'state UP'")
            .await?;

        // grep -c exits 1 when the count is zero, so classify on the
        // count itself rather than the exit code.
        let result = match out.stdout.trim().parse::<u32>() {
            Ok(0) => CheckResult::fail(self.name(), "no interfaces in state UP"),
            Ok(n) => CheckResult::ok(self.name(), format!("{n} interface(s) up")),
            Err(_) => CheckResult::warn(self.name(), "could not enumerate interfaces"),
        };
        Ok(vec![result])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testing::{test_host, test_target, ScriptedChannel};
    use crate::checks::Status;

    #[tokio::test]
    async fn interfaces_up_is_ok() {
        let channel = ScriptedChannel::replies(&[(0, "3\n")]);
        let (target, host) = (test_target(), test_host());
        let ctx = ProbeContext {
            channel: &channel,
            target: &target,
            host: &host,
        };
        let results = NetworkInterfaces.run(&ctx).await.unwrap();
        assert_eq!(results[0].status, Status::Ok);
        assert!(results[0].message.contains("3 interface"));
    }

    #[tokio::test]
    async fn zero_interfaces_is_a_failure() {
        // grep -c prints 0 and exits 1 when nothing matches.
        let channel = ScriptedChannel::replies(&[(1, "0\n")]);
        let (target, host) = (test_target(), test_host());
        let ctx = ProbeContext {
            channel: &channel,
            target: &target,
            host: &host,
        };
        let results = NetworkInterfaces.run(&ctx).await.unwrap();
        assert_eq!(results[0].status, Status::Fail);
    }

    #[tokio::test]
    async fn unparseable_interface_count_warns() {
        let channel = ScriptedChannel::replies(&[(0, "ip: not found\n")]);
        let (target, host) = (test_target(), test_host());
        let ctx = ProbeContext {
            channel: &channel,
            target: &target,
            host: &host,
        };
        let results = NetworkInterfaces.run(&ctx).await.unwrap();
        assert_eq!(results[0].status, Status::Warn);
    }
}
