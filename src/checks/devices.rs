//! Peripheral presence: expected USB devices against the target's bus.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::debug;

use crate::checks::{CheckResult, Probe, ProbeContext};
use crate::error::Result;

/// One result per device named in the inventory's `devices` map. Hosts
/// with no expected devices yield nothing rather than a vacuous pass.
pub struct UsbDevices;

#[async_trait]
impl Probe for UsbDevices {
    fn name(&self) -> &'static str {
        "USB Devices"
    }

    async fn run(&self, ctx: &ProbeContext<'_>) -> Result<Vec<CheckResult>> {
        if ctx.host.devices.is_empty() {
            return Ok(Vec::new());
        }

        let out = ctx.channel.run("lsusb").await?;
        if !out.success() {
            // lsusb missing or broken: every expected device is unverifiable.
            return Ok(ctx
                .host
                .devices
                .keys()
                .map(|name| {
                    CheckResult::warn(
                        format!("Device: {name}"),
                        "cannot enumerate USB devices (lsusb unavailable)",
                    )
                })
                .collect());
        }

        let present = parse_lsusb(&out.stdout);
        debug!(found = present.len(), "USB devices enumerated");

        let mut results = Vec::with_capacity(ctx.host.devices.len());
        for (name, spec) in &ctx.host.devices {
            let id = (normalize_id(&spec.vendor_id), normalize_id(&spec.product_id));
            let result = if present.contains(&id) {
                CheckResult::ok(
                    format!("Device: {name}"),
                    format!("connected ({}:{})", id.0, id.1),
                )
            } else {
                CheckResult::fail(
                    format!("Device: {name}"),
                    format!("missing (expected {}:{})", id.0, id.1),
                )
            };
            results.push(result);
        }
        Ok(results)
    }
}

/// The (vendor, product) id pairs present in `lsusb` output. Lines look
/// like `Bus 001 Device 004: ID 1bc7:1201 Telit Wireless ...`.
fn parse_lsusb(output: &str) -> BTreeSet<(String, String)> {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.split(" ID ").nth(1)?;
            let id = rest.split_whitespace().next()?;
            let (vendor, product) = id.split_once(':')?;
            Some((normalize_id(vendor), normalize_id(product)))
        })
        .collect()
}

/// Lowercase hex without a `0x` prefix, so inventory spellings like
/// `0x1BC7` and lsusb's `1bc7` compare equal.
fn normalize_id(id: &str) -> String {
    id.trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testing::{test_host, test_target, ScriptedChannel};
    use crate::checks::Status;
    use crate::inventory::UsbDeviceSpec;

    const LSUSB: &str = "\
Bus 001 Device 001: ID 1d6b:0002 Linux Foundation 2.0 root hub
Bus 001 Device 004: ID 1bc7:1201 Telit Wireless Solutions
Bus 001 Device 005: ID 0403:6001 FTDI FT232 Serial (UART)
";

    #[test]
    fn lsusb_lines_parse_to_id_pairs() {
        let present = parse_lsusb(LSUSB);
        assert_eq!(present.len(), 3);
        assert!(present.contains(&("1bc7".into(), "1201".into())));
        assert!(present.contains(&("0403".into(), "6001".into())));
    }

    #[test]
    fn ids_normalize_prefix_and_case() {
        assert_eq!(normalize_id("0x1BC7"), "1bc7");
        assert_eq!(normalize_id(" 6001 "), "6001");
    }

    #[tokio::test]
    async fn no_expected_devices_yields_no_results() {
        let channel = ScriptedChannel::replies(&[]);
        let (target, host) = (test_target(), test_host());
        let ctx = ProbeContext {
            channel: &channel,
            target: &target,
            host: &host,
        };
        let results = UsbDevices.run(&ctx).await.unwrap();
        assert!(results.is_empty());
        assert!(channel.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reports_present_and_missing_devices() {
        let channel = ScriptedChannel::replies(&[(0, LSUSB)]);
        let (target, mut host) = (test_target(), test_host());
        host.devices.insert(
            "lte-modem".into(),
            UsbDeviceSpec {
                vendor_id: "0x1BC7".into(),
                product_id: "0x1201".into(),
            },
        );
        host.devices.insert(
            "gps".into(),
            UsbDeviceSpec {
                vendor_id: "1546".into(),
                product_id: "01a8".into(),
            },
        );
        let ctx = ProbeContext {
            channel: &channel,
            target: &target,
            host: &host,
        };
        let results = UsbDevices.run(&ctx).await.unwrap();
        assert_eq!(results.len(), 2);
        // BTreeMap order: gps first.
        assert_eq!(results[0].check, "Device: gps");
        assert_eq!(results[0].status, Status::Fail);
        assert_eq!(results[1].check, "Device: lte-modem");
        assert_eq!(results[1].status, Status::Ok);
    }
}
