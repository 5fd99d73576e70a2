//! On-disk report bundles.
//!
//! Each run writes `reports/<host>/<timestamp>/` containing a plain-text
//! summary plus one `.log` file per check that captured logs. Only the
//! latest bundle per host is kept: the previous host directory is removed
//! before writing.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info};

use crate::checks::Status;
use crate::diagnose::RunOutcome;
use crate::error::Result;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Write the report bundle for one run. Returns the bundle directory.
pub fn write_report(base: &Path, outcome: &RunOutcome) -> Result<PathBuf> {
    let host_dir = base.join(&outcome.target);
    if host_dir.exists() {
        fs::remove_dir_all(&host_dir)?;
    }

    let bundle = host_dir.join(Local::now().format(TIMESTAMP_FORMAT).to_string());
    fs::create_dir_all(&bundle)?;

    fs::write(bundle.join("report.txt"), render_summary(outcome))?;
    fs::write(
        bundle.join("support_message.txt"),
        render_support_message(outcome),
    )?;

    for (check, logs) in outcome.logs() {
        let file = bundle.join(format!("{}.log", sanitize(check)));
        debug!(path = %file.display(), "writing log capture");
        fs::write(file, logs)?;
    }

    info!(path = %bundle.display(), "report written");
    Ok(bundle)
}

fn render_summary(outcome: &RunOutcome) -> String {
    let mut text = String::new();
    text.push_str(&format!("Diagnostic report for {}\n", outcome.target));
    text.push_str(&format!(
        "Generated: {}\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));

    for result in &outcome.results {
        let tag = match result.status {
            Status::Ok => "  ok",
            Status::Warn => "warn",
            Status::Fail => "FAIL",
        };
        text.push_str(&format!("[{tag}] {}: {}\n", result.check, result.message));
        if result.logs.is_some() {
            text.push_str(&format!(
                "       recent logs captured in {}.log\n",
                sanitize(&result.check)
            ));
        }
    }

    let count = |s: Status| outcome.results.iter().filter(|r| r.status == s).count();
    text.push_str(&format!(
        "\n{} checks: {} ok, {} warnings, {} failures\n",
        outcome.results.len(),
        count(Status::Ok),
        count(Status::Warn),
        count(Status::Fail),
    ));
    text.push_str(if outcome.overall_success {
        "Overall: HEALTHY\n"
    } else {
        "Overall: PROBLEMS DETECTED\n"
    });
    text
}

/// A ready-to-send note for non-technical operators: what was found, in
/// plain words, with the bundle folder named as the attachment.
fn render_support_message(outcome: &RunOutcome) -> String {
    let mut text = String::new();
    text.push_str(&format!(
        "Hello,\n\nI ran diagnostics on device '{}' on {}.\n\n",
        outcome.target,
        Local::now().format("%Y-%m-%d %H:%M")
    ));

    let failures: Vec<_> = outcome
        .results
        .iter()
        .filter(|r| r.status == Status::Fail)
        .collect();
    let warnings: Vec<_> = outcome
        .results
        .iter()
        .filter(|r| r.status == Status::Warn)
        .collect();

    if failures.is_empty() && warnings.is_empty() {
        text.push_str("All checks passed.\n");
    } else {
        if !failures.is_empty() {
            text.push_str("The following checks FAILED:\n");
            for r in &failures {
                text.push_str(&format!("  - {}: {}\n", r.check, r.message));
            }
            text.push('\n');
        }
        if !warnings.is_empty() {
            text.push_str("The following checks reported warnings:\n");
            for r in &warnings {
                text.push_str(&format!("  - {}: {}\n", r.check, r.message));
            }
            text.push('\n');
        }
        text.push_str(
            "Please advise. The full report and recent logs are attached (the\n\
             folder this message came from).\n",
        );
    }
    text
}

/// A check name reduced to a safe file stem.
fn sanitize(check: &str) -> String {
    check
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}
