//! SSH health diagnostics for edge devices.
//!
//! edge-doctor connects to hosts declared in an inventory file, bootstraps
//! key-based trust on first contact, runs a fixed battery of read-only
//! diagnostic probes over the session, and produces a per-host outcome:
//!
//! - [`ssh`] — session establishment with credential fallback, command
//!   execution, key provisioning, and SFTP transfer
//! - [`checks`] — the probe registry and the built-in probe set
//! - [`diagnose`] — the per-target orchestrator and [`diagnose::RunOutcome`]
//! - [`inventory`] — `inventory.yaml` loading and target resolution
//! - [`report`] — on-disk report bundles for non-technical operators

pub mod checks;
pub mod cli;
pub mod diagnose;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod report;
pub mod ssh;

pub use error::{Error, Result};
