//! Command-line interface definition.

use std::path::PathBuf;

use clap::Parser;

use crate::checks::Category;

#[derive(Debug, Parser)]
#[command(
    name = "edge-doctor",
    version,
    about = "SSH health diagnostics for edge devices",
    long_about = "Connects to edge devices listed in the inventory, runs a battery of \
                  health checks over SSH, and writes a report bundle per host."
)]
pub struct Cli {
    /// Host name(s) from the inventory to diagnose. Repeatable.
    #[arg(short = 'H', long = "host", required = true)]
    pub hosts: Vec<String>,

    /// Check categories to run. Defaults to all of them.
    #[arg(short = 'c', long = "check", value_enum)]
    pub checks: Vec<Category>,

    /// Path to the inventory file.
    #[arg(short, long, default_value = "inventory.yaml")]
    pub inventory: PathBuf,

    /// Print outcomes as JSON to stdout instead of the styled summary.
    #[arg(long)]
    pub json_output: bool,

    /// Log at debug level and mirror logs to stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// Skip writing report bundles to disk.
    #[arg(long)]
    pub no_report: bool,

    /// Directory report bundles are written under.
    #[arg(long, default_value = "reports")]
    pub reports_dir: PathBuf,

    /// Log level when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// The effective log level: `--verbose` overrides `--log-level`.
    pub fn effective_log_level(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }

    /// The categories to run, deduplicated and in execution order. An
    /// empty `--check` list means everything.
    pub fn categories(&self) -> Vec<Category> {
        if self.checks.is_empty() {
            return Category::ALL.to_vec();
        }
        Category::ALL
            .into_iter()
            .filter(|c| self.checks.contains(c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("edge-doctor").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn host_is_required() {
        assert!(Cli::try_parse_from(["edge-doctor"]).is_err());
    }

    #[test]
    fn hosts_accumulate() {
        let cli = cli_with(&["-H", "edge-1", "--host", "edge-2"]);
        assert_eq!(cli.hosts, vec!["edge-1", "edge-2"]);
    }

    #[test]
    fn no_checks_means_all_categories() {
        let cli = cli_with(&["-H", "edge-1"]);
        assert_eq!(cli.categories(), Category::ALL.to_vec());
    }

    #[test]
    fn requested_categories_run_in_fixed_order() {
        // Listed out of order and with a duplicate; execution order wins.
        let cli = cli_with(&["-H", "edge-1", "-c", "services", "-c", "system", "-c", "services"]);
        assert_eq!(cli.categories(), vec![Category::System, Category::Services]);
    }

    #[test]
    fn defaults() {
        let cli = cli_with(&["-H", "edge-1"]);
        assert_eq!(cli.inventory, PathBuf::from("inventory.yaml"));
        assert_eq!(cli.reports_dir, PathBuf::from("reports"));
        assert_eq!(cli.log_level, "info");
        assert!(!cli.json_output);
        assert!(!cli.no_report);
    }

    #[test]
    fn verbose_overrides_log_level() {
        let cli = cli_with(&["-H", "edge-1", "--log-level", "warn", "-v"]);
        assert_eq!(cli.effective_log_level(), "debug");
        let cli = cli_with(&["-H", "edge-1", "--log-level", "warn"]);
        assert_eq!(cli.effective_log_level(), "warn");
    }
}
