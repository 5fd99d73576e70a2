use std::process::ExitCode;

use clap::Parser;
use console::style;
use tracing::{error, warn};

use edge_doctor::checks::Status;
use edge_doctor::cli::Cli;
use edge_doctor::diagnose::{Orchestrator, RunOutcome};
use edge_doctor::inventory::Inventory;
use edge_doctor::{logging, report, Result};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = logging::init_logging(cli.effective_log_level(), cli.verbose);

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(%e, "fatal error");
            eprintln!("{} {e}", style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}

/// Run diagnostics for every requested host. Returns whether all runs
/// were healthy.
async fn run(cli: &Cli) -> Result<bool> {
    let inventory = Inventory::load(&cli.inventory)?;

    // Resolve every host before touching the network so a typo in the
    // last host name does not waste the whole run.
    let mut targets = Vec::with_capacity(cli.hosts.len());
    for name in &cli.hosts {
        targets.push(inventory.target(name)?);
    }

    let categories = cli.categories();
    let orchestrator = Orchestrator::new();
    let mut outcomes = Vec::with_capacity(targets.len());

    for (target, host) in &targets {
        if !cli.json_output {
            println!(
                "\n{} {}",
                style("Diagnosing").bold(),
                style(&target.name).cyan().bold()
            );
        }

        let outcome = orchestrator.run(target, host, &categories).await;

        if !cli.json_output {
            print_outcome(&outcome);
        }
        if !cli.no_report {
            match report::write_report(&cli.reports_dir, &outcome) {
                Ok(bundle) => {
                    if !cli.json_output {
                        println!("  report: {}", style(bundle.display()).dim());
                    }
                }
                // A run is still useful when the report cannot be written.
                Err(e) => warn!(target = %target.name, %e, "could not write report"),
            }
        }
        outcomes.push(outcome);
    }

    if cli.json_output {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    }

    Ok(outcomes.iter().all(|o| o.overall_success))
}

fn print_outcome(outcome: &RunOutcome) {
    for result in &outcome.results {
        let tag = match result.status {
            Status::Ok => style("  ok").green(),
            Status::Warn => style("warn").yellow().bold(),
            Status::Fail => style("FAIL").red().bold(),
        };
        println!("  [{tag}] {}: {}", style(&result.check).bold(), result.message);
    }

    let verdict = if outcome.overall_success {
        style("healthy").green().bold()
    } else {
        style("problems detected").red().bold()
    };
    println!("  {} is {verdict}", outcome.target);
}
