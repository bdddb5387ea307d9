// nautilus_sim/src/main.rs

//! Runs one scenario headless and prints a summary.
//!
//! `cargo run -p nautilus_sim -- --scenario assets/scenarios/01_leak_during_survey.toml`

use clap::Parser;
use nautilus_sim::prelude::*;
use std::error::Error;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "simulation failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let mut scenario = load_scenario(&cli.scenario)?;
    if let Some(duration) = cli.duration {
        scenario.simulation.duration_seconds = duration;
    }
    if let Some(seed) = cli.seed {
        scenario.simulation.seed = Some(seed);
    }
    if cli.print_config {
        scenario.validate()?;
        println!("{}", toml::to_string_pretty(&scenario.executor)?);
        return Ok(());
    }

    let catalog = MissionCatalog::load(&cli.missions);
    let mut sim = Simulation::new(scenario, catalog)?;
    let summary = sim.run();
    println!("{summary}");
    Ok(())
}
