// nautilus_sim/src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// Nautilus: a headless closed-loop simulator for the AUV mission executor.
///
/// Plays the vehicle, its sensors, a leader vehicle and the action servers
/// against the executor at its fixed tick rate.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(short, long, default_value = "assets/scenarios/00_gui_survey.toml")]
    pub scenario: PathBuf,

    /// Directory holding the mission catalog.
    #[arg(short, long, default_value = "assets/missions")]
    pub missions: PathBuf,

    /// Override the scenario duration, in seconds.
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Override the scenario seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the resolved executor configuration and exit.
    #[arg(long, default_value_t = false)]
    pub print_config: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
