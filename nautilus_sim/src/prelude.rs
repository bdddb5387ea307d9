// nautilus_sim/src/prelude.rs

// Re-export the entire nautilus_core prelude so the executor's types are at hand.
pub use nautilus_core::prelude::*;

// Re-export common simulation-specific types for easy access.
pub use crate::cli::Cli;
pub use crate::simulation::config::{
    load_scenario, EventAction, MissionCatalog, MissionFile, ScenarioConfig, ScenarioError,
    ScriptedEvent,
};
pub use crate::simulation::core::runner::{RunSummary, Simulation};
pub use crate::simulation::plugins::vehicles::auv::{AuvModel, MotionCommand};
