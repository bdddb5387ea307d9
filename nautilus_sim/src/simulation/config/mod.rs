// nautilus_sim/src/simulation/config/mod.rs

//! This module handles loading, resolving, and validating the scenario
//! configuration from disk, including the mission catalog.
//!
//! The executor section is layered: compiled defaults, then the scenario's
//! `[executor]` table, then `NAUTILUS_`-prefixed environment variables
//! (`NAUTILUS_SAFETY__MAX_DEPTH=12` sets `executor.safety.max_depth`).

mod catalog;

pub mod structs;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use nautilus_core::error::ConfigError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

// Re-export public types
pub use catalog::{MissionCatalog, MissionFile};
pub use structs::*;

/// Prefix of the environment overrides for the executor section.
pub const ENV_PREFIX: &str = "NAUTILUS_";

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenario file {0:?} not found")]
    NotFound(PathBuf),
    #[error("failed to resolve scenario: {0}")]
    Parse(#[from] figment::Error),
    #[error("invalid executor config: {0}")]
    Executor(#[from] ConfigError),
    #[error("invalid scenario: {0}")]
    Invalid(String),
    #[error("event at {at}s refers to unknown mission `{key}`")]
    UnknownMission { at: f64, key: String },
}

/// Loads the scenario at `path`, with environment overrides applied.
pub fn load_scenario(path: &Path) -> Result<ScenarioConfig, ScenarioError> {
    resolve(path, ENV_PREFIX)
}

fn resolve(path: &Path, env_prefix: &str) -> Result<ScenarioConfig, ScenarioError> {
    // A missing file would otherwise resolve silently to the defaults.
    if !path.is_file() {
        return Err(ScenarioError::NotFound(path.to_path_buf()));
    }
    info!(?path, "loading scenario");
    let scenario: ScenarioConfig = Figment::from(Serialized::defaults(ScenarioConfig::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed(env_prefix)
                .split("__")
                .map(|key| format!("executor.{key}").into()),
        )
        .extract()?;
    Ok(scenario)
}
