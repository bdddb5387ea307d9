// nautilus_sim/src/simulation/config/structs.rs

use nautilus_core::config::ExecutorConfig;
use nautilus_core::messages::MissionCommand;
use nautilus_core::mission::WaypointSource;
use serde::{Deserialize, Serialize};

use super::ScenarioError;

// =========================================================================
// == Top-Level Scenario ==
// =========================================================================

/// # ScenarioConfig
/// The root of the data parsed from a `scenario.toml` file. Every section is
/// optional; the executor section is resolved on top of its compiled
/// defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub world: World,
    #[serde(default)]
    pub vehicle: VehicleConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    /// The vehicle to follow, if the scenario has one.
    #[serde(default)]
    pub leader: Option<LeaderTrack>,
    #[serde(default)]
    pub servers: ServerConfig,
    /// `[[events]]` entries, in any order.
    #[serde(default)]
    pub events: Vec<ScriptedEvent>,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let sim = &self.simulation;
        if !(sim.duration_seconds.is_finite() && sim.duration_seconds > 0.0) {
            return Err(ScenarioError::Invalid(format!(
                "duration_seconds must be positive, got {}",
                sim.duration_seconds
            )));
        }
        if !(self.world.seabed_depth > 0.0) {
            return Err(ScenarioError::Invalid("seabed_depth must be positive".into()));
        }
        let v = &self.vehicle;
        for (name, value) in [
            ("max_speed", v.max_speed),
            ("turn_rate_deg", v.turn_rate_deg),
            ("dive_rate", v.dive_rate),
            ("rpm_per_mps", v.rpm_per_mps),
            ("gps_rate", self.sensors.gps_rate),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ScenarioError::Invalid(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        let s = &self.sensors;
        for (name, value) in [
            ("position_stddev", s.position_stddev),
            ("depth_stddev", s.depth_stddev),
            ("altitude_stddev", s.altitude_stddev),
            ("heading_stddev_deg", s.heading_stddev_deg),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ScenarioError::Invalid(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        for (name, p) in [
            ("goto_failure_probability", self.servers.goto_failure_probability),
            (
                "emergency_failure_probability",
                self.servers.emergency_failure_probability,
            ),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ScenarioError::Invalid(format!(
                    "{name} must be in [0, 1], got {p}"
                )));
            }
        }
        if let Some(e) = self.events.iter().find(|e| !(e.at.is_finite() && e.at >= 0.0)) {
            return Err(ScenarioError::Invalid(format!(
                "event time must be non-negative, got {}",
                e.at
            )));
        }
        self.executor.validate()?;
        Ok(())
    }
}

// =========================================================================
// == Configuration Sub-Structs ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSettings {
    /// Optional seed for the pseudo-random number generator for determinism.
    pub seed: Option<u64>,
    /// Duration of the simulation in seconds.
    pub duration_seconds: f64,
    /// End the run as soon as a mission completes.
    pub stop_on_complete: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            seed: None,
            duration_seconds: 600.0,
            stop_on_complete: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct World {
    /// Flat seabed depth in metres.
    pub seabed_depth: f64,
}

impl Default for World {
    fn default() -> Self {
        Self { seabed_depth: 20.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VehicleConfig {
    /// Start pose as `[x, y, yaw_deg]` in the local frame.
    pub start: [f64; 3],
    pub start_depth: f64,
    /// Cruise speed in m/s, also used when a goal leaves speed open.
    pub max_speed: f64,
    pub turn_rate_deg: f64,
    /// Vertical speed in m/s.
    pub dive_rate: f64,
    /// Propeller RPM per m/s of forward speed.
    pub rpm_per_mps: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            start: [0.0, 0.0, 0.0],
            start_depth: 0.0,
            max_speed: 1.5,
            turn_rate_deg: 30.0,
            dive_rate: 0.3,
            rpm_per_mps: 800.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorConfig {
    pub position_stddev: f64,
    pub depth_stddev: f64,
    pub altitude_stddev: f64,
    pub heading_stddev_deg: f64,
    /// GPS fixes are only available above this depth.
    pub gps_max_depth: f64,
    pub gps_rate: f64,
    /// Reported horizontal accuracy of a fix, in metres.
    pub gps_accuracy: f64,
    /// Bottom-lock range of the DVL.
    pub dvl_max_range: f64,
    /// Time from power-on to bottom lock.
    pub dvl_lock_delay: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            position_stddev: 0.2,
            depth_stddev: 0.02,
            altitude_stddev: 0.1,
            heading_stddev_deg: 1.0,
            gps_max_depth: 0.3,
            gps_rate: 1.0,
            gps_accuracy: 2.5,
            dvl_max_range: 40.0,
            dvl_lock_delay: 2.0,
        }
    }
}

/// Ground-truth motion of the leader vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "track", rename_all = "snake_case", deny_unknown_fields)]
pub enum LeaderTrack {
    Straight { start: [f64; 2], velocity: [f64; 2] },
    Circle {
        center: [f64; 2],
        radius: f64,
        /// Along-track speed in m/s.
        speed: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Chance that a goto goal is aborted by the server right after acceptance.
    pub goto_failure_probability: f64,
    pub emergency_failure_probability: f64,
    /// Depth at which the emergency-surface action reports success.
    pub surfaced_depth: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            goto_failure_probability: 0.0,
            emergency_failure_probability: 0.0,
            surfaced_depth: 0.2,
        }
    }
}

/// Something the operator or the environment does at a fixed time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedEvent {
    /// Simulation time in seconds.
    pub at: f64,
    pub action: EventAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventAction {
    Leak { active: bool },
    EnableSource { source: WaypointSource, enabled: bool },
    /// Stream the waypoints of a catalog mission from `source`.
    PushWaypoints { source: WaypointSource, mission: String },
    /// Send the plan-db message of a catalog mission.
    LoadPlan { mission: String },
    Abort,
    SafetyReset,
    Mission { command: MissionCommand },
    /// Toggle the ground-link heartbeat.
    GroundLink { active: bool },
    /// Toggle a navigation outage: no position or attitude while active.
    NavDropout { active: bool },
}

impl EventAction {
    /// The catalog key this event needs, if any.
    pub fn mission_key(&self) -> Option<&str> {
        match self {
            EventAction::PushWaypoints { mission, .. } | EventAction::LoadPlan { mission } => {
                Some(mission)
            }
            _ => None,
        }
    }
}
