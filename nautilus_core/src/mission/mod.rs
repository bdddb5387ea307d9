// nautilus_core/src/mission/mod.rs

//! Waypoints, mission plans and the manager that arbitrates their sources.

pub mod coverage;
pub mod manager;
pub mod plan;
pub mod plandb;
pub mod waypoint;

pub use manager::{MissionEvent, MissionPlanManager, PushOutcome};
pub use plan::{MissionPlan, PlanState};
pub use plandb::{Maneuver, ManeuverKind, PlanDbMessage, SpeedUnits, ZUnits};
pub use waypoint::{Similarity, Target, Waypoint, WaypointSource, WaypointSpec, WaypointTask};
