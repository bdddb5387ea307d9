// nautilus_core/src/planning/mod.rs

pub mod dubins;
pub mod planner;

pub use dubins::{DubinsPath, DubinsWord};
pub use planner::{cross_track_error, LegShape, NavQuality, PathPlanner, PlannedLeg};
