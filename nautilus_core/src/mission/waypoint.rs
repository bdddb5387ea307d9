// nautilus_core/src/mission/waypoint.rs

use crate::gateway::{SpeedControl, ZControl};
use crate::types::GeoPoint;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a waypoint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointSource {
    Gui,
    Live,
    PlanDb,
    AlgaeFollow,
}

impl WaypointSource {
    /// The sources gated by an enable flag.
    pub const STREAMS: [WaypointSource; 3] = [
        WaypointSource::Gui,
        WaypointSource::Live,
        WaypointSource::AlgaeFollow,
    ];

    pub fn is_stream(self) -> bool {
        !matches!(self, WaypointSource::PlanDb)
    }
}

/// What to do once a waypoint is reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WaypointTask {
    #[default]
    Goto,
    /// Run the panoramic inspection for `duration` seconds before moving on.
    Inspect { duration: f64 },
}

/// A target as it arrives on the wire: either local metres or lat/lon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Local { x: f64, y: f64 },
    Geo { lat: f64, lon: f64 },
}

impl Target {
    pub fn geo(&self) -> Option<GeoPoint> {
        match self {
            Target::Geo { lat, lon } => Some(GeoPoint::new(*lat, *lon)),
            Target::Local { .. } => None,
        }
    }
}

/// A waypoint as pushed by the GUI, the live link or the algae follower,
/// before it has been resolved into the local frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointSpec {
    pub id: String,
    pub target: Target,
    #[serde(default)]
    pub tolerance: Option<f64>,
    #[serde(default = "default_z_control")]
    pub z_control: ZControl,
    #[serde(default = "default_speed_control")]
    pub speed_control: SpeedControl,
    #[serde(default)]
    pub task: WaypointTask,
}

fn default_z_control() -> ZControl {
    ZControl::Depth(0.0)
}

fn default_speed_control() -> SpeedControl {
    SpeedControl::None
}

/// A resolved waypoint. Immutable once it is in a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub id: String,
    pub target: Point2<f64>,
    /// Goal tolerance requested by whoever sent the waypoint, in metres.
    pub tolerance: f64,
    pub z_control: ZControl,
    pub speed_control: SpeedControl,
    pub task: WaypointTask,
    pub source: WaypointSource,
    /// Maneuver-specific data carried along from the plan (sample flags etc.).
    pub extra: BTreeMap<String, String>,
}

/// Tolerances used by [`Waypoint::is_too_similar_to`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub z: f64,
    pub rpm: f64,
    pub speed: f64,
}

impl Waypoint {
    pub fn is_finite(&self) -> bool {
        self.target.x.is_finite() && self.target.y.is_finite() && self.tolerance.is_finite()
    }

    /// Two waypoints are "the same" when their control modes match and the
    /// horizontal position, vertical setpoint and speed setpoint are all
    /// within tolerance. Streamed waypoints that repeat the current target
    /// are dropped using this test.
    pub fn is_too_similar_to(&self, other: &Waypoint, tol: &Similarity) -> bool {
        let z_close = match (self.z_control, other.z_control) {
            (ZControl::None, ZControl::None) => true,
            (ZControl::Depth(a), ZControl::Depth(b))
            | (ZControl::Altitude(a), ZControl::Altitude(b)) => (a - b).abs() < tol.z,
            _ => return false,
        };
        let speed_close = match (self.speed_control, other.speed_control) {
            (SpeedControl::None, SpeedControl::None) => true,
            (SpeedControl::Rpm(a), SpeedControl::Rpm(b)) => (a - b).abs() < tol.rpm,
            (SpeedControl::Speed(a), SpeedControl::Speed(b)) => (a - b).abs() < tol.speed,
            _ => return false,
        };
        let xy_tolerance = self.tolerance.min(other.tolerance);
        let xy_close = (self.target - other.target).norm() < xy_tolerance;

        xy_close && z_close && speed_close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wp(x: f64, z: ZControl, speed: SpeedControl) -> Waypoint {
        Waypoint {
            id: "wp".into(),
            target: Point2::new(x, 0.0),
            tolerance: 2.0,
            z_control: z,
            speed_control: speed,
            task: WaypointTask::Goto,
            source: WaypointSource::Live,
            extra: BTreeMap::new(),
        }
    }

    const TOL: Similarity = Similarity {
        z: 0.6,
        rpm: 50.0,
        speed: 0.1,
    };

    #[test]
    fn near_duplicates_are_similar() {
        let a = wp(0.0, ZControl::Depth(2.0), SpeedControl::Rpm(1000.0));
        let b = wp(1.0, ZControl::Depth(2.3), SpeedControl::Rpm(1030.0));
        assert!(a.is_too_similar_to(&b, &TOL));
    }

    #[test]
    fn different_modes_are_never_similar() {
        let a = wp(0.0, ZControl::Depth(2.0), SpeedControl::Rpm(1000.0));
        let b = wp(0.0, ZControl::Altitude(2.0), SpeedControl::Rpm(1000.0));
        assert!(!a.is_too_similar_to(&b, &TOL));
        let c = wp(0.0, ZControl::Depth(2.0), SpeedControl::Speed(1.0));
        assert!(!a.is_too_similar_to(&c, &TOL));
    }

    #[test]
    fn distant_targets_differ() {
        let a = wp(0.0, ZControl::Depth(2.0), SpeedControl::Speed(1.0));
        let b = wp(2.5, ZControl::Depth(2.0), SpeedControl::Speed(1.0));
        assert!(!a.is_too_similar_to(&b, &TOL));
    }
}
