// nautilus_core/src/mission/plandb.rs

//! The plan-database message sent by the operator console, and its
//! expansion into resolved waypoints.

use super::coverage;
use super::waypoint::{Waypoint, WaypointSource, WaypointTask};
use crate::gateway::{SpeedControl, ZControl};
use crate::geo::LocalFrame;
use crate::types::GeoPoint;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDbMessage {
    pub plan_id: String,
    #[serde(default)]
    pub maneuvers: Vec<Maneuver>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManeuverKind {
    Goto,
    /// A goto that also fires the water samplers on arrival.
    Sample,
    /// Cover the polygon with a lawnmower pattern.
    CoverArea,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZUnits {
    None,
    #[default]
    Depth,
    Altitude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedUnits {
    #[default]
    None,
    Rpm,
    Mps,
}

/// One maneuver of a plan. Positions are geodetic, in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maneuver {
    pub kind: ManeuverKind,
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub z_units: ZUnits,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub speed_units: SpeedUnits,
    /// Sample maneuvers only.
    #[serde(default)]
    pub syringes: [bool; 3],
    /// CoverArea maneuvers only.
    #[serde(default)]
    pub polygon: Vec<GeoPoint>,
}

impl Maneuver {
    fn z_control(&self) -> ZControl {
        match self.z_units {
            ZUnits::Depth => ZControl::Depth(self.z),
            ZUnits::Altitude => ZControl::Altitude(self.z),
            ZUnits::None => {
                warn!(maneuver = %self.id, "z control is neither depth nor altitude, using depth 0");
                ZControl::Depth(0.0)
            }
        }
    }

    fn speed_control(&self) -> SpeedControl {
        match self.speed_units {
            SpeedUnits::Rpm => SpeedControl::Rpm(self.speed),
            SpeedUnits::Mps => SpeedControl::Speed(self.speed),
            SpeedUnits::None => {
                warn!(maneuver = %self.id, "speed control of the waypoint is none");
                SpeedControl::None
            }
        }
    }

    fn waypoint(&self, id: String, target: Point2<f64>, tolerance: f64) -> Waypoint {
        Waypoint {
            id,
            target,
            tolerance,
            z_control: self.z_control(),
            speed_control: self.speed_control(),
            task: WaypointTask::Goto,
            source: WaypointSource::PlanDb,
            extra: BTreeMap::new(),
        }
    }
}

/// Settings used when expanding maneuvers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expansion {
    pub default_tolerance: f64,
    pub coverage_swath: Option<f64>,
    /// Localization error growth per metre travelled.
    pub error_per_metre: f64,
}

/// Turns every supported maneuver into waypoints in the local frame.
/// Unsupported maneuvers and CoverArea without a swath are skipped.
pub fn expand(msg: &PlanDbMessage, frame: &LocalFrame, opts: &Expansion) -> Vec<Waypoint> {
    if msg.maneuvers.is_empty() {
        warn!(plan = %msg.plan_id, "plan contains no maneuvers");
    }
    let mut waypoints = Vec::new();
    for man in &msg.maneuvers {
        let anchor = GeoPoint::new(man.lat, man.lon);
        if !anchor.is_finite() {
            warn!(maneuver = %man.id, "non-finite position, skipping maneuver");
            continue;
        }
        let local = frame.to_local(&anchor);
        match man.kind {
            ManeuverKind::Goto => {
                waypoints.push(man.waypoint(man.id.clone(), local, opts.default_tolerance));
            }
            ManeuverKind::Sample => {
                let mut wp = man.waypoint(man.id.clone(), local, opts.default_tolerance);
                for (i, fire) in man.syringes.iter().enumerate() {
                    wp.extra.insert(format!("syringe{i}"), fire.to_string());
                }
                waypoints.push(wp);
            }
            ManeuverKind::CoverArea => {
                let Some(swath) = opts.coverage_swath else {
                    info!(maneuver = %man.id, "no coverage swath configured, skipping CoverArea");
                    continue;
                };
                // The anchor point is the first polygon vertex.
                let mut polygon = vec![local];
                let points = if man.polygon.len() > 2 {
                    polygon.extend(man.polygon.iter().map(|v| frame.to_local(v)));
                    coverage::lawnmower(&polygon, swath, opts.error_per_metre)
                } else {
                    info!(maneuver = %man.id, "polygon has too few vertices, using it as a waypoint");
                    polygon
                };
                let n = points.len();
                for (i, point) in points.into_iter().enumerate() {
                    let name = format!("{}_{}/{}", man.id, i + 1, n);
                    let mut wp = man.waypoint(name, point, opts.default_tolerance);
                    wp.extra.insert("cover_area".into(), man.id.clone());
                    waypoints.push(wp);
                }
            }
            ManeuverKind::Unsupported => {
                warn!(maneuver = %man.id, "skipping unsupported maneuver");
            }
        }
    }
    waypoints
}
