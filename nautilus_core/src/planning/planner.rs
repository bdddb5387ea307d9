// nautilus_core/src/planning/planner.rs

use super::dubins::{DubinsPath, DubinsWord};
use crate::config::NavigationConfig;
use crate::mission::Waypoint;
use crate::types::{bearing, Pose2D};
use nalgebra::Point2;
use serde::Serialize;
use tracing::debug;

/// How much the navigation solution can be trusted for this leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavQuality {
    Nominal,
    /// No DVL bottom lock; dead reckoning drifts faster.
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegShape {
    Dubins(DubinsWord),
    Straight,
}

/// The plan for the current leg. The goal pose goes to the goto action;
/// the sampled path is only published for visualisation and used to
/// measure cross-track error.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLeg {
    pub waypoint_id: String,
    pub goal: Pose2D,
    pub path: Vec<Point2<f64>>,
    pub shape: LegShape,
    pub quality: NavQuality,
}

#[derive(Debug)]
pub struct PathPlanner {
    config: NavigationConfig,
}

impl PathPlanner {
    pub fn new(config: &NavigationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Plans the leg from `pose` to `waypoint`.
    ///
    /// The arrival heading is the bearing of the leg from `previous` (the
    /// waypoint completed before this one) or from the vehicle if there is
    /// none. Without DVL the leg is a straight line.
    pub fn plan_leg(
        &self,
        pose: &Pose2D,
        waypoint: &Waypoint,
        previous: Option<&Point2<f64>>,
        dvl_available: bool,
    ) -> PlannedLeg {
        let from = previous
            .filter(|p| (waypoint.target - **p).norm() > f64::EPSILON)
            .copied()
            .unwrap_or(pose.position);
        let yaw = if (waypoint.target - from).norm() > f64::EPSILON {
            bearing(&from, &waypoint.target)
        } else {
            pose.yaw
        };
        let goal = Pose2D {
            position: waypoint.target,
            yaw,
        };
        let quality = if dvl_available {
            NavQuality::Nominal
        } else {
            NavQuality::Degraded
        };

        let dubins = (self.config.dubins_compute_path && dvl_available)
            .then(|| DubinsPath::shortest(pose, &goal, self.config.dubins_turning_radius))
            .flatten();
        let (path, shape) = match dubins {
            Some(path) => (
                path.sample_many(self.config.dubins_step_size),
                LegShape::Dubins(path.word()),
            ),
            None => (vec![pose.position, goal.position], LegShape::Straight),
        };
        debug!(
            waypoint = %waypoint.id,
            ?shape,
            ?quality,
            points = path.len(),
            "planned leg"
        );
        PlannedLeg {
            waypoint_id: waypoint.id.clone(),
            goal,
            path,
            shape,
            quality,
        }
    }

    /// Whether `leg` must be recomputed: the head changed or the vehicle
    /// strayed further than the intersection radius from the planned path.
    pub fn needs_replan(&self, leg: Option<&PlannedLeg>, waypoint: &Waypoint, position: &Point2<f64>) -> bool {
        let Some(leg) = leg else {
            return true;
        };
        if leg.waypoint_id != waypoint.id || leg.goal.position != waypoint.target {
            return true;
        }
        cross_track_error(&leg.path, position) > self.config.dubins_intersection_radius
    }

    pub fn waypoint_tolerance(&self) -> f64 {
        self.config.waypoint_tolerance
    }

    /// Arrival test: position error within the waypoint tolerance.
    pub fn has_arrived(&self, position: &Point2<f64>, waypoint: &Waypoint) -> bool {
        (waypoint.target - position).norm() <= self.config.waypoint_tolerance
    }
}

/// Distance from `p` to the nearest point of the polyline `path`.
pub fn cross_track_error(path: &[Point2<f64>], p: &Point2<f64>) -> f64 {
    match path {
        [] => f64::INFINITY,
        [only] => (p - only).norm(),
        _ => path
            .windows(2)
            .map(|w| distance_to_segment(p, &w[0], &w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

fn distance_to_segment(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq <= f64::EPSILON {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{SpeedControl, ZControl};
    use crate::mission::{WaypointSource, WaypointTask};
    use approx::assert_abs_diff_eq;
    use std::collections::BTreeMap;
    use std::f64::consts::FRAC_PI_2;

    fn wp(id: &str, x: f64, y: f64) -> Waypoint {
        Waypoint {
            id: id.into(),
            target: Point2::new(x, y),
            tolerance: 2.0,
            z_control: ZControl::Depth(1.0),
            speed_control: SpeedControl::None,
            task: WaypointTask::Goto,
            source: WaypointSource::PlanDb,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn heading_follows_the_previous_leg() {
        let planner = PathPlanner::new(&NavigationConfig::default());
        let pose = Pose2D::new(0.0, 0.0, 0.0);
        let prev = Point2::new(10.0, 0.0);
        let leg = planner.plan_leg(&pose, &wp("b", 10.0, 10.0), Some(&prev), true);
        assert_abs_diff_eq!(leg.goal.yaw, FRAC_PI_2, epsilon = 1e-12);
        assert!(matches!(leg.shape, LegShape::Dubins(_)));
        assert_eq!(leg.quality, NavQuality::Nominal);
        let end = leg.path.last().copied().unwrap();
        assert_abs_diff_eq!(end.x, 10.0, epsilon = 1e-6);
        assert_abs_diff_eq!(end.y, 10.0, epsilon = 1e-6);
    }

    #[test]
    fn first_leg_heads_away_from_the_vehicle() {
        let planner = PathPlanner::new(&NavigationConfig::default());
        let pose = Pose2D::new(0.0, 0.0, 1.0);
        let leg = planner.plan_leg(&pose, &wp("a", 0.0, -5.0), None, true);
        assert_abs_diff_eq!(leg.goal.yaw, -FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn no_dvl_means_straight_and_degraded() {
        let planner = PathPlanner::new(&NavigationConfig::default());
        let leg = planner.plan_leg(&Pose2D::default(), &wp("a", 20.0, 5.0), None, false);
        assert_eq!(leg.shape, LegShape::Straight);
        assert_eq!(leg.quality, NavQuality::Degraded);
        assert_eq!(leg.path.len(), 2);
    }

    #[test]
    fn dubins_can_be_disabled() {
        let planner = PathPlanner::new(&NavigationConfig {
            dubins_compute_path: false,
            ..NavigationConfig::default()
        });
        let leg = planner.plan_leg(&Pose2D::default(), &wp("a", 20.0, 5.0), None, true);
        assert_eq!(leg.shape, LegShape::Straight);
        assert_eq!(leg.quality, NavQuality::Nominal);
    }

    #[test]
    fn replans_on_new_head_or_large_cross_track_error() {
        let planner = PathPlanner::new(&NavigationConfig::default());
        let target = wp("a", 20.0, 0.0);
        let leg = planner.plan_leg(&Pose2D::default(), &target, None, false);
        let on_path = Point2::new(10.0, 1.0);
        let off_path = Point2::new(10.0, 4.0);
        assert!(!planner.needs_replan(Some(&leg), &target, &on_path));
        assert!(planner.needs_replan(Some(&leg), &target, &off_path));
        assert!(planner.needs_replan(Some(&leg), &wp("b", 20.0, 0.0), &on_path));
        assert!(planner.needs_replan(None, &target, &on_path));
    }

    #[test]
    fn arrival_uses_the_waypoint_tolerance() {
        let planner = PathPlanner::new(&NavigationConfig::default());
        let target = wp("a", 0.0, 0.0);
        assert!(planner.has_arrived(&Point2::new(1.5, 0.0), &target));
        assert!(!planner.has_arrived(&Point2::new(1.51, 0.0), &target));
    }

    #[test]
    fn cross_track_error_is_distance_to_the_polyline() {
        let path = [Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(10.0, 10.0)];
        assert_abs_diff_eq!(cross_track_error(&path, &Point2::new(5.0, 2.0)), 2.0);
        assert_abs_diff_eq!(cross_track_error(&path, &Point2::new(12.0, 5.0)), 2.0);
        assert_abs_diff_eq!(cross_track_error(&path, &Point2::new(-3.0, -4.0)), 5.0);
    }
}
