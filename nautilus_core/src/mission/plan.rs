// nautilus_core/src/mission/plan.rs

use super::waypoint::{Waypoint, WaypointSource};
use crate::error::PlanError;
use crate::types::Timestamp;
use serde::Serialize;
use std::collections::HashSet;

/// Lifecycle of the active plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    /// Received but not started.
    Idle,
    Running,
    Paused,
    /// Every waypoint has been visited.
    Complete,
}

/// An ordered, validated list of waypoints and the progress through it.
///
/// Waypoints are never edited after construction. Progress is an index into
/// the list; the waypoint at the index is the head.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionPlan {
    plan_id: String,
    source: WaypointSource,
    waypoints: Vec<Waypoint>,
    index: usize,
    state: PlanState,
    /// Set once the vehicle has reached the head and cleared on advance.
    head_arrived: bool,
    received_at: Timestamp,
}

impl MissionPlan {
    /// Validates and wraps `waypoints`. An empty list, a non-finite target or
    /// a repeated id is a plan inconsistency.
    pub fn new(
        plan_id: impl Into<String>,
        source: WaypointSource,
        waypoints: Vec<Waypoint>,
        received_at: Timestamp,
    ) -> Result<Self, PlanError> {
        let plan_id = plan_id.into();
        if waypoints.is_empty() {
            return Err(PlanError::Empty(plan_id));
        }
        let mut seen = HashSet::new();
        for wp in &waypoints {
            if !wp.is_finite() {
                return Err(PlanError::NonFiniteTarget(wp.id.clone()));
            }
            if !seen.insert(wp.id.as_str()) {
                return Err(PlanError::DuplicateId(wp.id.clone()));
            }
        }
        Ok(Self {
            plan_id,
            source,
            waypoints,
            index: 0,
            state: PlanState::Idle,
            head_arrived: false,
            received_at,
        })
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn source(&self) -> WaypointSource {
        self.source
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn state(&self) -> PlanState {
        self.state
    }

    pub fn received_at(&self) -> Timestamp {
        self.received_at
    }

    /// Index of the head waypoint and the plan length.
    pub fn progress(&self) -> (usize, usize) {
        (self.index, self.waypoints.len())
    }

    pub fn head(&self) -> Option<&Waypoint> {
        self.waypoints.get(self.index)
    }

    /// The waypoint completed just before the head.
    pub fn previous(&self) -> Option<&Waypoint> {
        self.index.checked_sub(1).and_then(|i| self.waypoints.get(i))
    }

    pub fn head_arrived(&self) -> bool {
        self.head_arrived
    }

    pub fn mark_arrived(&mut self) {
        self.head_arrived = true;
    }

    pub fn is_running(&self) -> bool {
        self.state == PlanState::Running
    }

    pub fn is_complete(&self) -> bool {
        self.state == PlanState::Complete
    }

    /// Dequeues the head and returns it. Marks the plan complete when the
    /// last waypoint is dequeued.
    pub fn advance(&mut self) -> Option<&Waypoint> {
        if self.index >= self.waypoints.len() {
            return None;
        }
        self.index += 1;
        self.head_arrived = false;
        if self.index == self.waypoints.len() {
            self.state = PlanState::Complete;
        }
        self.waypoints.get(self.index - 1)
    }

    /// Starts or resumes the plan. A complete plan restarts from its first
    /// waypoint.
    pub fn start(&mut self) {
        if self.state == PlanState::Complete {
            self.index = 0;
            self.head_arrived = false;
        }
        self.state = PlanState::Running;
    }

    pub fn pause(&mut self) -> bool {
        if self.state == PlanState::Running {
            self.state = PlanState::Paused;
            true
        } else {
            false
        }
    }

    pub fn resume(&mut self) -> bool {
        if self.state == PlanState::Paused {
            self.state = PlanState::Running;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{SpeedControl, ZControl};
    use crate::mission::waypoint::WaypointTask;
    use nalgebra::Point2;
    use std::collections::BTreeMap;

    fn wp(id: &str, x: f64) -> Waypoint {
        Waypoint {
            id: id.into(),
            target: Point2::new(x, 0.0),
            tolerance: 2.0,
            z_control: ZControl::Depth(1.0),
            speed_control: SpeedControl::None,
            task: WaypointTask::Goto,
            source: WaypointSource::PlanDb,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn empty_plan_is_rejected() {
        assert_eq!(
            MissionPlan::new("p", WaypointSource::PlanDb, vec![], 0.0),
            Err(PlanError::Empty("p".into()))
        );
    }

    #[test]
    fn duplicate_and_non_finite_waypoints_are_rejected() {
        let dup = vec![wp("a", 0.0), wp("a", 5.0)];
        assert_eq!(
            MissionPlan::new("p", WaypointSource::PlanDb, dup, 0.0),
            Err(PlanError::DuplicateId("a".into()))
        );
        let nan = vec![wp("a", f64::NAN)];
        assert_eq!(
            MissionPlan::new("p", WaypointSource::PlanDb, nan, 0.0),
            Err(PlanError::NonFiniteTarget("a".into()))
        );
    }

    #[test]
    fn advancing_walks_the_list_and_completes() {
        let mut plan =
            MissionPlan::new("p", WaypointSource::PlanDb, vec![wp("a", 0.0), wp("b", 1.0)], 0.0)
                .unwrap();
        plan.start();
        assert_eq!(plan.head().map(|w| w.id.as_str()), Some("a"));
        plan.mark_arrived();
        assert_eq!(plan.advance().map(|w| w.id.clone()), Some("a".into()));
        assert!(!plan.head_arrived());
        assert_eq!(plan.previous().map(|w| w.id.as_str()), Some("a"));
        assert_eq!(plan.advance().map(|w| w.id.clone()), Some("b".into()));
        assert!(plan.is_complete());
        assert!(plan.head().is_none());
        assert!(plan.advance().is_none());
    }

    #[test]
    fn pause_and_resume_only_from_matching_states() {
        let mut plan =
            MissionPlan::new("p", WaypointSource::Gui, vec![wp("a", 0.0)], 0.0).unwrap();
        assert!(!plan.pause());
        plan.start();
        assert!(plan.pause());
        assert!(!plan.is_running());
        assert!(plan.resume());
        assert!(plan.is_running());
    }

    #[test]
    fn starting_a_complete_plan_restarts_it() {
        let mut plan =
            MissionPlan::new("p", WaypointSource::Gui, vec![wp("a", 0.0)], 0.0).unwrap();
        plan.start();
        plan.advance();
        assert!(plan.is_complete());
        plan.start();
        assert_eq!(plan.progress(), (0, 1));
        assert!(plan.is_running());
    }
}
