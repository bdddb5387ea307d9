// nautilus_core/src/messages.rs

//! Everything that crosses the executor boundary: inbound sensor and
//! operator messages, and the publications produced each tick.

use crate::dvl::DvlState;
use crate::error::FaultClass;
use crate::gateway::ActionKind;
use crate::mission::{PlanDbMessage, PlanState, WaypointSource, WaypointSpec};
use crate::planning::NavQuality;
use crate::safety::Violation;
use crate::types::{Attitude, GeoPoint, Pose2D, Timestamp};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};

// =========================================================================
// == Inbound ==
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionCommand {
    Start,
    Pause,
    Resume,
    /// Drop the plan entirely.
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundData {
    Position(Point2<f64>),
    Depth(f64),
    Altitude(f64),
    Attitude(Attitude),
    Leak(bool),
    DvlFeedback { locked: bool },
    GpsFix { point: GeoPoint, accuracy: f64 },
    /// Result of the pose lookup of the leader link.
    LeaderPose(Pose2D),
    WaypointPush {
        source: WaypointSource,
        waypoints: Vec<WaypointSpec>,
    },
    EnableSource {
        source: WaypointSource,
        enabled: bool,
    },
    PlanDb(PlanDbMessage),
    Abort,
    MissionControl(MissionCommand),
    SafetyReset,
    GroundHeartbeat,
}

impl InboundData {
    /// Messages that can only have come from the operator side.
    pub fn is_ground_traffic(&self) -> bool {
        matches!(
            self,
            InboundData::WaypointPush { .. }
                | InboundData::EnableSource { .. }
                | InboundData::PlanDb(_)
                | InboundData::Abort
                | InboundData::MissionControl(_)
                | InboundData::SafetyReset
                | InboundData::GroundHeartbeat
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// Measurement or send time on the mission clock.
    pub stamp: Timestamp,
    pub data: InboundData,
}

/// Cloneable, thread-safe handle for feeding the executor.
#[derive(Debug, Clone)]
pub struct InboxSender(Sender<Inbound>);

impl InboxSender {
    /// Returns `false` once the executor has been dropped.
    pub fn send(&self, stamp: Timestamp, data: InboundData) -> bool {
        self.0.send(Inbound { stamp, data }).is_ok()
    }
}

/// The queue between asynchronous producers and the tick. Messages wait
/// here until the next tick drains them.
#[derive(Debug)]
pub struct Inbox {
    tx: Sender<Inbound>,
    rx: Receiver<Inbound>,
}

impl Default for Inbox {
    fn default() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(&self) -> InboxSender {
        InboxSender(self.tx.clone())
    }

    /// Everything queued so far, in arrival order.
    pub fn drain(&self) -> Vec<Inbound> {
        self.rx.try_iter().collect()
    }
}

// =========================================================================
// == Outbound ==
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DvlCommand {
    Start,
    Stop,
}

/// The top-level behavior that drove the last tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    Emergency,
    LeaderFollow,
    Mission,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistressReason {
    EmergencyExhausted,
    SensorLoss,
    /// The emergency-surface action itself keeps failing.
    SurfacingFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanControlState {
    pub behavior: Behavior,
    pub plan_id: Option<String>,
    pub plan_state: Option<PlanState>,
    pub plan_source: Option<WaypointSource>,
    pub enabled_source: Option<WaypointSource>,
    pub waypoint_index: usize,
    pub waypoint_count: usize,
    pub current_waypoint: Option<String>,
    pub violations: Vec<Violation>,
    pub emergency_trials: u32,
    pub gave_up: bool,
    pub faults: Vec<FaultClass>,
    pub active_actions: Vec<ActionKind>,
    pub dvl: DvlState,
    pub nav_quality: Option<NavQuality>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimatedState {
    pub position: Option<Point2<f64>>,
    pub geo: Option<GeoPoint>,
    pub depth: Option<f64>,
    pub altitude: Option<f64>,
    pub attitude: Option<Attitude>,
    pub localization_error: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    PlanControlState(PlanControlState),
    EstimatedState(EstimatedState),
    Heartbeat { seq: u64 },
    LastWaypoint { id: String },
    MissionComplete { plan_id: String },
    PlannedPath {
        waypoint_id: String,
        points: Vec<Point2<f64>>,
        quality: NavQuality,
    },
    Dvl { command: DvlCommand },
    Distress { reason: DistressReason },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Publication {
    /// Fully resolved topic name.
    pub topic: String,
    pub payload: Outbound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_drains_in_arrival_order_from_many_senders() {
        let inbox = Inbox::new();
        let a = inbox.sender();
        let b = a.clone();
        let t = std::thread::spawn(move || b.send(1.0, InboundData::Depth(2.0)));
        assert!(t.join().unwrap());
        a.send(2.0, InboundData::Leak(true));
        let drained = inbox.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].data, InboundData::Leak(true));
        assert!(inbox.drain().is_empty());
    }

    #[test]
    fn operator_messages_count_as_ground_traffic() {
        assert!(InboundData::GroundHeartbeat.is_ground_traffic());
        assert!(InboundData::MissionControl(MissionCommand::Pause).is_ground_traffic());
        assert!(!InboundData::Depth(1.0).is_ground_traffic());
    }
}
