// nautilus_core/src/error.rs

use crate::blackboard::Field;
use crate::gateway::{ActionKind, GoalId};
use crate::mission::WaypointSource;
use crate::types::Timestamp;
use serde::Serialize;
use thiserror::Error;

/// The error classes the executor distinguishes at runtime. These are not
/// returned from `tick`; they tag log events and the published state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FaultClass {
    /// A reading is older than its freshness window and is treated as unknown.
    SensorStale,
    /// Leak, depth or altitude violation. Suppresses every other action.
    SafetyFault,
    /// An external action reported failure; handled by the tree.
    ActionFailure,
    /// The plan is empty or contradictory.
    PlanInconsistency,
    /// The emergency trial budget is spent. Terminal until an external reset.
    EmergencyExhausted,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("`{field}` must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("`{field}` must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },
    #[error("absolute_min_altitude ({absolute}) must not exceed min_altitude ({min})")]
    AltitudeBoundsInverted { absolute: f64, min: f64 },
    #[error("topic `{0}` must not be empty")]
    EmptyTopic(&'static str),
    #[error("geo_origin latitude {0} is outside [-90, 90]")]
    BadOrigin(f64),
}

#[derive(Debug, Error, PartialEq)]
pub enum BlackboardError {
    #[error("out-of-order update for {field:?}: stored stamp {stored}, received {received}")]
    OutOfOrder {
        field: Field,
        stored: Timestamp,
        received: Timestamp,
    },
    #[error("non-finite value for {0:?}")]
    NonFinite(Field),
}

#[derive(Debug, Error, PartialEq)]
pub enum GatewayError {
    #[error("action server for {kind:?} refused goal {id:?}: {reason}")]
    Refused {
        kind: ActionKind,
        id: GoalId,
        reason: String,
    },
    #[error("action server for {0:?} is not connected")]
    Unavailable(ActionKind),
    #[error("unknown goal {0:?}")]
    UnknownGoal(GoalId),
}

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("plan `{0}` contains no actionable waypoints")]
    Empty(String),
    #[error("waypoint `{0}` has a non-finite target")]
    NonFiniteTarget(String),
    #[error("waypoint id `{0}` appears more than once")]
    DuplicateId(String),
    #[error("waypoint `{0}` is geodetic but no local origin is known yet")]
    NoOrigin(String),
    #[error("{0:?} waypoints rejected: source is not enabled")]
    SourceNotEnabled(WaypointSource),
    #[error("{0:?} is not a streamed waypoint source")]
    NotAStream(WaypointSource),
}

impl PlanError {
    pub fn class(&self) -> FaultClass {
        FaultClass::PlanInconsistency
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {0} referenced as a child but never declared")]
    DanglingChild(usize),
    #[error("node {0} has more than one parent")]
    SharedChild(usize),
    #[error("composite `{0}` has no children")]
    EmptyComposite(String),
    #[error("parallel `{name}` thresholds ({success}/{failure}) exceed its {children} children")]
    BadThreshold {
        name: String,
        success: usize,
        failure: usize,
        children: usize,
    },
    #[error("root node {0} is a child of another node")]
    RootHasParent(usize),
    #[error("tree has no root")]
    NoRoot,
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("malformed behavior tree: {0}")]
    Tree(#[from] TreeError),
    #[error("action gateway: {0}")]
    Gateway(#[from] GatewayError),
    #[error("mission plan: {0}")]
    Plan(#[from] PlanError),
    #[error("blackboard: {0}")]
    Blackboard(#[from] BlackboardError),
}
