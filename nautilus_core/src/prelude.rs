// nautilus_core/src/prelude.rs

// --- The executor and its inputs/outputs ---
pub use crate::executor::{MissionExecutor, TickReport};
pub use crate::messages::{
    Behavior, DistressReason, DvlCommand, InboundData, InboxSender, MissionCommand, Outbound,
    Publication,
};

// --- Configuration & errors ---
pub use crate::config::ExecutorConfig;
pub use crate::error::{ExecutorError, FaultClass};

// --- The action-server seam ---
pub use crate::gateway::{
    ActionClient, ActionGoal, ActionKind, ActionStatus, GoalId, SpeedControl, StatusSender,
    ZControl,
};

// --- Mission data ---
pub use crate::mission::{
    Maneuver, ManeuverKind, PlanDbMessage, PlanState, Target, WaypointSource, WaypointSpec,
    WaypointTask,
};

// --- Core types ---
pub use crate::bt::Status;
pub use crate::types::{Attitude, GeoPoint, Pose2D, Timestamp};
