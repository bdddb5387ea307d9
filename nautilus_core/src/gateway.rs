// nautilus_core/src/gateway.rs

//! Uniform goal/cancel/status access to the external action servers.
//!
//! The set of action kinds is closed. The transport to the servers sits
//! behind the `ActionClient` trait; status flows back asynchronously through
//! a `StatusSender` and is only folded into the handle table when the
//! executor calls `apply_status_updates` at the tick boundary. Polling never
//! blocks: it reads the cached table.
//!
//! Invariant: at most one active (non-terminal) handle per kind. Issuing a
//! goal for a kind that already has one cancels the old handle first.

use crate::error::GatewayError;
use crate::types::{Pose2D, Timestamp};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info, warn};

/// Terminal handles remembered for `poll` after they leave the active table.
const HISTORY_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionKind {
    GotoWaypoint,
    LeaderFollower,
    EmergencySurface,
    PanoramicInspection,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::GotoWaypoint,
        ActionKind::LeaderFollower,
        ActionKind::EmergencySurface,
        ActionKind::PanoramicInspection,
    ];

    /// Kinds that move the vehicle in the horizontal plane. Only one of
    /// them may be active at a time.
    pub fn is_motion(self) -> bool {
        !matches!(self, ActionKind::EmergencySurface)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GoalId(pub u64);

// =========================================================================
// == Goals ==
// =========================================================================

/// How the vehicle holds its vertical position while travelling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum ZControl {
    None,
    Depth(f64),
    Altitude(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum SpeedControl {
    None,
    Rpm(f64),
    Speed(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GotoGoal {
    pub waypoint_id: String,
    /// Target pose; the heading is the planned arrival heading.
    pub target: Pose2D,
    pub tolerance: f64,
    pub z_control: ZControl,
    pub speed_control: SpeedControl,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FollowGoal {
    pub leader_link: String,
    pub leader: Pose2D,
    pub standoff: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyGoal {
    /// The fault episode this attempt belongs to.
    pub episode: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InspectionGoal {
    pub waypoint_id: String,
    pub center: Point2<f64>,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionGoal {
    Goto(GotoGoal),
    Follow(FollowGoal),
    Emergency(EmergencyGoal),
    Inspection(InspectionGoal),
}

impl ActionGoal {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionGoal::Goto(_) => ActionKind::GotoWaypoint,
            ActionGoal::Follow(_) => ActionKind::LeaderFollower,
            ActionGoal::Emergency(_) => ActionKind::EmergencySurface,
            ActionGoal::Inspection(_) => ActionKind::PanoramicInspection,
        }
    }

    /// Whether two goals pursue the same objective: the same waypoint, the
    /// same leader or the same fault episode. Setpoints are not compared.
    pub fn same_objective(&self, other: &ActionGoal) -> bool {
        match (self, other) {
            (ActionGoal::Goto(a), ActionGoal::Goto(b)) => a.waypoint_id == b.waypoint_id,
            (ActionGoal::Follow(a), ActionGoal::Follow(b)) => a.leader_link == b.leader_link,
            (ActionGoal::Emergency(a), ActionGoal::Emergency(b)) => a.episode == b.episode,
            (ActionGoal::Inspection(a), ActionGoal::Inspection(b)) => {
                a.waypoint_id == b.waypoint_id
            }
            _ => false,
        }
    }
}

// =========================================================================
// == Status & Handles ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    Pending,
    Running,
    Succeeded,
    Failed(String),
    Cancelled,
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionStatus::Succeeded | ActionStatus::Failed(_) | ActionStatus::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// Reference to a goal that was handed to an action server.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionHandle {
    pub id: GoalId,
    pub kind: ActionKind,
    pub started_at: Timestamp,
    pub last_status: ActionStatus,
    pub goal: ActionGoal,
}

/// An asynchronous status report from an action server.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub id: GoalId,
    pub status: ActionStatus,
}

/// Cloneable sender used by action-server callbacks.
#[derive(Debug, Clone)]
pub struct StatusSender(Sender<StatusUpdate>);

impl StatusSender {
    /// Returns `false` once the gateway has been dropped.
    pub fn send(&self, id: GoalId, status: ActionStatus) -> bool {
        self.0.send(StatusUpdate { id, status }).is_ok()
    }
}

/// The transport seam to the external action servers.
pub trait ActionClient: Send {
    /// Hands a goal to the server for `goal.kind()`. Must not block.
    fn send_goal(&mut self, id: GoalId, goal: &ActionGoal) -> Result<(), GatewayError>;

    /// Asks the server to cancel a goal. Must not block.
    fn send_cancel(&mut self, id: GoalId, kind: ActionKind) -> Result<(), GatewayError>;
}

// =========================================================================
// == Gateway ==
// =========================================================================

pub struct ActionGateway {
    client: Box<dyn ActionClient>,
    active: HashMap<ActionKind, ActionHandle>,
    history: VecDeque<ActionHandle>,
    issued_count: HashMap<ActionKind, u64>,
    next_id: u64,
    status_tx: Sender<StatusUpdate>,
    status_rx: Receiver<StatusUpdate>,
}

impl ActionGateway {
    pub fn new(client: Box<dyn ActionClient>) -> Self {
        let (status_tx, status_rx) = mpsc::channel();
        Self {
            client,
            active: HashMap::new(),
            history: VecDeque::with_capacity(HISTORY_LEN),
            issued_count: HashMap::new(),
            next_id: 1,
            status_tx,
            status_rx,
        }
    }

    pub fn status_sender(&self) -> StatusSender {
        StatusSender(self.status_tx.clone())
    }

    /// Issues a goal. Any active handle of the same kind is cancelled first,
    /// and so is any other active motion kind when `goal` is a motion goal.
    pub fn issue(&mut self, goal: ActionGoal, now: Timestamp) -> Result<ActionHandle, GatewayError> {
        let kind = goal.kind();
        self.cancel_kind(kind);
        if kind.is_motion() {
            let others: Vec<ActionKind> = self
                .active
                .keys()
                .copied()
                .filter(|k| k.is_motion() && *k != kind)
                .collect();
            for other in others {
                self.cancel_kind(other);
            }
        }

        let id = GoalId(self.next_id);
        self.next_id += 1;
        self.client.send_goal(id, &goal)?;

        let handle = ActionHandle {
            id,
            kind,
            started_at: now,
            last_status: ActionStatus::Pending,
            goal,
        };
        *self.issued_count.entry(kind).or_insert(0) += 1;
        info!(?kind, id = id.0, "issued goal");
        self.active.insert(kind, handle.clone());
        Ok(handle)
    }

    /// Cancels a handle if it is still the active one for its kind.
    pub fn cancel(&mut self, handle: &ActionHandle) {
        let is_current = self
            .active
            .get(&handle.kind)
            .is_some_and(|h| h.id == handle.id);
        if is_current {
            self.cancel_kind(handle.kind);
        }
    }

    /// Cancels the active handle of `kind`, if any.
    pub fn cancel_kind(&mut self, kind: ActionKind) -> bool {
        let Some(mut handle) = self.active.remove(&kind) else {
            return false;
        };
        if let Err(e) = self.client.send_cancel(handle.id, kind) {
            // The handle is dropped from the table regardless; a server that
            // cannot hear the cancel can no longer be tracked either.
            warn!(?kind, id = handle.id.0, error = %e, "cancel not delivered");
        }
        debug!(?kind, id = handle.id.0, "cancelled goal");
        handle.last_status = ActionStatus::Cancelled;
        self.remember(handle);
        true
    }

    /// Cancels every active kind except the emergency-surface action.
    pub fn cancel_non_safety(&mut self) -> usize {
        let kinds: Vec<ActionKind> = self
            .active
            .keys()
            .copied()
            .filter(|k| *k != ActionKind::EmergencySurface)
            .collect();
        kinds.into_iter().filter(|k| self.cancel_kind(*k)).count()
    }

    /// Cancels all active motion kinds.
    pub fn cancel_motion(&mut self) -> usize {
        let kinds: Vec<ActionKind> = self
            .active
            .keys()
            .copied()
            .filter(|k| k.is_motion())
            .collect();
        kinds.into_iter().filter(|k| self.cancel_kind(*k)).count()
    }

    /// Current status of a handle from the cached table.
    pub fn poll(&self, handle: &ActionHandle) -> ActionStatus {
        self.lookup(handle.id)
            .map(|h| h.last_status.clone())
            .unwrap_or(ActionStatus::Cancelled)
    }

    /// The active handle of `kind`, if any.
    pub fn active(&self, kind: ActionKind) -> Option<&ActionHandle> {
        self.active.get(&kind)
    }

    /// The active handle of `kind`, or the most recent terminal one.
    pub fn latest(&self, kind: ActionKind) -> Option<&ActionHandle> {
        self.active
            .get(&kind)
            .or_else(|| self.history.iter().rev().find(|h| h.kind == kind))
    }

    pub fn active_kinds(&self) -> Vec<ActionKind> {
        let mut kinds: Vec<ActionKind> = self.active.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Number of goals ever issued for `kind`.
    pub fn issued(&self, kind: ActionKind) -> u64 {
        self.issued_count.get(&kind).copied().unwrap_or(0)
    }

    /// Drains asynchronous status reports into the handle table. Reports for
    /// goals that were superseded or cancelled are ignored.
    pub fn apply_status_updates(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.status_rx.try_recv() {
            let Some(kind) = self
                .active
                .values()
                .find(|h| h.id == update.id)
                .map(|h| h.kind)
            else {
                debug!(id = update.id.0, "status for inactive goal ignored");
                continue;
            };
            applied += 1;
            let terminal = update.status.is_terminal();
            if let Some(handle) = self.active.get_mut(&kind) {
                if let ActionStatus::Failed(reason) = &update.status {
                    warn!(?kind, id = update.id.0, %reason, "action failed");
                }
                handle.last_status = update.status;
            }
            if terminal {
                if let Some(handle) = self.active.remove(&kind) {
                    self.remember(handle);
                }
            }
        }
        applied
    }

    fn lookup(&self, id: GoalId) -> Option<&ActionHandle> {
        self.active
            .values()
            .find(|h| h.id == id)
            .or_else(|| self.history.iter().rev().find(|h| h.id == id))
    }

    fn remember(&mut self, handle: ActionHandle) {
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(handle);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// What a `RecordingClient` saw, shared with the test body.
    #[derive(Debug, Default)]
    pub struct Record {
        pub goals: Vec<(GoalId, ActionGoal)>,
        pub cancels: Vec<(GoalId, ActionKind)>,
        pub refuse: bool,
    }

    pub struct RecordingClient(pub Arc<Mutex<Record>>);

    impl ActionClient for RecordingClient {
        fn send_goal(&mut self, id: GoalId, goal: &ActionGoal) -> Result<(), GatewayError> {
            let mut record = self.0.lock().unwrap();
            if record.refuse {
                return Err(GatewayError::Refused {
                    kind: goal.kind(),
                    id,
                    reason: "test".into(),
                });
            }
            record.goals.push((id, goal.clone()));
            Ok(())
        }

        fn send_cancel(&mut self, id: GoalId, kind: ActionKind) -> Result<(), GatewayError> {
            self.0.lock().unwrap().cancels.push((id, kind));
            Ok(())
        }
    }

    pub fn gateway() -> (ActionGateway, Arc<Mutex<Record>>) {
        let record = Arc::new(Mutex::new(Record::default()));
        (
            ActionGateway::new(Box::new(RecordingClient(record.clone()))),
            record,
        )
    }
}
