// nautilus_core/src/executor.rs

//! The mission executor: one fixed behavior tree ticked against a fresh
//! blackboard snapshot.
//!
//! A tick runs in a fixed order. Queued inbound messages are drained into the
//! blackboard and the plan manager, action status reports are applied, a
//! snapshot is taken and the safety monitor evaluates it. If a fault is active
//! every non-safety action is cancelled before the tree runs. Then the DVL is
//! duty-cycled, the tree is ticked, and the publications for this tick are
//! collected.
//!
//! The tree is
//!
//! ```text
//! Fallback
//! ├── Safety:   Sequence[SafetyFault?, Fallback[Retry(EmergencySurface), SurfaceDistress]]
//! ├── Leader:   Sequence[LeaderEnabled?, LeaderFresh?,
//! │                      Fallback[Sequence[LeaderTooClose?, HoldStation], FollowLeader]]
//! ├── Mission:  Sequence[PlanActive?, PoseFresh?, ComputePath,
//! │                      Fallback[Retry(Timeout(Sequence[IssueGoto, AwaitArrival])),
//! │                               AbandonLeg],
//! │                      Fallback[Invert(NeedsInspection?), Inspect], CompleteWaypoint]
//! └── HoldPosition
//! ```
//!
//! At most one goal is handed to the gateway per tick. A leaf that would
//! issue a second one reports Running and issues on the next tick.

use crate::blackboard::{Blackboard, BlackboardSnapshot, Field, FieldValue};
use crate::bt::{BehaviorTree, LeafHandler, NodeId, Phase, Status, TreeBuilder};
use crate::config::ExecutorConfig;
use crate::dvl::{DvlController, DvlState};
use crate::error::{ExecutorError, FaultClass, PlanError, TreeError};
use crate::gateway::{
    ActionClient, ActionGateway, ActionGoal, ActionKind, ActionStatus, EmergencyGoal, GoalId,
    GotoGoal, InspectionGoal, StatusSender,
};
use crate::leader::{LeaderDecision, LeaderFollower};
use crate::messages::{
    Behavior, DistressReason, EstimatedState, Inbound, InboundData, Inbox, InboxSender, Outbound,
    PlanControlState, Publication,
};
use crate::mission::{MissionEvent, MissionPlanManager, WaypointTask};
use crate::planning::{NavQuality, PathPlanner, PlannedLeg};
use crate::safety::{SafetyMonitor, SafetyState, SafetyTransition};
use crate::types::Timestamp;
use std::collections::HashMap;
use tracing::{debug, error, info, trace, warn};

// =========================================================================
// == Leaves ==
// =========================================================================

/// Condition leaves of the executor tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Check {
    SafetyFault,
    LeaderEnabled,
    /// Both the leader pose and the own position are fresh.
    LeaderFresh,
    LeaderTooClose,
    /// A plan is running and has a waypoint left.
    PlanActive,
    PoseFresh,
    NeedsInspection,
}

/// Action leaves of the executor tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    EmergencySurface,
    SurfaceDistress,
    HoldStation,
    FollowLeader,
    ComputePath,
    IssueGoto,
    AwaitArrival,
    /// Pauses the plan once the leg has no retries left.
    AbandonLeg,
    Inspect,
    CompleteWaypoint,
    HoldPosition,
}

impl Task {
    fn behavior(self) -> Behavior {
        match self {
            Task::EmergencySurface | Task::SurfaceDistress => Behavior::Emergency,
            Task::HoldStation | Task::FollowLeader => Behavior::LeaderFollow,
            Task::ComputePath
            | Task::IssueGoto
            | Task::AwaitArrival
            | Task::AbandonLeg
            | Task::Inspect
            | Task::CompleteWaypoint => Behavior::Mission,
            Task::HoldPosition => Behavior::Hold,
        }
    }
}

/// Builds the executor tree. Returns the tree and the id of the mission
/// branch, which is reset whenever the plan is replaced.
fn build_tree(config: &ExecutorConfig) -> Result<(BehaviorTree<Check, Task>, NodeId), TreeError> {
    let mut b = TreeBuilder::new();

    // --- Safety ---
    let fault = b.condition(Check::SafetyFault);
    let surface = b.action(Task::EmergencySurface);
    let surface = b.retry(
        "emergency_retry",
        config.safety.emergency_action_retries,
        surface,
    );
    let distress = b.action(Task::SurfaceDistress);
    let recover = b.fallback("surface_or_distress", vec![surface, distress]);
    let safety = b.sequence("safety", vec![fault, recover]);

    // --- Leader-Follower ---
    let enabled = b.condition(Check::LeaderEnabled);
    let fresh = b.condition(Check::LeaderFresh);
    let too_close = b.condition(Check::LeaderTooClose);
    let hold_station = b.action(Task::HoldStation);
    let keep_clear = b.sequence("keep_clear", vec![too_close, hold_station]);
    let follow = b.action(Task::FollowLeader);
    let track = b.fallback("track_leader", vec![keep_clear, follow]);
    let leader = b.sequence("leader_follower", vec![enabled, fresh, track]);

    // --- Mission ---
    let active = b.condition(Check::PlanActive);
    let pose = b.condition(Check::PoseFresh);
    let compute = b.action(Task::ComputePath);
    let issue = b.action(Task::IssueGoto);
    let arrive = b.action(Task::AwaitArrival);
    let leg = b.sequence("leg", vec![issue, arrive]);
    let leg = b.timeout("leg_timeout", config.navigation.leg_timeout, leg);
    let leg = b.retry("leg_retry", config.navigation.goto_retries, leg);
    let abandon = b.action(Task::AbandonLeg);
    let leg = b.fallback("leg_or_abandon", vec![leg, abandon]);
    let needs_inspection = b.condition(Check::NeedsInspection);
    let skip_inspection = b.invert("no_inspection", needs_inspection);
    let inspect = b.action(Task::Inspect);
    let inspection = b.fallback("inspection", vec![skip_inspection, inspect]);
    let complete = b.action(Task::CompleteWaypoint);
    let mission = b.sequence(
        "mission",
        vec![active, pose, compute, leg, inspection, complete],
    );

    let hold = b.action(Task::HoldPosition);
    let root = b.fallback("root", vec![safety, leader, mission, hold]);
    Ok((b.build(root)?, mission))
}

/// Per-leaf memory that outlives a tick.
#[derive(Debug, Default)]
struct LeafMemory {
    /// Goal sent by the leaf of each kind during its current run.
    sent: HashMap<ActionKind, GoalId>,
    /// Distress has been raised for the current surfacing failure.
    distress_raised: bool,
}

enum Issue {
    Sent,
    /// Another goal already went out this tick.
    Deferred,
    Refused,
}

/// The leaf handler for one tick. Borrows the executor's parts disjointly
/// from the tree.
struct Leaves<'a> {
    now: Timestamp,
    snap: &'a BlackboardSnapshot,
    safety: &'a SafetyState,
    episode: u32,
    dvl_available: bool,
    gateway: &'a mut ActionGateway,
    manager: &'a mut MissionPlanManager,
    planner: &'a PathPlanner,
    leader: &'a LeaderFollower,
    leg: &'a mut Option<PlannedLeg>,
    memory: &'a mut LeafMemory,

    // --- Results of this tick ---
    issued: Option<ActionKind>,
    path_updated: bool,
    distress: bool,
    behavior: Behavior,
}

impl Leaves<'_> {
    /// Hands `goal` to the gateway unless something was issued already.
    fn issue(&mut self, goal: ActionGoal) -> Issue {
        let kind = goal.kind();
        if let Some(first) = self.issued {
            debug!(?kind, ?first, "issuance deferred to next tick");
            return Issue::Deferred;
        }
        match self.gateway.issue(goal, self.now) {
            Ok(handle) => {
                self.issued = Some(kind);
                self.memory.sent.insert(kind, handle.id);
                Issue::Sent
            }
            Err(e) => {
                warn!(?kind, error = %e, class = ?FaultClass::ActionFailure, "goal not issued");
                Issue::Refused
            }
        }
    }

    fn issue_running(&mut self, goal: ActionGoal) -> Status {
        match self.issue(goal) {
            Issue::Sent | Issue::Deferred => Status::Running,
            Issue::Refused => Status::Failure,
        }
    }

    /// The newest handle of `goal`'s kind that pursues the same objective.
    fn tracked(&self, goal: &ActionGoal) -> Option<(GoalId, ActionStatus)> {
        self.gateway
            .latest(goal.kind())
            .filter(|h| h.goal.same_objective(goal))
            .map(|h| (h.id, h.last_status.clone()))
    }

    /// Runs a goal to completion: issues it if nothing is tracking it yet,
    /// follows it while active, and fails once the goal this run sent ends
    /// without success. A stale failure from an earlier run is retried.
    fn await_or_issue(&mut self, phase: Phase, goal: ActionGoal) -> Status {
        let kind = goal.kind();
        if phase == Phase::Start {
            self.memory.sent.remove(&kind);
        }
        match self.tracked(&goal) {
            Some((id, status)) if status.is_active() => {
                self.memory.sent.insert(kind, id);
                Status::Running
            }
            Some((_, ActionStatus::Succeeded)) => Status::Success,
            Some((id, status)) if self.memory.sent.get(&kind) == Some(&id) => {
                debug!(?kind, id = id.0, ?status, "goal ended without success");
                Status::Failure
            }
            _ => self.issue_running(goal),
        }
    }

    fn leader_decision(&self) -> LeaderDecision {
        let leader = self.snap.leader_pose(self.leader.pose_timeout());
        self.leader.assess(self.snap.position(), leader)
    }

    fn emergency_surface(&mut self, phase: Phase) -> Status {
        let goal = ActionGoal::Emergency(EmergencyGoal {
            episode: self.episode,
        });
        self.await_or_issue(phase, goal)
    }

    fn surface_distress(&mut self) -> Status {
        if !self.memory.distress_raised {
            error!(
                episode = self.episode,
                "emergency surfacing keeps failing, raising distress"
            );
            self.memory.distress_raised = true;
            self.distress = true;
        }
        Status::Running
    }

    fn hold_motion(&mut self) -> Status {
        let cancelled = self.gateway.cancel_motion();
        if cancelled > 0 {
            debug!(cancelled, "motion actions cancelled to hold");
        }
        Status::Running
    }

    fn follow_leader(&mut self) -> Status {
        let LeaderDecision::Follow { leader, gap } = self.leader_decision() else {
            return Status::Failure;
        };
        let goal = ActionGoal::Follow(self.leader.goal(leader));
        let current = self
            .gateway
            .latest(ActionKind::LeaderFollower)
            .filter(|h| h.goal.same_objective(&goal))
            .and_then(|h| match &h.goal {
                ActionGoal::Follow(active) if !self.leader.needs_refresh(active, &leader) => {
                    Some(h.last_status.clone())
                }
                _ => None,
            });
        match current {
            Some(ActionStatus::Pending | ActionStatus::Running | ActionStatus::Succeeded) => {
                Status::Running
            }
            Some(ActionStatus::Failed(_)) => Status::Failure,
            Some(ActionStatus::Cancelled) | None => {
                debug!(gap, "following leader");
                self.issue_running(goal)
            }
        }
    }

    fn compute_path(&mut self) -> Status {
        let (Some(pose), Some(head)) = (self.snap.pose(), self.manager.head()) else {
            return Status::Failure;
        };
        let quality_changed = self
            .leg
            .as_ref()
            .is_some_and(|leg| (leg.quality == NavQuality::Nominal) != self.dvl_available);
        if quality_changed || self.planner.needs_replan(self.leg.as_ref(), head, &pose.position) {
            let previous = self.manager.previous().map(|wp| wp.target);
            let leg = self
                .planner
                .plan_leg(&pose, head, previous.as_ref(), self.dvl_available);
            *self.leg = Some(leg);
            self.path_updated = true;
        }
        Status::Success
    }

    fn goto_goal(&self) -> Option<GotoGoal> {
        let head = self.manager.head()?;
        let leg = self.leg.as_ref().filter(|leg| leg.waypoint_id == head.id)?;
        Some(GotoGoal {
            waypoint_id: head.id.clone(),
            target: leg.goal,
            tolerance: head.tolerance.min(self.planner.waypoint_tolerance()),
            z_control: head.z_control,
            speed_control: head.speed_control,
        })
    }

    /// Succeeds once a goto for the head waypoint is out. Whether it got
    /// there is `AwaitArrival`'s call.
    fn issue_goto(&mut self, phase: Phase) -> Status {
        if self.manager.head_arrived() {
            return Status::Success;
        }
        if phase == Phase::Start {
            self.memory.sent.remove(&ActionKind::GotoWaypoint);
        }
        let Some(goal) = self.goto_goal() else {
            return Status::Failure;
        };
        let goal = ActionGoal::Goto(goal);
        match self.tracked(&goal) {
            Some((id, status)) if status.is_active() => {
                self.memory.sent.insert(ActionKind::GotoWaypoint, id);
                Status::Success
            }
            Some((id, _)) if self.memory.sent.get(&ActionKind::GotoWaypoint) == Some(&id) => {
                Status::Success
            }
            _ => match self.issue(goal) {
                Issue::Sent => Status::Success,
                Issue::Deferred => Status::Running,
                Issue::Refused => Status::Failure,
            },
        }
    }

    /// Arrival is declared on position error alone; the goto's own verdict
    /// only decides between waiting and failing.
    fn await_arrival(&mut self) -> Status {
        if self.manager.head_arrived() {
            return Status::Success;
        }
        let (Some(position), Some(head)) = (self.snap.position(), self.manager.head()) else {
            return Status::Failure;
        };
        if self.planner.has_arrived(&position, head) {
            info!(waypoint = %head.id, "waypoint reached");
            self.manager.mark_arrived();
            return Status::Success;
        }
        let id = head.id.clone();
        let status = self
            .gateway
            .latest(ActionKind::GotoWaypoint)
            .filter(|h| matches!(&h.goal, ActionGoal::Goto(g) if g.waypoint_id == id))
            .map(|h| h.last_status.clone());
        match status {
            Some(s) if s.is_active() => Status::Running,
            Some(ActionStatus::Succeeded) => {
                warn!(waypoint = %id, "goto reported success outside tolerance");
                Status::Failure
            }
            Some(s) => {
                debug!(waypoint = %id, status = ?s, "goto ended");
                Status::Failure
            }
            None => Status::Failure,
        }
    }

    fn inspect(&mut self, phase: Phase) -> Status {
        let Some(head) = self.manager.head() else {
            return Status::Failure;
        };
        let WaypointTask::Inspect { duration } = head.task else {
            return Status::Success;
        };
        let goal = ActionGoal::Inspection(InspectionGoal {
            waypoint_id: head.id.clone(),
            center: head.target,
            duration,
        });
        self.await_or_issue(phase, goal)
    }
}

impl LeafHandler<Check, Task> for Leaves<'_> {
    fn condition(&mut self, check: &Check) -> bool {
        match check {
            Check::SafetyFault => self.safety.is_fault(),
            Check::LeaderEnabled => self.leader.is_enabled(),
            Check::LeaderFresh => self.leader_decision() != LeaderDecision::Unavailable,
            Check::LeaderTooClose => {
                matches!(self.leader_decision(), LeaderDecision::HoldStation { .. })
            }
            Check::PlanActive => self.manager.is_active(),
            Check::PoseFresh => self.snap.pose().is_some(),
            Check::NeedsInspection => self
                .manager
                .head()
                .is_some_and(|wp| matches!(wp.task, WaypointTask::Inspect { .. })),
        }
    }

    fn action(&mut self, task: &Task, phase: Phase) -> Status {
        self.behavior = task.behavior();
        match task {
            Task::EmergencySurface => self.emergency_surface(phase),
            Task::SurfaceDistress => self.surface_distress(),
            Task::HoldStation | Task::HoldPosition => self.hold_motion(),
            Task::FollowLeader => self.follow_leader(),
            Task::ComputePath => self.compute_path(),
            Task::IssueGoto => self.issue_goto(phase),
            Task::AwaitArrival => self.await_arrival(),
            Task::AbandonLeg => {
                self.manager.abandon_head();
                Status::Failure
            }
            Task::Inspect => self.inspect(phase),
            Task::CompleteWaypoint => Status::from(self.manager.complete_head().is_some()),
        }
    }

    fn halt(&mut self, task: &Task) {
        let kind = match task {
            Task::EmergencySurface => ActionKind::EmergencySurface,
            Task::FollowLeader => ActionKind::LeaderFollower,
            Task::AwaitArrival => ActionKind::GotoWaypoint,
            Task::Inspect => ActionKind::PanoramicInspection,
            Task::SurfaceDistress => {
                self.memory.distress_raised = false;
                return;
            }
            _ => return,
        };
        if self.gateway.cancel_kind(kind) {
            debug!(?task, ?kind, "halted leaf cancelled its goal");
        }
    }
}

// =========================================================================
// == Executor ==
// =========================================================================

/// Everything one tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub root: Status,
    pub behavior: Behavior,
    /// The action kind issued this tick, if any.
    pub issued: Option<ActionKind>,
    pub transitions: Vec<SafetyTransition>,
    pub publications: Vec<Publication>,
}

impl TickReport {
    pub fn payloads(&self) -> impl Iterator<Item = &Outbound> {
        self.publications.iter().map(|p| &p.payload)
    }
}

pub struct MissionExecutor {
    config: ExecutorConfig,
    tree: BehaviorTree<Check, Task>,
    mission_branch: NodeId,
    inbox: Inbox,
    blackboard: Blackboard,
    safety: SafetyMonitor,
    dvl: DvlController,
    planner: PathPlanner,
    leader: LeaderFollower,
    manager: MissionPlanManager,
    gateway: ActionGateway,
    memory: LeafMemory,
    leg: Option<PlannedLeg>,
    /// Fault episodes seen since start; never reset, tags emergency goals.
    episode: u32,
    plan_changed: bool,
    plan_error: bool,
    behavior: Behavior,
    heartbeat_seq: u64,
    next_heartbeat: Option<Timestamp>,
}

impl MissionExecutor {
    pub fn new(config: ExecutorConfig, client: Box<dyn ActionClient>) -> Result<Self, ExecutorError> {
        config.validate()?;
        let (tree, mission_branch) = build_tree(&config)?;
        info!(
            robot = %config.robot_name,
            tick_rate_hz = config.tick_rate_hz,
            nodes = tree.len(),
            "mission executor ready"
        );
        Ok(Self {
            blackboard: Blackboard::new(
                config.safety.sensor_timeout,
                config.navigation.localization_error_growth,
            ),
            safety: SafetyMonitor::new(&config.safety),
            dvl: DvlController::new(&config.dvl),
            planner: PathPlanner::new(&config.navigation),
            leader: LeaderFollower::new(&config.leader),
            manager: MissionPlanManager::new(
                &config.plan,
                config.navigation.localization_error_growth,
            ),
            gateway: ActionGateway::new(client),
            inbox: Inbox::new(),
            memory: LeafMemory::default(),
            leg: None,
            episode: 0,
            plan_changed: false,
            plan_error: false,
            behavior: Behavior::Hold,
            heartbeat_seq: 0,
            next_heartbeat: None,
            tree,
            mission_branch,
            config,
        })
    }

    /// A sender for inbound messages. Usable from any thread.
    pub fn inbox(&self) -> InboxSender {
        self.inbox.sender()
    }

    /// A sender for action-server status reports.
    pub fn status_sender(&self) -> StatusSender {
        self.gateway.status_sender()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn tree(&self) -> &BehaviorTree<Check, Task> {
        &self.tree
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn safety(&self) -> &SafetyState {
        self.safety.state()
    }

    pub fn gateway(&self) -> &ActionGateway {
        &self.gateway
    }

    pub fn mission(&self) -> &MissionPlanManager {
        &self.manager
    }

    pub fn dvl_state(&self) -> DvlState {
        self.dvl.state()
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    pub fn planned_leg(&self) -> Option<&PlannedLeg> {
        self.leg.as_ref()
    }

    /// Runs one tick at mission time `now`.
    pub fn tick(&mut self, now: Timestamp) -> TickReport {
        let mut publications = Vec::new();

        for msg in self.inbox.drain() {
            self.ingest(msg, now);
        }
        self.absorb_mission_events(&mut publications);
        self.gateway.apply_status_updates();
        let snap = self.blackboard.snapshot(now);

        let transitions = self.safety.evaluate(&snap);
        for transition in &transitions {
            if matches!(transition, SafetyTransition::EpisodeStarted { .. }) {
                self.episode += 1;
            }
        }
        if self.safety.state().is_fault() {
            let cancelled = self.gateway.cancel_non_safety();
            if cancelled > 0 {
                warn!(
                    cancelled,
                    class = ?FaultClass::SafetyFault,
                    "non-safety actions cancelled"
                );
            }
        }

        let dvl_command = self.dvl.update(snap.depth(), snap.dvl_lock(), now);

        let plan_changed = std::mem::take(&mut self.plan_changed);
        if plan_changed {
            self.leg = None;
        }
        let mut leaves = Leaves {
            now,
            snap: &snap,
            safety: self.safety.state(),
            episode: self.episode,
            dvl_available: self.dvl.is_available(),
            gateway: &mut self.gateway,
            manager: &mut self.manager,
            planner: &self.planner,
            leader: &self.leader,
            leg: &mut self.leg,
            memory: &mut self.memory,
            issued: None,
            path_updated: false,
            distress: false,
            behavior: Behavior::Hold,
        };
        if plan_changed {
            self.tree.halt_subtree(self.mission_branch, &mut leaves);
        }
        let root = self.tree.tick(&mut leaves, now);
        let Leaves {
            issued,
            path_updated,
            distress,
            behavior,
            ..
        } = leaves;

        if behavior != self.behavior {
            info!(from = ?self.behavior, to = ?behavior, "behavior changed");
            self.behavior = behavior;
        }
        trace!(now, ?root, ?behavior, ?issued, "tick");

        // --- Publications ---
        if let Some(command) = dvl_command {
            self.publish(
                &mut publications,
                &self.config.topics.dvl_command,
                Outbound::Dvl { command },
            );
        }
        if path_updated {
            if let Some(leg) = &self.leg {
                self.publish(
                    &mut publications,
                    &self.config.topics.planned_path,
                    Outbound::PlannedPath {
                        waypoint_id: leg.waypoint_id.clone(),
                        points: leg.path.clone(),
                        quality: leg.quality,
                    },
                );
            }
        }
        self.absorb_mission_events(&mut publications);

        let mut distress_reasons = Vec::new();
        for transition in &transitions {
            match transition {
                SafetyTransition::GaveUp { .. } => {
                    distress_reasons.push(DistressReason::EmergencyExhausted)
                }
                SafetyTransition::SensorLoss => distress_reasons.push(DistressReason::SensorLoss),
                _ => {}
            }
        }
        if distress {
            distress_reasons.push(DistressReason::SurfacingFailed);
        }
        for reason in distress_reasons {
            error!(?reason, "distress raised");
            self.publish(
                &mut publications,
                &self.config.topics.distress,
                Outbound::Distress { reason },
            );
        }

        if self.next_heartbeat.map_or(true, |due| now >= due) {
            self.heartbeat_seq += 1;
            self.next_heartbeat = Some(now + self.config.heartbeat_period);
            self.publish(
                &mut publications,
                &self.config.topics.heartbeat,
                Outbound::Heartbeat {
                    seq: self.heartbeat_seq,
                },
            );
        }
        let estimated = self.estimated_state(&snap);
        self.publish(
            &mut publications,
            &self.config.topics.estimated_state,
            Outbound::EstimatedState(estimated),
        );
        let state = self.plan_control_state(&snap);
        self.publish(
            &mut publications,
            &self.config.topics.plan_control_state,
            Outbound::PlanControlState(state),
        );

        TickReport {
            root,
            behavior,
            issued,
            transitions,
            publications,
        }
    }

    // --- Ingestion ---

    fn ingest(&mut self, msg: Inbound, now: Timestamp) {
        let Inbound { stamp, data } = msg;
        if data.is_ground_traffic() {
            if let Err(e) = self.blackboard.update(FieldValue::GroundContact, stamp) {
                debug!(error = %e, "ground contact not recorded");
            }
        }
        let reading = match data {
            InboundData::Position(p) => Some(FieldValue::Position(p)),
            InboundData::Depth(d) => Some(FieldValue::Depth(d)),
            InboundData::Altitude(a) => Some(FieldValue::Altitude(a)),
            InboundData::Attitude(a) => Some(FieldValue::Attitude(a)),
            InboundData::Leak(l) => Some(FieldValue::Leak(l)),
            InboundData::DvlFeedback { locked } => Some(FieldValue::DvlLock(locked)),
            InboundData::GpsFix { point, accuracy } => {
                if point.is_finite() {
                    self.manager.observe_fix(point);
                }
                Some(FieldValue::GpsFix { point, accuracy })
            }
            InboundData::LeaderPose(p) => Some(FieldValue::LeaderPose(p)),
            InboundData::WaypointPush { source, waypoints } => {
                match self.manager.push_waypoints(source, &waypoints, now) {
                    Ok(outcome) => debug!(?source, ?outcome, "waypoint push handled"),
                    Err(e) => self.plan_rejected(e),
                }
                None
            }
            InboundData::EnableSource { source, enabled } => {
                if let Err(e) = self.manager.set_source_enabled(source, enabled) {
                    warn!(error = %e, "enable request rejected");
                }
                None
            }
            InboundData::PlanDb(msg) => {
                match self.manager.load_plandb(&msg, now) {
                    Ok(waypoints) => debug!(plan = %msg.plan_id, waypoints, "plan-db loaded"),
                    Err(e) => self.plan_rejected(e),
                }
                None
            }
            InboundData::Abort => {
                self.safety.request_abort(stamp);
                None
            }
            InboundData::MissionControl(cmd) => {
                self.manager.command(cmd);
                None
            }
            InboundData::SafetyReset => {
                self.safety.reset();
                None
            }
            InboundData::GroundHeartbeat => None,
        };
        if let Some(value) = reading {
            let field = value.field();
            if let Err(e) = self.blackboard.update(value, stamp) {
                warn!(?field, error = %e, "reading dropped");
            }
        }
    }

    fn plan_rejected(&mut self, e: PlanError) {
        warn!(error = %e, class = ?e.class(), "plan rejected");
        self.plan_error = true;
    }

    /// Turns mission events into publications and notes plan replacements.
    fn absorb_mission_events(&mut self, publications: &mut Vec<Publication>) {
        for event in self.manager.drain_events() {
            match event {
                MissionEvent::PlanLoaded { plan_id, waypoints } => {
                    debug!(plan = %plan_id, waypoints, "new plan, mission branch reset");
                    self.plan_changed = true;
                    self.plan_error = false;
                }
                MissionEvent::PlanCleared => self.plan_changed = true,
                MissionEvent::WaypointCompleted { id } => self.publish(
                    publications,
                    &self.config.topics.last_wp,
                    Outbound::LastWaypoint { id },
                ),
                MissionEvent::MissionComplete { plan_id } => self.publish(
                    publications,
                    &self.config.topics.mission_complete,
                    Outbound::MissionComplete { plan_id },
                ),
            }
        }
    }

    // --- Reporting ---

    fn publish(&self, publications: &mut Vec<Publication>, topic: &str, payload: Outbound) {
        publications.push(Publication {
            topic: self.config.resolve_topic(topic),
            payload,
        });
    }

    fn estimated_state(&self, snap: &BlackboardSnapshot) -> EstimatedState {
        let position = snap.position();
        EstimatedState {
            position,
            geo: position.and_then(|p| self.manager.frame().map(|f| f.to_geo(&p))),
            depth: snap.depth(),
            altitude: snap.altitude(),
            attitude: snap.attitude(),
            localization_error: snap.localization_error(),
        }
    }

    fn faults(&self, snap: &BlackboardSnapshot) -> Vec<FaultClass> {
        let safety = self.safety.state();
        let mut faults = Vec::new();
        if !snap.is_fresh(Field::Position) || !snap.is_fresh(Field::Depth) {
            faults.push(FaultClass::SensorStale);
        }
        if safety.is_fault() {
            faults.push(FaultClass::SafetyFault);
        }
        let failed = ActionKind::ALL.iter().any(|kind| {
            self.gateway
                .latest(*kind)
                .is_some_and(|h| matches!(h.last_status, ActionStatus::Failed(_)))
        });
        if failed || self.manager.stalled().is_some() {
            faults.push(FaultClass::ActionFailure);
        }
        if self.plan_error {
            faults.push(FaultClass::PlanInconsistency);
        }
        if safety.has_given_up() {
            faults.push(FaultClass::EmergencyExhausted);
        }
        faults
    }

    fn plan_control_state(&self, snap: &BlackboardSnapshot) -> PlanControlState {
        let plan = self.manager.plan();
        let (waypoint_index, waypoint_count) = plan.map_or((0, 0), |p| p.progress());
        let safety = self.safety.state();
        PlanControlState {
            behavior: self.behavior,
            plan_id: plan.map(|p| p.plan_id().to_string()),
            plan_state: plan.map(|p| p.state()),
            plan_source: plan.map(|p| p.source()),
            enabled_source: self.manager.enabled_source(),
            waypoint_index,
            waypoint_count,
            current_waypoint: self.manager.head().map(|wp| wp.id.clone()),
            violations: safety.violations(),
            emergency_trials: safety.trials(),
            gave_up: safety.has_given_up(),
            faults: self.faults(snap),
            active_actions: self.gateway.active_kinds(),
            dvl: self.dvl.state(),
            nav_quality: self.leg.as_ref().map(|leg| leg.quality),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_has_the_four_branches_in_priority_order() {
        let (tree, mission) = build_tree(&ExecutorConfig::default()).unwrap();
        let Some(crate::bt::Node::Fallback { name, children }) = tree.node(tree.root()) else {
            panic!("root is not a fallback");
        };
        assert_eq!(name, "root");
        assert_eq!(children.len(), 4);
        assert_eq!(children[2], mission);
        assert_eq!(
            tree.node(children[3]),
            Some(&crate::bt::Node::Action(Task::HoldPosition))
        );
    }

    #[test]
    fn retry_budgets_come_from_config() {
        let mut config = ExecutorConfig::default();
        config.safety.emergency_action_retries = 7;
        config.navigation.goto_retries = 2;
        let (tree, _) = build_tree(&config).unwrap();
        let retries: Vec<(String, u32)> = (0..tree.len())
            .filter_map(|id| match tree.node(id) {
                Some(crate::bt::Node::Decorator {
                    name,
                    decorator: crate::bt::Decorator::Retry { retries },
                    ..
                }) => Some((name.clone(), *retries)),
                _ => None,
            })
            .collect();
        assert_eq!(
            retries,
            vec![("emergency_retry".to_string(), 7), ("leg_retry".to_string(), 2)]
        );
    }

    #[test]
    fn every_task_maps_to_a_behavior() {
        assert_eq!(Task::SurfaceDistress.behavior(), Behavior::Emergency);
        assert_eq!(Task::HoldStation.behavior(), Behavior::LeaderFollow);
        assert_eq!(Task::Inspect.behavior(), Behavior::Mission);
        assert_eq!(Task::HoldPosition.behavior(), Behavior::Hold);
    }
}
