// nautilus_sim/src/simulation/plugins/servers.rs

//! Simulated action servers. The executor's gateway talks to them through
//! `SimActionClient`; they answer asynchronously through the gateway's
//! status channel, one tick later, like real servers would.

use crate::simulation::config::ServerConfig;
use crate::simulation::plugins::vehicles::auv::{AuvModel, MotionCommand};
use nautilus_core::error::GatewayError;
use nautilus_core::gateway::{
    ActionClient, ActionGoal, ActionKind, ActionStatus, GoalId, SpeedControl, StatusSender,
    ZControl,
};
use nautilus_core::types::{Pose2D, Timestamp};
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info};

/// Gotos report success once inside this fraction of their tolerance.
const GOTO_SETTLE_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub enum ServerRequest {
    Goal(GoalId, ActionGoal),
    Cancel(GoalId, ActionKind),
}

/// The executor-side end of the simulated transport.
pub struct SimActionClient(Sender<ServerRequest>);

impl ActionClient for SimActionClient {
    fn send_goal(&mut self, id: GoalId, goal: &ActionGoal) -> Result<(), GatewayError> {
        self.0
            .send(ServerRequest::Goal(id, goal.clone()))
            .map_err(|_| GatewayError::Unavailable(goal.kind()))
    }

    fn send_cancel(&mut self, id: GoalId, kind: ActionKind) -> Result<(), GatewayError> {
        self.0
            .send(ServerRequest::Cancel(id, kind))
            .map_err(|_| GatewayError::Unavailable(kind))
    }
}

#[derive(Debug, Clone)]
struct Accepted {
    id: GoalId,
    goal: ActionGoal,
    since: Timestamp,
}

/// All four servers. At most one goal per kind is being executed.
pub struct ActionServers {
    config: ServerConfig,
    requests: Receiver<ServerRequest>,
    status: Option<StatusSender>,
    active: BTreeMap<ActionKind, Accepted>,
}

impl ActionServers {
    /// Creates the servers and the client the executor should be built with.
    pub fn new(config: &ServerConfig) -> (Self, SimActionClient) {
        let (tx, rx) = mpsc::channel();
        let servers = Self {
            config: config.clone(),
            requests: rx,
            status: None,
            active: BTreeMap::new(),
        };
        (servers, SimActionClient(tx))
    }

    /// Connects the status channel. Reports are dropped until this is called.
    pub fn connect(&mut self, status: StatusSender) {
        self.status = Some(status);
    }

    pub fn active_kinds(&self) -> Vec<ActionKind> {
        self.active.keys().copied().collect()
    }

    fn report(&self, id: GoalId, status: ActionStatus) {
        if let Some(tx) = &self.status {
            tx.send(id, status);
        }
    }

    /// Accepts queued requests, advances every active goal against the true
    /// vehicle state, and returns the motion the vehicle should execute.
    pub fn update<R: Rng>(
        &mut self,
        now: Timestamp,
        vehicle: &AuvModel,
        leader: Option<Pose2D>,
        rng: &mut R,
    ) -> MotionCommand {
        while let Ok(request) = self.requests.try_recv() {
            match request {
                ServerRequest::Goal(id, goal) => self.accept(id, goal, now, rng),
                ServerRequest::Cancel(id, kind) => {
                    if self.active.get(&kind).is_some_and(|a| a.id == id) {
                        self.active.remove(&kind);
                        debug!(?kind, id = id.0, "server cancelled goal");
                        self.report(id, ActionStatus::Cancelled);
                    }
                }
            }
        }

        let finished: Vec<(ActionKind, GoalId)> = self
            .active
            .iter()
            .filter(|(_, a)| self.is_done(a, now, vehicle))
            .map(|(kind, a)| (*kind, a.id))
            .collect();
        for (kind, id) in finished {
            self.active.remove(&kind);
            info!(?kind, id = id.0, "server goal succeeded");
            self.report(id, ActionStatus::Succeeded);
        }

        self.motion(vehicle, leader)
    }

    fn accept<R: Rng>(&mut self, id: GoalId, goal: ActionGoal, now: Timestamp, rng: &mut R) {
        let kind = goal.kind();
        let failure_probability = match kind {
            ActionKind::GotoWaypoint => self.config.goto_failure_probability,
            ActionKind::EmergencySurface => self.config.emergency_failure_probability,
            _ => 0.0,
        };
        if failure_probability > 0.0 && rng.gen_bool(failure_probability) {
            info!(?kind, id = id.0, "server aborted goal");
            self.report(id, ActionStatus::Failed("aborted by server".into()));
            return;
        }
        if let Some(old) = self.active.insert(kind, Accepted { id, goal, since: now }) {
            self.report(old.id, ActionStatus::Cancelled);
        }
        self.report(id, ActionStatus::Running);
    }

    fn is_done(&self, accepted: &Accepted, now: Timestamp, vehicle: &AuvModel) -> bool {
        match &accepted.goal {
            ActionGoal::Goto(g) => {
                (g.target.position - vehicle.pose().position).norm()
                    <= g.tolerance * GOTO_SETTLE_FRACTION
            }
            ActionGoal::Emergency(_) => vehicle.depth() <= self.config.surfaced_depth,
            ActionGoal::Inspection(i) => now - accepted.since >= i.duration,
            ActionGoal::Follow(_) => false,
        }
    }

    /// Surfacing overrides everything; otherwise the single motion goal, if
    /// any, steers the vehicle.
    fn motion(&self, vehicle: &AuvModel, leader: Option<Pose2D>) -> MotionCommand {
        if self.active.contains_key(&ActionKind::EmergencySurface) {
            return MotionCommand::Surface;
        }
        for accepted in self.active.values() {
            match &accepted.goal {
                ActionGoal::Goto(g) => {
                    return MotionCommand::Goto {
                        target: g.target.position,
                        speed: g.speed_control,
                        z: g.z_control,
                    }
                }
                ActionGoal::Follow(f) => {
                    let leader = leader.unwrap_or(f.leader);
                    let behind = leader.position - leader.heading() * f.standoff;
                    if (behind - vehicle.pose().position).norm() < 0.5 {
                        return MotionCommand::Hold;
                    }
                    return MotionCommand::Goto {
                        target: behind,
                        speed: SpeedControl::None,
                        z: ZControl::None,
                    };
                }
                // Spinning in place for the panorama.
                ActionGoal::Inspection(_) => return MotionCommand::Hold,
                ActionGoal::Emergency(_) => {}
            }
        }
        MotionCommand::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::config::VehicleConfig;
    use nautilus_core::gateway::{GotoGoal, InspectionGoal};
    use nautilus_core::prelude::{ExecutorConfig, MissionExecutor};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn goto(x: f64) -> ActionGoal {
        ActionGoal::Goto(GotoGoal {
            waypoint_id: "a".into(),
            target: Pose2D::new(x, 0.0, 0.0),
            tolerance: 1.0,
            z_control: ZControl::Depth(1.0),
            speed_control: SpeedControl::None,
        })
    }

    #[test]
    fn goto_steers_until_within_tolerance() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (mut servers, mut client) = ActionServers::new(&ServerConfig::default());
        let vehicle = AuvModel::new(&VehicleConfig::default());
        client.send_goal(GoalId(1), &goto(10.0)).unwrap();
        let motion = servers.update(0.0, &vehicle, None, &mut rng);
        assert!(matches!(motion, MotionCommand::Goto { .. }));
        assert_eq!(servers.active_kinds(), vec![ActionKind::GotoWaypoint]);

        client.send_goal(GoalId(2), &goto(0.5)).unwrap();
        let motion = servers.update(0.1, &vehicle, None, &mut rng);
        assert_eq!(motion, MotionCommand::Hold);
        assert!(servers.active_kinds().is_empty());
    }

    #[test]
    fn emergency_overrides_motion_and_cancel_is_honoured() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (mut servers, mut client) = ActionServers::new(&ServerConfig::default());
        let vehicle = AuvModel::new(&VehicleConfig {
            start_depth: 4.0,
            ..VehicleConfig::default()
        });
        client.send_goal(GoalId(1), &goto(10.0)).unwrap();
        client
            .send_goal(
                GoalId(2),
                &ActionGoal::Emergency(nautilus_core::gateway::EmergencyGoal { episode: 1 }),
            )
            .unwrap();
        assert_eq!(
            servers.update(0.0, &vehicle, None, &mut rng),
            MotionCommand::Surface
        );
        client.send_cancel(GoalId(2), ActionKind::EmergencySurface).unwrap();
        // A cancel for a goal the server no longer runs is ignored.
        client.send_cancel(GoalId(9), ActionKind::GotoWaypoint).unwrap();
        assert!(matches!(
            servers.update(0.1, &vehicle, None, &mut rng),
            MotionCommand::Goto { .. }
        ));
    }

    #[test]
    fn inspection_runs_for_its_duration() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (mut servers, mut client) = ActionServers::new(&ServerConfig::default());
        let vehicle = AuvModel::new(&VehicleConfig::default());
        let goal = ActionGoal::Inspection(InspectionGoal {
            waypoint_id: "i".into(),
            center: vehicle.pose().position,
            duration: 2.0,
        });
        client.send_goal(GoalId(1), &goal).unwrap();
        servers.update(0.0, &vehicle, None, &mut rng);
        servers.update(1.9, &vehicle, None, &mut rng);
        assert_eq!(servers.active_kinds(), vec![ActionKind::PanoramicInspection]);
        servers.update(2.0, &vehicle, None, &mut rng);
        assert!(servers.active_kinds().is_empty());
    }

    #[test]
    fn server_failures_reach_the_executor_gateway() {
        use nautilus_core::prelude::{InboundData, Target, WaypointSource, WaypointSpec};

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (mut servers, client) = ActionServers::new(&ServerConfig {
            goto_failure_probability: 1.0,
            ..ServerConfig::default()
        });
        let mut executor =
            MissionExecutor::new(ExecutorConfig::default(), Box::new(client)).unwrap();
        servers.connect(executor.status_sender());
        let vehicle = AuvModel::new(&VehicleConfig::default());

        let inbox = executor.inbox();
        inbox.send(0.0, InboundData::Position(vehicle.pose().position));
        inbox.send(0.0, InboundData::Attitude(Default::default()));
        inbox.send(0.0, InboundData::Depth(0.0));
        inbox.send(
            0.0,
            InboundData::EnableSource {
                source: WaypointSource::Gui,
                enabled: true,
            },
        );
        inbox.send(
            0.0,
            InboundData::WaypointPush {
                source: WaypointSource::Gui,
                waypoints: vec![WaypointSpec {
                    id: "far".into(),
                    target: Target::Local { x: 50.0, y: 0.0 },
                    tolerance: None,
                    z_control: ZControl::Depth(1.0),
                    speed_control: SpeedControl::None,
                    task: Default::default(),
                }],
            },
        );
        assert_eq!(executor.tick(0.1).issued, Some(ActionKind::GotoWaypoint));
        assert_eq!(
            servers.update(0.1, &vehicle, None, &mut rng),
            MotionCommand::Hold
        );

        executor.tick(0.2);
        let status = executor
            .gateway()
            .latest(ActionKind::GotoWaypoint)
            .map(|h| h.last_status.clone());
        assert!(matches!(status, Some(ActionStatus::Failed(_))));
    }
}
