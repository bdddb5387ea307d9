// nautilus_sim/src/simulation/core/runner.rs

//! The closed loop. Each tick: scripted events fire, the vehicle moves under
//! the servers' last motion command, the sensors report, the executor ticks,
//! its publications are consumed, and the servers react to new goals.

use crate::simulation::config::{
    EventAction, MissionCatalog, ScenarioConfig, ScenarioError,
};
use crate::simulation::core::events::EventScript;
use crate::simulation::core::prng::SimulationRng;
use crate::simulation::plugins::sensors::nav::NavSensors;
use crate::simulation::plugins::servers::ActionServers;
use crate::simulation::plugins::vehicles::auv::{AuvModel, MotionCommand};
use nalgebra::Point2;
use nautilus_core::geo::LocalFrame;
use nautilus_core::prelude::*;
use nautilus_core::safety::SafetyTransition;
use std::fmt;
use tracing::{info, warn};

/// Interval of the ground-link heartbeat while the link is up.
const GROUND_HEARTBEAT_PERIOD: f64 = 1.0;

// =========================================================================
// == Run Summary ==
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub sim_time: f64,
    pub goals_issued: Vec<(ActionKind, u64)>,
    pub waypoints_completed: Vec<String>,
    pub missions_completed: Vec<String>,
    pub fault_episodes: u32,
    pub distress: Vec<DistressReason>,
    pub final_behavior: Behavior,
    pub final_position: Point2<f64>,
    pub final_depth: f64,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            ticks: 0,
            sim_time: 0.0,
            goals_issued: Vec::new(),
            waypoints_completed: Vec::new(),
            missions_completed: Vec::new(),
            fault_episodes: 0,
            distress: Vec::new(),
            final_behavior: Behavior::Hold,
            final_position: Point2::origin(),
            final_depth: 0.0,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== Run summary ==")?;
        writeln!(f, "ticks:               {} ({:.1} s)", self.ticks, self.sim_time)?;
        for (kind, n) in &self.goals_issued {
            writeln!(f, "goals {:<14} {n}", format!("{kind:?}:"))?;
        }
        writeln!(
            f,
            "waypoints completed: {} {:?}",
            self.waypoints_completed.len(),
            self.waypoints_completed
        )?;
        writeln!(f, "missions completed:  {:?}", self.missions_completed)?;
        writeln!(f, "fault episodes:      {}", self.fault_episodes)?;
        writeln!(f, "distress:            {:?}", self.distress)?;
        writeln!(f, "final behavior:      {:?}", self.final_behavior)?;
        write!(
            f,
            "final position:      ({:.1}, {:.1}) at {:.1} m",
            self.final_position.x, self.final_position.y, self.final_depth
        )
    }
}

// =========================================================================
// == Simulation ==
// =========================================================================

pub struct Simulation {
    scenario: ScenarioConfig,
    catalog: MissionCatalog,
    executor: MissionExecutor,
    inbox: InboxSender,
    servers: ActionServers,
    vehicle: AuvModel,
    sensors: NavSensors,
    script: EventScript,
    rng: SimulationRng,
    frame: Option<LocalFrame>,
    motion: MotionCommand,
    ground_link: bool,
    next_ground_beat: f64,
    summary: RunSummary,
}

impl Simulation {
    pub fn new(scenario: ScenarioConfig, catalog: MissionCatalog) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        for event in &scenario.events {
            if let Some(key) = event.action.mission_key() {
                if catalog.get(key).is_none() {
                    return Err(ScenarioError::UnknownMission {
                        at: event.at,
                        key: key.to_string(),
                    });
                }
            }
        }

        let (mut servers, client) = ActionServers::new(&scenario.servers);
        let executor = MissionExecutor::new(scenario.executor.clone(), Box::new(client))
            .map_err(|e| ScenarioError::Invalid(e.to_string()))?;
        servers.connect(executor.status_sender());
        let sensors = NavSensors::new(&scenario.sensors)
            .map_err(|e| ScenarioError::Invalid(format!("sensor noise: {e}")))?;

        info!(
            duration = scenario.simulation.duration_seconds,
            events = scenario.events.len(),
            missions = catalog.len(),
            "simulation ready"
        );
        Ok(Self {
            inbox: executor.inbox(),
            vehicle: AuvModel::new(&scenario.vehicle),
            script: EventScript::new(&scenario.events),
            rng: SimulationRng::new(scenario.simulation.seed),
            frame: scenario.executor.plan.geo_origin.map(LocalFrame::new),
            motion: MotionCommand::Hold,
            ground_link: true,
            next_ground_beat: 0.0,
            summary: RunSummary::default(),
            executor,
            servers,
            sensors,
            catalog,
            scenario,
        })
    }

    pub fn executor(&self) -> &MissionExecutor {
        &self.executor
    }

    pub fn vehicle(&self) -> &AuvModel {
        &self.vehicle
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Runs until the scenario duration elapses, or until a mission
    /// completes when the scenario asks for that.
    pub fn run(&mut self) -> &RunSummary {
        let dt = self.executor.config().tick_period();
        let ticks = (self.scenario.simulation.duration_seconds / dt).ceil() as u64;
        for i in 1..=ticks {
            self.step(i as f64 * dt);
            if self.scenario.simulation.stop_on_complete
                && !self.summary.missions_completed.is_empty()
            {
                info!(now = i as f64 * dt, "mission complete, stopping");
                break;
            }
        }
        &self.summary
    }

    /// One closed-loop tick at simulation time `now`.
    pub fn step(&mut self, now: f64) -> TickReport {
        let dt = self.executor.config().tick_period();

        for action in self.script.due(now) {
            self.apply(action, now);
        }

        let seabed = self.scenario.world.seabed_depth;
        self.vehicle.step(&self.motion, dt, seabed);

        for reading in
            self.sensors
                .sample(now, &self.vehicle, seabed, self.frame.as_ref(), &mut self.rng.0)
        {
            self.inbox.send(now, reading);
        }
        let leader = self.scenario.leader.as_ref().map(|track| track.pose(now));
        if let Some(pose) = leader {
            self.inbox.send(now, InboundData::LeaderPose(pose));
        }
        if self.ground_link && now >= self.next_ground_beat {
            self.next_ground_beat = now + GROUND_HEARTBEAT_PERIOD;
            self.inbox.send(now, InboundData::GroundHeartbeat);
        }

        let report = self.executor.tick(now);
        self.consume(&report, now);

        self.motion = self
            .servers
            .update(now, &self.vehicle, leader, &mut self.rng.0);
        report
    }

    fn apply(&mut self, action: EventAction, now: f64) {
        info!(now, ?action, "scripted event");
        let data = match action {
            EventAction::Leak { active } => {
                self.sensors.set_leak(active);
                None
            }
            EventAction::NavDropout { active } => {
                self.sensors.set_dropout(active);
                None
            }
            EventAction::GroundLink { active } => {
                self.ground_link = active;
                None
            }
            EventAction::EnableSource { source, enabled } => {
                Some(InboundData::EnableSource { source, enabled })
            }
            EventAction::PushWaypoints { source, mission } => {
                match self.catalog.get(&mission) {
                    Some(file) if !file.waypoints.is_empty() => Some(InboundData::WaypointPush {
                        source,
                        waypoints: file.waypoints.clone(),
                    }),
                    _ => {
                        warn!(%mission, "mission has no waypoint list");
                        None
                    }
                }
            }
            EventAction::LoadPlan { mission } => {
                match self.catalog.get(&mission).and_then(|m| m.plan.clone()) {
                    Some(plan) => Some(InboundData::PlanDb(plan)),
                    None => {
                        warn!(%mission, "mission has no plan-db message");
                        None
                    }
                }
            }
            EventAction::Abort => Some(InboundData::Abort),
            EventAction::SafetyReset => Some(InboundData::SafetyReset),
            EventAction::Mission { command } => Some(InboundData::MissionControl(command)),
        };
        if let Some(data) = data {
            self.inbox.send(now, data);
        }
    }

    fn consume(&mut self, report: &TickReport, now: f64) {
        let summary = &mut self.summary;
        summary.ticks += 1;
        summary.sim_time = now;
        summary.fault_episodes += report
            .transitions
            .iter()
            .filter(|t| matches!(t, SafetyTransition::EpisodeStarted { .. }))
            .count() as u32;

        for payload in report.payloads() {
            match payload {
                Outbound::Dvl { command } => self.sensors.command_dvl(*command, now),
                Outbound::LastWaypoint { id } => summary.waypoints_completed.push(id.clone()),
                Outbound::MissionComplete { plan_id } => {
                    summary.missions_completed.push(plan_id.clone())
                }
                Outbound::Distress { reason } => summary.distress.push(*reason),
                _ => {}
            }
        }

        summary.final_behavior = report.behavior;
        summary.final_position = self.vehicle.pose().position;
        summary.final_depth = self.vehicle.depth();
        summary.goals_issued = ActionKind::ALL
            .iter()
            .map(|kind| (*kind, self.executor.gateway().issued(*kind)))
            .collect();
    }
}
