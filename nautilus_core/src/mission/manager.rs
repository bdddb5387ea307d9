// nautilus_core/src/mission/manager.rs

//! Owns the active plan and arbitrates between the waypoint sources.
//!
//! At most one streamed source (GUI, live, algae-follow) is enabled at a
//! time. Enabling one replaces whichever was enabled before in the same call,
//! so there is never a moment where two are enabled. Pushes from any other
//! source are rejected. A plan-db message always wins: it disables every
//! stream and replaces the plan wholesale.

use super::plan::{MissionPlan, PlanState};
use super::plandb::{self, Expansion, PlanDbMessage};
use super::waypoint::{Similarity, Target, Waypoint, WaypointSource, WaypointSpec};
use crate::config::PlanConfig;
use crate::error::PlanError;
use crate::geo::LocalFrame;
use crate::messages::MissionCommand;
use crate::types::{GeoPoint, Timestamp};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Something the rest of the executor should publish or react to.
#[derive(Debug, Clone, PartialEq)]
pub enum MissionEvent {
    PlanLoaded { plan_id: String, waypoints: usize },
    WaypointCompleted { id: String },
    MissionComplete { plan_id: String },
    PlanCleared,
}

/// Result of a stream push that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The plan was replaced by the pushed waypoints.
    Replaced,
    /// The push repeated the current head and was dropped.
    IgnoredSimilar,
}

#[derive(Debug)]
pub struct MissionPlanManager {
    config: PlanConfig,
    error_per_metre: f64,
    enabled: Option<WaypointSource>,
    plan: Option<MissionPlan>,
    frame: Option<LocalFrame>,
    events: Vec<MissionEvent>,
    /// Head waypoint whose leg ran out of retries. The plan stays paused
    /// until the operator starts or resumes it.
    stalled: Option<String>,
}

impl MissionPlanManager {
    /// `error_growth` is the localization error growth in m/s.
    pub fn new(config: &PlanConfig, error_growth: f64) -> Self {
        Self {
            config: config.clone(),
            error_per_metre: error_growth / config.nominal_speed,
            enabled: None,
            plan: None,
            frame: config.geo_origin.map(LocalFrame::new),
            events: Vec::new(),
            stalled: None,
        }
    }

    // --- Source arbitration ---

    /// Enables or disables a streamed source. Enabling one disables the
    /// others; disabling a source that is not the enabled one is a no-op.
    pub fn set_source_enabled(
        &mut self,
        source: WaypointSource,
        enabled: bool,
    ) -> Result<(), PlanError> {
        if !source.is_stream() {
            return Err(PlanError::NotAStream(source));
        }
        if enabled {
            if self.enabled != Some(source) {
                info!(?source, previous = ?self.enabled, "waypoint source enabled");
            }
            self.enabled = Some(source);
        } else if self.enabled == Some(source) {
            info!(?source, "waypoint source disabled");
            self.enabled = None;
        }
        Ok(())
    }

    pub fn enabled_source(&self) -> Option<WaypointSource> {
        self.enabled
    }

    pub fn is_enabled(&self, source: WaypointSource) -> bool {
        self.enabled == Some(source)
    }

    // --- Frame ---

    /// Latches the local frame origin from a GPS fix if none is known yet.
    pub fn observe_fix(&mut self, fix: GeoPoint) {
        if self.frame.is_none() {
            info!(lat = fix.lat, lon = fix.lon, "local frame origin latched from GPS");
            self.frame = Some(LocalFrame::new(fix));
        }
    }

    pub fn frame(&self) -> Option<&LocalFrame> {
        self.frame.as_ref()
    }

    // --- Plan ingestion ---

    /// Replaces the plan with waypoints streamed by `source`. A push that
    /// resolves to no usable waypoints clears the plan.
    pub fn push_waypoints(
        &mut self,
        source: WaypointSource,
        specs: &[WaypointSpec],
        now: Timestamp,
    ) -> Result<PushOutcome, PlanError> {
        if !source.is_stream() {
            return Err(PlanError::NotAStream(source));
        }
        if !self.is_enabled(source) {
            return Err(PlanError::SourceNotEnabled(source));
        }
        let waypoints = match self.resolve(source, specs) {
            Ok(waypoints) => waypoints,
            Err(e) => {
                self.clear();
                return Err(e);
            }
        };

        if matches!(source, WaypointSource::Live | WaypointSource::AlgaeFollow)
            && waypoints.len() == 1
        {
            let tol = self.similarity();
            let same_as_head = self
                .plan
                .as_ref()
                .filter(|p| p.source() == source && p.is_running())
                .and_then(|p| p.head())
                .is_some_and(|head| head.is_too_similar_to(&waypoints[0], &tol));
            if same_as_head {
                return Ok(PushOutcome::IgnoredSimilar);
            }
        }

        let plan_id = match specs {
            [single] => format!("{source:?}:{}", single.id),
            _ => format!("{source:?}:{now:.1}"),
        };
        match MissionPlan::new(plan_id, source, waypoints, now) {
            Ok(plan) => {
                self.install(plan);
                Ok(PushOutcome::Replaced)
            }
            Err(e) => {
                self.clear();
                Err(e)
            }
        }
    }

    /// Replaces the plan with the contents of a plan-db message. Every
    /// streamed source is disabled first. On error the old plan is gone.
    pub fn load_plandb(&mut self, msg: &PlanDbMessage, now: Timestamp) -> Result<usize, PlanError> {
        if self.enabled.take().is_some() {
            info!("plan-db message received, streamed sources disabled");
        }
        let Some(frame) = self.frame else {
            self.clear();
            return Err(PlanError::NoOrigin(msg.plan_id.clone()));
        };
        let opts = Expansion {
            default_tolerance: self.config.default_goal_tolerance,
            coverage_swath: self.config.coverage_swath,
            error_per_metre: self.error_per_metre,
        };
        let waypoints = plandb::expand(msg, &frame, &opts);
        match MissionPlan::new(msg.plan_id.clone(), WaypointSource::PlanDb, waypoints, now) {
            Ok(plan) => {
                let n = plan.waypoints().len();
                self.install(plan);
                Ok(n)
            }
            Err(e) => {
                self.clear();
                Err(e)
            }
        }
    }

    /// Applies an operator mission command. Returns whether it changed
    /// anything.
    pub fn command(&mut self, cmd: MissionCommand) -> bool {
        if cmd == MissionCommand::Stop {
            let had_plan = self.plan.is_some();
            self.clear();
            return had_plan;
        }
        let Some(plan) = self.plan.as_mut() else {
            warn!(?cmd, "mission command without a plan");
            return false;
        };
        let changed = match cmd {
            MissionCommand::Start => {
                plan.start();
                true
            }
            MissionCommand::Pause => plan.pause(),
            MissionCommand::Resume => plan.resume(),
            MissionCommand::Stop => false,
        };
        if changed {
            info!(?cmd, plan = plan.plan_id(), "mission command applied");
            if matches!(cmd, MissionCommand::Start | MissionCommand::Resume) {
                self.stalled = None;
            }
        }
        changed
    }

    // --- Progress ---

    pub fn plan(&self) -> Option<&MissionPlan> {
        self.plan.as_ref()
    }

    pub fn state(&self) -> Option<PlanState> {
        self.plan.as_ref().map(|p| p.state())
    }

    /// Running with a head waypoint left to visit.
    pub fn is_active(&self) -> bool {
        self.plan
            .as_ref()
            .is_some_and(|p| p.is_running() && p.head().is_some())
    }

    pub fn head(&self) -> Option<&Waypoint> {
        self.plan.as_ref().and_then(|p| p.head())
    }

    pub fn previous(&self) -> Option<&Waypoint> {
        self.plan.as_ref().and_then(|p| p.previous())
    }

    pub fn head_arrived(&self) -> bool {
        self.plan.as_ref().is_some_and(|p| p.head_arrived())
    }

    pub fn mark_arrived(&mut self) {
        if let Some(plan) = self.plan.as_mut() {
            plan.mark_arrived();
        }
    }

    /// Dequeues the head waypoint, raising the completion events.
    pub fn complete_head(&mut self) -> Option<String> {
        let plan = self.plan.as_mut()?;
        let id = plan.advance()?.id.clone();
        info!(waypoint = %id, plan = plan.plan_id(), "waypoint completed");
        self.events
            .push(MissionEvent::WaypointCompleted { id: id.clone() });
        if plan.is_complete() {
            info!(plan = plan.plan_id(), "mission complete");
            self.events.push(MissionEvent::MissionComplete {
                plan_id: plan.plan_id().to_string(),
            });
        }
        Some(id)
    }

    /// Gives up on the head waypoint's leg: the plan is paused with the head
    /// kept, so an operator start or resume retries it with a fresh budget.
    pub fn abandon_head(&mut self) -> bool {
        let Some(plan) = self.plan.as_mut() else {
            return false;
        };
        let Some(id) = plan.head().map(|wp| wp.id.clone()) else {
            return false;
        };
        if !plan.pause() {
            return false;
        }
        warn!(waypoint = %id, plan = plan.plan_id(), "leg retries exhausted, plan paused");
        self.stalled = Some(id);
        true
    }

    pub fn stalled(&self) -> Option<&str> {
        self.stalled.as_deref()
    }

    pub fn drain_events(&mut self) -> Vec<MissionEvent> {
        std::mem::take(&mut self.events)
    }

    // --- Internals ---

    fn similarity(&self) -> Similarity {
        Similarity {
            z: self.config.similar_z_tolerance,
            rpm: self.config.similar_rpm_tolerance,
            speed: self.config.similar_speed_tolerance,
        }
    }

    fn install(&mut self, mut plan: MissionPlan) {
        if self.config.auto_start {
            plan.start();
        }
        info!(
            plan = plan.plan_id(),
            source = ?plan.source(),
            waypoints = plan.waypoints().len(),
            state = ?plan.state(),
            "mission plan replaced"
        );
        self.stalled = None;
        self.events.push(MissionEvent::PlanLoaded {
            plan_id: plan.plan_id().to_string(),
            waypoints: plan.waypoints().len(),
        });
        self.plan = Some(plan);
    }

    fn clear(&mut self) {
        self.stalled = None;
        if self.plan.take().is_some() {
            self.events.push(MissionEvent::PlanCleared);
        }
    }

    /// Resolves specs into the local frame. Geodetic targets are skipped
    /// while no origin is known.
    fn resolve(
        &self,
        source: WaypointSource,
        specs: &[WaypointSpec],
    ) -> Result<Vec<Waypoint>, PlanError> {
        let mut out = Vec::with_capacity(specs.len());
        let mut first_skipped = None;
        for spec in specs {
            let target = match spec.target {
                Target::Local { x, y } => nalgebra::Point2::new(x, y),
                Target::Geo { lat, lon } => match self.frame {
                    Some(frame) => frame.to_local(&GeoPoint::new(lat, lon)),
                    None => {
                        warn!(waypoint = %spec.id, "geodetic waypoint before any origin, skipped");
                        first_skipped.get_or_insert_with(|| spec.id.clone());
                        continue;
                    }
                },
            };
            out.push(Waypoint {
                id: spec.id.clone(),
                target,
                tolerance: spec
                    .tolerance
                    .unwrap_or(self.config.default_goal_tolerance),
                z_control: spec.z_control,
                speed_control: spec.speed_control,
                task: spec.task,
                source,
                extra: BTreeMap::new(),
            });
        }
        if out.is_empty() {
            if let Some(id) = first_skipped {
                return Err(PlanError::NoOrigin(id));
            }
        }
        Ok(out)
    }
}
