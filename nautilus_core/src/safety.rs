// nautilus_core/src/safety.rs

//! Hard safety invariants, evaluated once per tick before any behavior.
//!
//! Every check looks at the tick's snapshot and yields violated, clear or
//! unknown. An unknown result (stale or missing reading) leaves that
//! violation exactly as it was: a stale sensor neither raises nor clears a
//! fault on its own.
//!
//! Fault episodes are counted on the rising edge of the violation set. Once
//! the count exceeds the budget the monitor gives up: the
//! `EmergencyTrialsExhausted` violation is latched and only `reset` clears it.

use crate::blackboard::{BlackboardSnapshot, Field};
use crate::config::SafetyConfig;
use crate::types::Timestamp;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Individual safety violations, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Violation {
    Leak,
    DepthExceeded,
    AltitudeExceeded,
    LostCommunication,
    /// Operator abort or emergency command. Latched until reset.
    Aborted,
    EmergencyTrialsExhausted,
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    Violated,
    Clear,
    Unknown,
}

impl From<Option<bool>> for Check {
    fn from(violated: Option<bool>) -> Self {
        match violated {
            Some(true) => Check::Violated,
            Some(false) => Check::Clear,
            None => Check::Unknown,
        }
    }
}

/// Read-only view of the monitor's state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafetyState {
    /// Active violations and when each was first detected.
    violations: BTreeMap<Violation, Timestamp>,
    trials: u32,
    gave_up: bool,
    sensor_loss: bool,
}

impl SafetyState {
    /// Any violation active. Level-triggered: suppresses every other action.
    pub fn is_fault(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn contains(&self, violation: Violation) -> bool {
        self.violations.contains_key(&violation)
    }

    pub fn first_detected(&self, violation: Violation) -> Option<Timestamp> {
        self.violations.get(&violation).copied()
    }

    /// Active violations in priority order.
    pub fn violations(&self) -> Vec<Violation> {
        self.violations.keys().copied().collect()
    }

    /// Highest-priority active violation.
    pub fn primary(&self) -> Option<Violation> {
        self.violations.keys().next().copied()
    }

    /// Fault episodes seen since the last reset. Also the id of the current
    /// episode while a fault is active.
    pub fn trials(&self) -> u32 {
        self.trials
    }

    pub fn has_given_up(&self) -> bool {
        self.gave_up
    }

    /// Position and depth have both been unavailable for longer than the
    /// sensor loss timeout.
    pub fn sensor_loss(&self) -> bool {
        self.sensor_loss
    }
}

/// A change worth reporting, produced by `SafetyMonitor::evaluate`.
#[derive(Debug, Clone, PartialEq)]
pub enum SafetyTransition {
    /// The violation set went from empty to non-empty.
    EpisodeStarted {
        episode: u32,
        violations: Vec<Violation>,
    },
    /// A new episode pushed the count over the budget.
    GaveUp { episode: u32 },
    /// Every violation cleared.
    Cleared,
    /// Total sensor loss began.
    SensorLoss,
}

#[derive(Debug)]
pub struct SafetyMonitor {
    config: SafetyConfig,
    state: SafetyState,
    /// Start of the current below-`min_altitude` stretch.
    low_altitude_since: Option<Timestamp>,
    abort_requested: Option<Timestamp>,
    /// First evaluation time; stands in for "last seen" before a sensor
    /// has ever reported.
    started_at: Option<Timestamp>,
}

impl SafetyMonitor {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            config: config.clone(),
            state: SafetyState::default(),
            low_altitude_since: None,
            abort_requested: None,
            started_at: None,
        }
    }

    pub fn state(&self) -> &SafetyState {
        &self.state
    }

    /// Latches the `Aborted` violation from the next evaluation on.
    pub fn request_abort(&mut self, now: Timestamp) {
        warn!("abort requested");
        self.abort_requested.get_or_insert(now);
    }

    /// Clears every violation, the trial count and the give-up state.
    pub fn reset(&mut self) {
        info!(
            trials = self.state.trials,
            gave_up = self.state.gave_up,
            "safety state reset"
        );
        self.state = SafetyState::default();
        self.low_altitude_since = None;
        self.abort_requested = None;
    }

    /// Runs every check in priority order against one snapshot.
    pub fn evaluate(&mut self, snap: &BlackboardSnapshot) -> Vec<SafetyTransition> {
        let now = snap.now();
        let started_at = *self.started_at.get_or_insert(now);
        let was_fault = self.state.is_fault();
        let mut transitions = Vec::new();

        let leak = Check::from(snap.leak());
        self.apply(Violation::Leak, leak, now);

        let depth = Check::from(snap.depth().map(|d| d > self.config.max_depth));
        self.apply(Violation::DepthExceeded, depth, now);

        let altitude = self.check_altitude(snap.altitude(), now);
        self.apply(Violation::AltitudeExceeded, altitude, now);

        if let Some(timeout) = self.config.ground_link_timeout {
            let silence = snap
                .age(Field::GroundContact)
                .unwrap_or(now - started_at);
            self.apply(
                Violation::LostCommunication,
                Check::from(Some(silence > timeout)),
                now,
            );
        }

        if let Some(at) = self.abort_requested {
            self.state.violations.entry(Violation::Aborted).or_insert(at);
        }

        let is_fault = self.state.is_fault();
        if is_fault && !was_fault {
            self.state.trials = self.state.trials.saturating_add(1);
            let episode = self.state.trials;
            let violations = self.state.violations();
            warn!(episode, ?violations, "safety fault episode started");
            transitions.push(SafetyTransition::EpisodeStarted {
                episode,
                violations,
            });
            if episode > self.config.emergency_trials_before_giving_up && !self.state.gave_up {
                error!(
                    episode,
                    budget = self.config.emergency_trials_before_giving_up,
                    "emergency trials exhausted, giving up"
                );
                self.state.gave_up = true;
                transitions.push(SafetyTransition::GaveUp { episode });
            }
        } else if !is_fault && was_fault {
            info!("all safety violations cleared");
            transitions.push(SafetyTransition::Cleared);
        }
        if self.state.gave_up {
            self.state
                .violations
                .entry(Violation::EmergencyTrialsExhausted)
                .or_insert(now);
        }

        let lost = self.sensors_lost(snap, started_at);
        if lost && !self.state.sensor_loss {
            error!("position and depth both lost");
            transitions.push(SafetyTransition::SensorLoss);
        }
        self.state.sensor_loss = lost;

        transitions
    }

    fn apply(&mut self, violation: Violation, check: Check, now: Timestamp) {
        match check {
            Check::Violated => {
                self.state.violations.entry(violation).or_insert(now);
            }
            Check::Clear => {
                self.state.violations.remove(&violation);
            }
            Check::Unknown => {}
        }
    }

    /// Below the absolute floor faults at once; below `min_altitude` only
    /// after the grace window.
    fn check_altitude(&mut self, altitude: Option<f64>, now: Timestamp) -> Check {
        let Some(altitude) = altitude else {
            return Check::Unknown;
        };
        if altitude >= self.config.min_altitude {
            self.low_altitude_since = None;
            return Check::Clear;
        }
        let since = *self.low_altitude_since.get_or_insert(now);
        if altitude < self.config.absolute_min_altitude
            || now - since >= self.config.min_altitude_grace
        {
            Check::Violated
        } else {
            Check::Clear
        }
    }

    fn sensors_lost(&self, snap: &BlackboardSnapshot, started_at: Timestamp) -> bool {
        let silent = |field| {
            snap.age(field)
                .unwrap_or(snap.now() - started_at)
        };
        let limit = self.config.sensor_loss_timeout;
        silent(Field::Position) > limit && silent(Field::Depth) > limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::{Blackboard, FieldValue};

    fn config() -> SafetyConfig {
        SafetyConfig {
            emergency_trials_before_giving_up: 2,
            ..SafetyConfig::default()
        }
    }

    struct Rig {
        bb: Blackboard,
        monitor: SafetyMonitor,
    }

    impl Rig {
        fn new(config: SafetyConfig) -> Self {
            Self {
                bb: Blackboard::new(config.sensor_timeout, 0.0),
                monitor: SafetyMonitor::new(&config),
            }
        }

        fn set(&mut self, value: FieldValue, now: f64) {
            self.bb.update(value, now).unwrap();
        }

        fn eval(&mut self, now: f64) -> Vec<SafetyTransition> {
            let snap = self.bb.snapshot(now);
            self.monitor.evaluate(&snap)
        }
    }

    #[test]
    fn leak_starts_one_episode_while_it_persists() {
        let mut rig = Rig::new(config());
        rig.set(FieldValue::Leak(false), 0.0);
        assert!(rig.eval(0.0).is_empty());

        rig.set(FieldValue::Leak(true), 1.0);
        let t = rig.eval(1.0);
        assert_eq!(
            t,
            vec![SafetyTransition::EpisodeStarted {
                episode: 1,
                violations: vec![Violation::Leak]
            }]
        );
        for i in 2..10 {
            rig.set(FieldValue::Leak(true), i as f64);
            assert!(rig.eval(i as f64).is_empty());
        }
        assert_eq!(rig.monitor.state().trials(), 1);
        assert_eq!(rig.monitor.state().first_detected(Violation::Leak), Some(1.0));
    }

    #[test]
    fn gives_up_on_the_episode_after_the_budget() {
        let mut rig = Rig::new(config());
        let mut now = 0.0;
        for episode in 1..=3u32 {
            rig.set(FieldValue::Leak(true), now);
            let t = rig.eval(now);
            assert!(matches!(
                t[0],
                SafetyTransition::EpisodeStarted { episode: e, .. } if e == episode
            ));
            let gave_up = t.contains(&SafetyTransition::GaveUp { episode });
            assert_eq!(gave_up, episode == 3);
            now += 1.0;
            rig.set(FieldValue::Leak(false), now);
            rig.eval(now);
            now += 1.0;
        }
        let state = rig.monitor.state();
        assert!(state.has_given_up());
        // Giving up is terminal: the leak is gone but the fault remains.
        assert!(state.is_fault());
        assert_eq!(state.violations(), vec![Violation::EmergencyTrialsExhausted]);

        rig.monitor.reset();
        rig.eval(now);
        assert!(!rig.monitor.state().is_fault());
        assert_eq!(rig.monitor.state().trials(), 0);
    }

    #[test]
    fn stale_reading_keeps_the_violation() {
        let mut rig = Rig::new(config());
        rig.set(FieldValue::Depth(25.0), 0.0);
        rig.eval(0.0);
        assert!(rig.monitor.state().contains(Violation::DepthExceeded));
        // Depth is now 5 s old, older than the 2 s sensor timeout.
        rig.eval(5.0);
        assert!(rig.monitor.state().contains(Violation::DepthExceeded));
        rig.set(FieldValue::Depth(10.0), 5.0);
        rig.eval(5.0);
        assert!(!rig.monitor.state().is_fault());
    }

    #[test]
    fn low_altitude_waits_for_the_grace_window() {
        let mut rig = Rig::new(config());
        for (now, expect) in [(0.0, false), (1.0, false), (2.9, false), (3.0, true)] {
            rig.set(FieldValue::Altitude(0.8), now);
            rig.eval(now);
            assert_eq!(
                rig.monitor.state().contains(Violation::AltitudeExceeded),
                expect,
                "at t={now}"
            );
        }
        // Climbing back above the limit clears it and restarts the window.
        rig.set(FieldValue::Altitude(2.0), 4.0);
        rig.eval(4.0);
        assert!(!rig.monitor.state().is_fault());
    }

    #[test]
    fn very_low_altitude_faults_at_once() {
        let mut rig = Rig::new(config());
        rig.set(FieldValue::Altitude(0.3), 0.0);
        rig.eval(0.0);
        assert!(rig.monitor.state().contains(Violation::AltitudeExceeded));
    }

    #[test]
    fn abort_latches_until_reset() {
        let mut rig = Rig::new(config());
        rig.monitor.request_abort(1.0);
        rig.eval(1.0);
        rig.eval(2.0);
        assert_eq!(rig.monitor.state().primary(), Some(Violation::Aborted));
        rig.monitor.reset();
        rig.eval(3.0);
        assert!(!rig.monitor.state().is_fault());
    }

    #[test]
    fn ground_link_silence_is_a_violation_when_enabled() {
        let mut rig = Rig::new(SafetyConfig {
            ground_link_timeout: Some(5.0),
            ..config()
        });
        rig.set(FieldValue::GroundContact, 0.0);
        rig.eval(0.0);
        rig.eval(4.0);
        assert!(!rig.monitor.state().is_fault());
        rig.eval(6.0);
        assert!(rig.monitor.state().contains(Violation::LostCommunication));
        rig.set(FieldValue::GroundContact, 6.5);
        rig.eval(6.5);
        assert!(!rig.monitor.state().is_fault());
    }

    #[test]
    fn total_sensor_loss_is_reported_once() {
        let mut rig = Rig::new(config());
        rig.set(FieldValue::Depth(3.0), 0.0);
        rig.set(FieldValue::Position(nalgebra::Point2::new(0.0, 0.0)), 0.0);
        assert!(rig.eval(0.0).is_empty());
        assert!(rig.eval(9.0).is_empty());
        assert_eq!(rig.eval(11.0), vec![SafetyTransition::SensorLoss]);
        assert!(rig.eval(12.0).is_empty());
        assert!(rig.monitor.state().sensor_loss());
        // Losing sensors is not a safety fault by itself.
        assert!(!rig.monitor.state().is_fault());
    }
}
