// nautilus_core/src/dvl.rs

//! Depth-gated duty cycling of the Doppler velocity log.
//!
//! The DVL only works with the transducer submerged, so it is started once
//! the vehicle is deep enough and stopped again when it comes up. Coming up
//! does not stop it at once: it first sits in `Cooldown` for `dvl_cooldown`
//! seconds, and going back down in that time resumes it without a restart.
//!
//! Power and lock are separate: a powered DVL only counts as available while
//! its latest fresh feedback reports bottom lock.

use crate::config::DvlConfig;
use crate::messages::DvlCommand;
use crate::types::Timestamp;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DvlState {
    Off,
    /// Powered, waiting for bottom lock.
    Starting,
    Running,
    /// Above the running depth since `since`.
    Cooldown { since: Timestamp },
}

#[derive(Debug)]
pub struct DvlController {
    config: DvlConfig,
    state: DvlState,
    /// Last fresh lock report; a stale report counts as unlocked.
    locked: bool,
}

impl DvlController {
    pub fn new(config: &DvlConfig) -> Self {
        Self {
            config: config.clone(),
            state: DvlState::Off,
            locked: false,
        }
    }

    pub fn state(&self) -> DvlState {
        self.state
    }

    /// Whether DVL velocity can be trusted for navigation.
    pub fn is_available(&self) -> bool {
        self.locked && matches!(self.state, DvlState::Running | DvlState::Cooldown { .. })
    }

    /// Steps the state machine. `depth` and `lock` are the fresh readings
    /// from the snapshot; without a depth reading nothing changes.
    pub fn update(
        &mut self,
        depth: Option<f64>,
        lock: Option<bool>,
        now: Timestamp,
    ) -> Option<DvlCommand> {
        if lock == Some(false) && self.locked && self.state == DvlState::Running {
            info!(?depth, "dvl bottom lock lost");
        }
        self.locked = lock == Some(true);
        let depth = depth?;
        let deep = depth >= self.config.dvl_running_depth;
        let (next, command) = match self.state {
            DvlState::Off if deep => (DvlState::Starting, Some(DvlCommand::Start)),
            DvlState::Off => (DvlState::Off, None),
            DvlState::Starting if !deep => (DvlState::Off, Some(DvlCommand::Stop)),
            DvlState::Starting if lock == Some(true) => (DvlState::Running, None),
            DvlState::Starting => (DvlState::Starting, None),
            DvlState::Running if !deep => (DvlState::Cooldown { since: now }, None),
            DvlState::Running => (DvlState::Running, None),
            DvlState::Cooldown { .. } if deep => (DvlState::Running, None),
            DvlState::Cooldown { since } if now - since >= self.config.dvl_cooldown => {
                (DvlState::Off, Some(DvlCommand::Stop))
            }
            DvlState::Cooldown { since } => (DvlState::Cooldown { since }, None),
        };
        if next != self.state {
            if command.is_some() {
                info!(from = ?self.state, to = ?next, depth, "dvl transition");
            } else {
                debug!(from = ?self.state, to = ?next, depth, "dvl transition");
            }
            self.state = next;
        }
        command
    }
}
