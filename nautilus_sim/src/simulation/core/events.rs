// nautilus_sim/src/simulation/core/events.rs

use crate::simulation::config::{EventAction, ScriptedEvent};
use std::collections::VecDeque;

/// The scenario's scripted events, released in time order.
#[derive(Debug, Default)]
pub struct EventScript {
    pending: VecDeque<ScriptedEvent>,
}

impl EventScript {
    pub fn new(events: &[ScriptedEvent]) -> Self {
        let mut sorted = events.to_vec();
        // Stable, so events at the same time keep their file order.
        sorted.sort_by(|a, b| a.at.total_cmp(&b.at));
        Self {
            pending: sorted.into(),
        }
    }

    /// Every event due at or before `now`, oldest first.
    pub fn due(&mut self, now: f64) -> Vec<EventAction> {
        let mut due = Vec::new();
        while self.pending.front().is_some_and(|e| e.at <= now) {
            if let Some(event) = self.pending.pop_front() {
                due.push(event.action);
            }
        }
        due
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_in_time_order_keeping_ties() {
        let ev = |at, active| ScriptedEvent {
            at,
            action: EventAction::Leak { active },
        };
        let mut script = EventScript::new(&[ev(5.0, true), ev(1.0, false), ev(5.0, false)]);
        assert!(script.due(0.5).is_empty());
        assert_eq!(script.due(1.0), vec![EventAction::Leak { active: false }]);
        assert_eq!(
            script.due(10.0),
            vec![
                EventAction::Leak { active: true },
                EventAction::Leak { active: false }
            ]
        );
        assert_eq!(script.remaining(), 0);
    }
}
