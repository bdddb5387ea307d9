// nautilus_core/src/leader.rs

//! Relative-pose tracking of a leader vehicle.

use crate::config::LeaderConfig;
use crate::gateway::FollowGoal;
use crate::types::Pose2D;
use nalgebra::Point2;

/// What the follower should do this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LeaderDecision {
    /// Leader pose or own position is missing or stale; hand control back.
    Unavailable,
    /// Too close: hold station instead of following.
    HoldStation { gap: f64 },
    Follow { gap: f64, leader: Pose2D },
}

#[derive(Debug)]
pub struct LeaderFollower {
    config: LeaderConfig,
}

impl LeaderFollower {
    pub fn new(config: &LeaderConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enable_leader_follower
    }

    pub fn pose_timeout(&self) -> f64 {
        self.config.leader_pose_timeout
    }

    /// Decides between following and holding station. A gap at or under
    /// the minimum distance holds station.
    pub fn assess(&self, own: Option<Point2<f64>>, leader: Option<Pose2D>) -> LeaderDecision {
        let (Some(own), Some(leader)) = (own, leader) else {
            return LeaderDecision::Unavailable;
        };
        let gap = leader.distance_to(&own);
        if gap <= self.config.min_distance_to_leader {
            LeaderDecision::HoldStation { gap }
        } else {
            LeaderDecision::Follow { gap, leader }
        }
    }

    pub fn goal(&self, leader: Pose2D) -> FollowGoal {
        FollowGoal {
            leader_link: self.config.leader_link.clone(),
            leader,
            standoff: self.config.min_distance_to_leader,
        }
    }

    /// A follow goal is refreshed once the leader has moved further than
    /// `follow_refresh_distance` from where the goal was issued.
    pub fn needs_refresh(&self, active: &FollowGoal, leader: &Pose2D) -> bool {
        active.leader.distance_to(&leader.position) > self.config.follow_refresh_distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn follower() -> LeaderFollower {
        LeaderFollower::new(&LeaderConfig {
            enable_leader_follower: true,
            leader_link: "lolo/base_link".into(),
            min_distance_to_leader: 5.0,
            leader_pose_timeout: 5.0,
            follow_refresh_distance: 2.0,
        })
    }

    #[test]
    fn too_close_holds_station() {
        let f = follower();
        let d = f.assess(Some(Point2::new(0.0, 0.0)), Some(Pose2D::new(3.0, 4.0, 0.0)));
        assert_eq!(d, LeaderDecision::HoldStation { gap: 5.0 });
    }

    #[test]
    fn far_leader_is_followed() {
        let f = follower();
        let leader = Pose2D::new(30.0, 0.0, 0.0);
        assert_eq!(
            f.assess(Some(Point2::new(0.0, 0.0)), Some(leader)),
            LeaderDecision::Follow { gap: 30.0, leader }
        );
        let goal = f.goal(leader);
        assert_eq!(goal.leader_link, "lolo/base_link");
        assert_eq!(goal.standoff, 5.0);
    }

    #[test]
    fn missing_pose_yields_control() {
        let f = follower();
        assert_eq!(f.assess(None, Some(Pose2D::default())), LeaderDecision::Unavailable);
        assert_eq!(f.assess(Some(Point2::origin()), None), LeaderDecision::Unavailable);
    }

    #[test]
    fn refresh_after_leader_moves() {
        let f = follower();
        let goal = f.goal(Pose2D::new(30.0, 0.0, 0.0));
        assert!(!f.needs_refresh(&goal, &Pose2D::new(31.5, 0.0, 0.0)));
        assert!(f.needs_refresh(&goal, &Pose2D::new(32.5, 0.0, 0.0)));
    }
}
