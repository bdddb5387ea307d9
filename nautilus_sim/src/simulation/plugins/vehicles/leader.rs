// nautilus_sim/src/simulation/plugins/vehicles/leader.rs

use crate::simulation::config::LeaderTrack;
use nautilus_core::types::{wrap_to_pi, Pose2D};
use std::f64::consts::FRAC_PI_2;

impl LeaderTrack {
    /// Ground-truth pose of the leader at simulation time `t`.
    pub fn pose(&self, t: f64) -> Pose2D {
        match *self {
            LeaderTrack::Straight { start, velocity } => Pose2D::new(
                start[0] + velocity[0] * t,
                start[1] + velocity[1] * t,
                velocity[1].atan2(velocity[0]),
            ),
            LeaderTrack::Circle {
                center,
                radius,
                speed,
            } => {
                let angle = if radius > 0.0 { speed / radius * t } else { 0.0 };
                Pose2D::new(
                    center[0] + radius * angle.cos(),
                    center[1] + radius * angle.sin(),
                    wrap_to_pi(angle + FRAC_PI_2),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn straight_track_moves_at_constant_velocity() {
        let track = LeaderTrack::Straight {
            start: [1.0, 2.0],
            velocity: [0.0, 0.5],
        };
        let pose = track.pose(10.0);
        assert_abs_diff_eq!(pose.position.x, 1.0);
        assert_abs_diff_eq!(pose.position.y, 7.0);
        assert_abs_diff_eq!(pose.yaw, FRAC_PI_2);
    }

    #[test]
    fn circle_track_heads_along_the_tangent() {
        let track = LeaderTrack::Circle {
            center: [0.0, 0.0],
            radius: 10.0,
            speed: 1.0,
        };
        // A quarter lap.
        let pose = track.pose(5.0 * PI);
        assert_abs_diff_eq!(pose.position.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.position.y, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.yaw.abs(), PI, epsilon = 1e-9);
    }
}
