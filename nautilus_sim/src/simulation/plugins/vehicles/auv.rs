// nautilus_sim/src/simulation/plugins/vehicles/auv.rs

//! Ground-truth AUV model: unicycle kinematics in the plane plus a
//! rate-limited depth controller.

use crate::simulation::config::VehicleConfig;
use nalgebra::{Point2, Vector2};
use nautilus_core::gateway::{SpeedControl, ZControl};
use nautilus_core::types::{wrap_to_pi, Pose2D};

/// What the action servers currently ask the vehicle to do.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MotionCommand {
    #[default]
    Hold,
    Goto {
        target: Point2<f64>,
        speed: SpeedControl,
        z: ZControl,
    },
    /// Stop and rise to the surface.
    Surface,
}

#[derive(Debug, Clone)]
pub struct AuvModel {
    config: VehicleConfig,
    pose: Pose2D,
    depth: f64,
    target_depth: f64,
    speed: f64,
}

impl AuvModel {
    pub fn new(config: &VehicleConfig) -> Self {
        let [x, y, yaw_deg] = config.start;
        Self {
            pose: Pose2D::new(x, y, yaw_deg.to_radians()),
            depth: config.start_depth,
            target_depth: config.start_depth,
            speed: 0.0,
            config: config.clone(),
        }
    }

    pub fn pose(&self) -> Pose2D {
        self.pose
    }

    pub fn depth(&self) -> f64 {
        self.depth
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn altitude(&self, seabed_depth: f64) -> f64 {
        (seabed_depth - self.depth).max(0.0)
    }

    /// Commanded forward speed in m/s, capped at the vehicle's cruise speed.
    fn cruise_speed(&self, speed: SpeedControl) -> f64 {
        let requested = match speed {
            SpeedControl::None => self.config.max_speed,
            SpeedControl::Rpm(rpm) => rpm / self.config.rpm_per_mps,
            SpeedControl::Speed(s) => s,
        };
        requested.clamp(0.0, self.config.max_speed)
    }

    /// Advances the model by `dt` seconds.
    pub fn step(&mut self, command: &MotionCommand, dt: f64, seabed_depth: f64) {
        match *command {
            MotionCommand::Hold => self.speed = 0.0,
            MotionCommand::Surface => {
                self.speed = 0.0;
                self.target_depth = 0.0;
            }
            MotionCommand::Goto { target, speed, z } => {
                match z {
                    ZControl::Depth(d) => self.target_depth = d,
                    ZControl::Altitude(a) => self.target_depth = seabed_depth - a,
                    ZControl::None => {}
                }
                self.steer_towards(&target, self.cruise_speed(speed), dt);
            }
        }

        let max_dz = self.config.dive_rate * dt;
        let dz = (self.target_depth - self.depth).clamp(-max_dz, max_dz);
        self.depth = (self.depth + dz).clamp(0.0, seabed_depth);
    }

    fn steer_towards(&mut self, target: &Point2<f64>, cruise: f64, dt: f64) {
        let to_target = target - self.pose.position;
        let distance = to_target.norm();
        if distance < 1e-6 {
            self.speed = 0.0;
            return;
        }
        let desired = to_target.y.atan2(to_target.x);
        let error = wrap_to_pi(desired - self.pose.yaw);
        let max_turn = self.config.turn_rate_deg.to_radians() * dt;
        self.pose.yaw = wrap_to_pi(self.pose.yaw + error.clamp(-max_turn, max_turn));

        // Slow down while the target is off the bow, so the vehicle turns
        // in place rather than orbiting a close target.
        self.speed = cruise * error.cos().max(0.0);
        let step = (self.speed * dt).min(distance);
        self.pose.position += Vector2::new(self.pose.yaw.cos(), self.pose.yaw.sin()) * step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn model() -> AuvModel {
        AuvModel::new(&VehicleConfig::default())
    }

    #[test]
    fn goto_reaches_a_target_behind_the_vehicle() {
        let mut auv = model();
        let cmd = MotionCommand::Goto {
            target: Point2::new(-10.0, 5.0),
            speed: SpeedControl::None,
            z: ZControl::Depth(2.0),
        };
        for _ in 0..400 {
            auv.step(&cmd, 0.1, 20.0);
        }
        assert_abs_diff_eq!(auv.pose().position, Point2::new(-10.0, 5.0), epsilon = 0.2);
        assert_abs_diff_eq!(auv.depth(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn rpm_is_converted_and_capped() {
        let auv = model();
        assert_abs_diff_eq!(auv.cruise_speed(SpeedControl::Rpm(800.0)), 1.0);
        assert_abs_diff_eq!(auv.cruise_speed(SpeedControl::Speed(9.0)), 1.5);
    }

    #[test]
    fn surface_stops_and_rises_at_the_dive_rate() {
        let mut auv = AuvModel::new(&VehicleConfig {
            start_depth: 3.0,
            ..VehicleConfig::default()
        });
        auv.step(&MotionCommand::Surface, 1.0, 20.0);
        assert_abs_diff_eq!(auv.depth(), 2.7, epsilon = 1e-9);
        assert_eq!(auv.speed(), 0.0);
        for _ in 0..20 {
            auv.step(&MotionCommand::Hold, 1.0, 20.0);
        }
        assert_eq!(auv.depth(), 0.0);
    }

    #[test]
    fn altitude_hold_tracks_the_seabed() {
        let mut auv = model();
        let cmd = MotionCommand::Goto {
            target: Point2::new(0.0, 0.0),
            speed: SpeedControl::None,
            z: ZControl::Altitude(4.0),
        };
        for _ in 0..100 {
            auv.step(&cmd, 1.0, 10.0);
        }
        assert_abs_diff_eq!(auv.altitude(10.0), 4.0, epsilon = 1e-9);
    }
}
