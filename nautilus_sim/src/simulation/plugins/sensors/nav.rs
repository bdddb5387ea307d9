// nautilus_sim/src/simulation/plugins/sensors/nav.rs

//! Navigation sensor suite: noisy position, attitude, depth and altitude
//! every tick, GPS fixes near the surface, and the DVL bottom-lock flag.

use crate::simulation::config::SensorConfig;
use crate::simulation::plugins::vehicles::auv::AuvModel;
use nalgebra::Vector2;
use nautilus_core::geo::LocalFrame;
use nautilus_core::messages::{DvlCommand, InboundData};
use nautilus_core::types::{wrap_to_pi, Attitude, Timestamp};
use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError};
use tracing::debug;

pub struct NavSensors {
    config: SensorConfig,
    // Store the noise distributions for efficiency
    position_noise: Normal<f64>,
    depth_noise: Normal<f64>,
    altitude_noise: Normal<f64>,
    heading_noise: Normal<f64>,
    next_gps: Timestamp,
    dvl_powered_since: Option<Timestamp>,
    /// Navigation outage: position and attitude are withheld.
    dropout: bool,
    leak: bool,
}

impl NavSensors {
    pub fn new(config: &SensorConfig) -> Result<Self, NormalError> {
        Ok(Self {
            position_noise: Normal::new(0.0, config.position_stddev)?,
            depth_noise: Normal::new(0.0, config.depth_stddev)?,
            altitude_noise: Normal::new(0.0, config.altitude_stddev)?,
            heading_noise: Normal::new(0.0, config.heading_stddev_deg.to_radians())?,
            next_gps: 0.0,
            dvl_powered_since: None,
            dropout: false,
            leak: false,
            config: config.clone(),
        })
    }

    pub fn set_leak(&mut self, leak: bool) {
        self.leak = leak;
    }

    pub fn set_dropout(&mut self, dropout: bool) {
        self.dropout = dropout;
    }

    pub fn dvl_powered(&self) -> bool {
        self.dvl_powered_since.is_some()
    }

    /// Applies a power command from the executor.
    pub fn command_dvl(&mut self, command: DvlCommand, now: Timestamp) {
        match command {
            DvlCommand::Start => {
                self.dvl_powered_since.get_or_insert(now);
            }
            DvlCommand::Stop => self.dvl_powered_since = None,
        }
        debug!(?command, now, "dvl power");
    }

    /// One tick worth of readings for the true vehicle state.
    pub fn sample<R: Rng>(
        &mut self,
        now: Timestamp,
        truth: &AuvModel,
        seabed_depth: f64,
        frame: Option<&LocalFrame>,
        rng: &mut R,
    ) -> Vec<InboundData> {
        let mut readings = Vec::with_capacity(8);
        let pose = truth.pose();
        let noisy_position = pose.position
            + Vector2::new(
                self.position_noise.sample(rng),
                self.position_noise.sample(rng),
            );

        if !self.dropout {
            readings.push(InboundData::Position(noisy_position));
            readings.push(InboundData::Attitude(Attitude {
                roll: 0.0,
                pitch: 0.0,
                yaw: wrap_to_pi(pose.yaw + self.heading_noise.sample(rng)),
            }));
        }
        let depth = (truth.depth() + self.depth_noise.sample(rng)).max(0.0);
        readings.push(InboundData::Depth(depth));
        let altitude = truth.altitude(seabed_depth);
        readings.push(InboundData::Altitude(
            (altitude + self.altitude_noise.sample(rng)).max(0.0),
        ));
        readings.push(InboundData::Leak(self.leak));

        if let Some(since) = self.dvl_powered_since {
            let locked =
                now - since >= self.config.dvl_lock_delay && altitude <= self.config.dvl_max_range;
            readings.push(InboundData::DvlFeedback { locked });
        }

        if let Some(frame) = frame {
            if truth.depth() <= self.config.gps_max_depth && now >= self.next_gps {
                self.next_gps = now + 1.0 / self.config.gps_rate;
                readings.push(InboundData::GpsFix {
                    point: frame.to_geo(&noisy_position),
                    accuracy: self.config.gps_accuracy,
                });
            }
        }
        readings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::config::VehicleConfig;
    use nautilus_core::types::GeoPoint;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn quiet() -> SensorConfig {
        SensorConfig {
            position_stddev: 0.0,
            depth_stddev: 0.0,
            altitude_stddev: 0.0,
            heading_stddev_deg: 0.0,
            ..SensorConfig::default()
        }
    }

    fn count<F: Fn(&InboundData) -> bool>(readings: &[InboundData], pred: F) -> usize {
        readings.iter().filter(|r| pred(r)).count()
    }

    #[test]
    fn dvl_locks_after_the_delay() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut nav = NavSensors::new(&quiet()).unwrap();
        let auv = AuvModel::new(&VehicleConfig::default());
        let dvl = |r: &[InboundData]| {
            r.iter().find_map(|d| match d {
                InboundData::DvlFeedback { locked } => Some(*locked),
                _ => None,
            })
        };

        assert_eq!(dvl(&nav.sample(0.0, &auv, 20.0, None, &mut rng)), None);
        nav.command_dvl(DvlCommand::Start, 1.0);
        assert_eq!(dvl(&nav.sample(1.5, &auv, 20.0, None, &mut rng)), Some(false));
        assert_eq!(dvl(&nav.sample(3.0, &auv, 20.0, None, &mut rng)), Some(true));
        nav.command_dvl(DvlCommand::Stop, 4.0);
        assert!(!nav.dvl_powered());
    }

    #[test]
    fn gps_only_at_the_surface_and_at_its_rate() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut nav = NavSensors::new(&quiet()).unwrap();
        let frame = LocalFrame::new(GeoPoint::new(58.0, 11.0));
        let surfaced = AuvModel::new(&VehicleConfig::default());
        let gps = |r: &[InboundData]| count(r, |d| matches!(d, InboundData::GpsFix { .. }));

        let fixes: usize = (0..20)
            .map(|i| gps(&nav.sample(i as f64 * 0.1, &surfaced, 20.0, Some(&frame), &mut rng)))
            .sum();
        assert_eq!(fixes, 2);

        let submerged = AuvModel::new(&VehicleConfig {
            start_depth: 5.0,
            ..VehicleConfig::default()
        });
        assert_eq!(gps(&nav.sample(10.0, &submerged, 20.0, Some(&frame), &mut rng)), 0);
    }

    #[test]
    fn dropout_withholds_the_pose() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut nav = NavSensors::new(&quiet()).unwrap();
        let auv = AuvModel::new(&VehicleConfig::default());
        nav.set_dropout(true);
        nav.set_leak(true);
        let r = nav.sample(0.0, &auv, 20.0, None, &mut rng);
        assert_eq!(count(&r, |d| matches!(d, InboundData::Position(_))), 0);
        assert_eq!(count(&r, |d| matches!(d, InboundData::Depth(_))), 1);
        assert!(r.contains(&InboundData::Leak(true)));
    }

    #[test]
    fn negative_noise_is_rejected() {
        let config = SensorConfig {
            depth_stddev: -1.0,
            ..SensorConfig::default()
        };
        assert!(NavSensors::new(&config).is_err());
    }
}
