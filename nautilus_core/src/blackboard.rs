// nautilus_core/src/blackboard.rs

//! The shared vehicle-state store.
//!
//! Every field is stamped with the time of the measurement that produced it.
//! Updates are last-write-wins per field, but an update older than what is
//! already stored is rejected so out-of-order delivery can never roll the
//! state backwards. Nodes never read the live store: each tick works on a
//! `BlackboardSnapshot`, an owned copy that cannot change under it.
//! Staleness is not stored; it is derived from the snapshot time on read.

use crate::error::BlackboardError;
use crate::types::{Attitude, GeoPoint, Pose2D, Stamped, Timestamp};
use nalgebra::Point2;
use serde::Serialize;

/// Names the individually-stamped fields of the blackboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Field {
    Position,
    Depth,
    Altitude,
    Attitude,
    Leak,
    DvlLock,
    GpsFix,
    LeaderPose,
    GroundContact,
}

/// A typed value for one blackboard field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Position(Point2<f64>),
    Depth(f64),
    Altitude(f64),
    Attitude(Attitude),
    Leak(bool),
    DvlLock(bool),
    /// A GPS fix and its horizontal accuracy in metres.
    GpsFix { point: GeoPoint, accuracy: f64 },
    LeaderPose(Pose2D),
    GroundContact,
}

impl FieldValue {
    pub fn field(&self) -> Field {
        match self {
            FieldValue::Position(_) => Field::Position,
            FieldValue::Depth(_) => Field::Depth,
            FieldValue::Altitude(_) => Field::Altitude,
            FieldValue::Attitude(_) => Field::Attitude,
            FieldValue::Leak(_) => Field::Leak,
            FieldValue::DvlLock(_) => Field::DvlLock,
            FieldValue::GpsFix { .. } => Field::GpsFix,
            FieldValue::LeaderPose(_) => Field::LeaderPose,
            FieldValue::GroundContact => Field::GroundContact,
        }
    }

    fn is_finite(&self) -> bool {
        match self {
            FieldValue::Position(p) => p.x.is_finite() && p.y.is_finite(),
            FieldValue::Depth(v) | FieldValue::Altitude(v) => v.is_finite(),
            FieldValue::Attitude(a) => {
                a.roll.is_finite() && a.pitch.is_finite() && a.yaw.is_finite()
            }
            FieldValue::GpsFix { point, accuracy } => point.is_finite() && accuracy.is_finite(),
            FieldValue::LeaderPose(p) => {
                p.position.x.is_finite() && p.position.y.is_finite() && p.yaw.is_finite()
            }
            FieldValue::Leak(_) | FieldValue::DvlLock(_) | FieldValue::GroundContact => true,
        }
    }
}

/// Everything the executor knows about the vehicle and its surroundings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleState {
    pub position: Option<Stamped<Point2<f64>>>,
    /// Positive down, in metres.
    pub depth: Option<Stamped<f64>>,
    /// Height above the seabed, in metres.
    pub altitude: Option<Stamped<f64>>,
    pub attitude: Option<Stamped<Attitude>>,
    pub leak: Option<Stamped<bool>>,
    pub dvl_lock: Option<Stamped<bool>>,
    pub gps_fix: Option<Stamped<GeoPoint>>,
    /// Accuracy of the last GPS fix; the base of the localization error model.
    pub fix_accuracy: f64,
    pub leader_pose: Option<Stamped<Pose2D>>,
    pub ground_contact: Option<Stamped<()>>,
}

impl VehicleState {
    fn stamp_of(&self, field: Field) -> Option<Timestamp> {
        match field {
            Field::Position => self.position.map(|s| s.stamp),
            Field::Depth => self.depth.map(|s| s.stamp),
            Field::Altitude => self.altitude.map(|s| s.stamp),
            Field::Attitude => self.attitude.map(|s| s.stamp),
            Field::Leak => self.leak.map(|s| s.stamp),
            Field::DvlLock => self.dvl_lock.map(|s| s.stamp),
            Field::GpsFix => self.gps_fix.map(|s| s.stamp),
            Field::LeaderPose => self.leader_pose.map(|s| s.stamp),
            Field::GroundContact => self.ground_contact.map(|s| s.stamp),
        }
    }
}

/// The single owned store of vehicle state.
#[derive(Debug, Clone)]
pub struct Blackboard {
    state: VehicleState,
    sensor_timeout: f64,
    error_growth: f64,
    /// Incremented on every accepted update.
    version: u64,
}

impl Blackboard {
    pub fn new(sensor_timeout: f64, error_growth: f64) -> Self {
        Self {
            state: VehicleState::default(),
            sensor_timeout,
            error_growth,
            version: 0,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Stores `value` for its field if `stamp` is not older than the stored one.
    pub fn update(&mut self, value: FieldValue, stamp: Timestamp) -> Result<(), BlackboardError> {
        let field = value.field();
        if !value.is_finite() || !stamp.is_finite() {
            return Err(BlackboardError::NonFinite(field));
        }
        if let Some(stored) = self.state.stamp_of(field) {
            if stamp < stored {
                return Err(BlackboardError::OutOfOrder {
                    field,
                    stored,
                    received: stamp,
                });
            }
        }

        let s = &mut self.state;
        match value {
            FieldValue::Position(p) => s.position = Some(Stamped::new(p, stamp)),
            FieldValue::Depth(d) => s.depth = Some(Stamped::new(d, stamp)),
            FieldValue::Altitude(a) => s.altitude = Some(Stamped::new(a, stamp)),
            FieldValue::Attitude(a) => s.attitude = Some(Stamped::new(a, stamp)),
            FieldValue::Leak(l) => s.leak = Some(Stamped::new(l, stamp)),
            FieldValue::DvlLock(l) => s.dvl_lock = Some(Stamped::new(l, stamp)),
            FieldValue::GpsFix { point, accuracy } => {
                s.gps_fix = Some(Stamped::new(point, stamp));
                s.fix_accuracy = accuracy.max(0.0);
            }
            FieldValue::LeaderPose(p) => s.leader_pose = Some(Stamped::new(p, stamp)),
            FieldValue::GroundContact => s.ground_contact = Some(Stamped::new((), stamp)),
        }
        self.version += 1;
        Ok(())
    }

    /// An immutable copy of the current state, valid for one tick.
    pub fn snapshot(&self, now: Timestamp) -> BlackboardSnapshot {
        BlackboardSnapshot {
            state: self.state.clone(),
            taken_at: now,
            version: self.version,
            sensor_timeout: self.sensor_timeout,
            error_growth: self.error_growth,
        }
    }
}

/// One tick's read-only view of the blackboard.
///
/// The plain accessors only return readings younger than the sensor timeout;
/// a stale reading is reported as unknown (`None`).
#[derive(Debug, Clone, PartialEq)]
pub struct BlackboardSnapshot {
    state: VehicleState,
    taken_at: Timestamp,
    version: u64,
    sensor_timeout: f64,
    error_growth: f64,
}

impl BlackboardSnapshot {
    pub fn now(&self) -> Timestamp {
        self.taken_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn raw(&self) -> &VehicleState {
        &self.state
    }

    /// Age of a field at snapshot time, `None` if it was never written.
    pub fn age(&self, field: Field) -> Option<f64> {
        self.state.stamp_of(field).map(|stamp| self.taken_at - stamp)
    }

    /// Whether a field is present and within the sensor timeout.
    pub fn is_fresh(&self, field: Field) -> bool {
        self.is_fresh_within(field, self.sensor_timeout)
    }

    pub fn is_fresh_within(&self, field: Field, timeout: f64) -> bool {
        self.age(field).is_some_and(|age| age <= timeout)
    }

    fn fresh<T: Copy>(&self, field: Field, value: Option<Stamped<T>>) -> Option<T> {
        if self.is_fresh(field) {
            value.map(|s| s.value)
        } else {
            None
        }
    }

    pub fn position(&self) -> Option<Point2<f64>> {
        self.fresh(Field::Position, self.state.position)
    }

    pub fn depth(&self) -> Option<f64> {
        self.fresh(Field::Depth, self.state.depth)
    }

    pub fn altitude(&self) -> Option<f64> {
        self.fresh(Field::Altitude, self.state.altitude)
    }

    pub fn attitude(&self) -> Option<Attitude> {
        self.fresh(Field::Attitude, self.state.attitude)
    }

    pub fn leak(&self) -> Option<bool> {
        self.fresh(Field::Leak, self.state.leak)
    }

    pub fn dvl_lock(&self) -> Option<bool> {
        self.fresh(Field::DvlLock, self.state.dvl_lock)
    }

    /// The vehicle pose, combining the fresh position with the fresh heading.
    pub fn pose(&self) -> Option<Pose2D> {
        let position = self.position()?;
        let yaw = self.attitude()?.yaw;
        Some(Pose2D { position, yaw })
    }

    /// Leader pose if it is younger than `timeout`.
    pub fn leader_pose(&self, timeout: f64) -> Option<Pose2D> {
        if self.is_fresh_within(Field::LeaderPose, timeout) {
            self.state.leader_pose.map(|s| s.value)
        } else {
            None
        }
    }

    /// Last GPS fix regardless of age.
    pub fn last_fix(&self) -> Option<Stamped<GeoPoint>> {
        self.state.gps_fix
    }

    /// Estimated localization error: the accuracy of the last fix plus a
    /// linear growth since then. `None` before the first fix.
    pub fn localization_error(&self) -> Option<f64> {
        self.state.gps_fix.map(|fix| {
            let since = (self.taken_at - fix.stamp).max(0.0);
            self.state.fix_accuracy + self.error_growth * since
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn board() -> Blackboard {
        Blackboard::new(2.0, 0.1)
    }

    #[test]
    fn older_update_is_rejected() {
        let mut bb = board();
        bb.update(FieldValue::Depth(3.0), 10.0).unwrap();
        let err = bb.update(FieldValue::Depth(1.0), 9.5).unwrap_err();
        assert_eq!(
            err,
            BlackboardError::OutOfOrder {
                field: Field::Depth,
                stored: 10.0,
                received: 9.5
            }
        );
        assert_eq!(bb.snapshot(10.0).depth(), Some(3.0));
    }

    #[test]
    fn fields_are_stamped_independently() {
        let mut bb = board();
        bb.update(FieldValue::Depth(3.0), 10.0).unwrap();
        // An older altitude is fine: it is a different field.
        bb.update(FieldValue::Altitude(7.0), 5.0).unwrap();
        assert_eq!(bb.version(), 2);
    }

    #[test]
    fn equal_stamp_overwrites() {
        let mut bb = board();
        bb.update(FieldValue::Leak(false), 4.0).unwrap();
        bb.update(FieldValue::Leak(true), 4.0).unwrap();
        assert_eq!(bb.snapshot(4.0).leak(), Some(true));
    }

    #[test]
    fn staleness_is_derived_at_read_time() {
        let mut bb = board();
        bb.update(FieldValue::Depth(3.0), 10.0).unwrap();
        assert_eq!(bb.snapshot(11.9).depth(), Some(3.0));
        let late = bb.snapshot(12.5);
        assert_eq!(late.depth(), None);
        assert_eq!(late.raw().depth.map(|s| s.value), Some(3.0));
        assert_abs_diff_eq!(late.age(Field::Depth).unwrap(), 2.5);
    }

    #[test]
    fn snapshot_does_not_see_later_updates() {
        let mut bb = board();
        bb.update(FieldValue::Depth(3.0), 1.0).unwrap();
        let snap = bb.snapshot(1.0);
        bb.update(FieldValue::Depth(9.0), 1.5).unwrap();
        assert_eq!(snap.depth(), Some(3.0));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut bb = board();
        assert_eq!(
            bb.update(FieldValue::Depth(f64::NAN), 1.0),
            Err(BlackboardError::NonFinite(Field::Depth))
        );
    }

    #[test]
    fn localization_error_grows_between_fixes() {
        let mut bb = board();
        assert_eq!(bb.snapshot(0.0).localization_error(), None);
        bb.update(
            FieldValue::GpsFix {
                point: GeoPoint::new(58.0, 11.0),
                accuracy: 1.0,
            },
            10.0,
        )
        .unwrap();
        assert_abs_diff_eq!(bb.snapshot(10.0).localization_error().unwrap(), 1.0);
        assert_abs_diff_eq!(bb.snapshot(30.0).localization_error().unwrap(), 3.0);
        bb.update(
            FieldValue::GpsFix {
                point: GeoPoint::new(58.0, 11.0),
                accuracy: 0.5,
            },
            30.0,
        )
        .unwrap();
        assert_abs_diff_eq!(bb.snapshot(30.0).localization_error().unwrap(), 0.5);
    }

    #[test]
    fn pose_needs_fresh_position_and_heading() {
        let mut bb = board();
        bb.update(FieldValue::Position(Point2::new(1.0, 2.0)), 0.0)
            .unwrap();
        assert_eq!(bb.snapshot(0.0).pose(), None);
        bb.update(
            FieldValue::Attitude(Attitude {
                yaw: 0.5,
                ..Attitude::default()
            }),
            0.0,
        )
        .unwrap();
        assert_eq!(bb.snapshot(0.0).pose(), Some(Pose2D::new(1.0, 2.0, 0.5)));
    }
}
