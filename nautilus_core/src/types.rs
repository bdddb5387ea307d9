// nautilus_core/src/types.rs

use nalgebra::{Point2, Vector2};
use num_traits::{Float, FloatConst};
use serde::{Deserialize, Serialize};

// --- Core Type Aliases ---

/// Seconds on the mission clock. The caller of `tick` owns this clock; the
/// core never reads wall time.
pub type Timestamp = f64;

// =========================================================================
// == Geometry ==
// =========================================================================

/// A planar pose in the local east/north frame. `yaw` is measured from +x
/// (east) counter-clockwise, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    pub position: Point2<f64>,
    pub yaw: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self {
            position: Point2::new(x, y),
            yaw,
        }
    }

    /// Unit vector pointing along the heading.
    pub fn heading(&self) -> Vector2<f64> {
        Vector2::new(self.yaw.cos(), self.yaw.sin())
    }

    pub fn distance_to(&self, other: &Point2<f64>) -> f64 {
        (other - self.position).norm()
    }
}

impl Default for Pose2D {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// Vehicle attitude in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// A geodetic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// A value together with the time it was measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stamped<T> {
    pub value: T,
    pub stamp: Timestamp,
}

impl<T> Stamped<T> {
    pub fn new(value: T, stamp: Timestamp) -> Self {
        Self { value, stamp }
    }

    pub fn age(&self, now: Timestamp) -> f64 {
        now - self.stamp
    }
}

/// Normalises an angle into `[-PI, PI)`.
pub fn wrap_to_pi<T: Float + FloatConst>(angle: T) -> T {
    let two_pi = T::PI() + T::PI();
    let mut wrapped = (angle + T::PI()) % two_pi;
    if wrapped < T::zero() {
        wrapped = wrapped + two_pi;
    }
    wrapped - T::PI()
}

/// Normalises an angle into `[0, 2 PI)`.
pub fn wrap_to_two_pi<T: Float + FloatConst>(angle: T) -> T {
    let two_pi = T::PI() + T::PI();
    let wrapped = angle % two_pi;
    if wrapped < T::zero() {
        wrapped + two_pi
    } else {
        wrapped
    }
}

/// Heading of the straight line from `from` to `to`.
pub fn bearing(from: &Point2<f64>, to: &Point2<f64>) -> f64 {
    let d = to - from;
    d.y.atan2(d.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn wrap_to_pi_folds_large_angles() {
        assert_abs_diff_eq!(wrap_to_pi(3.0 * PI + 0.5), -PI + 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(wrap_to_pi(-PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_to_pi(2.0 * PI + 0.25), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_to_pi(-2.0 * PI - 0.25), -0.25, epsilon = 1e-12);
    }

    #[test]
    fn wrap_to_two_pi_is_non_negative() {
        assert_abs_diff_eq!(wrap_to_two_pi(-PI / 2.0), 1.5 * PI, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_to_two_pi(5.0 * PI), PI, epsilon = 1e-12);
    }

    #[test]
    fn bearing_points_north() {
        let b = bearing(&Point2::new(1.0, 1.0), &Point2::new(1.0, 5.0));
        assert_abs_diff_eq!(b, PI / 2.0, epsilon = 1e-12);
    }
}
