// nautilus_core/src/geo.rs

use crate::types::GeoPoint;
use nalgebra::Point2;

/// Mean Earth radius used by the local projection, in metres.
const EARTH_RADIUS: f64 = 6_371_008.8;

/// A local east/north tangent frame anchored at a geodetic origin.
///
/// Uses an equirectangular projection, which is accurate to well under a
/// metre over the few kilometres a mission spans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    origin: GeoPoint,
    cos_lat: f64,
}

impl LocalFrame {
    pub fn new(origin: GeoPoint) -> Self {
        Self {
            origin,
            cos_lat: origin.lat.to_radians().cos(),
        }
    }

    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// Geodetic to local (east, north) metres.
    pub fn to_local(&self, point: &GeoPoint) -> Point2<f64> {
        let d_lat = (point.lat - self.origin.lat).to_radians();
        let d_lon = (point.lon - self.origin.lon).to_radians();
        Point2::new(EARTH_RADIUS * d_lon * self.cos_lat, EARTH_RADIUS * d_lat)
    }

    /// Local (east, north) metres to geodetic.
    pub fn to_geo(&self, point: &Point2<f64>) -> GeoPoint {
        let lat = self.origin.lat + (point.y / EARTH_RADIUS).to_degrees();
        let lon = self.origin.lon + (point.x / (EARTH_RADIUS * self.cos_lat)).to_degrees();
        GeoPoint::new(lat, lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn origin_maps_to_zero() {
        let frame = LocalFrame::new(GeoPoint::new(58.25, 11.45));
        let p = frame.to_local(&GeoPoint::new(58.25, 11.45));
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn one_millidegree_north_is_about_111_metres() {
        let frame = LocalFrame::new(GeoPoint::new(58.25, 11.45));
        let p = frame.to_local(&GeoPoint::new(58.251, 11.45));
        assert_abs_diff_eq!(p.y, 111.19, epsilon = 0.05);
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn round_trip_is_stable() {
        let frame = LocalFrame::new(GeoPoint::new(-33.9, 151.2));
        let local = Point2::new(420.0, -1300.0);
        let back = frame.to_local(&frame.to_geo(&local));
        assert_abs_diff_eq!(back.x, local.x, epsilon = 1e-6);
        assert_abs_diff_eq!(back.y, local.y, epsilon = 1e-6);
    }
}
