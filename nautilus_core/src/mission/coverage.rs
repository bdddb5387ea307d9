// nautilus_core/src/mission/coverage.rs

//! Lawnmower coverage of a polygon.
//!
//! Lanes run east-west and are stacked northwards from the lowest vertex.
//! Each lane is clipped to the polygon (outermost crossings, so concave
//! polygons are covered by their row-wise hull). Lane spacing starts at the
//! sensor swath and shrinks as the expected localization error accumulates
//! along the path, so adjacent swaths keep overlapping even when the vehicle
//! has drifted: `spacing_k = max(swath - 2 * growth * travelled_k, swath / 4)`.

use nalgebra::Point2;

/// Smallest spacing allowed, as a fraction of the swath.
const MIN_SPACING_FRACTION: f64 = 0.25;

/// Generates the coverage waypoints for `polygon`.
///
/// `error_growth` is metres of localization error per metre travelled.
/// Returns an empty list for polygons with fewer than three vertices.
pub fn lawnmower(polygon: &[Point2<f64>], swath: f64, error_growth: f64) -> Vec<Point2<f64>> {
    if polygon.len() < 3 || swath <= 0.0 {
        return Vec::new();
    }

    let min_y = polygon.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = polygon.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
    let min_spacing = swath * MIN_SPACING_FRACTION;

    let half = swath / 2.0;
    let top_lane = max_y - half;

    let mut points = Vec::new();
    let mut travelled = 0.0;
    let mut last: Option<Point2<f64>> = None;
    let mut left_to_right = true;
    // Lanes sit half a swath inside the boundary; a strip thinner than one
    // swath gets a single lane down its middle.
    let mut y = if max_y - min_y <= swath {
        (min_y + max_y) / 2.0
    } else {
        min_y + half
    };

    loop {
        if let Some((x0, x1)) = clip_row(polygon, y) {
            let (a, b) = if left_to_right { (x0, x1) } else { (x1, x0) };
            let start = Point2::new(a, y);
            let end = Point2::new(b, y);
            if let Some(prev) = last {
                travelled += (start - prev).norm();
            }
            travelled += (end - start).norm();
            points.push(start);
            points.push(end);
            last = Some(end);
            left_to_right = !left_to_right;
        }
        if y + half >= max_y - 1e-9 {
            break;
        }
        let spacing = (swath - 2.0 * error_growth * travelled).max(min_spacing);
        let next = (y + spacing).min(top_lane);
        if next <= y {
            break;
        }
        y = next;
    }
    points
}

/// Outermost x crossings of the horizontal line at `y`.
fn clip_row(polygon: &[Point2<f64>], y: f64) -> Option<(f64, f64)> {
    let mut xs: Vec<f64> = Vec::new();
    let n = polygon.len();
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        if (a.y - b.y).abs() < f64::EPSILON {
            if (a.y - y).abs() < 1e-9 {
                xs.push(a.x);
                xs.push(b.x);
            }
            continue;
        }
        let (lo, hi) = if a.y < b.y { (a, b) } else { (b, a) };
        if y >= lo.y && y <= hi.y {
            let t = (y - lo.y) / (hi.y - lo.y);
            xs.push(lo.x + t * (hi.x - lo.x));
        }
    }
    let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min.is_finite() && max.is_finite() {
        Some((min, max))
    } else {
        None
    }
}
