// nautilus_core/src/planning/dubins.rs

//! Shortest curvature-bounded paths between two oriented points.
//!
//! All six words are evaluated in the normalised frame (turning radius 1,
//! start at the origin, goal on the +x axis) and the shortest feasible one
//! is kept. Sampling maps back to the world frame.

use crate::types::{wrap_to_two_pi, Pose2D};
use nalgebra::Point2;
use serde::Serialize;
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DubinsWord {
    Lsl,
    Rsr,
    Lsr,
    Rsl,
    Rlr,
    Lrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Left,
    Straight,
    Right,
}

impl DubinsWord {
    const ALL: [DubinsWord; 6] = [
        DubinsWord::Lsl,
        DubinsWord::Rsr,
        DubinsWord::Lsr,
        DubinsWord::Rsl,
        DubinsWord::Rlr,
        DubinsWord::Lrl,
    ];

    fn segments(self) -> [Segment; 3] {
        use Segment::*;
        match self {
            DubinsWord::Lsl => [Left, Straight, Left],
            DubinsWord::Rsr => [Right, Straight, Right],
            DubinsWord::Lsr => [Left, Straight, Right],
            DubinsWord::Rsl => [Right, Straight, Left],
            DubinsWord::Rlr => [Right, Left, Right],
            DubinsWord::Lrl => [Left, Right, Left],
        }
    }

    /// Normalised segment lengths for this word, if it is feasible.
    fn solve(self, alpha: f64, beta: f64, d: f64) -> Option<[f64; 3]> {
        let (sa, ca) = alpha.sin_cos();
        let (sb, cb) = beta.sin_cos();
        let c_ab = (alpha - beta).cos();
        let m = wrap_to_two_pi;

        match self {
            DubinsWord::Lsl => {
                let p_sq = 2.0 + d * d - 2.0 * c_ab + 2.0 * d * (sa - sb);
                let p_sq = feasible(p_sq)?;
                let tmp = (cb - ca).atan2(d + sa - sb);
                Some([m(tmp - alpha), p_sq.sqrt(), m(beta - tmp)])
            }
            DubinsWord::Rsr => {
                let p_sq = 2.0 + d * d - 2.0 * c_ab + 2.0 * d * (sb - sa);
                let p_sq = feasible(p_sq)?;
                let tmp = (ca - cb).atan2(d - sa + sb);
                Some([m(alpha - tmp), p_sq.sqrt(), m(tmp - beta)])
            }
            DubinsWord::Lsr => {
                let p_sq = -2.0 + d * d + 2.0 * c_ab + 2.0 * d * (sa + sb);
                let p_sq = feasible(p_sq)?;
                let p = p_sq.sqrt();
                let tmp = (-ca - cb).atan2(d + sa + sb) - (-2.0f64).atan2(p);
                Some([m(tmp - alpha), p, m(tmp - beta)])
            }
            DubinsWord::Rsl => {
                let p_sq = -2.0 + d * d + 2.0 * c_ab - 2.0 * d * (sa + sb);
                let p_sq = feasible(p_sq)?;
                let p = p_sq.sqrt();
                let tmp = (ca + cb).atan2(d - sa - sb) - 2.0f64.atan2(p);
                Some([m(alpha - tmp), p, m(beta - tmp)])
            }
            DubinsWord::Rlr => {
                let tmp = (6.0 - d * d + 2.0 * c_ab + 2.0 * d * (sa - sb)) / 8.0;
                let tmp = feasible_cos(tmp)?;
                let phi = (ca - cb).atan2(d - sa + sb);
                let p = m(2.0 * PI - tmp.acos());
                let t = m(alpha - phi + m(p / 2.0));
                Some([t, p, m(alpha - beta - t + m(p))])
            }
            DubinsWord::Lrl => {
                let tmp = (6.0 - d * d + 2.0 * c_ab + 2.0 * d * (sb - sa)) / 8.0;
                let tmp = feasible_cos(tmp)?;
                let phi = (ca - cb).atan2(d + sa - sb);
                let p = m(2.0 * PI - tmp.acos());
                let t = m(-alpha - phi + p / 2.0);
                Some([t, p, m(m(beta) - alpha - t + m(p))])
            }
        }
    }
}

/// Tolerance on the feasibility tests; tangent configurations land exactly
/// on the boundary and rounding must not reject them.
const FEASIBILITY_EPS: f64 = 1e-9;

fn feasible(p_sq: f64) -> Option<f64> {
    (p_sq >= -FEASIBILITY_EPS).then(|| p_sq.max(0.0))
}

fn feasible_cos(c: f64) -> Option<f64> {
    (c.abs() <= 1.0 + FEASIBILITY_EPS).then(|| c.clamp(-1.0, 1.0))
}

/// A solved Dubins path.
#[derive(Debug, Clone, PartialEq)]
pub struct DubinsPath {
    start: Pose2D,
    radius: f64,
    word: DubinsWord,
    /// Normalised segment lengths (multiply by `radius` for metres).
    lengths: [f64; 3],
}

impl DubinsPath {
    /// Shortest path from `start` to `goal` with turning radius `radius`.
    /// `None` when the radius is not positive or an input is not finite.
    pub fn shortest(start: &Pose2D, goal: &Pose2D, radius: f64) -> Option<Self> {
        if !(radius > 0.0) {
            return None;
        }
        let delta = goal.position - start.position;
        let d = delta.norm() / radius;
        let theta = if d > 0.0 {
            wrap_to_two_pi(delta.y.atan2(delta.x))
        } else {
            0.0
        };
        let alpha = wrap_to_two_pi(start.yaw - theta);
        let beta = wrap_to_two_pi(goal.yaw - theta);
        if !(alpha.is_finite() && beta.is_finite() && d.is_finite()) {
            return None;
        }

        DubinsWord::ALL
            .into_iter()
            .filter_map(|word| word.solve(alpha, beta, d).map(|lengths| (word, lengths)))
            .min_by(|a, b| a.1.iter().sum::<f64>().total_cmp(&b.1.iter().sum::<f64>()))
            .map(|(word, lengths)| Self {
                start: *start,
                radius,
                word,
                lengths,
            })
    }

    pub fn word(&self) -> DubinsWord {
        self.word
    }

    /// Total length in metres.
    pub fn length(&self) -> f64 {
        self.lengths.iter().sum::<f64>() * self.radius
    }

    /// Pose at arc length `s` metres along the path, clamped to its ends.
    pub fn sample(&self, s: f64) -> Pose2D {
        let mut remaining = (s / self.radius).clamp(0.0, self.lengths.iter().sum());
        // Walk the segments in the normalised frame anchored at the start.
        let (mut x, mut y, mut phi) = (0.0, 0.0, self.start.yaw);
        for (segment, &len) in self.word.segments().iter().zip(self.lengths.iter()) {
            let t = remaining.min(len);
            match segment {
                Segment::Left => {
                    x += (phi + t).sin() - phi.sin();
                    y += -(phi + t).cos() + phi.cos();
                    phi += t;
                }
                Segment::Right => {
                    x += -(phi - t).sin() + phi.sin();
                    y += (phi - t).cos() - phi.cos();
                    phi -= t;
                }
                Segment::Straight => {
                    x += phi.cos() * t;
                    y += phi.sin() * t;
                }
            }
            remaining -= t;
            if remaining <= 0.0 {
                break;
            }
        }
        Pose2D {
            position: Point2::new(
                self.start.position.x + x * self.radius,
                self.start.position.y + y * self.radius,
            ),
            yaw: wrap_to_two_pi(phi),
        }
    }

    /// Points every `step` metres, always including both ends.
    pub fn sample_many(&self, step: f64) -> Vec<Point2<f64>> {
        let length = self.length();
        let step = if step > 0.0 { step } else { length.max(1.0) };
        let mut points = Vec::new();
        let mut s = 0.0;
        while s < length {
            points.push(self.sample(s).position);
            s += step;
        }
        points.push(self.sample(length).position);
        points
    }
}
