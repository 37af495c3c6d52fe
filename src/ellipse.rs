//! Fitted moon-disk ellipses and the heading-line exit point.
//!
//! The moon disk in each frame is modeled as an ellipse with semi-axes
//! `semi_major` (along the ellipse's own x-axis) and `semi_minor`, rotated by
//! `theta_deg` counter-clockwise in image coordinates. A tracklet's heading line
//! leaves the disk at one point; that point bounds how far ahead the scorer
//! should look for the same bird.

use nalgebra::Rotation2;
use rkyv::{Archive, Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::Vector2;

/// Below this |cos| the heading is treated as vertical in the ellipse frame.
const VERTICAL_COS_EPS: f64 = 1e-12;

/// Allowed backward slack (px along the ray) when accepting a root as "ahead".
const FORWARD_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub struct Ellipse {
    pub frame: u32,
    pub center_x: f64,
    pub center_y: f64,
    pub semi_major: f64,
    pub semi_minor: f64,
    /// Rotation of the major axis, degrees.
    pub theta_deg: f64,
}

impl Ellipse {
    /// Same ellipse with its center moved to `center`.
    pub fn recentered(&self, center: [f64; 2]) -> Self {
        Self {
            center_x: center[0],
            center_y: center[1],
            ..*self
        }
    }

    pub fn center(&self) -> Vector2 {
        Vector2::new(self.center_x, self.center_y)
    }

    /// Point where the ray from `origin` along `heading_rad` crosses the ellipse.
    ///
    /// The line is solved in the ellipse's rotated frame using the slope form
    /// `y = m x + k`, which gives a quadratic in `x`. Headings that are vertical
    /// in that frame are solved at `x = origin.x` directly. Of the two crossings
    /// the one farthest along the ray is returned, so an origin inside the disk
    /// yields its exit point. Returns `None` when the line misses the ellipse or
    /// both crossings lie behind the origin.
    pub fn exit_point(&self, origin: Vector2, heading_rad: f64) -> Option<Vector2> {
        let a = self.semi_major;
        let b = self.semi_minor;
        if !(a > 0.0 && b > 0.0) || !heading_rad.is_finite() {
            return None;
        }
        let theta = self.theta_deg.to_radians();
        let to_local = Rotation2::new(-theta);
        let p = to_local * (origin - self.center());
        let phi = heading_rad - theta;
        let (sin_phi, cos_phi) = phi.sin_cos();

        let roots: [Vector2; 2] = if cos_phi.abs() < VERTICAL_COS_EPS {
            let rem = 1.0 - (p.x * p.x) / (a * a);
            if rem < 0.0 {
                return None;
            }
            let y = b * rem.sqrt();
            [Vector2::new(p.x, y), Vector2::new(p.x, -y)]
        } else {
            let m = sin_phi / cos_phi;
            let k = p.y - m * p.x;
            let qa = b * b + a * a * m * m;
            let qb = 2.0 * a * a * m * k;
            let qc = a * a * (k * k - b * b);
            let disc = qb * qb - 4.0 * qa * qc;
            if disc < 0.0 {
                return None;
            }
            let sq = disc.sqrt();
            let x1 = (-qb + sq) / (2.0 * qa);
            let x2 = (-qb - sq) / (2.0 * qa);
            [Vector2::new(x1, m * x1 + k), Vector2::new(x2, m * x2 + k)]
        };

        let dir = Vector2::new(cos_phi, sin_phi);
        let best = roots
            .iter()
            .map(|r| (r, (r - p).dot(&dir)))
            .filter(|(_, t)| *t >= -FORWARD_EPS)
            .max_by(|l, r| l.1.total_cmp(&r.1))?;

        Some(self.center() + Rotation2::new(theta) * *best.0)
    }
}

/// Dense, frame-indexed ellipse lookup.
///
/// Row `i` holds the ellipse for frame `first_frame + i`; lookup is a direct
/// index, and construction rejects any gap.
#[derive(Debug, Clone, Default)]
pub struct EllipseTable {
    first_frame: u32,
    ellipses: Vec<Ellipse>,
}

impl EllipseTable {
    /// Build a table from ellipses in ascending, consecutive frame order.
    pub fn from_ellipses(ellipses: Vec<Ellipse>) -> Result<Self> {
        let first_frame = ellipses.first().map(|e| e.frame).unwrap_or(0);
        for (i, e) in ellipses.iter().enumerate() {
            let expected = first_frame + i as u32;
            if e.frame != expected {
                return Err(Error::EllipseGap {
                    expected,
                    actual: e.frame,
                });
            }
        }
        Ok(Self {
            first_frame,
            ellipses,
        })
    }

    /// Ellipse fitted to `frame`.
    pub fn get(&self, frame: u32) -> Result<&Ellipse> {
        frame
            .checked_sub(self.first_frame)
            .and_then(|i| self.ellipses.get(i as usize))
            .ok_or(Error::MissingEllipse { frame })
    }

    pub fn len(&self) -> usize {
        self.ellipses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ellipses.is_empty()
    }

    /// Frame range covered, inclusive. `None` when empty.
    pub fn frame_range(&self) -> Option<(u32, u32)> {
        self.ellipses
            .last()
            .map(|last| (self.first_frame, last.frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn circle(r: f64) -> Ellipse {
        Ellipse {
            frame: 0,
            center_x: 0.0,
            center_y: 0.0,
            semi_major: r,
            semi_minor: r,
            theta_deg: 0.0,
        }
    }

    fn assert_near(p: Vector2, x: f64, y: f64) {
        assert!(
            (p.x - x).abs() < 1e-9 && (p.y - y).abs() < 1e-9,
            "got ({}, {}), expected ({}, {})",
            p.x,
            p.y,
            x,
            y
        );
    }

    #[test]
    fn test_exit_from_center_of_circle() {
        let c = circle(10.0);
        let origin = Vector2::zeros();
        assert_near(c.exit_point(origin, 0.0).unwrap(), 10.0, 0.0);
        assert_near(c.exit_point(origin, PI).unwrap(), -10.0, 0.0);
        let s = 10.0 / 2f64.sqrt();
        assert_near(c.exit_point(origin, FRAC_PI_4).unwrap(), s, s);
    }

    #[test]
    fn test_vertical_heading() {
        let c = circle(5.0);
        let origin = Vector2::new(3.0, 0.0);
        assert_near(c.exit_point(origin, FRAC_PI_2).unwrap(), 3.0, 4.0);
        assert_near(c.exit_point(origin, -FRAC_PI_2).unwrap(), 3.0, -4.0);
    }

    #[test]
    fn test_rotated_ellipse() {
        let e = Ellipse {
            frame: 0,
            center_x: 100.0,
            center_y: 50.0,
            semi_major: 20.0,
            semi_minor: 10.0,
            theta_deg: 90.0,
        };
        // Major axis now points along image y.
        let origin = e.center();
        assert_near(e.exit_point(origin, FRAC_PI_2).unwrap(), 100.0, 70.0);
        assert_near(e.exit_point(origin, 0.0).unwrap(), 110.0, 50.0);
    }

    #[test]
    fn test_line_missing_ellipse() {
        let c = circle(5.0);
        let origin = Vector2::new(0.0, 10.0);
        assert!(c.exit_point(origin, 0.0).is_none());
    }

    #[test]
    fn test_ellipse_behind_ray() {
        let c = circle(5.0);
        let origin = Vector2::new(20.0, 0.0);
        assert!(c.exit_point(origin, 0.0).is_none());
        // Heading back toward the disk finds the far side.
        assert_near(c.exit_point(origin, PI).unwrap(), -5.0, 0.0);
    }

    #[test]
    fn test_recentered_keeps_shape() {
        let e = circle(3.0).recentered([960.0, 540.0]);
        assert_eq!(e.center_x, 960.0);
        assert_eq!(e.semi_major, 3.0);
    }

    #[test]
    fn test_table_lookup_and_gap() {
        let mk = |frame| Ellipse {
            frame,
            ..circle(1.0)
        };
        let table = EllipseTable::from_ellipses(vec![mk(5), mk(6), mk(7)]).unwrap();
        assert_eq!(table.get(6).unwrap().frame, 6);
        assert!(table.get(4).is_err());
        assert!(table.get(8).is_err());
        assert_eq!(table.frame_range(), Some((5, 7)));

        let err = EllipseTable::from_ellipses(vec![mk(5), mk(7)]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Range);
    }
}
