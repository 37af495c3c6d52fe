//! Consistency filter: keep triples whose two legs agree in length and
//! heading and whose three detections agree in radius.

use super::closeness::heading_deg;
use super::LinkConfig;
use crate::tracklet::{ConsistencyScores, Tracklet};
use crate::Detection;

fn variance3(a: f32, b: f32, c: f32) -> f64 {
    let (a, b, c) = (a as f64, b as f64, c as f64);
    let mean = (a + b + c) / 3.0;
    ((a - mean).powi(2) + (b - mean).powi(2) + (c - mean).powi(2)) / 3.0
}

/// Consistency features for a tracklet's legs.
pub fn consistency_scores(
    legs: &[Detection; 3],
    dist01: f64,
    dist12: f64,
    dir01: f64,
    dir12: f64,
    config: &LinkConfig,
) -> ConsistencyScores {
    let [d0, d1, d2] = legs;
    ConsistencyScores {
        dist_score: dist01.max(dist12) / (dist01 - dist12 + config.speed_tolerance.atol).abs(),
        dir_score: dir01.max(dir12) / (dir01 - dir12 + config.direction_tolerance.atol).abs(),
        radius_var: variance3(d0.radius, d1.radius, d2.radius),
        focus_var: variance3(d0.focus, d1.focus, d2.focus),
        perimeter_var: variance3(d0.perimeter, d1.perimeter, d2.perimeter),
    }
}

/// Turn a candidate triple into a tracklet, or reject it.
///
/// Rejected when either leg is axis-aligned (equal x or equal y between
/// consecutive detections), when a leg has zero length, when the two headings
/// or the two leg lengths are not close, or when any pair of radii is not
/// close.
pub fn link_triple(legs: [&Detection; 3], config: &LinkConfig) -> Option<Tracklet> {
    let [d0, d1, d2] = legs;
    if d0.x == d1.x || d0.y == d1.y || d1.x == d2.x || d1.y == d2.y {
        return None;
    }

    let leg01 = d0.position() - d1.position();
    let leg12 = d1.position() - d2.position();
    let mut dir01 = heading_deg(leg01.x, leg01.y);
    let mut dir12 = heading_deg(leg12.x, leg12.y);
    if config.canonicalize_travel_sense && d0.x > d2.x {
        dir01 = 180.0 - dir01;
        dir12 = 180.0 - dir12;
    }

    let dist01 = leg01.norm();
    let dist12 = leg12.norm();
    if dist01 == 0.0 || dist12 == 0.0 {
        return None;
    }

    if !config.direction_tolerance.is_close(dir01, dir12)
        || !config.speed_tolerance.is_close(dist01, dist12)
    {
        return None;
    }

    let rt = &config.radius_tolerance;
    let (r0, r1, r2) = (d0.radius as f64, d1.radius as f64, d2.radius as f64);
    if !rt.is_close(r0, r1) || !rt.is_close(r1, r2) || !rt.is_close(r2, r0) {
        return None;
    }

    let legs = [*d0, *d1, *d2];
    let scores = consistency_scores(&legs, dist01, dist12, dir01, dir12, config);
    Some(Tracklet {
        legs,
        dist01,
        dist12,
        dir01,
        dir12,
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::Tolerance;

    fn det(frame: u32, x: f32, y: f32, r: f32) -> Detection {
        Detection::new(frame, x, y, r)
    }

    #[test]
    fn test_diagonal_triple_passes() {
        let d2 = det(0, 0.0, 0.0, 2.0);
        let d1 = det(1, 1.0, 1.0, 2.0);
        let d0 = det(2, 2.0, 2.0, 2.0);
        let config = LinkConfig {
            canonicalize_travel_sense: false,
            ..Default::default()
        };
        let t = link_triple([&d0, &d1, &d2], &config).unwrap();
        assert!((t.dist01 - 2f64.sqrt()).abs() < 1e-12);
        assert!((t.dir01 - 45.0).abs() < 1e-9);
        assert!((t.dir12 - 45.0).abs() < 1e-9);
        assert_eq!(t.scores.radius_var, 0.0);
    }

    #[test]
    fn test_canonicalization_reflects_headings() {
        let d2 = det(0, 0.0, 0.0, 2.0);
        let d1 = det(1, 1.0, 1.0, 2.0);
        let d0 = det(2, 2.0, 2.0, 2.0);
        let t = link_triple([&d0, &d1, &d2], &LinkConfig::default()).unwrap();
        assert!((t.dir01 - 135.0).abs() < 1e-9);
        assert!((t.dir12 - 135.0).abs() < 1e-9);
    }

    #[test]
    fn test_axis_aligned_leg_rejected() {
        let d2 = det(0, 0.0, 0.0, 2.0);
        let d1 = det(1, 5.0, 0.0, 2.0);
        let d0 = det(2, 10.0, 3.0, 2.0);
        assert!(link_triple([&d0, &d1, &d2], &LinkConfig::default()).is_none());
    }

    #[test]
    fn test_direction_change_rejected() {
        let d2 = det(0, 0.0, 0.0, 2.0);
        let d1 = det(1, 20.0, 20.0, 2.0);
        let d0 = det(2, 0.5, 40.0, 2.0);
        assert!(link_triple([&d0, &d1, &d2], &LinkConfig::default()).is_none());
    }

    #[test]
    fn test_speed_change_rejected() {
        let d2 = det(0, 0.0, 0.0, 2.0);
        let d1 = det(1, 1.0, 1.0, 2.0);
        let d0 = det(2, 101.0, 101.0, 2.0);
        let config = LinkConfig {
            speed_tolerance: Tolerance::new(0.1, 1.0),
            ..Default::default()
        };
        assert!(link_triple([&d0, &d1, &d2], &config).is_none());
    }

    #[test]
    fn test_radius_mismatch_rejected() {
        let d2 = det(0, 0.0, 0.0, 2.0);
        let d1 = det(1, 10.0, 10.0, 2.0);
        let d0 = det(2, 20.0, 20.0, 50.0);
        assert!(link_triple([&d0, &d1, &d2], &LinkConfig::default()).is_none());
    }

    #[test]
    fn test_scores_use_leg_maxima() {
        let mut d0 = det(2, 30.0, 30.0, 3.0);
        let mut d1 = det(1, 20.0, 20.0, 2.0);
        let d2 = det(0, 10.0, 10.0, 1.0);
        d0.focus = 4.0;
        d1.focus = 1.0;
        let config = LinkConfig {
            canonicalize_travel_sense: false,
            ..Default::default()
        };
        let t = link_triple([&d0, &d1, &d2], &config).unwrap();
        let expect_dist = t.dist01.max(t.dist12) / (t.dist01 - t.dist12 + 10.0).abs();
        assert!((t.scores.dist_score - expect_dist).abs() < 1e-12);
        assert!((t.scores.radius_var - 2.0 / 3.0).abs() < 1e-12);
        assert!((t.scores.focus_var - 26.0 / 9.0).abs() < 1e-12);
    }
}
