//! Averaged kinematics, the moon-ellipse exit point, and the forward search
//! window for each consistent tracklet.

use super::{LinkConfig, MaxTravel};
use crate::error::Result;
use crate::tracklet::{Kinematics, ProjectedTracklet, Tracklet};
use crate::{EllipseTable, Vector2};

/// Forward search window in frames, clamped to `config.max_travel_cap`.
pub fn max_travel(
    anchor: Vector2,
    target: Option<Vector2>,
    avg_dist: f64,
    config: &LinkConfig,
) -> u32 {
    let cap = config.max_travel_cap;
    match config.max_travel {
        MaxTravel::Fixed(n) => n.min(cap),
        MaxTravel::ExitDistance { slack } => match target {
            Some(target) if avg_dist > 0.0 => {
                let frames = ((target - anchor).norm() / avg_dist).floor();
                let frames = if frames.is_finite() {
                    frames.min(cap as f64) as u32
                } else {
                    cap
                };
                frames.saturating_add(slack).min(cap)
            }
            _ => cap,
        },
    }
}

/// Compute kinematics for a tracklet and project it onto its frame's ellipse.
///
/// Returns `Ok(None)` when the tracklet is slower than `config.min_speed`.
/// Fails when the ellipse table has no entry for the anchor frame.
pub fn project(
    tracklet: Tracklet,
    ellipses: &EllipseTable,
    config: &LinkConfig,
) -> Result<Option<ProjectedTracklet>> {
    let avg_dist = (tracklet.dist01 + tracklet.dist12) / 2.0;
    if avg_dist <= config.min_speed {
        return Ok(None);
    }
    let avg_dir = ((tracklet.dir01 + tracklet.dir12) / 2.0).to_radians();
    let [d0, d1, d2] = &tracklet.legs;
    let avg_radius = (d0.radius as f64 + d1.radius as f64 + d2.radius as f64) / 3.0;

    let fitted = ellipses.get(tracklet.frame())?;
    let ellipse = match config.moon_center {
        Some(center) => fitted.recentered(center),
        None => *fitted,
    };
    let anchor = tracklet.anchor();
    let target = ellipse.exit_point(anchor, avg_dir);
    let max_travel = max_travel(anchor, target, avg_dist, config);

    Ok(Some(ProjectedTracklet {
        tracklet,
        kinematics: Kinematics {
            avg_dist,
            avg_dir,
            avg_radius,
            ellipse,
            ellipse_target: target.map(|p| [p.x, p.y]),
            max_travel,
        },
    }))
}
