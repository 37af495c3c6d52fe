//! Forward corroboration: for each tracklet, count later tracklets within its
//! search window that look like the same bird further along the path.
//!
//! Tracklets are sorted by anchor frame once; each window
//! `(frame, frame + max_travel]` is then two binary searches into that table.

use rayon::prelude::*;
use tracing::info;

use super::{CorroborationMode, LinkConfig};
use crate::tracklet::{Corroboration, ProjectedTracklet, ScoredTracklet};

/// Frame-sorted, read-only tracklet table shared by all scoring workers.
pub struct TrackletTable {
    tracklets: Vec<ProjectedTracklet>,
}

impl TrackletTable {
    /// Sort tracklets by anchor frame. Order within a frame is preserved.
    pub fn new(mut tracklets: Vec<ProjectedTracklet>) -> Self {
        tracklets.sort_by_key(|t| t.frame());
        Self { tracklets }
    }

    pub fn len(&self) -> usize {
        self.tracklets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracklets.is_empty()
    }

    pub fn tracklets(&self) -> &[ProjectedTracklet] {
        &self.tracklets
    }

    /// Tracklets anchored in `(after, through]`.
    pub fn window(&self, after: u32, through: u32) -> &[ProjectedTracklet] {
        let lo = self.tracklets.partition_point(|t| t.frame() <= after);
        let hi = self.tracklets.partition_point(|t| t.frame() <= through);
        &self.tracklets[lo..hi.max(lo)]
    }

    /// Corroboration counts for one tracklet.
    pub fn corroborate(&self, t: &ProjectedTracklet, config: &LinkConfig) -> Corroboration {
        let k = &t.kinematics;
        let frame = t.frame();
        let travel = k.max_travel.min(config.max_travel_cap);
        let window = self.window(frame, frame.saturating_add(travel));

        let anchor = t.tracklet.anchor();
        let (sin_phi, cos_phi) = k.avg_dir.sin_cos();
        let mut c = Corroboration {
            window: window.len() as u32,
            ..Default::default()
        };
        let mut all_three = 0u32;
        for u in window {
            let uk = &u.kinematics;
            let radius = config.radius_tolerance.is_close(k.avg_radius, uk.avg_radius);
            let speed = config.speed_tolerance.is_close(k.avg_dist, uk.avg_dist);
            let direction = config.direction_tolerance.is_close(k.avg_dir, uk.avg_dir);
            c.near_radius += radius as u32;
            c.near_speed += speed as u32;
            c.near_direction += direction as u32;
            if radius && speed && direction {
                all_three += 1;
            }
            if direction {
                let d = u.tracklet.anchor() - anchor;
                let off_line = (-sin_phi * d.x + cos_phi * d.y).abs();
                if off_line < config.near_line_px {
                    c.near_line += 1;
                }
            }
        }
        c.count = match config.corroboration_mode {
            CorroborationMode::NearLine => c.near_line,
            CorroborationMode::Kinematic => all_three,
        };
        c
    }
}

/// Score every tracklet against the forward window. Output is in anchor-frame
/// order and unlabeled.
pub fn score(tracklets: Vec<ProjectedTracklet>, config: &LinkConfig) -> Vec<ScoredTracklet> {
    let table = TrackletTable::new(tracklets);
    let scored: Vec<ScoredTracklet> = table
        .tracklets()
        .par_iter()
        .map(|t| ScoredTracklet {
            tracklet: t.tracklet.clone(),
            kinematics: t.kinematics.clone(),
            corroboration: table.corroborate(t, config),
            label: false,
        })
        .collect();
    let supported = scored.iter().filter(|s| s.corroboration.count > 0).count();
    info!(
        "Scored {} tracklets ({} with corroboration, mode {:?})",
        scored.len(),
        supported,
        config.corroboration_mode
    );
    scored
}
