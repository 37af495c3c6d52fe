//! Tracklet records at each linking stage.
//!
//! A tracklet is three detections from three successive frames, newest first.
//! Later stages wrap the earlier record instead of mutating it:
//! [`Tracklet`] (built and filtered) → [`ProjectedTracklet`] (kinematics and
//! moon-ellipse exit point) → [`ScoredTracklet`] (corroboration and label).

use rkyv::{Archive, Deserialize, Serialize};

use crate::{Detection, Ellipse, Vector2};

/// Per-tracklet consistency features.
#[derive(Debug, Clone, Copy, PartialEq, Default, Archive, Serialize, Deserialize)]
pub struct ConsistencyScores {
    /// `max(dist01, dist12) / |dist01 - dist12 + speed_atol|`.
    pub dist_score: f64,
    /// `max(dir01, dir12) / |dir01 - dir12 + direction_atol|`.
    pub dir_score: f64,
    /// Population variance of the three radii.
    pub radius_var: f64,
    /// Population variance of the three focus values.
    pub focus_var: f64,
    /// Population variance of the three perimeters.
    pub perimeter_var: f64,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Tracklet {
    /// `[d0, d1, d2]` with `d0.frame > d1.frame > d2.frame`.
    pub legs: [Detection; 3],
    /// Pixel distance `d0 -> d1`.
    pub dist01: f64,
    /// Pixel distance `d1 -> d2`.
    pub dist12: f64,
    /// Heading of `d1 -> d0`, degrees.
    pub dir01: f64,
    /// Heading of `d2 -> d1`, degrees.
    pub dir12: f64,
    pub scores: ConsistencyScores,
}

impl Tracklet {
    /// Frame of the newest detection; tracklets are keyed by it.
    pub fn frame(&self) -> u32 {
        self.legs[0].frame
    }

    /// Position of the newest detection.
    pub fn anchor(&self) -> Vector2 {
        self.legs[0].position()
    }
}

/// Averaged motion plus the moon-ellipse projection.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Kinematics {
    /// Mean leg length, pixels per frame.
    pub avg_dist: f64,
    /// Mean heading, radians.
    pub avg_dir: f64,
    pub avg_radius: f64,
    /// Ellipse used for the projection, after any re-centering.
    pub ellipse: Ellipse,
    /// Where the heading line leaves the ellipse; `None` when it misses.
    pub ellipse_target: Option<[f64; 2]>,
    /// Forward search window for corroboration, frames.
    pub max_travel: u32,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct ProjectedTracklet {
    pub tracklet: Tracklet,
    pub kinematics: Kinematics,
}

impl ProjectedTracklet {
    pub fn frame(&self) -> u32 {
        self.tracklet.frame()
    }
}

/// Counts of later tracklets that support this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Corroboration {
    /// Tracklets in `(frame, frame + max_travel]`.
    pub window: u32,
    /// Window tracklets with a close mean radius.
    pub near_radius: u32,
    /// Window tracklets with a close mean speed.
    pub near_speed: u32,
    /// Window tracklets with a close mean heading.
    pub near_direction: u32,
    /// Window tracklets with a close heading whose anchor lies near the heading line.
    pub near_line: u32,
    /// The score for the configured mode. Never exceeds `window`.
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTracklet {
    pub tracklet: Tracklet,
    pub kinematics: Kinematics,
    pub corroboration: Corroboration,
    /// Whether the anchor frame falls inside a ground-truth interval.
    pub label: bool,
}

impl ScoredTracklet {
    pub fn frame(&self) -> u32 {
        self.tracklet.frame()
    }
}
