//! Tracklet linking and trajectory scoring.
//!
//! This module turns a cleaned [`DetectionStore`](crate::DetectionStore) into
//! scored, labeled tracklets:
//!
//! 1. **Build**: for each frame `f`, the cross product of detections at `f`,
//!    `f-1` and `f-2` yields candidate triples ([`builder`]).
//! 2. **Filter**: triples with inconsistent leg lengths, headings or radii are
//!    discarded as they are produced ([`filter`]).
//! 3. **Project**: survivors get averaged kinematics and the point where their
//!    heading line leaves the moon ellipse ([`kinematics`]).
//! 4. **Corroborate**: each tracklet counts later tracklets that continue its
//!    path ([`scorer`]).
//! 5. **Label**: each tracklet is marked against ground-truth intervals
//!    ([`labeler`]).
//!
//! Stages 1-3 run in parallel over frame chunks and may be checkpointed per
//! chunk ([`checkpoint`]); [`pipeline`] drives the whole run.

pub mod builder;
pub mod checkpoint;
pub mod closeness;
pub mod filter;
pub mod kinematics;
pub mod labeler;
pub mod pipeline;
pub mod scorer;

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::PathBuf;

pub use closeness::{heading_deg, is_close, Tolerance};
pub use labeler::{GroundTruth, HitReport, TruthInterval};
pub use pipeline::link;

use crate::error::{Error, Result};
use crate::store::DEFAULT_FRAME_INDEX_LIMIT;
use crate::ScoredTracklet;

// ── Strategy enums ──────────────────────────────────────────────────────────

/// How far ahead (in frames) a tracklet looks for corroboration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxTravel {
    /// A fixed number of frames.
    Fixed(u32),
    /// `floor(distance to ellipse exit / avg_dist) + slack`. Tracklets whose
    /// heading misses the ellipse use the cap.
    ExitDistance { slack: u32 },
}

/// Which count becomes the corroboration score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorroborationMode {
    /// Later tracklets with a close heading whose anchor lies near this
    /// tracklet's heading line.
    NearLine,
    /// Later tracklets close in mean radius, speed and heading all at once.
    Kinematic,
}

// ── Configuration ───────────────────────────────────────────────────────────

/// Parameters controlling cleaning, linking and scoring.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Detections at or beyond this frame are dropped. Default 60000.
    pub frame_cutoff: u32,
    /// Largest frame index the run supports. Default 65535.
    pub frame_index_limit: u32,
    /// Detections with `radius <= min_radius` are dropped. Default 1.0.
    pub min_radius: f32,
    /// Frames with more detections than this are dropped entirely. Default 30.
    pub max_per_frame: usize,
    /// Sigma multiplier for hot-position suppression. None = disabled (default).
    pub hot_position_sigma: Option<f64>,
    /// Leg-length tolerance. Default rtol 1, atol 10.
    pub speed_tolerance: Tolerance,
    /// Heading tolerance. Default rtol 0.1, atol 0.002.
    pub direction_tolerance: Tolerance,
    /// Radius tolerance. Default rtol 1, atol 10.
    pub radius_tolerance: Tolerance,
    /// Reflect headings to `180 - dir` when the newest detection is right of
    /// the oldest. Default true.
    pub canonicalize_travel_sense: bool,
    /// Tracklets with `avg_dist <= min_speed` are dropped. Default 10 px/frame.
    pub min_speed: f64,
    /// Replace each fitted ellipse center with this point. None = keep the
    /// fitted center. Default (960, 540).
    pub moon_center: Option<[f64; 2]>,
    /// Forward search window strategy. Default `Fixed(3)`.
    pub max_travel: MaxTravel,
    /// Upper bound on the forward search window. Default 10.
    pub max_travel_cap: u32,
    /// Which count becomes the score. Default `NearLine`.
    pub corroboration_mode: CorroborationMode,
    /// Perpendicular distance gate for `NearLine`, pixels. Default 10.
    pub near_line_px: f64,
    /// Frames per parallel/checkpoint chunk. Default 1000.
    pub chunk_frames: u32,
    /// Directory for per-chunk checkpoints. None = no checkpointing.
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            frame_cutoff: 60000,
            frame_index_limit: DEFAULT_FRAME_INDEX_LIMIT,
            min_radius: 1.0,
            max_per_frame: 30,
            hot_position_sigma: None,
            speed_tolerance: Tolerance::new(1.0, 10.0),
            direction_tolerance: Tolerance::new(0.1, 2e-3),
            radius_tolerance: Tolerance::new(1.0, 10.0),
            canonicalize_travel_sense: true,
            min_speed: 10.0,
            moon_center: Some([960.0, 540.0]),
            max_travel: MaxTravel::Fixed(3),
            max_travel_cap: 10,
            corroboration_mode: CorroborationMode::NearLine,
            near_line_px: 10.0,
            chunk_frames: 1000,
            checkpoint_dir: None,
        }
    }
}

fn check_tolerance(field: &'static str, tol: &Tolerance) -> Result<()> {
    let ok = |v: f64| v.is_finite() && v >= 0.0;
    if !ok(tol.rtol) || !ok(tol.atol) {
        return Err(Error::config(
            field,
            format!("rtol/atol must be finite and >= 0, got {}/{}", tol.rtol, tol.atol),
        ));
    }
    Ok(())
}

impl LinkConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.frame_cutoff > self.frame_index_limit {
            return Err(Error::config(
                "frame_cutoff",
                format!(
                    "{} exceeds frame_index_limit {}",
                    self.frame_cutoff, self.frame_index_limit
                ),
            ));
        }
        if !self.min_radius.is_finite() {
            return Err(Error::config("min_radius", "must be finite"));
        }
        if let Some(sigma) = self.hot_position_sigma {
            if !sigma.is_finite() {
                return Err(Error::config("hot_position_sigma", "must be finite"));
            }
        }
        check_tolerance("speed_tolerance", &self.speed_tolerance)?;
        check_tolerance("direction_tolerance", &self.direction_tolerance)?;
        check_tolerance("radius_tolerance", &self.radius_tolerance)?;
        if !(self.min_speed.is_finite() && self.min_speed >= 0.0) {
            return Err(Error::config("min_speed", "must be finite and >= 0"));
        }
        if let Some([x, y]) = self.moon_center {
            if !(x.is_finite() && y.is_finite()) {
                return Err(Error::config("moon_center", "must be finite"));
            }
        }
        if self.max_travel_cap == 0 {
            return Err(Error::config("max_travel_cap", "must be > 0"));
        }
        if !(self.near_line_px.is_finite() && self.near_line_px > 0.0) {
            return Err(Error::config("near_line_px", "must be finite and > 0"));
        }
        if self.chunk_frames == 0 {
            return Err(Error::config("chunk_frames", "must be > 0"));
        }
        Ok(())
    }

    /// Hash of every setting that shapes projected tracklets. Checkpoints
    /// written under a different fingerprint are not reused.
    pub fn projection_fingerprint(&self) -> u64 {
        let mut h = DefaultHasher::new();
        self.frame_cutoff.hash(&mut h);
        self.frame_index_limit.hash(&mut h);
        self.min_radius.to_bits().hash(&mut h);
        self.max_per_frame.hash(&mut h);
        self.hot_position_sigma.map(f64::to_bits).hash(&mut h);
        for tol in [
            &self.speed_tolerance,
            &self.direction_tolerance,
            &self.radius_tolerance,
        ] {
            tol.rtol.to_bits().hash(&mut h);
            tol.atol.to_bits().hash(&mut h);
        }
        self.canonicalize_travel_sense.hash(&mut h);
        self.min_speed.to_bits().hash(&mut h);
        self.moon_center
            .map(|[x, y]| (x.to_bits(), y.to_bits()))
            .hash(&mut h);
        match self.max_travel {
            MaxTravel::Fixed(n) => (0u8, n).hash(&mut h),
            MaxTravel::ExitDistance { slack } => (1u8, slack).hash(&mut h),
        }
        self.max_travel_cap.hash(&mut h);
        self.chunk_frames.hash(&mut h);
        h.finish()
    }
}

// ── Run summary ─────────────────────────────────────────────────────────────

/// Counts collected while linking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Detections before cleaning.
    pub detections_in: usize,
    /// Detections after cleaning.
    pub detections_cleaned: usize,
    /// Candidate triples produced by the builder.
    pub candidates: u64,
    /// Triples passing the consistency filter.
    pub consistent: u64,
    /// Tracklets passing the speed floor and projected onto the ellipse.
    pub projected: u64,
    /// Chunks processed.
    pub chunks: usize,
    /// Chunks restored from checkpoints instead of recomputed.
    pub chunks_resumed: usize,
}

/// Output of a full linking run.
#[derive(Debug, Clone)]
pub struct LinkResult {
    /// Scored, labeled tracklets in ascending anchor-frame order.
    pub tracklets: Vec<ScoredTracklet>,
    /// Hit/miss report, when ground truth was supplied.
    pub report: Option<HitReport>,
    pub stats: LinkStats,
    /// Wall-clock time of the run in milliseconds.
    pub link_time_ms: f32,
}
