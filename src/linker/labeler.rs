//! Ground-truth labeling and hit/miss reporting.

use std::collections::BTreeSet;

use tracing::info;

use crate::ScoredTracklet;

/// Frames `first_frame..=last_frame` known to contain a bird.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruthInterval {
    pub first_frame: u32,
    pub last_frame: u32,
}

impl TruthInterval {
    pub fn contains(&self, frame: u32) -> bool {
        self.first_frame <= frame && frame <= self.last_frame
    }

    pub fn num_frames(&self) -> u64 {
        (self.last_frame - self.first_frame) as u64 + 1
    }
}

/// Sorted, non-overlapping ground-truth intervals with binary-search
/// membership.
#[derive(Debug, Clone, Default)]
pub struct GroundTruth {
    intervals: Vec<TruthInterval>,
}

impl GroundTruth {
    /// Normalize intervals: sort them, and merge any that overlap or touch.
    /// Reversed intervals are ignored.
    pub fn new(mut intervals: Vec<TruthInterval>) -> Self {
        intervals.retain(|iv| iv.first_frame <= iv.last_frame);
        intervals.sort_by_key(|iv| iv.first_frame);
        let mut merged: Vec<TruthInterval> = Vec::with_capacity(intervals.len());
        for iv in intervals {
            match merged.last_mut() {
                Some(last) if iv.first_frame <= last.last_frame.saturating_add(1) => {
                    last.last_frame = last.last_frame.max(iv.last_frame);
                }
                _ => merged.push(iv),
            }
        }
        Self { intervals: merged }
    }

    pub fn intervals(&self) -> &[TruthInterval] {
        &self.intervals
    }

    /// Total number of frames covered.
    pub fn num_frames(&self) -> u64 {
        self.intervals.iter().map(TruthInterval::num_frames).sum()
    }

    pub fn contains(&self, frame: u32) -> bool {
        let i = self.intervals.partition_point(|iv| iv.last_frame < frame);
        self.intervals.get(i).is_some_and(|iv| iv.contains(frame))
    }
}

/// Set each tracklet's label from its anchor frame.
pub fn label(tracklets: &mut [ScoredTracklet], truth: &GroundTruth) {
    for t in tracklets.iter_mut() {
        t.label = truth.contains(t.frame());
    }
}

/// How well the labeled tracklets cover the ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct HitReport {
    /// Frames covered by ground truth.
    pub truth_frames: u64,
    /// Ground-truth frames with at least one tracklet anchored in them.
    pub detected_frames: u64,
    /// `detected_frames / truth_frames`; 0 when there is no ground truth.
    pub hit_rate: f64,
    /// `1 - hit_rate`; 0 when there is no ground truth.
    pub miss_rate: f64,
    /// Tracklets labeled as inside a ground-truth interval.
    pub labeled_hits: usize,
    /// Tracklets labeled as outside every ground-truth interval.
    pub labeled_misses: usize,
    /// Ground-truth intervals with no tracklet anchored inside.
    pub missed_intervals: Vec<TruthInterval>,
}

impl HitReport {
    /// Summarize labeled tracklets against the ground truth.
    pub fn compute(tracklets: &[ScoredTracklet], truth: &GroundTruth) -> Self {
        let hit_frames: BTreeSet<u32> = tracklets
            .iter()
            .filter(|t| t.label)
            .map(|t| t.frame())
            .collect();
        let labeled_hits = tracklets.iter().filter(|t| t.label).count();
        let truth_frames = truth.num_frames();
        let detected_frames = hit_frames.len() as u64;
        let (hit_rate, miss_rate) = if truth_frames == 0 {
            (0.0, 0.0)
        } else {
            let hit = detected_frames as f64 / truth_frames as f64;
            (hit, 1.0 - hit)
        };
        let missed_intervals = truth
            .intervals()
            .iter()
            .filter(|iv| hit_frames.range(iv.first_frame..=iv.last_frame).next().is_none())
            .copied()
            .collect();
        let report = Self {
            truth_frames,
            detected_frames,
            hit_rate,
            miss_rate,
            labeled_hits,
            labeled_misses: tracklets.len() - labeled_hits,
            missed_intervals,
        };
        info!(
            "Hit rate {:.1}% ({} of {} truth frames), {} intervals missed",
            report.hit_rate * 100.0,
            report.detected_frames,
            report.truth_frames,
            report.missed_intervals.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracklet::{ConsistencyScores, Corroboration, Kinematics, Tracklet};
    use crate::{Detection, Ellipse};

    fn iv(first_frame: u32, last_frame: u32) -> TruthInterval {
        TruthInterval {
            first_frame,
            last_frame,
        }
    }

    fn scored_at(frame: u32) -> ScoredTracklet {
        let d = Detection::new(frame, 0.0, 0.0, 2.0);
        ScoredTracklet {
            tracklet: Tracklet {
                legs: [d, d, d],
                dist01: 0.0,
                dist12: 0.0,
                dir01: 0.0,
                dir12: 0.0,
                scores: ConsistencyScores::default(),
            },
            kinematics: Kinematics {
                avg_dist: 0.0,
                avg_dir: 0.0,
                avg_radius: 2.0,
                ellipse: Ellipse {
                    frame,
                    center_x: 0.0,
                    center_y: 0.0,
                    semi_major: 1.0,
                    semi_minor: 1.0,
                    theta_deg: 0.0,
                },
                ellipse_target: None,
                max_travel: 3,
            },
            corroboration: Corroboration::default(),
            label: false,
        }
    }

    #[test]
    fn test_label_against_interval() {
        let truth = GroundTruth::new(vec![iv(40, 60)]);
        let mut ts = vec![scored_at(50), scored_at(70), scored_at(40), scored_at(60)];
        label(&mut ts, &truth);
        let labels: Vec<bool> = ts.iter().map(|t| t.label).collect();
        assert_eq!(labels, vec![true, false, true, true]);
    }

    #[test]
    fn test_intervals_merge() {
        let truth = GroundTruth::new(vec![iv(50, 60), iv(10, 20), iv(21, 25), iv(55, 70), iv(9, 3)]);
        assert_eq!(truth.intervals(), &[iv(10, 25), iv(50, 70)]);
        assert_eq!(truth.num_frames(), 16 + 21);
        assert!(truth.contains(25));
        assert!(!truth.contains(26));
        assert!(!truth.contains(5));
        assert!(!truth.contains(71));
    }

    #[test]
    fn test_hit_report() {
        let truth = GroundTruth::new(vec![iv(40, 49), iv(100, 109)]);
        let mut ts = vec![scored_at(41), scored_at(41), scored_at(45), scored_at(80)];
        label(&mut ts, &truth);
        let report = HitReport::compute(&ts, &truth);
        assert_eq!(report.truth_frames, 20);
        assert_eq!(report.detected_frames, 2);
        assert!((report.hit_rate - 0.1).abs() < 1e-12);
        assert!((report.miss_rate - 0.9).abs() < 1e-12);
        assert_eq!(report.labeled_hits, 3);
        assert_eq!(report.labeled_misses, 1);
        assert_eq!(report.missed_intervals, vec![iv(100, 109)]);
    }

    #[test]
    fn test_empty_truth_report() {
        let report = HitReport::compute(&[scored_at(1)], &GroundTruth::default());
        assert_eq!(report.hit_rate, 0.0);
        assert_eq!(report.miss_rate, 0.0);
        assert_eq!(report.labeled_misses, 1);
    }
}
