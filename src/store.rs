//! Frame-indexed detection store and the cleaning passes applied before linking.
//!
//! `DetectionStore` keeps every detection in one vector sorted by
//! `(frame, x, y)`, plus a compact frame index: `frames[i]` is the i-th distinct
//! frame and `frame_offsets[i]..frame_offsets[i + 1]` is its slice of the
//! detection vector. Looking up a frame is a binary search over distinct frames.
//!
//! Every cleaning pass consumes the store and returns a rebuilt one, so earlier
//! stages never observe a partially cleaned table.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::info;

use crate::error::{Error, Result};
use crate::linker::LinkConfig;
use crate::Detection;

/// Default frame index width. Frame numbers were historically stored as `u16`.
pub const DEFAULT_FRAME_INDEX_LIMIT: u32 = u16::MAX as u32;

#[derive(Debug, Clone)]
pub struct DetectionStore {
    detections: Vec<Detection>,
    frames: Vec<u32>,
    frame_offsets: Vec<u32>,
    frame_index_limit: u32,
}

impl Default for DetectionStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn order(a: &Detection, b: &Detection) -> Ordering {
    a.frame
        .cmp(&b.frame)
        .then(a.x.total_cmp(&b.x))
        .then(a.y.total_cmp(&b.y))
}

fn same_position(a: &Detection, b: &Detection) -> bool {
    a.frame == b.frame && a.x.to_bits() == b.x.to_bits() && a.y.to_bits() == b.y.to_bits()
}

impl DetectionStore {
    /// Ingest raw detections.
    ///
    /// Each detection's `frame_density` is set to the number of raw detections
    /// in its frame. That count is fixed here and survives all cleaning.
    pub fn new(mut detections: Vec<Detection>) -> Self {
        let mut density: HashMap<u32, u32> = HashMap::new();
        for d in &detections {
            *density.entry(d.frame).or_insert(0) += 1;
        }
        for d in &mut detections {
            d.frame_density = density[&d.frame];
        }
        detections.sort_by(order);
        Self::from_sorted(detections, DEFAULT_FRAME_INDEX_LIMIT)
    }

    /// Override the frame index width used by [`Self::restrict_frame_range`].
    pub fn with_frame_index_limit(mut self, limit: u32) -> Self {
        self.frame_index_limit = limit;
        self
    }

    fn from_sorted(detections: Vec<Detection>, frame_index_limit: u32) -> Self {
        let mut frames = Vec::new();
        let mut frame_offsets = vec![0u32];
        for (i, d) in detections.iter().enumerate() {
            if frames.last() != Some(&d.frame) {
                if !frames.is_empty() {
                    frame_offsets.push(i as u32);
                }
                frames.push(d.frame);
            }
        }
        if !frames.is_empty() {
            frame_offsets.push(detections.len() as u32);
        }
        Self {
            detections,
            frames,
            frame_offsets,
            frame_index_limit,
        }
    }

    fn retain<F: FnMut(&Detection) -> bool>(self, keep: F) -> Self {
        let limit = self.frame_index_limit;
        let mut detections = self.detections;
        detections.retain(keep);
        Self::from_sorted(detections, limit)
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Number of distinct frames with at least one detection.
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Distinct frames, ascending.
    pub fn frames(&self) -> &[u32] {
        &self.frames
    }

    pub fn first_frame(&self) -> Option<u32> {
        self.frames.first().copied()
    }

    pub fn last_frame(&self) -> Option<u32> {
        self.frames.last().copied()
    }

    pub fn frame_index_limit(&self) -> u32 {
        self.frame_index_limit
    }

    /// All detections in `(frame, x, y)` order.
    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn has_frame(&self, frame: u32) -> bool {
        self.frames.binary_search(&frame).is_ok()
    }

    /// Detections in `frame`; empty when the frame has none.
    pub fn frame(&self, frame: u32) -> &[Detection] {
        match self.frames.binary_search(&frame) {
            Ok(i) => self.slot(i),
            Err(_) => &[],
        }
    }

    fn slot(&self, i: usize) -> &[Detection] {
        let start = self.frame_offsets[i] as usize;
        let end = self.frame_offsets[i + 1] as usize;
        &self.detections[start..end]
    }

    /// Iterate `(frame, detections)` in ascending frame order.
    pub fn iter_frames(&self) -> impl Iterator<Item = (u32, &[Detection])> + '_ {
        self.frames
            .iter()
            .enumerate()
            .map(move |(i, &f)| (f, self.slot(i)))
    }

    // ── Cleaning ────────────────────────────────────────────────────────────

    /// Keep only detections with `frame < max_frame`.
    ///
    /// Fails when `max_frame` is beyond the frame index width.
    pub fn restrict_frame_range(self, max_frame: u32) -> Result<Self> {
        if max_frame > self.frame_index_limit {
            return Err(Error::FrameOutOfRange {
                frame: max_frame,
                limit: self.frame_index_limit,
            });
        }
        let before = self.len();
        let out = self.retain(|d| d.frame < max_frame);
        info!(
            "Frame cutoff {}: {} -> {} detections",
            max_frame,
            before,
            out.len()
        );
        Ok(out)
    }

    /// Drop detections with `radius <= threshold`.
    pub fn drop_small_radius(self, threshold: f32) -> Self {
        let before = self.len();
        let out = self.retain(|d| d.radius > threshold);
        info!(
            "Radius floor {}: {} -> {} detections",
            threshold,
            before,
            out.len()
        );
        out
    }

    /// Drop every detection in frames holding more than `max_count` detections.
    pub fn cap_per_frame(self, max_count: usize) -> Self {
        let before = self.len();
        let frames_before = self.num_frames();
        let crowded: Vec<u32> = (0..self.frames.len())
            .filter(|&i| self.slot(i).len() > max_count)
            .map(|i| self.frames[i])
            .collect();
        let out = self.retain(|d| crowded.binary_search(&d.frame).is_err());
        info!(
            "Per-frame cap {}: {} -> {} detections, {} -> {} frames",
            max_count,
            before,
            out.len(),
            frames_before,
            out.num_frames()
        );
        out
    }

    /// Drop detections at positions that recur anomalously often across frames.
    ///
    /// Occurrences of each exact `(x, y)` are counted over the whole store; a
    /// position is "hot" when its count is at least `mean + sigma * std` of all
    /// position counts. Nothing is dropped when every position occurs equally
    /// often.
    pub fn drop_hot_positions(self, sigma: f64) -> Self {
        let before = self.len();
        let mut counts: HashMap<(u32, u32), u32> = HashMap::new();
        for d in &self.detections {
            *counts.entry((d.x.to_bits(), d.y.to_bits())).or_insert(0) += 1;
        }
        if counts.is_empty() {
            return self;
        }
        let n = counts.len() as f64;
        let mean = counts.values().map(|&c| c as f64).sum::<f64>() / n;
        let var = counts
            .values()
            .map(|&c| (c as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        let std = var.sqrt();
        if std == 0.0 {
            info!("Hot positions: none ({} distinct positions)", counts.len());
            return self;
        }
        let threshold = mean + sigma * std;
        let out = self.retain(|d| (counts[&(d.x.to_bits(), d.y.to_bits())] as f64) < threshold);
        info!(
            "Hot positions (count >= {:.2}): {} -> {} detections",
            threshold,
            before,
            out.len()
        );
        out
    }

    /// Collapse detections sharing `(frame, x, y)` into the one with the
    /// largest radius. Ties keep the earliest loaded. `duplicates` accumulates
    /// the size of each collapsed group.
    pub fn dedupe(self) -> Self {
        let before = self.len();
        let limit = self.frame_index_limit;
        let mut out: Vec<Detection> = Vec::with_capacity(self.detections.len());
        for d in self.detections {
            match out.last_mut() {
                Some(kept) if same_position(kept, &d) => {
                    let dup = kept.duplicates + d.duplicates;
                    if d.radius > kept.radius {
                        *kept = d;
                    }
                    kept.duplicates = dup;
                }
                _ => out.push(d),
            }
        }
        let out = Self::from_sorted(out, limit);
        info!("Dedupe: {} -> {} detections", before, out.len());
        out
    }

    /// Run the full cleaning sequence configured in `config`:
    /// frame cutoff, radius floor, per-frame cap, optional hot-position
    /// suppression, then dedupe.
    pub fn clean(self, config: &LinkConfig) -> Result<Self> {
        let mut store = self
            .with_frame_index_limit(config.frame_index_limit)
            .restrict_frame_range(config.frame_cutoff)?
            .drop_small_radius(config.min_radius)
            .cap_per_frame(config.max_per_frame);
        if let Some(sigma) = config.hot_position_sigma {
            store = store.drop_hot_positions(sigma);
        }
        Ok(store.dedupe())
    }
}
