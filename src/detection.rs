//! Define a detection: one moving-object candidate (contour) in one video frame.
//!
//! Detections are the output of the upstream contour extraction and are the
//! input to tracklet linking. They are immutable once loaded.

use rkyv::{Archive, Deserialize, Serialize};

use crate::Vector2;

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub struct Detection {
    /// Video frame index.
    pub frame: u32,
    /// Contour center along columns, in pixels. +X points right.
    pub x: f32,
    /// Contour center along rows, in pixels. +Y points down.
    pub y: f32,
    /// Enclosing-circle radius in pixels. Never negative.
    pub radius: f32,
    /// Focus (Laplacian variance) measure. Zero when the source had no focus column.
    pub focus: f32,
    /// Contour perimeter in pixels. Zero when the source had no perimeter column.
    pub perimeter: f32,
    /// Number of raw detections loaded for this frame, before any cleaning.
    /// A per-frame noise measure.
    pub frame_density: u32,
    /// Number of raw detections that collapsed into this one during dedupe.
    pub duplicates: u32,
}

impl Detection {
    /// Build a detection with only the four mandatory fields.
    pub fn new(frame: u32, x: f32, y: f32, radius: f32) -> Self {
        Self {
            frame,
            x,
            y,
            radius,
            focus: 0.0,
            perimeter: 0.0,
            frame_density: 0,
            duplicates: 1,
        }
    }

    /// Pixel position as a 64-bit vector, for geometry.
    pub fn position(&self) -> Vector2 {
        Vector2::new(self.x as f64, self.y as f64)
    }

    /// Euclidean pixel distance to another detection.
    pub fn distance_to(&self, other: &Detection) -> f64 {
        (self.position() - other.position()).norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to() {
        let a = Detection::new(1, 0.0, 0.0, 2.0);
        let b = Detection::new(0, 3.0, 4.0, 2.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
        assert_eq!(a.duplicates, 1);
    }
}
