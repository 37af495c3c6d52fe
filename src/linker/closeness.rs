//! Tolerance comparison and quadrant-corrected headings.

/// Relative-plus-absolute tolerance pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Tolerance {
    pub const fn new(rtol: f64, atol: f64) -> Self {
        Self { rtol, atol }
    }

    /// `is_close(a, b, self.rtol, self.atol)`.
    pub fn is_close(&self, a: f64, b: f64) -> bool {
        is_close(a, b, self.rtol, self.atol)
    }
}

/// `|a - b| <= atol + rtol * |b|`.
///
/// Asymmetric: the relative term scales with `b` only. Any NaN operand
/// compares as not close.
pub fn is_close(a: f64, b: f64, rtol: f64, atol: f64) -> bool {
    (a - b).abs() <= atol + rtol * b.abs()
}

/// Heading in degrees of the displacement `(dx, dy)`.
///
/// `dx == 0` gives `+90` for `dy > 0` and `-90` otherwise. Otherwise
/// `atan(dy / dx)` is shifted by `+180` when `dx < 0`, or by `+360` when
/// `dx > 0` and `dy < 0`. The result is in `[0, 360)` except for the two
/// vertical cases.
pub fn heading_deg(dx: f64, dy: f64) -> f64 {
    if dx == 0.0 {
        return if dy > 0.0 { 90.0 } else { -90.0 };
    }
    let base = (dy / dx).atan().to_degrees();
    if dx < 0.0 {
        base + 180.0
    } else if dy < 0.0 {
        base + 360.0
    } else {
        base
    }
}
