//! Scored tracklet table writer.
//!
//! One row per tracklet: the three legs, leg kinematics, consistency features,
//! averaged kinematics, the ellipse used, its exit point, the search window,
//! corroboration counts and the ground-truth label. Missing exit points are
//! written as empty cells.

use std::fs::File;
use std::io;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::ScoredTracklet;

/// Column names, in write order.
pub const COLUMNS: &[&str] = &[
    "frame0", "x0", "y0", "radius0", "focus0", "perimeter0",
    "frame1", "x1", "y1", "radius1", "focus1", "perimeter1",
    "frame2", "x2", "y2", "radius2", "focus2", "perimeter2",
    "frame_density", "duplicates",
    "dist01", "dist12", "dir01", "dir12",
    "dist_score", "dir_score", "radius_var", "focus_var", "perimeter_var",
    "avg_dist", "avg_dir", "avg_radius",
    "ellipse_cx", "ellipse_cy", "ellipse_a", "ellipse_b", "ellipse_theta",
    "target_x", "target_y", "max_travel",
    "window", "near_radius", "near_speed", "near_direction", "near_line", "score",
    "label",
];

fn row(t: &ScoredTracklet) -> Vec<String> {
    let mut out = Vec::with_capacity(COLUMNS.len());
    for d in &t.tracklet.legs {
        out.push(d.frame.to_string());
        out.push(d.x.to_string());
        out.push(d.y.to_string());
        out.push(d.radius.to_string());
        out.push(d.focus.to_string());
        out.push(d.perimeter.to_string());
    }
    let d0 = &t.tracklet.legs[0];
    out.push(d0.frame_density.to_string());
    out.push(d0.duplicates.to_string());

    let tr = &t.tracklet;
    let s = &tr.scores;
    let k = &t.kinematics;
    let e = &k.ellipse;
    let c = &t.corroboration;
    for v in [
        tr.dist01,
        tr.dist12,
        tr.dir01,
        tr.dir12,
        s.dist_score,
        s.dir_score,
        s.radius_var,
        s.focus_var,
        s.perimeter_var,
        k.avg_dist,
        k.avg_dir,
        k.avg_radius,
        e.center_x,
        e.center_y,
        e.semi_major,
        e.semi_minor,
        e.theta_deg,
    ] {
        out.push(v.to_string());
    }
    match k.ellipse_target {
        Some([x, y]) => {
            out.push(x.to_string());
            out.push(y.to_string());
        }
        None => {
            out.push(String::new());
            out.push(String::new());
        }
    }
    out.push(k.max_travel.to_string());
    for v in [
        c.window,
        c.near_radius,
        c.near_speed,
        c.near_direction,
        c.near_line,
        c.count,
    ] {
        out.push(v.to_string());
    }
    out.push(u8::from(t.label).to_string());
    out
}

/// Write scored tracklets as CSV with a header row.
pub fn write_tracklets_to<W: io::Write>(wtr: W, tracklets: &[ScoredTracklet]) -> Result<()> {
    let origin = Path::new("<stream>");
    write_tracklets_inner(wtr, tracklets, origin)
}

/// Write scored tracklets to a CSV file.
pub fn write_tracklets<P: AsRef<Path>>(path: P, tracklets: &[ScoredTracklet]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::resource(path, e))?;
    write_tracklets_inner(file, tracklets, path)?;
    info!("Wrote {} tracklets to {}", tracklets.len(), path.display());
    Ok(())
}

fn write_tracklets_inner<W: io::Write>(
    wtr: W,
    tracklets: &[ScoredTracklet],
    origin: &Path,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(wtr);
    wtr.write_record(COLUMNS).map_err(|e| Error::csv(origin, e))?;
    for t in tracklets {
        wtr.write_record(row(t)).map_err(|e| Error::csv(origin, e))?;
    }
    wtr.flush().map_err(|e| Error::resource(origin, e))
}
