//! Detection table loader.
//!
//! Rows are `frame, x, y, radius` with optional `focus, perimeter` columns.
//! Malformed rows are skipped and counted rather than aborting the load.

use std::io;
use std::path::Path;

use tracing::{info, warn};

use super::{csv_reader, data_records, open, parse_f32, parse_frame, Loaded};
use crate::error::{Error, ErrorKind, Result};
use crate::Detection;

/// Parse one detection row.
///
/// Fails with a format error when the column count is not 4 or 6, when any
/// field is non-numeric, or when the frame or radius is negative.
pub fn parse_detection_row(rec: &csv::StringRecord, line: u64) -> Result<Detection> {
    if rec.len() != 4 && rec.len() != 6 {
        return Err(Error::format(
            line,
            format!("expected 4 or 6 columns, got {}", rec.len()),
        ));
    }
    let frame = parse_frame(rec, 0, "frame", line)?;
    let x = parse_f32(rec, 1, "x", line)?;
    let y = parse_f32(rec, 2, "y", line)?;
    let radius = parse_f32(rec, 3, "radius", line)?;
    if radius < 0.0 {
        return Err(Error::format(line, format!("negative radius {radius}")));
    }
    let mut det = Detection::new(frame, x, y, radius);
    if rec.len() == 6 {
        det.focus = parse_f32(rec, 4, "focus", line)?;
        det.perimeter = parse_f32(rec, 5, "perimeter", line)?;
    }
    Ok(det)
}

/// Load detections from a CSV file.
pub fn load_detections<P: AsRef<Path>>(path: P) -> Result<Loaded<Detection>> {
    let path = path.as_ref();
    info!("Loading detections from {}", path.display());
    let file = open(path)?;
    read_detections_from(file, path)
}

/// Load detections from any reader (e.g. an in-memory buffer).
pub fn read_detections<R: io::Read>(rdr: R) -> Result<Loaded<Detection>> {
    read_detections_from(rdr, Path::new("<stream>"))
}

fn read_detections_from<R: io::Read>(rdr: R, origin: &Path) -> Result<Loaded<Detection>> {
    let mut rdr = csv_reader(rdr);
    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for item in data_records(&mut rdr, origin) {
        let (line, rec) = match item {
            Ok(row) => row,
            Err(e) if e.kind() == ErrorKind::Format => {
                warn!("{}: skipping row: {}", origin.display(), e);
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        match parse_detection_row(&rec, line) {
            Ok(det) => rows.push(det),
            Err(e) => {
                warn!("{}: skipping row: {}", origin.display(), e);
                skipped += 1;
            }
        }
    }
    info!(
        "Loaded {} detections ({} malformed rows skipped)",
        rows.len(),
        skipped
    );
    Ok(Loaded { rows, skipped })
}
