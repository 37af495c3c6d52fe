//! Moon ellipse table loader.
//!
//! Rows are `frame, center_x, center_y, semi_major, semi_minor, theta_deg`;
//! trailing columns are ignored. The table must cover consecutive frames, so
//! unlike the detection loader a bad row aborts the load.

use std::io;
use std::path::Path;

use tracing::info;

use super::{csv_reader, data_records, open, parse_f64, parse_frame};
use crate::ellipse::{Ellipse, EllipseTable};
use crate::error::{Error, Result};

fn parse_ellipse_row(rec: &csv::StringRecord, line: u64) -> Result<Ellipse> {
    if rec.len() < 6 {
        return Err(Error::format(
            line,
            format!("expected at least 6 columns, got {}", rec.len()),
        ));
    }
    let e = Ellipse {
        frame: parse_frame(rec, 0, "frame", line)?,
        center_x: parse_f64(rec, 1, "center_x", line)?,
        center_y: parse_f64(rec, 2, "center_y", line)?,
        semi_major: parse_f64(rec, 3, "semi_major", line)?,
        semi_minor: parse_f64(rec, 4, "semi_minor", line)?,
        theta_deg: parse_f64(rec, 5, "theta_deg", line)?,
    };
    if e.semi_major < 0.0 || e.semi_minor < 0.0 {
        return Err(Error::format(line, "negative semi-axis"));
    }
    Ok(e)
}

/// Load the per-frame moon ellipse table from a CSV file.
pub fn load_ellipses<P: AsRef<Path>>(path: P) -> Result<EllipseTable> {
    let path = path.as_ref();
    info!("Loading moon ellipses from {}", path.display());
    let file = open(path)?;
    read_ellipses_from(file, path)
}

/// Load the per-frame moon ellipse table from any reader.
pub fn read_ellipses<R: io::Read>(rdr: R) -> Result<EllipseTable> {
    read_ellipses_from(rdr, Path::new("<stream>"))
}

fn read_ellipses_from<R: io::Read>(rdr: R, origin: &Path) -> Result<EllipseTable> {
    let mut rdr = csv_reader(rdr);
    let mut ellipses = Vec::new();
    for item in data_records(&mut rdr, origin) {
        let (line, rec) = item?;
        ellipses.push(parse_ellipse_row(&rec, line)?);
    }
    let table = EllipseTable::from_ellipses(ellipses)?;
    if let Some((first, last)) = table.frame_range() {
        info!("Loaded {} ellipses covering frames {}..={}", table.len(), first, last);
    }
    Ok(table)
}
