//! Ground-truth interval loader: rows of `first_frame, last_frame`, inclusive.

use std::io;
use std::path::Path;

use tracing::{info, warn};

use super::{csv_reader, data_records, open, parse_frame, Loaded};
use crate::error::{Error, ErrorKind, Result};
use crate::TruthInterval;

fn parse_truth_row(rec: &csv::StringRecord, line: u64) -> Result<TruthInterval> {
    if rec.len() < 2 {
        return Err(Error::format(
            line,
            format!("expected 2 columns, got {}", rec.len()),
        ));
    }
    let first_frame = parse_frame(rec, 0, "first_frame", line)?;
    let last_frame = parse_frame(rec, 1, "last_frame", line)?;
    if first_frame > last_frame {
        return Err(Error::format(
            line,
            format!("interval start {first_frame} is after end {last_frame}"),
        ));
    }
    Ok(TruthInterval {
        first_frame,
        last_frame,
    })
}

/// Load ground-truth bird intervals from a CSV file.
pub fn load_ground_truth<P: AsRef<Path>>(path: P) -> Result<Loaded<TruthInterval>> {
    let path = path.as_ref();
    info!("Loading ground truth from {}", path.display());
    let file = open(path)?;
    read_ground_truth_from(file, path)
}

/// Load ground-truth bird intervals from any reader.
pub fn read_ground_truth<R: io::Read>(rdr: R) -> Result<Loaded<TruthInterval>> {
    read_ground_truth_from(rdr, Path::new("<stream>"))
}

fn read_ground_truth_from<R: io::Read>(rdr: R, origin: &Path) -> Result<Loaded<TruthInterval>> {
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
        match parse_truth_row(&rec, line) {
            Ok(iv) => rows.push(iv),
            Err(e) => {
                warn!("{}: skipping row: {}", origin.display(), e);
                skipped += 1;
            }
        }
    }
    info!("Loaded {} ground-truth intervals", rows.len());
    Ok(Loaded { rows, skipped })
}
