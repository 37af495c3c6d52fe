//! Comma-delimited table readers for detections, moon ellipses and ground truth.
//!
//! All three inputs share one dialect: no mandatory header (a first row with no
//! numeric field is treated as a header and skipped), `#` comment
//! lines, surrounding whitespace trimmed, and ragged rows allowed through to the
//! row parser, which decides whether the column count is acceptable.

pub mod detections;
pub mod ellipses;
pub mod truth;

use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::{Error, Result};

pub use detections::{load_detections, parse_detection_row, read_detections};
pub use ellipses::{load_ellipses, read_ellipses};
pub use truth::{load_ground_truth, read_ground_truth};

/// Rows recovered from a tolerant loader, plus the number of malformed rows
/// that were skipped.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

pub(crate) fn csv_reader<R: io::Read>(rdr: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(rdr)
}

pub(crate) fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| Error::resource(path, e))
}

/// Iterate data records, dropping a leading header row. Yields `(line, record)`.
///
/// A row that is not valid UTF-8 comes back as a format error for that line;
/// the reader carries on with the next row.
pub(crate) fn data_records<'a, R: io::Read + 'a>(
    rdr: &'a mut csv::Reader<R>,
    origin: &'a Path,
) -> impl Iterator<Item = Result<(u64, csv::StringRecord)>> + 'a {
    let mut first = true;
    rdr.records().filter_map(move |rec| {
        let is_first = std::mem::replace(&mut first, false);
        let rec = match rec {
            Ok(r) => r,
            Err(e) => {
                let utf8_line = match e.kind() {
                    csv::ErrorKind::Utf8 { pos, .. } => {
                        Some(pos.as_ref().map(|p| p.line()).unwrap_or(0))
                    }
                    _ => None,
                };
                return Some(Err(match utf8_line {
                    Some(line) => Error::format(line, "invalid UTF-8"),
                    None => Error::csv(origin, e),
                }));
            }
        };
        let line = rec.position().map(|p| p.line()).unwrap_or(0);
        if is_first && is_header(&rec) {
            return None;
        }
        Some(Ok((line, rec)))
    })
}

fn is_header(rec: &csv::StringRecord) -> bool {
    !rec.is_empty() && rec.iter().all(|field| field.parse::<f64>().is_err())
}

pub(crate) fn parse_f32(rec: &csv::StringRecord, idx: usize, name: &str, line: u64) -> Result<f32> {
    let field = rec
        .get(idx)
        .ok_or_else(|| Error::format(line, format!("missing column '{name}'")))?;
    let v: f32 = field
        .parse()
        .map_err(|_| Error::format(line, format!("'{name}' is not a number: '{field}'")))?;
    if !v.is_finite() {
        return Err(Error::format(line, format!("'{name}' is not finite")));
    }
    Ok(v)
}

pub(crate) fn parse_f64(rec: &csv::StringRecord, idx: usize, name: &str, line: u64) -> Result<f64> {
    let field = rec
        .get(idx)
        .ok_or_else(|| Error::format(line, format!("missing column '{name}'")))?;
    let v: f64 = field
        .parse()
        .map_err(|_| Error::format(line, format!("'{name}' is not a number: '{field}'")))?;
    if !v.is_finite() {
        return Err(Error::format(line, format!("'{name}' is not finite")));
    }
    Ok(v)
}

/// Parse a frame index. Integral floats such as `12.0` are accepted since
/// upstream tools often write every column as float.
pub(crate) fn parse_frame(rec: &csv::StringRecord, idx: usize, name: &str, line: u64) -> Result<u32> {
    let field = rec
        .get(idx)
        .ok_or_else(|| Error::format(line, format!("missing column '{name}'")))?;
    if let Ok(v) = field.parse::<u32>() {
        return Ok(v);
    }
    let v: f64 = field
        .parse()
        .map_err(|_| Error::format(line, format!("'{name}' is not a frame index: '{field}'")))?;
    if v < 0.0 {
        return Err(Error::format(line, format!("'{name}' is negative: {v}")));
    }
    if !v.is_finite() || v.fract() != 0.0 || v > u32::MAX as f64 {
        return Err(Error::format(line, format!("'{name}' is not a frame index: '{field}'")));
    }
    Ok(v as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(fields.to_vec())
    }

    #[test]
    fn test_parse_frame_accepts_integral_float() {
        let rec = record(&["12.0"]);
        assert_eq!(parse_frame(&rec, 0, "frame", 1).unwrap(), 12);
        let rec = record(&["7"]);
        assert_eq!(parse_frame(&rec, 0, "frame", 1).unwrap(), 7);
    }

    #[test]
    fn test_parse_frame_rejects_negative_and_fractional() {
        let rec = record(&["-3"]);
        assert!(parse_frame(&rec, 0, "frame", 4).is_err());
        let rec = record(&["2.5"]);
        assert!(parse_frame(&rec, 0, "frame", 4).is_err());
    }

    #[test]
    fn test_header_row_is_skipped_once() {
        let text = "frame,x\n1,2\nframe,x\n";
        let mut rdr = csv_reader(text.as_bytes());
        let origin = Path::new("<test>");
        let rows: Vec<_> = data_records(&mut rdr, origin).collect();
        assert_eq!(rows.len(), 2);
        let (line, rec) = rows[0].as_ref().unwrap();
        assert_eq!(*line, 2);
        assert_eq!(rec.get(0), Some("1"));
    }

    #[test]
    fn test_row_with_numeric_fields_is_not_a_header() {
        let text = "x1,2,3,4\n5,6,7,8\n";
        let mut rdr = csv_reader(text.as_bytes());
        let rows: Vec<_> = data_records(&mut rdr, Path::new("<test>")).collect();
        assert_eq!(rows.len(), 2);
        let (line, rec) = rows[0].as_ref().unwrap();
        assert_eq!(*line, 1);
        assert_eq!(rec.get(0), Some("x1"));
    }

    #[test]
    fn test_invalid_utf8_row_is_format_error() {
        let text: &[u8] = b"1,2\n2,\xff\xfe\n3,4\n";
        let mut rdr = csv_reader(text);
        let rows: Vec<_> = data_records(&mut rdr, Path::new("<test>")).collect();
        assert_eq!(rows.len(), 3);
        let err = rows[1].as_ref().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);
        assert!(err.to_string().contains("line 2"));
        assert!(rows[2].is_ok());
    }
}
