//! Raster files on disk: naming, timestamp parsing and `.npy` persistence.
//!
//! The file name is the only temporal index: `rainfall_YYYYMMDDHHMM.npy`.

use crate::types::{RadarError, RadarResult, RainfallImage};
use chrono::NaiveDateTime;
use ndarray::{ArrayBase, Data, Dimension};
use ndarray_npy::{ReadNpyExt, WritableElement, WriteNpyExt};
use regex::Regex;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::NamedTempFile;

/// Minute-resolution timestamp used in every file name
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

const RAINFALL_PREFIX: &str = "rainfall_";

fn rainfall_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^rainfall_(\d{12})\.npy$").expect("valid regex"))
}

/// Parse a `YYYYMMDDHHMM` string
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if text.len() != 12 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok()
}

/// Timestamp of a raw scan file, taken from the second dot-separated
/// component of its name (`HAR.202311090200.h5`)
pub fn scan_timestamp(path: &Path) -> RadarResult<NaiveDateTime> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RadarError::Timestamp(path.display().to_string()))?;

    name.split('.')
        .nth(1)
        .and_then(parse_timestamp)
        .ok_or_else(|| RadarError::Timestamp(name.to_string()))
}

/// `rainfall_YYYYMMDDHHMM.npy`
pub fn rainfall_file_name(timestamp: NaiveDateTime) -> String {
    format!("{}{}.npy", RAINFALL_PREFIX, timestamp.format(TIMESTAMP_FORMAT))
}

pub fn rainfall_path(dir: &Path, timestamp: NaiveDateTime) -> PathBuf {
    dir.join(rainfall_file_name(timestamp))
}

/// Timestamp of a rainfall raster file name, `None` for anything else
/// (geometry files, temporaries, foreign files)
pub fn parse_rainfall_file_name(name: &str) -> Option<NaiveDateTime> {
    rainfall_name_pattern()
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_timestamp(m.as_str()))
}

/// All rainfall rasters in `dir`, sorted by timestamp
pub fn list_rainfall_rasters(dir: &Path) -> RadarResult<Vec<(NaiveDateTime, PathBuf)>> {
    let mut rasters = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(timestamp) = parse_rainfall_file_name(name) {
            rasters.push((timestamp, entry.path()));
        } else if name.starts_with(RAINFALL_PREFIX) {
            log::warn!("Ignoring file with unparseable timestamp: {}", name);
        }
    }
    rasters.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(rasters)
}

/// Write an array as `.npy` under a temporary name in the destination
/// directory, then rename it into place. A reader never observes a
/// partially written file under `path`.
pub fn write_npy_atomic<A, S, D>(path: &Path, array: &ArrayBase<S, D>) -> RadarResult<()>
where
    A: WritableElement,
    S: Data<Elem = A>,
    D: Dimension,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        array.write_npy(&mut writer)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| RadarError::Io(e.error))?;
    Ok(())
}

/// Read a 2D rainfall raster
pub fn read_raster(path: &Path) -> RadarResult<RainfallImage> {
    let reader = BufReader::new(File::open(path)?);
    Ok(RainfallImage::read_npy(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::arr2;
    use tempfile::TempDir;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 11, 9).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_scan_timestamp() {
        let parsed = scan_timestamp(Path::new("/data/radar/HAR.202311090205.h5")).unwrap();
        assert_eq!(parsed, ts(2, 5));
    }

    #[test]
    fn test_scan_timestamp_rejects_bad_names() {
        assert!(scan_timestamp(Path::new("HAR_202311090205.h5")).is_err());
        assert!(scan_timestamp(Path::new("HAR.2023110902.h5")).is_err());
        assert!(scan_timestamp(Path::new("HAR.202313090205.h5")).is_err());
    }

    #[test]
    fn test_rainfall_name_round_trip() {
        let name = rainfall_file_name(ts(14, 55));
        assert_eq!(name, "rainfall_202311091455.npy");
        assert_eq!(parse_rainfall_file_name(&name), Some(ts(14, 55)));
        assert_eq!(parse_rainfall_file_name("ranges.npy"), None);
        assert_eq!(parse_rainfall_file_name(".tmpAbC123"), None);
    }

    #[test]
    fn test_listing_is_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let grid = arr2(&[[1.0_f32]]);
        for (h, m) in [(3, 0), (2, 55), (2, 50)] {
            write_npy_atomic(&rainfall_path(dir.path(), ts(h, m)), &grid).unwrap();
        }
        std::fs::write(dir.path().join("ranges.npy"), b"x").unwrap();
        std::fs::write(dir.path().join("rainfall_notatime.npy"), b"x").unwrap();

        let listed = list_rainfall_rasters(dir.path()).unwrap();
        let times: Vec<_> = listed.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![ts(2, 50), ts(2, 55), ts(3, 0)]);
    }

    #[test]
    fn test_nan_survives_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rainfall_202311090200.npy");
        let grid = arr2(&[[0.5_f32, f32::NAN], [0.0, 2.0]]);
        write_npy_atomic(&path, &grid).unwrap();

        let back = read_raster(&path).unwrap();
        assert_eq!(back[[0, 0]], 0.5);
        assert!(back[[0, 1]].is_nan());
        assert_eq!(back[[1, 0]], 0.0);
        // only the final file remains, no temporaries
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
