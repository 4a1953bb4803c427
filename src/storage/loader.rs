//! JSON-lines catalog and measurement log loading
//!
//! One JSON object per line. Blank lines and lines starting with `#` are
//! skipped. A file that does not exist loads as empty.

use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

use crate::error::StoreError;
use crate::types::{Device, Measurement};

/// Read the device catalog (`{"id","lat","lon"}` per line)
pub fn read_devices(path: &Path) -> Result<Vec<Device>, StoreError> {
    read_lines(path)
}

/// Read the measurement log (`{"device_id","timestamp","value"}` per line)
pub fn read_measurements(path: &Path) -> Result<Vec<Measurement>, StoreError> {
    read_lines(path)
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Store file not found, starting empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(StoreError::Io(e)),
    };

    parse_lines(BufReader::new(file), &path.display().to_string())
}

/// Parse JSON-lines records from any reader
///
/// `origin` names the source in parse errors.
pub fn parse_lines<T, R>(reader: R, origin: &str) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
    R: BufRead,
{
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let record = serde_json::from_str(trimmed).map_err(|e| StoreError::Parse {
            path: origin.to_string(),
            line: idx + 1,
            reason: e.to_string(),
        })?;
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_devices_skips_comments() {
        let input = "# catalog\n{\"id\":\"a\",\"lat\":1.0,\"lon\":2.0}\n\n{\"id\":\"b\",\"lat\":3.0,\"lon\":4.0}\n";
        let devices: Vec<Device> = parse_lines(Cursor::new(input), "inline").unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].id, "b");
    }

    #[test]
    fn test_parse_error_reports_line() {
        let input = "{\"device_id\":\"a\",\"timestamp\":1,\"value\":0.5}\n{not json}\n";
        let err = parse_lines::<Measurement, _>(Cursor::new(input), "m.jsonl").unwrap_err();
        match err {
            StoreError::Parse { path, line, .. } => {
                assert_eq!(path, "m.jsonl");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let devices = read_devices(&dir.path().join("absent.jsonl")).unwrap();
        assert!(devices.is_empty());
    }

    #[test]
    fn test_read_measurements_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("measurements.jsonl");
        std::fs::write(
            &path,
            "{\"device_id\":\"a\",\"timestamp\":10,\"value\":0.1}\n{\"device_id\":\"a\",\"timestamp\":5,\"value\":0.2}\n",
        )
        .unwrap();

        let rows = read_measurements(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp, 10);
    }
}
