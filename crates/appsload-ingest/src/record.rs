// Device record parser
//
// Input lines are tab-separated:
//   device_type \t device_id \t latitude \t longitude \t app_id[,app_id...]
//   Example: idfa	1rfw452y52g2gq4g	55.55	42.42	1423,43,567,3,7,23

use thiserror::Error;
use tracing::{info, warn};

/// Minimum number of tab-separated fields in a valid line
pub const FIELD_COUNT: usize = 5;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Expected at least {FIELD_COUNT} tab-separated fields, got {found}")]
    MalformedLine { found: usize },

    #[error("Device type and device id must both be non-empty")]
    MissingIdentity,

    #[error("Line is not valid UTF-8")]
    InvalidEncoding,
}

// ============================================================================
// DeviceRecord
// ============================================================================

/// One decoded input line
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub device_type: String,
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub apps: Vec<u32>,
    /// App entries that did not parse and were stored as `0`
    pub coerced_apps: usize,
    /// Whether latitude or longitude failed to parse
    pub invalid_coords: bool,
}

impl DeviceRecord {
    /// Composite backend key, `device_type:device_id`
    pub fn key(&self) -> String {
        format!("{}:{}", self.device_type, self.device_id)
    }
}

/// Parse a single line into a [`DeviceRecord`]
///
/// Surrounding whitespace is stripped, except tabs: those are separators, and
/// a leading tab means an empty device type.
pub fn parse(line: &str) -> Result<DeviceRecord, ParseError> {
    let line = trim_line(line);
    let fields: Vec<&str> = line.split('\t').collect();

    if fields.len() < FIELD_COUNT {
        return Err(ParseError::MalformedLine { found: fields.len() });
    }

    let device_type = fields[0];
    let device_id = fields[1];
    if device_type.is_empty() || device_id.is_empty() {
        return Err(ParseError::MissingIdentity);
    }

    let (apps, coerced_apps) = parse_apps(fields[4]);
    if coerced_apps > 0 {
        info!(line = %line, coerced = coerced_apps, "Not all user apps are digits");
    }

    let latitude = parse_coord(fields[2]);
    let longitude = parse_coord(fields[3]);
    let invalid_coords = latitude.is_none() || longitude.is_none();
    if invalid_coords {
        warn!(line = %line, "Invalid geo coords");
    }

    Ok(DeviceRecord {
        device_type: device_type.to_string(),
        device_id: device_id.to_string(),
        latitude: latitude.unwrap_or_default(),
        longitude: longitude.unwrap_or_default(),
        apps,
        coerced_apps,
        invalid_coords,
    })
}

/// Parse raw bytes, rejecting anything that is not UTF-8
pub fn parse_bytes(line: &[u8]) -> Result<DeviceRecord, ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidEncoding)?;
    parse(line)
}

/// Returns the app ids and how many of them had to be coerced to 0.
///
/// Non-numeric entries keep their position as `0` so downstream consumers see
/// the same list length as the source line. An empty field is one empty
/// entry, so it yields `[0]`.
fn parse_apps(raw: &str) -> (Vec<u32>, usize) {
    let mut coerced = 0;
    let apps: Vec<u32> = raw
        .split(',')
        .map(|piece| {
            piece.trim().parse::<u32>().unwrap_or_else(|_| {
                coerced += 1;
                0
            })
        })
        .collect();

    (apps, coerced)
}

fn trim_line(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() && c != '\t')
}

fn parse_coord(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "idfa\t1rfw452y52g2gq4g\t55.55\t42.42\t1423,43,567,3,7,23";

    #[test]
    fn test_parse_valid_line() {
        let record = parse(SAMPLE).unwrap();
        assert_eq!(record.device_type, "idfa");
        assert_eq!(record.device_id, "1rfw452y52g2gq4g");
        assert_eq!(record.latitude, 55.55);
        assert_eq!(record.longitude, 42.42);
        assert_eq!(record.apps, vec![1423, 43, 567, 3, 7, 23]);
        assert_eq!(record.coerced_apps, 0);
        assert!(!record.invalid_coords);
        assert_eq!(record.key(), "idfa:1rfw452y52g2gq4g");
    }

    #[test]
    fn test_too_few_fields() {
        assert_eq!(
            parse("idfa\tabc\t1.0\t2.0"),
            Err(ParseError::MalformedLine { found: 4 })
        );
        assert_eq!(parse("garbage"), Err(ParseError::MalformedLine { found: 1 }));
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let record = parse("gaid\tabc\t1.0\t2.0\t5,6\textra").unwrap();
        assert_eq!(record.apps, vec![5, 6]);
    }

    #[test]
    fn test_missing_identity() {
        assert_eq!(parse("\tabc\t1\t2\t3"), Err(ParseError::MissingIdentity));
        assert_eq!(parse("idfa\t\t1\t2\t3"), Err(ParseError::MissingIdentity));
    }

    #[test]
    fn test_non_numeric_apps_become_zero() {
        let record = parse("adid\tx\t1\t2\t10,abc,-3,20,99999999999").unwrap();
        assert_eq!(record.apps, vec![10, 0, 0, 20, 0]);
        assert_eq!(record.coerced_apps, 3);
    }

    #[test]
    fn test_empty_apps_field() {
        let record = parse("adid\tx\t1\t2\t\textra").unwrap();
        assert_eq!(record.apps, vec![0]);
        assert_eq!(record.coerced_apps, 1);

        let record = parse("adid\tx\t1\t2\t \tmore").unwrap();
        assert_eq!(record.apps, vec![0]);
        assert_eq!(record.coerced_apps, 1);

        let record = parse("adid\tx\t1\t2\t5,,6").unwrap();
        assert_eq!(record.apps, vec![5, 0, 6]);
        assert_eq!(record.coerced_apps, 1);
    }

    #[test]
    fn test_bad_coords_are_zeroed() {
        let record = parse("dvid\tx\tnorth\t42.5\t1").unwrap();
        assert_eq!(record.latitude, 0.0);
        assert_eq!(record.longitude, 42.5);
        assert!(record.invalid_coords);
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        let record = parse("  idfa\tid\t1\t2\t3\r\n").unwrap();
        assert_eq!(record.device_type, "idfa");
        assert_eq!(record.apps, vec![3]);
    }

    #[test]
    fn test_parse_bytes_rejects_invalid_utf8() {
        assert_eq!(
            parse_bytes(b"idfa\t\xff\xfe\t1\t2\t3"),
            Err(ParseError::InvalidEncoding)
        );
        assert!(parse_bytes(SAMPLE.as_bytes()).is_ok());
    }
}
