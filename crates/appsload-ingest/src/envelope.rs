//! Protobuf envelope stored under each composite key
//!
//! Wire schema (proto2):
//!
//! ```proto
//! message UserApps {
//!     repeated uint32 apps = 1;
//!     optional double lat = 2;
//!     optional double lon = 3;
//! }
//! ```
//!
//! `lat` and `lon` are always set when encoding. Readers treat a missing
//! coordinate as `0.0`, so absent and zero are indistinguishable after decode.

use crate::record::{self, DeviceRecord};
use prost::Message;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Failed to decode UserApps envelope: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Sample line rejected by parser: {0}")]
    Sample(#[from] record::ParseError),

    #[error("Envelope round-trip mismatch: encoded {encoded}, decoded {decoded}")]
    Mismatch { encoded: String, decoded: String },
}

/// Binary payload written to the backend
#[derive(Clone, PartialEq, Message)]
pub struct UserApps {
    #[prost(uint32, repeated, packed = "false", tag = "1")]
    pub apps: Vec<u32>,
    #[prost(double, optional, tag = "2")]
    pub lat: Option<f64>,
    #[prost(double, optional, tag = "3")]
    pub lon: Option<f64>,
}

impl From<&DeviceRecord> for UserApps {
    fn from(record: &DeviceRecord) -> Self {
        Self {
            apps: record.apps.clone(),
            lat: Some(record.latitude),
            lon: Some(record.longitude),
        }
    }
}

impl fmt::Display for UserApps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lat: {} lon: {} apps: {:?}",
            self.lat.unwrap_or_default(),
            self.lon.unwrap_or_default(),
            self.apps
        )
    }
}

/// Serialize a record's payload. Identical records give identical bytes.
pub fn encode(record: &DeviceRecord) -> Vec<u8> {
    UserApps::from(record).encode_to_vec()
}

pub fn decode(bytes: &[u8]) -> Result<UserApps, EnvelopeError> {
    Ok(UserApps::decode(bytes)?)
}

const SELF_CHECK_SAMPLE: &str = "idfa\t1rfw452y52g2gq4g\t55.55\t42.42\t1423,43,567,3,7,23\n\
                                 gaid\t7rfw452y52g2gq4g\t55.55\t42.42\t7423,424";

/// Encode and decode a couple of known lines, failing on any difference.
///
/// Returns the number of sample records checked.
pub fn self_check() -> Result<usize, EnvelopeError> {
    let mut checked = 0;
    for line in SELF_CHECK_SAMPLE.lines() {
        let record = record::parse(line)?;
        let expected = UserApps::from(&record);
        let decoded = decode(&encode(&record))?;
        if decoded != expected {
            return Err(EnvelopeError::Mismatch {
                encoded: expected.to_string(),
                decoded: decoded.to_string(),
            });
        }
        checked += 1;
    }
    Ok(checked)
}
