//! Time utilities for trip timestamps.
//!
//! All timestamps are Unix epoch microseconds (u64).

use crate::error::{OdometerError, Result};

/// Return the current time as microseconds since Unix epoch.
///
/// A clock set before the epoch reads as zero.
pub fn now_micros() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Convert microseconds to an RFC 3339 string.
pub fn micros_to_rfc3339(micros: u64) -> String {
    let secs = (micros / 1_000_000) as i64;
    let nsecs = ((micros % 1_000_000) * 1000) as u32;
    let dt = chrono::DateTime::from_timestamp(secs, nsecs).unwrap_or(chrono::DateTime::UNIX_EPOCH);
    dt.to_rfc3339()
}

/// Parse an RFC 3339 string into microseconds since Unix epoch.
///
/// Times before the epoch are rejected.
pub fn rfc3339_to_micros(s: &str) -> Result<u64> {
    let dt = chrono::DateTime::parse_from_rfc3339(s.trim())
        .map_err(|e| OdometerError::SerializationError(format!("invalid timestamp '{s}': {e}")))?;
    let micros = dt.timestamp_micros();
    u64::try_from(micros).map_err(|_| {
        OdometerError::SerializationError(format!("timestamp '{s}' is before the Unix epoch"))
    })
}
