//! Error types for odometer continuity.
//!
//! All errors are strongly typed and propagated without panicking.
//! Cascade failures name the trip that caused them so callers can surface it.

use crate::trip::TripId;

/// Error types covering trip construction, cascades, and storage.
#[derive(Debug, thiserror::Error)]
pub enum OdometerError {
    #[error("Invalid reading for trip {trip_id}: end {end_km} km is below start {start_km} km")]
    InvalidReading {
        trip_id: TripId,
        start_km: u64,
        end_km: u64,
    },

    #[error("Cascade out of range: trip {trip_id} would start at {shifted_start_km} km")]
    CascadeOutOfRange {
        trip_id: TripId,
        shifted_start_km: i64,
    },

    #[error("Stale sequence for vehicle {vehicle_id}: trips changed since the preview was computed")]
    StaleSequence { vehicle_id: String },

    #[error("Transaction failed: {0}")]
    TransactionFailure(String),

    #[error("Trip not found: {0}")]
    TripNotFound(String),

    #[error("Vehicle mismatch: expected {expected}, found {found}")]
    VehicleMismatch { expected: String, found: String },

    #[error("Invalid fuel quantity: {0}")]
    InvalidFuel(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, OdometerError>;
