//! Trips: odometer readings, derived metrics, and per-vehicle ordering.
//!
//! The trip module provides:
//! - The flat `Trip` record with derived distance and efficiency
//! - Trip construction and validation via `TripBuilder`
//! - `TripSequence`, the sorted per-vehicle array cascades run over

pub mod sequence;
pub mod types;

pub use sequence::TripSequence;
pub use types::{SequenceKey, Trip, TripBuilder, TripId, VehicleId};
