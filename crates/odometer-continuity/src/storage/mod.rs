//! Storage layer for vehicle trip sequences.
//!
//! The engine never persists anything itself. It consumes a [`TripStore`]
//! that fetches a vehicle's trips and commits batches of reading updates
//! all-or-nothing.
//!
//! # Modules
//!
//! - [`memory_store`]: in-process store guarded by a lock, with fault injection.
//! - [`trip_file`]: one JSON file per vehicle, committed by atomic rename.
//!
//! # Batch contract
//!
//! `commit_trip_updates` must either write every update in the batch or
//! none of them. A store rejects a batch with `StaleSequence` when the
//! vehicle's current fingerprint differs from `expected_fingerprint`, or
//! when any row's current readings differ from the expected ones.

pub mod memory_store;
pub mod trip_file;

use serde::{Deserialize, Serialize};

use crate::error::{OdometerError, Result};
use crate::trip::{Trip, TripId, TripSequence, VehicleId};

pub use memory_store::MemoryTripStore;
pub use trip_file::FileTripStore;

// ── Batch types ───────────────────────────────────────────────────────────────

/// New readings for one trip, with the readings they replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripUpdate {
    pub trip_id: TripId,
    pub expected_start_km: u64,
    pub expected_end_km: u64,
    pub start_km: u64,
    pub end_km: u64,
}

/// An atomic set of reading updates for one vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripBatch {
    pub vehicle_id: VehicleId,
    /// Fingerprint the vehicle's sequence must still have; `None` skips the check.
    pub expected_fingerprint: Option<String>,
    pub updates: Vec<TripUpdate>,
}

// ── Store contract ────────────────────────────────────────────────────────────

/// Persistence collaborator for trip sequences.
pub trait TripStore: Send + Sync {
    /// All trips recorded for `vehicle_id`, ordered by sequence key.
    fn fetch_trips_for_vehicle(&self, vehicle_id: &VehicleId) -> Result<Vec<Trip>>;

    /// Apply every update in `batch`, or none of them.
    ///
    /// # Errors
    ///
    /// `StaleSequence` if the sequence changed under the batch,
    /// `TransactionFailure` if the write itself failed.
    fn commit_trip_updates(&self, batch: &TripBatch) -> Result<()>;

    /// Insert a new trip.
    ///
    /// # Errors
    ///
    /// `InvalidReading`/`InvalidFuel` if the record fails [`Trip::validate`];
    /// a store error if a trip with the same id exists.
    fn insert_trip(&self, trip: Trip) -> Result<()>;

    /// Vehicles that have at least one trip.
    fn list_vehicles(&self) -> Result<Vec<VehicleId>>;
}

// ── Shared batch validation ───────────────────────────────────────────────────

/// Validate `batch` against `trips` and return the updated trip list.
///
/// `trips` is left untouched, so a caller that only swaps in the returned
/// list on success gets all-or-nothing semantics for free.
pub(crate) fn apply_batch(trips: &[Trip], batch: &TripBatch) -> Result<Vec<Trip>> {
    let sequence = TripSequence::for_vehicle(batch.vehicle_id.clone(), trips.to_vec())?;

    if let Some(expected) = &batch.expected_fingerprint {
        if &sequence.fingerprint() != expected {
            return Err(OdometerError::StaleSequence {
                vehicle_id: batch.vehicle_id.0.clone(),
            });
        }
    }

    let mut updated = sequence.into_trips();
    for update in &batch.updates {
        let trip = updated
            .iter_mut()
            .find(|t| t.id == update.trip_id)
            .ok_or_else(|| OdometerError::TripNotFound(update.trip_id.0.clone()))?;

        if trip.start_km != update.expected_start_km || trip.end_km != update.expected_end_km {
            return Err(OdometerError::StaleSequence {
                vehicle_id: batch.vehicle_id.0.clone(),
            });
        }
        if update.end_km < update.start_km {
            return Err(OdometerError::InvalidReading {
                trip_id: update.trip_id.clone(),
                start_km: update.start_km,
                end_km: update.end_km,
            });
        }

        trip.start_km = update.start_km;
        trip.end_km = update.end_km;
    }

    Ok(updated)
}
