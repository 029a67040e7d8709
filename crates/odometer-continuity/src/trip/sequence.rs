//! Owned, ordered trip sequence for a single vehicle.
//!
//! Trips are held in a flat array sorted by [`SequenceKey`]. A trip's
//! predecessor and successor are its neighbours by index; there are no
//! links between records.

use sha2::{Digest, Sha256};

use crate::error::{OdometerError, Result};

use super::types::{Trip, TripId, VehicleId};

/// All trips of one vehicle, sorted by sequence key.
#[derive(Debug, Clone)]
pub struct TripSequence {
    vehicle_id: VehicleId,
    trips: Vec<Trip>,
}

impl TripSequence {
    /// Build a sequence from trips given in any order.
    ///
    /// # Errors
    ///
    /// Returns `OdometerError::VehicleMismatch` if the trips belong to more
    /// than one vehicle, or `OdometerError::TripNotFound` if `trips` is empty.
    pub fn new(trips: Vec<Trip>) -> Result<Self> {
        let vehicle_id = trips
            .first()
            .map(|t| t.vehicle_id.clone())
            .ok_or_else(|| OdometerError::TripNotFound("empty trip sequence".into()))?;
        Self::for_vehicle(vehicle_id, trips)
    }

    /// Build a sequence for `vehicle_id`; an empty list is allowed.
    pub fn for_vehicle(vehicle_id: VehicleId, mut trips: Vec<Trip>) -> Result<Self> {
        if let Some(stray) = trips.iter().find(|t| t.vehicle_id != vehicle_id) {
            return Err(OdometerError::VehicleMismatch {
                expected: vehicle_id.0.clone(),
                found: stray.vehicle_id.0.clone(),
            });
        }
        trips.sort_by_cached_key(|t| t.sequence_key());
        Ok(Self { vehicle_id, trips })
    }

    pub fn vehicle_id(&self) -> &VehicleId {
        &self.vehicle_id
    }

    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    pub fn into_trips(self) -> Vec<Trip> {
        self.trips
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    /// Index of a trip in sequence order.
    pub fn position(&self, id: &TripId) -> Option<usize> {
        self.trips.iter().position(|t| &t.id == id)
    }

    pub fn get(&self, id: &TripId) -> Option<&Trip> {
        self.trips.iter().find(|t| &t.id == id)
    }

    /// Look up a trip's index, failing with `TripNotFound`.
    pub fn require_position(&self, id: &TripId) -> Result<usize> {
        self.position(id).ok_or_else(|| {
            OdometerError::TripNotFound(format!("{} (vehicle {})", id, self.vehicle_id))
        })
    }

    /// Content fingerprint of the sequence.
    ///
    /// Any change to a trip's id, readings, fuel, manual flag, or position
    /// changes the fingerprint.
    pub fn fingerprint(&self) -> String {
        fingerprint_trips(&self.trips)
    }
}

/// Hex SHA-256 over the ordered trips' cascade-relevant fields.
pub(crate) fn fingerprint_trips(trips: &[Trip]) -> String {
    let mut hasher = Sha256::new();
    for t in trips {
        let fuel = t
            .fuel_quantity
            .map(|q| q.to_bits().to_string())
            .unwrap_or_else(|| "-".into());
        let line = format!(
            "{}:{}:{}:{}:{}:{};",
            t.id.0, t.started_at, t.start_km, t.end_km, t.is_manual_override, fuel
        );
        hasher.update(line.as_bytes());
    }
    hex::encode(hasher.finalize())
}
