//! In-process trip store.
//!
//! Holds every vehicle's trips in a map behind a single `RwLock`. A commit
//! validates the whole batch against a copy and swaps it in under the write
//! lock, so readers never observe a partially shifted sequence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::{OdometerError, Result};
use crate::trip::{Trip, TripId, TripSequence, VehicleId};

use super::{apply_batch, TripBatch, TripStore};

/// Lock-guarded in-memory implementation of [`TripStore`].
#[derive(Default)]
pub struct MemoryTripStore {
    vehicles: RwLock<HashMap<VehicleId, Vec<Trip>>>,
    fail_next_commit: AtomicBool,
}

impl MemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `trips` (any vehicles, any order).
    pub fn with_trips(trips: impl IntoIterator<Item = Trip>) -> Result<Self> {
        let store = Self::new();
        for trip in trips {
            store.insert_trip(trip)?;
        }
        Ok(store)
    }

    /// Make the next `commit_trip_updates` fail with `TransactionFailure`
    /// without writing anything.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Remove a trip, leaving its successor unanchored.
    pub fn delete_trip(&self, vehicle_id: &VehicleId, trip_id: &TripId) -> Result<()> {
        let mut vehicles = self.write_lock()?;
        let trips = vehicles
            .get_mut(vehicle_id)
            .ok_or_else(|| OdometerError::TripNotFound(trip_id.0.clone()))?;
        let before = trips.len();
        trips.retain(|t| &t.id != trip_id);
        if trips.len() == before {
            return Err(OdometerError::TripNotFound(trip_id.0.clone()));
        }
        Ok(())
    }

    fn read_lock(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<VehicleId, Vec<Trip>>>> {
        self.vehicles
            .read()
            .map_err(|_| OdometerError::StorageError("trip store lock poisoned".into()))
    }

    fn write_lock(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<VehicleId, Vec<Trip>>>> {
        self.vehicles
            .write()
            .map_err(|_| OdometerError::StorageError("trip store lock poisoned".into()))
    }
}

impl TripStore for MemoryTripStore {
    fn fetch_trips_for_vehicle(&self, vehicle_id: &VehicleId) -> Result<Vec<Trip>> {
        let vehicles = self.read_lock()?;
        let trips = vehicles.get(vehicle_id).cloned().unwrap_or_default();
        Ok(TripSequence::for_vehicle(vehicle_id.clone(), trips)?.into_trips())
    }

    fn commit_trip_updates(&self, batch: &TripBatch) -> Result<()> {
        let mut vehicles = self.write_lock()?;

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(OdometerError::TransactionFailure(format!(
                "commit for vehicle {} aborted",
                batch.vehicle_id
            )));
        }

        let current = vehicles
            .get(&batch.vehicle_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let updated = apply_batch(current, batch)?;
        vehicles.insert(batch.vehicle_id.clone(), updated);
        Ok(())
    }

    fn insert_trip(&self, trip: Trip) -> Result<()> {
        trip.validate()?;
        let mut vehicles = self.write_lock()?;
        let trips = vehicles.entry(trip.vehicle_id.clone()).or_default();
        if trips.iter().any(|t| t.id == trip.id) {
            return Err(OdometerError::StorageError(format!(
                "trip already exists: {}",
                trip.id
            )));
        }
        trips.push(trip);
        Ok(())
    }

    fn list_vehicles(&self) -> Result<Vec<VehicleId>> {
        let vehicles = self.read_lock()?;
        let mut ids: Vec<VehicleId> = vehicles
            .iter()
            .filter(|(_, trips)| !trips.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
