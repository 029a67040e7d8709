//! Trip persistence: one JSON file per vehicle.
//!
//! Each vehicle's trips are stored in `{hex(vehicle_id)}.json` inside the
//! configured base directory. The stem is the hex encoding of the id's
//! UTF-8 bytes, so distinct ids never share a file.
//!
//! File format:
//! ```json
//! {
//!     "version": 1,
//!     "vehicle_id": "KA-01-1234",
//!     "trips": [ ... Trip ... ]
//! }
//! ```
//!
//! Commits write the whole vehicle file to `{hex(vehicle_id)}.json.tmp` and rename
//! it over the original, so a failed commit leaves the previous file intact.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{OdometerError, Result};
use crate::trip::{Trip, TripSequence, VehicleId};

use super::{apply_batch, TripBatch, TripStore};

// ── File format constants ─────────────────────────────────────────────────────

const TRIP_FILE_VERSION: u32 = 1;

// ── On-disk structure ─────────────────────────────────────────────────────────

/// Wrapper written to disk for each vehicle.
#[derive(Debug, Serialize, Deserialize)]
struct VehicleTripsFile {
    /// Format version number.
    version: u32,
    /// Owning vehicle.
    vehicle_id: VehicleId,
    /// All trips of the vehicle, in sequence order.
    trips: Vec<Trip>,
}

// ── FileTripStore ─────────────────────────────────────────────────────────────

/// Filesystem-backed implementation of [`TripStore`].
///
/// Writes within one process are serialized by an internal mutex;
/// concurrent writers from multiple processes are not coordinated.
pub struct FileTripStore {
    base_dir: PathBuf,
    write_guard: Mutex<()>,
}

impl FileTripStore {
    /// Create a new `FileTripStore` rooted at `base_dir`.
    ///
    /// The directory and any missing parents are created if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `OdometerError::Io` if the directory cannot be created.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            write_guard: Mutex::new(()),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of a vehicle's trip file, whether or not it exists yet.
    pub fn vehicle_path(&self, vehicle_id: &VehicleId) -> PathBuf {
        self.base_dir
            .join(format!("{}.json", hex::encode(vehicle_id.0.as_bytes())))
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn read_vehicle(&self, vehicle_id: &VehicleId) -> Result<Vec<Trip>> {
        let path = self.vehicle_path(vehicle_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let bytes = std::fs::read(&path)?;
        let file: VehicleTripsFile = serde_json::from_slice(&bytes).map_err(|e| {
            OdometerError::InvalidFileFormat(format!(
                "failed to parse trip file {}: {e}",
                path.display()
            ))
        })?;

        if file.version != TRIP_FILE_VERSION {
            return Err(OdometerError::InvalidFileFormat(format!(
                "unsupported trip file version {} in {}",
                file.version,
                path.display()
            )));
        }
        if &file.vehicle_id != vehicle_id {
            return Err(OdometerError::VehicleMismatch {
                expected: vehicle_id.0.clone(),
                found: file.vehicle_id.0,
            });
        }

        Ok(file.trips)
    }

    /// Write a vehicle's trips via temp file and rename.
    fn write_vehicle(&self, vehicle_id: &VehicleId, trips: Vec<Trip>) -> Result<()> {
        let trips = TripSequence::for_vehicle(vehicle_id.clone(), trips)?.into_trips();
        let file = VehicleTripsFile {
            version: TRIP_FILE_VERSION,
            vehicle_id: vehicle_id.clone(),
            trips,
        };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| OdometerError::SerializationError(e.to_string()))?;

        let path = self.vehicle_path(vehicle_id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json.as_bytes())?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            OdometerError::TransactionFailure(format!(
                "failed to replace {}: {e}",
                path.display()
            ))
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_guard
            .lock()
            .map_err(|_| OdometerError::StorageError("trip file lock poisoned".into()))
    }
}

impl TripStore for FileTripStore {
    fn fetch_trips_for_vehicle(&self, vehicle_id: &VehicleId) -> Result<Vec<Trip>> {
        let trips = self.read_vehicle(vehicle_id)?;
        Ok(TripSequence::for_vehicle(vehicle_id.clone(), trips)?.into_trips())
    }

    fn commit_trip_updates(&self, batch: &TripBatch) -> Result<()> {
        let _guard = self.lock()?;
        let current = self.read_vehicle(&batch.vehicle_id)?;
        let updated = apply_batch(&current, batch)?;
        self.write_vehicle(&batch.vehicle_id, updated)
    }

    fn insert_trip(&self, trip: Trip) -> Result<()> {
        trip.validate()?;
        let _guard = self.lock()?;
        let vehicle_id = trip.vehicle_id.clone();
        let mut trips = self.read_vehicle(&vehicle_id)?;
        if trips.iter().any(|t| t.id == trip.id) {
            return Err(OdometerError::StorageError(format!(
                "trip already exists: {}",
                trip.id
            )));
        }
        trips.push(trip);
        self.write_vehicle(&vehicle_id, trips)
    }

    fn list_vehicles(&self) -> Result<Vec<VehicleId>> {
        let mut ids = Vec::new();

        for entry in std::fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if name_str.strip_suffix(".json").is_none() {
                continue;
            }
            let bytes = std::fs::read(entry.path())?;
            let file: VehicleTripsFile = serde_json::from_slice(&bytes).map_err(|e| {
                OdometerError::InvalidFileFormat(format!(
                    "failed to parse trip file {}: {e}",
                    entry.path().display()
                ))
            })?;
            if !file.trips.is_empty() {
                ids.push(file.vehicle_id);
            }
        }

        ids.sort();
        Ok(ids)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
