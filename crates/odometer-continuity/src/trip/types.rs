//! Trip records and their identifiers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{OdometerError, Result};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique identifier for a trip.
///
/// Format: `trip_` + base58 of the first 16 bytes of SHA-256 over the trip's
/// identifying fields.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TripId(pub String);

impl std::fmt::Display for TripId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the vehicle owning a trip.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordering key of a trip within its vehicle's sequence.
///
/// Trips order by start time, then by creation time. Two trips created in
/// the same microsecond fall back to their ids so the order stays total.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceKey {
    pub started_at: u64,
    pub created_at: u64,
    pub trip_id: TripId,
}

// ---------------------------------------------------------------------------
// Trip
// ---------------------------------------------------------------------------

/// One odometer-tracked journey for a vehicle.
///
/// Distance and efficiency are always derived from the readings and are
/// never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub vehicle_id: VehicleId,
    /// Trip start time (microseconds since epoch).
    pub started_at: u64,
    /// Creation time of the record (microseconds since epoch).
    pub created_at: u64,
    pub start_km: u64,
    pub end_km: u64,
    /// Fuel added on this trip; present only when refuelling was done.
    pub fuel_quantity: Option<f64>,
    /// Readings deliberately entered by a user; never rewritten by a cascade.
    #[serde(default)]
    pub is_manual_override: bool,
}

impl Trip {
    /// Distance covered, `end_km - start_km`.
    ///
    /// Saturates at zero for records that violate `end_km >= start_km`.
    pub fn distance_km(&self) -> u64 {
        self.end_km.saturating_sub(self.start_km)
    }

    /// Whether fuel was added on this trip.
    pub fn refueling_done(&self) -> bool {
        self.fuel_quantity.is_some()
    }

    /// Usable fuel quantity: present, finite and strictly positive.
    pub fn usable_fuel(&self) -> Option<f64> {
        self.fuel_quantity.filter(|q| q.is_finite() && *q > 0.0)
    }

    /// Kilometres per fuel unit, when fuel was added and is usable.
    pub fn efficiency(&self) -> Option<f64> {
        self.usable_fuel().map(|q| self.distance_km() as f64 / q)
    }

    /// Key that orders this trip within its vehicle's sequence.
    pub fn sequence_key(&self) -> SequenceKey {
        SequenceKey {
            started_at: self.started_at,
            created_at: self.created_at,
            trip_id: self.id.clone(),
        }
    }

    /// Whether the stored readings satisfy `end_km >= start_km`.
    pub fn readings_valid(&self) -> bool {
        self.end_km >= self.start_km
    }

    /// Check the record invariants before it is stored.
    ///
    /// # Errors
    ///
    /// `InvalidReading` if `end_km < start_km`, `InvalidFuel` if a fuel
    /// quantity is present but not a finite positive number.
    pub fn validate(&self) -> Result<()> {
        if !self.readings_valid() {
            return Err(OdometerError::InvalidReading {
                trip_id: self.id.clone(),
                start_km: self.start_km,
                end_km: self.end_km,
            });
        }

        if let Some(q) = self.fuel_quantity {
            if !q.is_finite() || q <= 0.0 {
                return Err(OdometerError::InvalidFuel(format!(
                    "fuel quantity must be a positive number, got {q}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

static TRIP_NONCE: AtomicU64 = AtomicU64::new(0);

/// Builder for new trip records.
pub struct TripBuilder {
    vehicle_id: VehicleId,
    started_at: u64,
    created_at: Option<u64>,
    start_km: u64,
    end_km: u64,
    fuel_quantity: Option<f64>,
    is_manual_override: bool,
    id: Option<TripId>,
}

impl TripBuilder {
    /// Start building a trip for `vehicle_id` starting at `started_at`.
    pub fn new(vehicle_id: VehicleId, started_at: u64, start_km: u64, end_km: u64) -> Self {
        Self {
            vehicle_id,
            started_at,
            created_at: None,
            start_km,
            end_km,
            fuel_quantity: None,
            is_manual_override: false,
            id: None,
        }
    }

    /// Record a refuel of `quantity` units on this trip.
    pub fn fuel(mut self, quantity: f64) -> Self {
        self.fuel_quantity = Some(quantity);
        self
    }

    /// Mark the readings as deliberately entered by a user.
    pub fn manual_override(mut self, manual: bool) -> Self {
        self.is_manual_override = manual;
        self
    }

    /// Set the creation time (defaults to now).
    pub fn created_at(mut self, micros: u64) -> Self {
        self.created_at = Some(micros);
        self
    }

    /// Use an explicit id instead of a generated one (imports).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(TripId(id.into()));
        self
    }

    /// Validate the readings and build the trip.
    pub fn build(self) -> Result<Trip> {
        let created_at = self.created_at.unwrap_or_else(crate::time::now_micros);
        let id = self
            .id
            .unwrap_or_else(|| generate_trip_id(&self.vehicle_id, self.started_at, created_at));

        let trip = Trip {
            id,
            vehicle_id: self.vehicle_id,
            started_at: self.started_at,
            created_at,
            start_km: self.start_km,
            end_km: self.end_km,
            fuel_quantity: self.fuel_quantity,
            is_manual_override: self.is_manual_override,
        };
        trip.validate()?;
        Ok(trip)
    }
}

fn generate_trip_id(vehicle_id: &VehicleId, started_at: u64, created_at: u64) -> TripId {
    let nonce = TRIP_NONCE.fetch_add(1, Ordering::Relaxed);
    let id_input = format!("trip:{}:{}:{}:{}", vehicle_id.0, started_at, created_at, nonce);
    let id_hash = Sha256::digest(id_input.as_bytes());
    let id_encoded = bs58::encode(&id_hash[..16]).into_string();
    TripId(format!("trip_{id_encoded}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
