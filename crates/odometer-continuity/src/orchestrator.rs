//! Correction orchestrator: preview, confirm, apply, and re-evaluate.
//!
//! Cascades for one vehicle are serialized by a per-vehicle mutex; a
//! preview computed outside that lock is still protected at apply time by
//! the sequence fingerprint. Different vehicles never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::anomaly::{self, EvaluationContext, FleetBaseline, TripEvaluation};
use crate::config::EngineConfig;
use crate::continuity::{self, ApplyOutcome, CascadeKind, CascadeResult, ContinuityReport};
use crate::error::{OdometerError, Result};
use crate::storage::TripStore;
use crate::trip::{Trip, TripId, TripSequence, VehicleId};

/// Result of an applied correction, ready for a caller to render.
#[derive(Debug, Clone)]
pub struct CorrectionOutcome {
    pub vehicle_id: VehicleId,
    pub kind: CascadeKind,
    pub applied: ApplyOutcome,
    /// Fresh evaluations for every trip whose readings changed.
    pub evaluations: Vec<TripEvaluation>,
}

impl CorrectionOutcome {
    pub fn rows_written(&self) -> usize {
        self.applied.updated().len()
    }
}

/// Glue between the continuity engine, the anomaly detector, and a store.
pub struct CorrectionOrchestrator<S: TripStore> {
    store: S,
    config: EngineConfig,
    locks: Mutex<HashMap<VehicleId, Arc<Mutex<()>>>>,
}

impl<S: TripStore> CorrectionOrchestrator<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Previews ──────────────────────────────────────────────────────────────

    /// Preview changing `trip_id`'s end reading to `new_end_km`.
    pub fn preview_edit(
        &self,
        vehicle_id: &VehicleId,
        trip_id: &TripId,
        new_end_km: u64,
    ) -> Result<CascadeResult> {
        let sequence = self.load_sequence(vehicle_id)?;
        continuity::preview_sequence(&sequence, trip_id, new_end_km)
    }

    /// Preview re-anchoring `trip_id` on its predecessor.
    pub fn preview_relink(&self, vehicle_id: &VehicleId, trip_id: &TripId) -> Result<CascadeResult> {
        let sequence = self.load_sequence(vehicle_id)?;
        continuity::relink(&sequence, trip_id)
    }

    // ── Apply ─────────────────────────────────────────────────────────────────

    /// Apply a cascade previewed earlier.
    ///
    /// # Errors
    ///
    /// `StaleSequence` if the vehicle's trips changed since the preview.
    pub fn apply_correction(&self, result: &CascadeResult) -> Result<CorrectionOutcome> {
        let lock = self.vehicle_lock(&result.vehicle_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| OdometerError::StorageError("vehicle lock poisoned".into()))?;
        self.apply_locked(result)
    }

    /// Preview, confirm, and apply an edit while holding the vehicle's lock.
    ///
    /// Returns `None` when `confirm` declines the preview.
    pub fn edit_trip<F>(
        &self,
        vehicle_id: &VehicleId,
        trip_id: &TripId,
        new_end_km: u64,
        confirm: F,
    ) -> Result<Option<CorrectionOutcome>>
    where
        F: FnOnce(&CascadeResult) -> bool,
    {
        let lock = self.vehicle_lock(vehicle_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| OdometerError::StorageError("vehicle lock poisoned".into()))?;

        let result = self.preview_edit(vehicle_id, trip_id, new_end_km)?;
        if !confirm(&result) {
            info!("edit of {} on vehicle {} declined", trip_id, vehicle_id);
            return Ok(None);
        }
        self.apply_locked(&result).map(Some)
    }

    /// Preview, confirm, and apply a relink while holding the vehicle's lock.
    pub fn relink_trip<F>(
        &self,
        vehicle_id: &VehicleId,
        trip_id: &TripId,
        confirm: F,
    ) -> Result<Option<CorrectionOutcome>>
    where
        F: FnOnce(&CascadeResult) -> bool,
    {
        let lock = self.vehicle_lock(vehicle_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| OdometerError::StorageError("vehicle lock poisoned".into()))?;

        let result = self.preview_relink(vehicle_id, trip_id)?;
        if !confirm(&result) {
            return Ok(None);
        }
        self.apply_locked(&result).map(Some)
    }

    fn apply_locked(&self, result: &CascadeResult) -> Result<CorrectionOutcome> {
        let trips = self.store.fetch_trips_for_vehicle(&result.vehicle_id)?;
        let applied = continuity::apply(&self.store, &trips, result)?;
        let evaluations = self.evaluate_trips(&result.vehicle_id, applied.updated())?;

        Ok(CorrectionOutcome {
            vehicle_id: result.vehicle_id.clone(),
            kind: result.kind,
            applied,
            evaluations,
        })
    }

    // ── Insert ────────────────────────────────────────────────────────────────

    /// Insert a new trip and evaluate it.
    ///
    /// A trip that does not chain with its neighbours is still recorded;
    /// the break is logged and shows up in `continuity_report`. Reversed
    /// readings or an unusable fuel quantity are rejected before anything
    /// is written.
    ///
    /// Only the inserted trip is evaluated. A back-dated trip also becomes
    /// part of the rolling baseline of every later trip of the vehicle;
    /// call [`Self::evaluate_vehicle`] to refresh their flags.
    pub fn record_trip(&self, trip: Trip) -> Result<TripEvaluation> {
        trip.validate()?;
        let vehicle_id = trip.vehicle_id.clone();
        let trip_id = trip.id.clone();

        let lock = self.vehicle_lock(&vehicle_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| OdometerError::StorageError("vehicle lock poisoned".into()))?;

        let mut trips = self.store.fetch_trips_for_vehicle(&vehicle_id)?;
        trips.push(trip.clone());
        let preview = TripSequence::for_vehicle(vehicle_id.clone(), trips)?;
        let index = preview.require_position(&trip_id)?;
        let neighbours = preview.trips();

        if index > 0 {
            if let Some(b) = continuity::continuity_break(&neighbours[index - 1], &trip) {
                warn!(
                    "trip {} on vehicle {} does not chain: starts at {} km, previous ended at {} km",
                    trip_id, vehicle_id, b.actual_start_km, b.expected_start_km
                );
            }
        }
        if let Some(next) = neighbours.get(index + 1) {
            if let Some(b) = continuity::continuity_break(&trip, next) {
                warn!(
                    "trip {} on vehicle {} leaves {} unanchored: next starts at {} km",
                    trip_id, vehicle_id, next.id, b.actual_start_km
                );
            }
        }

        // Fleet baseline excludes the trip being judged.
        let fleet = self.fleet_baseline()?;
        self.store.insert_trip(trip)?;

        let context = EvaluationContext::for_trip(&preview, index, &fleet, &self.config);
        let evaluation = anomaly::evaluate_trip(&preview.trips()[index], &context);
        log_flags(&vehicle_id, &evaluation);
        Ok(evaluation)
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Evaluate every trip of a vehicle.
    pub fn evaluate_vehicle(&self, vehicle_id: &VehicleId) -> Result<Vec<TripEvaluation>> {
        let sequence = self.load_sequence(vehicle_id)?;
        let fleet = self.fleet_baseline()?;
        Ok(anomaly::evaluate_sequence(&sequence, &fleet, &self.config))
    }

    /// Continuity report for a vehicle.
    pub fn continuity_report(&self, vehicle_id: &VehicleId) -> Result<ContinuityReport> {
        let sequence = self.load_sequence(vehicle_id)?;
        Ok(continuity::verify_continuity(&sequence))
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn load_sequence(&self, vehicle_id: &VehicleId) -> Result<TripSequence> {
        let trips = self.store.fetch_trips_for_vehicle(vehicle_id)?;
        TripSequence::for_vehicle(vehicle_id.clone(), trips)
    }

    fn fleet_baseline(&self) -> Result<FleetBaseline> {
        let sequences = self
            .store
            .list_vehicles()?
            .iter()
            .map(|v| self.load_sequence(v))
            .collect::<Result<Vec<_>>>()?;
        Ok(FleetBaseline::from_sequences(&sequences))
    }

    /// Re-evaluate the listed trips against the vehicle's current state.
    fn evaluate_trips(&self, vehicle_id: &VehicleId, ids: &[TripId]) -> Result<Vec<TripEvaluation>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sequence = self.load_sequence(vehicle_id)?;
        let fleet = self.fleet_baseline()?;

        let evaluations: Vec<TripEvaluation> = sequence
            .trips()
            .iter()
            .enumerate()
            .filter(|(_, t)| ids.contains(&t.id))
            .map(|(i, t)| {
                let context = EvaluationContext::for_trip(&sequence, i, &fleet, &self.config);
                anomaly::evaluate_trip(t, &context)
            })
            .collect();

        for evaluation in &evaluations {
            log_flags(vehicle_id, evaluation);
        }
        Ok(evaluations)
    }

    fn vehicle_lock(&self, vehicle_id: &VehicleId) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| OdometerError::StorageError("lock table poisoned".into()))?;
        Ok(Arc::clone(locks.entry(vehicle_id.clone()).or_default()))
    }
}

fn log_flags(vehicle_id: &VehicleId, evaluation: &TripEvaluation) {
    for flag in &evaluation.flags {
        warn!(
            "trip {} on vehicle {} flagged {} ({:?}): {}",
            evaluation.trip_id,
            vehicle_id,
            flag.kind.as_tag(),
            flag.severity,
            flag.reason
        );
    }
}
