//! Continuity engine: cascade preview, apply, relink, and break detection.

use log::{debug, info, warn};

use crate::error::{OdometerError, Result};
use crate::storage::{TripBatch, TripStore, TripUpdate};
use crate::trip::{Trip, TripId, TripSequence};

use super::types::*;

// ---------------------------------------------------------------------------
// Cascade planning
// ---------------------------------------------------------------------------

/// Compute the cascade for changing `edited`'s end reading to `new_end_km`.
///
/// Unlike [`preview_sequence`], an out-of-range shift is reported through
/// `CascadeResult::status` rather than as an error. Rows computed before the
/// offending trip are kept so callers can show how far the cascade got.
///
/// # Errors
///
/// `TripNotFound` if `edited` is not in the sequence, `InvalidReading` if
/// `new_end_km` is below the trip's own start reading.
pub fn plan_cascade(
    sequence: &TripSequence,
    edited: &TripId,
    new_end_km: u64,
) -> Result<CascadeResult> {
    let index = sequence.require_position(edited)?;
    let trip = &sequence.trips()[index];

    if new_end_km < trip.start_km {
        return Err(OdometerError::InvalidReading {
            trip_id: trip.id.clone(),
            start_km: trip.start_km,
            end_km: new_end_km,
        });
    }

    let delta_km = signed_km(trip, new_end_km)? - signed_km(trip, trip.end_km)?;
    let mut rows = vec![CascadeRow {
        trip_id: trip.id.clone(),
        current_start_km: trip.start_km,
        new_start_km: trip.start_km,
        current_end_km: trip.end_km,
        new_end_km,
    }];

    let (status, stopped_at) = shift_downstream(&sequence.trips()[index + 1..], delta_km, &mut rows);

    debug!(
        "cascade for {} on vehicle {}: delta {} km, {} rows, stopped at {:?}",
        trip.id,
        sequence.vehicle_id(),
        delta_km,
        rows.len(),
        stopped_at
    );

    Ok(CascadeResult {
        vehicle_id: sequence.vehicle_id().clone(),
        kind: CascadeKind::Edit,
        edited_trip_id: trip.id.clone(),
        delta_km,
        rows,
        status,
        stopped_at,
        sequence_fingerprint: sequence.fingerprint(),
    })
}

/// Preview a cascade over a vehicle's trips given in any order.
///
/// Performs no mutation; the same inputs always give the same result.
///
/// # Errors
///
/// `InvalidReading`, `TripNotFound`, `VehicleMismatch`, or
/// `CascadeOutOfRange` naming the first trip that would go negative.
pub fn preview(vehicle_trips: &[Trip], edited: &TripId, new_end_km: u64) -> Result<CascadeResult> {
    let sequence = TripSequence::new(vehicle_trips.to_vec())?;
    preview_sequence(&sequence, edited, new_end_km)
}

/// Preview a cascade over an already-built sequence.
pub fn preview_sequence(
    sequence: &TripSequence,
    edited: &TripId,
    new_end_km: u64,
) -> Result<CascadeResult> {
    let plan = plan_cascade(sequence, edited, new_end_km)?;
    reject_out_of_range(plan)
}

/// Compute a cascade that re-anchors `trip_id` on its predecessor.
///
/// The trip keeps its distance; its start moves to the predecessor's end
/// reading and every later trip shifts by the same amount, up to the first
/// manual override. The first trip of a sequence, or one already linked,
/// yields a single unchanged row.
///
/// # Errors
///
/// `TripNotFound`, `InvalidReading` if the trip's own readings are reversed,
/// or `CascadeOutOfRange`.
pub fn relink(sequence: &TripSequence, trip_id: &TripId) -> Result<CascadeResult> {
    let index = sequence.require_position(trip_id)?;
    let trips = sequence.trips();
    let trip = &trips[index];

    if !trip.readings_valid() {
        return Err(OdometerError::InvalidReading {
            trip_id: trip.id.clone(),
            start_km: trip.start_km,
            end_km: trip.end_km,
        });
    }

    let (new_start_km, delta_km) = match index {
        0 => (trip.start_km, 0),
        _ => {
            let anchor = trips[index - 1].end_km;
            (anchor, signed_km(trip, anchor)? - signed_km(trip, trip.start_km)?)
        }
    };
    let new_end_km = new_start_km.checked_add(trip.distance_km()).ok_or_else(|| {
        OdometerError::CascadeOutOfRange {
            trip_id: trip.id.clone(),
            shifted_start_km: i64::try_from(new_start_km).unwrap_or(i64::MAX),
        }
    })?;
    let mut rows = vec![CascadeRow {
        trip_id: trip.id.clone(),
        current_start_km: trip.start_km,
        new_start_km,
        current_end_km: trip.end_km,
        new_end_km,
    }];

    let (status, stopped_at) = shift_downstream(&trips[index + 1..], delta_km, &mut rows);

    debug!(
        "relink for {} on vehicle {}: delta {} km, {} rows",
        trip.id,
        sequence.vehicle_id(),
        delta_km,
        rows.len()
    );

    reject_out_of_range(CascadeResult {
        vehicle_id: sequence.vehicle_id().clone(),
        kind: CascadeKind::Relink,
        edited_trip_id: trip.id.clone(),
        delta_km,
        rows,
        status,
        stopped_at,
        sequence_fingerprint: sequence.fingerprint(),
    })
}

/// Shift `downstream` trips by `delta_km`, appending a row per shifted trip.
///
/// Stops at the first manual override, which is left untouched together
/// with everything after it. A zero delta shifts nothing.
fn shift_downstream(
    downstream: &[Trip],
    delta_km: i64,
    rows: &mut Vec<CascadeRow>,
) -> (CascadeStatus, Option<TripId>) {
    if delta_km == 0 {
        return (CascadeStatus::Ok, None);
    }

    for trip in downstream {
        if trip.is_manual_override {
            return (CascadeStatus::Ok, Some(trip.id.clone()));
        }

        let (Some(new_start_km), Some(new_end_km)) = (
            shift_reading(trip.start_km, delta_km),
            shift_reading(trip.end_km, delta_km),
        ) else {
            let shifted_start_km = i64::try_from(trip.start_km)
                .unwrap_or(i64::MAX)
                .saturating_add(delta_km);
            return (
                CascadeStatus::OutOfRange {
                    trip_id: trip.id.clone(),
                    shifted_start_km,
                },
                None,
            );
        };

        rows.push(CascadeRow {
            trip_id: trip.id.clone(),
            current_start_km: trip.start_km,
            new_start_km,
            current_end_km: trip.end_km,
            new_end_km,
        });
    }

    (CascadeStatus::Ok, None)
}

/// Shift a reading by `delta_km`; `None` below zero or past `i64::MAX`.
fn shift_reading(km: u64, delta_km: i64) -> Option<u64> {
    let shifted = i64::try_from(km).ok()?.checked_add(delta_km)?;
    u64::try_from(shifted).ok()
}

/// A reading of `trip` as a signed value for delta arithmetic.
fn signed_km(trip: &Trip, km: u64) -> Result<i64> {
    i64::try_from(km).map_err(|_| OdometerError::InvalidReading {
        trip_id: trip.id.clone(),
        start_km: trip.start_km,
        end_km: km,
    })
}

fn reject_out_of_range(plan: CascadeResult) -> Result<CascadeResult> {
    match plan.status {
        CascadeStatus::Ok => Ok(plan),
        CascadeStatus::OutOfRange {
            trip_id,
            shifted_start_km,
        } => {
            warn!(
                "cascade from {} on vehicle {} rejected: trip {} would start at {} km",
                plan.edited_trip_id, plan.vehicle_id, trip_id, shifted_start_km
            );
            Err(OdometerError::CascadeOutOfRange {
                trip_id,
                shifted_start_km,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Write a previewed cascade through `store` as one atomic batch.
///
/// `vehicle_trips` is the vehicle's current state. If every row already
/// holds its new readings the call is a no-op; otherwise the current state
/// must still match the state the preview was computed from.
///
/// # Errors
///
/// `CascadeOutOfRange` for a plan that was never valid, `StaleSequence` if
/// the trips changed since the preview, `TransactionFailure` (or another
/// store error) if the batch write failed. No rows change on any error.
pub fn apply<S: TripStore + ?Sized>(
    store: &S,
    vehicle_trips: &[Trip],
    result: &CascadeResult,
) -> Result<ApplyOutcome> {
    if let CascadeStatus::OutOfRange {
        trip_id,
        shifted_start_km,
    } = &result.status
    {
        return Err(OdometerError::CascadeOutOfRange {
            trip_id: trip_id.clone(),
            shifted_start_km: *shifted_start_km,
        });
    }

    let sequence = TripSequence::for_vehicle(result.vehicle_id.clone(), vehicle_trips.to_vec())?;

    let already_applied = result.rows.iter().all(|row| {
        sequence
            .get(&row.trip_id)
            .map(|t| t.start_km == row.new_start_km && t.end_km == row.new_end_km)
            .unwrap_or(false)
    });
    if already_applied {
        debug!(
            "cascade from {} on vehicle {} already applied",
            result.edited_trip_id, result.vehicle_id
        );
        return Ok(ApplyOutcome::AlreadyApplied);
    }

    if sequence.fingerprint() != result.sequence_fingerprint {
        warn!(
            "stale cascade from {} on vehicle {}: sequence changed since preview",
            result.edited_trip_id, result.vehicle_id
        );
        return Err(OdometerError::StaleSequence {
            vehicle_id: result.vehicle_id.0.clone(),
        });
    }

    let updates: Vec<TripUpdate> = result
        .changed_rows()
        .map(|row| TripUpdate {
            trip_id: row.trip_id.clone(),
            expected_start_km: row.current_start_km,
            expected_end_km: row.current_end_km,
            start_km: row.new_start_km,
            end_km: row.new_end_km,
        })
        .collect();
    let updated: Vec<TripId> = updates.iter().map(|u| u.trip_id.clone()).collect();

    store.commit_trip_updates(&TripBatch {
        vehicle_id: result.vehicle_id.clone(),
        expected_fingerprint: Some(result.sequence_fingerprint.clone()),
        updates,
    })?;

    info!(
        "applied {} cascade from {} on vehicle {}: {} trips updated, delta {} km",
        result.kind.as_tag(),
        result.edited_trip_id,
        result.vehicle_id,
        updated.len(),
        result.delta_km
    );

    Ok(ApplyOutcome::Applied { updated })
}

// ---------------------------------------------------------------------------
// Continuity audit
// ---------------------------------------------------------------------------

/// Find every consecutive pair whose readings do not chain.
pub fn detect_breaks(sequence: &TripSequence) -> Vec<ContinuityBreak> {
    sequence
        .trips()
        .windows(2)
        .filter_map(|pair| continuity_break(&pair[0], &pair[1]))
        .collect()
}

/// Check whether `next` chains from `previous`.
pub fn continuity_break(previous: &Trip, next: &Trip) -> Option<ContinuityBreak> {
    if next.start_km == previous.end_km {
        return None;
    }

    let (kind, magnitude_km) = if next.start_km > previous.end_km {
        (BreakKind::Gap, next.start_km - previous.end_km)
    } else {
        (BreakKind::Overlap, previous.end_km - next.start_km)
    };

    Some(ContinuityBreak {
        previous_trip_id: previous.id.clone(),
        trip_id: next.id.clone(),
        expected_start_km: previous.end_km,
        actual_start_km: next.start_km,
        kind,
        magnitude_km,
        severity: BreakSeverity::for_magnitude(magnitude_km),
        at_manual_boundary: next.is_manual_override,
    })
}

/// Summarise a vehicle's continuity.
///
/// Breaks in front of a manual override are reported but do not make the
/// sequence discontinuous.
pub fn verify_continuity(sequence: &TripSequence) -> ContinuityReport {
    let breaks = detect_breaks(sequence);
    let counted: Vec<&ContinuityBreak> = breaks.iter().filter(|b| !b.at_manual_boundary).collect();

    let result = if counted.is_empty() {
        ContinuityResult::Continuous
    } else {
        ContinuityResult::Broken {
            break_count: counted.len(),
            max_break_km: counted.iter().map(|b| b.magnitude_km).max().unwrap_or(0),
        }
    };

    ContinuityReport {
        vehicle_id: sequence.vehicle_id().clone(),
        trip_count: sequence.len(),
        total_distance_km: sequence.trips().iter().map(Trip::distance_km).sum(),
        breaks,
        result,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
