//! Scale test: cascades over 5K-trip sequences.
//!
//! Validates that previews, applies, and audits stay linear in the number
//! of downstream trips.

use odometer_continuity::continuity;
use odometer_continuity::{
    CorrectionOrchestrator, EngineConfig, MemoryTripStore, Trip, TripBuilder, TripSequence,
    TripStore, VehicleId,
};

fn chained(vehicle: &VehicleId, count: usize, distance: u64) -> Vec<Trip> {
    (0..count)
        .map(|i| {
            let start = i as u64 * distance;
            TripBuilder::new(vehicle.clone(), i as u64 * 1_000, start, start + distance)
                .created_at(i as u64)
                .fuel(4.0)
                .build()
                .unwrap()
        })
        .collect()
}

#[test]
fn stress_5k_trip_preview_from_head() {
    let vehicle = VehicleId::new("scale-head");
    let trips = chained(&vehicle, 5_000, 40);

    let result = continuity::preview(&trips, &trips[0].id, 45).unwrap();
    assert_eq!(result.rows.len(), 5_000);
    assert_eq!(result.delta_km, 5);
    for (row, trip) in result.rows.iter().zip(&trips).skip(1) {
        assert_eq!(row.trip_id, trip.id);
        assert_eq!(row.new_start_km, trip.start_km + 5);
        assert_eq!(row.new_distance_km(), 40);
    }
}

#[test]
fn stress_5k_trip_apply_restores_continuity() {
    let vehicle = VehicleId::new("scale-apply");
    let trips = chained(&vehicle, 5_000, 40);
    let orch = CorrectionOrchestrator::new(
        MemoryTripStore::with_trips(trips.clone()).unwrap(),
        EngineConfig::default(),
    );

    let outcome = orch
        .edit_trip(&vehicle, &trips[2_500].id, trips[2_500].end_km + 7, |_| true)
        .unwrap()
        .unwrap();
    assert_eq!(outcome.rows_written(), 2_500);

    let report = orch.continuity_report(&vehicle).unwrap();
    assert!(report.is_continuous());
    assert_eq!(report.total_distance_km, 5_000 * 40 + 7);

    let stored = orch.store().fetch_trips_for_vehicle(&vehicle).unwrap();
    assert_eq!(stored[..2_500], trips[..2_500]);
    assert_eq!(stored[4_999].end_km, trips[4_999].end_km + 7);
}

#[test]
fn stress_manual_override_bounds_cascade() {
    let vehicle = VehicleId::new("scale-manual");
    let mut trips = chained(&vehicle, 5_000, 40);
    trips[100].is_manual_override = true;

    let sequence = TripSequence::new(trips.clone()).unwrap();
    let result = continuity::preview_sequence(&sequence, &trips[0].id, 60).unwrap();
    assert_eq!(result.rows.len(), 100);
    assert_eq!(result.stopped_at.as_ref(), Some(&trips[100].id));
}

#[test]
fn stress_audit_10k_trips_with_breaks() {
    let vehicle = VehicleId::new("scale-audit");
    let mut trips = chained(&vehicle, 10_000, 25);
    // Every 1000th trip starts 3 km late.
    for trip in trips.iter_mut().skip(1).step_by(1_000) {
        trip.start_km += 3;
        trip.end_km += 3;
    }

    let sequence = TripSequence::new(trips).unwrap();
    let breaks = continuity::detect_breaks(&sequence);
    // Each shifted trip opens a gap before it and an overlap after it.
    assert_eq!(breaks.len(), 20);
    assert!(breaks.iter().all(|b| b.magnitude_km == 3));
}
