//! Resilience tests: failed commits, stale batches, corrupted trip files.

use odometer_continuity::continuity;
use odometer_continuity::{
    CorrectionOrchestrator, EngineConfig, FileTripStore, MemoryTripStore, OdometerError, Trip,
    TripBatch, TripBuilder, TripStore, TripUpdate, VehicleId,
};

fn vid() -> VehicleId {
    VehicleId::new("resilient-van")
}

fn chain() -> Vec<Trip> {
    (0..4u64)
        .map(|i| {
            TripBuilder::new(vid(), i * 100, i * 50, i * 50 + 50)
                .created_at(i)
                .build()
                .unwrap()
        })
        .collect()
}

#[test]
fn resilience_failed_commit_leaves_store_unchanged() {
    let trips = chain();
    let store = MemoryTripStore::with_trips(trips.clone()).unwrap();
    let result = continuity::preview(&trips, &trips[0].id, 70).unwrap();

    store.fail_next_commit();
    let err = continuity::apply(&store, &trips, &result).unwrap_err();
    assert!(matches!(err, OdometerError::TransactionFailure(_)));
    assert_eq!(store.fetch_trips_for_vehicle(&vid()).unwrap(), trips);

    // A retry with the same preview succeeds.
    continuity::apply(&store, &trips, &result).unwrap();
    let stored = store.fetch_trips_for_vehicle(&vid()).unwrap();
    assert_eq!(stored[3].end_km, 220);
}

#[test]
fn resilience_orchestrator_surfaces_transaction_failure() {
    let trips = chain();
    let orch = CorrectionOrchestrator::new(
        MemoryTripStore::with_trips(trips.clone()).unwrap(),
        EngineConfig::default(),
    );

    orch.store().fail_next_commit();
    let err = orch
        .edit_trip(&vid(), &trips[1].id, 90, |_| true)
        .unwrap_err();
    assert!(matches!(err, OdometerError::TransactionFailure(_)));
    assert_eq!(orch.store().fetch_trips_for_vehicle(&vid()).unwrap(), trips);
}

#[test]
fn resilience_batch_with_wrong_expected_readings_is_rejected() {
    let trips = chain();
    let store = MemoryTripStore::with_trips(trips.clone()).unwrap();

    let batch = TripBatch {
        vehicle_id: vid(),
        expected_fingerprint: None,
        updates: vec![
            TripUpdate {
                trip_id: trips[0].id.clone(),
                expected_start_km: 0,
                expected_end_km: 50,
                start_km: 0,
                end_km: 60,
            },
            TripUpdate {
                trip_id: trips[1].id.clone(),
                expected_start_km: 999,
                expected_end_km: 100,
                start_km: 60,
                end_km: 110,
            },
        ],
    };
    let err = store.commit_trip_updates(&batch).unwrap_err();
    assert!(matches!(err, OdometerError::StaleSequence { .. }));
    assert_eq!(store.fetch_trips_for_vehicle(&vid()).unwrap(), trips);
}

#[test]
fn resilience_file_store_stale_fingerprint_keeps_file() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileTripStore::new(tmp.path()).unwrap();
    let trips = chain();
    for t in &trips {
        store.insert_trip(t.clone()).unwrap();
    }
    let path = store.vehicle_path(&vid());
    let before = std::fs::read(&path).unwrap();

    let batch = TripBatch {
        vehicle_id: vid(),
        expected_fingerprint: Some("not-a-fingerprint".into()),
        updates: vec![],
    };
    assert!(matches!(
        store.commit_trip_updates(&batch),
        Err(OdometerError::StaleSequence { .. })
    ));
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn resilience_corrupted_trip_file_detected() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileTripStore::new(tmp.path()).unwrap();
    for t in chain() {
        store.insert_trip(t).unwrap();
    }

    let path = store.vehicle_path(&vid());
    {
        let mut data = std::fs::read(&path).unwrap();
        for item in data.iter_mut().take(50).skip(10) {
            *item ^= 0xFF;
        }
        std::fs::write(&path, data).unwrap();
    }

    let result = store.fetch_trips_for_vehicle(&vid());
    assert!(matches!(result, Err(OdometerError::InvalidFileFormat(_))));
}

#[test]
fn resilience_truncated_trip_file_detected() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileTripStore::new(tmp.path()).unwrap();
    for t in chain() {
        store.insert_trip(t).unwrap();
    }

    let path = store.vehicle_path(&vid());
    {
        let data = std::fs::read(&path).unwrap();
        let half = data.len() / 2;
        std::fs::write(&path, &data[..half]).unwrap();
    }

    assert!(store.fetch_trips_for_vehicle(&vid()).is_err());
    assert!(store.list_vehicles().is_err());
}

#[test]
fn resilience_unsupported_version_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileTripStore::new(tmp.path()).unwrap();
    std::fs::write(
        store.vehicle_path(&vid()),
        r#"{ "version": 99, "vehicle_id": "resilient-van", "trips": [] }"#,
    )
    .unwrap();

    assert!(matches!(
        store.fetch_trips_for_vehicle(&vid()),
        Err(OdometerError::InvalidFileFormat(_))
    ));
}

#[test]
fn resilience_empty_trip_file_detected() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileTripStore::new(tmp.path()).unwrap();
    std::fs::write(store.vehicle_path(&vid()), b"").unwrap();

    assert!(store.fetch_trips_for_vehicle(&vid()).is_err());
}

#[test]
fn resilience_duplicate_insert_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileTripStore::new(tmp.path()).unwrap();
    let trip = chain().remove(0);
    store.insert_trip(trip.clone()).unwrap();
    assert!(store.insert_trip(trip).is_err());
    assert_eq!(store.fetch_trips_for_vehicle(&vid()).unwrap().len(), 1);
}
