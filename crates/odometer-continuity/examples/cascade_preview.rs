//! Cascade Preview: record a week of trips, fix a mistyped reading,
//! and review the anomaly flags that result.
//!
//! Run with:
//!   cargo run --example cascade_preview -p odometer-continuity

use odometer_continuity::{
    CorrectionOrchestrator, EngineConfig, MemoryTripStore, TripBuilder, VehicleId,
};

const HOUR: u64 = 3_600_000_000;

fn main() {
    let van = VehicleId::new("KA-01-1234");
    let orch = CorrectionOrchestrator::new(MemoryTripStore::new(), EngineConfig::default());

    // ── 1. Record a chained week of trips ───────────────────────────────────
    //
    // Each trip starts where the previous one ended. The fourth was entered
    // by hand from the dashboard and is marked as a manual checkpoint.
    let legs = [(120, 10.0), (95, 8.0), (140, 12.0), (80, 7.0), (110, 9.5)];
    let mut km = 48_200;
    let mut ids = Vec::new();
    for (i, (distance, fuel)) in legs.iter().enumerate() {
        let trip = TripBuilder::new(van.clone(), i as u64 * 24 * HOUR, km, km + distance)
            .fuel(*fuel)
            .manual_override(i == 3)
            .build()
            .expect("valid trip");
        km += distance;
        ids.push(trip.id.clone());

        let evaluation = orch.record_trip(trip).expect("record trip");
        println!(
            "Recorded {} ({} flags)",
            evaluation.trip_id,
            evaluation.flags.len()
        );
    }
    println!();

    // ── 2. Preview a correction ─────────────────────────────────────────────
    //
    // The second trip's end reading was mistyped as 48_415 instead of 48_515.
    // Raising it by 100 km shifts the third trip; the cascade stops at the
    // manual checkpoint.
    let preview = orch
        .preview_edit(&van, &ids[1], 48_515)
        .expect("preview edit");
    println!("Preview: delta {:+} km", preview.delta_km);
    for row in &preview.rows {
        println!(
            "  {}  {} → {}  ..  {} → {}",
            row.trip_id, row.current_start_km, row.new_start_km, row.current_end_km, row.new_end_km
        );
    }
    if let Some(stop) = &preview.stopped_at {
        println!("  stopped at manual trip {stop}");
    }
    println!();

    // ── 3. Apply and review ─────────────────────────────────────────────────
    let outcome = orch.apply_correction(&preview).expect("apply correction");
    println!("Applied: {} trips updated", outcome.rows_written());
    for evaluation in &outcome.evaluations {
        for flag in &evaluation.flags {
            println!(
                "  {} {} ({:?}): {}",
                evaluation.trip_id,
                flag.kind.as_tag(),
                flag.severity,
                flag.reason
            );
        }
    }

    // ── 4. Audit continuity ─────────────────────────────────────────────────
    //
    // The manual checkpoint now overlaps its corrected predecessor; the
    // audit reports it without counting it as a break.
    let report = orch.continuity_report(&van).expect("continuity report");
    println!();
    println!("Continuity: {:?}", report.result);
    for b in &report.breaks {
        println!(
            "  {:?} {:?} of {} km before {} (manual: {})",
            b.severity, b.kind, b.magnitude_km, b.trip_id, b.at_manual_boundary
        );
    }
}
