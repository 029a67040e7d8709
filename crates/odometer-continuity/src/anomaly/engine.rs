//! Anomaly detection: plausibility bounds and efficiency baselines.
//!
//! Evaluation is advisory and never fails. Missing or malformed optional
//! fields suppress the checks that depend on them.

use log::debug;

use crate::config::EngineConfig;
use crate::trip::{Trip, TripSequence};

use super::types::*;

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Classify one trip against `context`.
///
/// Flags are independent; a trip may carry several. The result is
/// deterministic and ordered: distance, fuel volume, efficiency.
pub fn evaluate(trip: &Trip, context: &EvaluationContext) -> Vec<AnomalyFlag> {
    let bounds = &context.bounds;
    let mut flags = Vec::new();

    if trip.readings_valid() {
        let distance = trip.distance_km();
        if distance > bounds.max_distance_km {
            flags.push(AnomalyFlag {
                kind: AnomalyKind::ExcessiveDistance,
                severity: beyond_bound(distance as f64, bounds.max_distance_km as f64),
                reason: format!("distance_km={} max={}", distance, bounds.max_distance_km),
            });
        }
    }

    if let Some(fuel) = trip.usable_fuel() {
        if fuel > bounds.max_fuel_volume {
            flags.push(AnomalyFlag {
                kind: AnomalyKind::ExcessiveFuelVolume,
                severity: beyond_bound(fuel, bounds.max_fuel_volume),
                reason: format!("fuel_quantity={} max={}", fuel, bounds.max_fuel_volume),
            });
        }
    }

    if let Some(flag) = efficiency_flag(trip, context) {
        flags.push(flag);
    }

    flags
}

/// Evaluate a trip and package the result.
pub fn evaluate_trip(trip: &Trip, context: &EvaluationContext) -> TripEvaluation {
    TripEvaluation {
        trip_id: trip.id.clone(),
        efficiency: trip.efficiency(),
        baseline_efficiency: context.average_efficiency,
        flags: evaluate(trip, context),
    }
}

fn efficiency_flag(trip: &Trip, context: &EvaluationContext) -> Option<AnomalyFlag> {
    if !trip.readings_valid() {
        return None;
    }
    let efficiency = trip.efficiency()?;
    let average = context
        .average_efficiency
        .filter(|a| a.is_finite() && *a > 0.0)?;
    let pct = efficiency / average * 100.0;
    let bounds = &context.bounds;

    let (kind, severity) = if pct >= bounds.high_efficiency_pct {
        let severity = if pct >= 200.0 {
            AnomalySeverity::Critical
        } else {
            AnomalySeverity::Warning
        };
        (AnomalyKind::SuspiciouslyHighEfficiency, severity)
    } else if pct <= bounds.poor_efficiency_pct {
        let severity = if pct <= 20.0 {
            AnomalySeverity::Critical
        } else {
            AnomalySeverity::Warning
        };
        (AnomalyKind::PoorEfficiency, severity)
    } else {
        return None;
    };

    Some(AnomalyFlag {
        kind,
        severity,
        reason: format!(
            "efficiency={:.2} average={:.2} pct={:.1}",
            efficiency, average, pct
        ),
    })
}

/// Critical beyond twice the bound, warning otherwise.
fn beyond_bound(value: f64, bound: f64) -> AnomalySeverity {
    if value > bound * 2.0 {
        AnomalySeverity::Critical
    } else {
        AnomalySeverity::Warning
    }
}

// ---------------------------------------------------------------------------
// Baselines
// ---------------------------------------------------------------------------

impl EfficiencyBaseline {
    /// Mean efficiency of the last `window` trips in `trips` that have one.
    pub fn rolling(trips: &[Trip], window: usize) -> Self {
        let recent: Vec<f64> = trips
            .iter()
            .rev()
            .filter(|t| t.readings_valid())
            .filter_map(Trip::efficiency)
            .take(window)
            .collect();
        Self::from_samples(&recent)
    }

    fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        Self {
            average: Some(samples.iter().sum::<f64>() / samples.len() as f64),
            samples: samples.len(),
        }
    }
}

impl FleetBaseline {
    /// Mean efficiency across every trip of every vehicle.
    pub fn from_sequences<'a>(sequences: impl IntoIterator<Item = &'a TripSequence>) -> Self {
        let samples: Vec<f64> = sequences
            .into_iter()
            .flat_map(|s| s.trips().iter())
            .filter(|t| t.readings_valid())
            .filter_map(Trip::efficiency)
            .collect();
        Self(EfficiencyBaseline::from_samples(&samples))
    }
}

impl EvaluationContext {
    /// Context for the trip at `index`, baselined on the trips before it.
    ///
    /// Falls back to the fleet average when the vehicle has fewer than
    /// `min_samples` prior efficiency samples.
    pub fn for_trip(
        sequence: &TripSequence,
        index: usize,
        fleet: &FleetBaseline,
        config: &EngineConfig,
    ) -> Self {
        let prior = &sequence.trips()[..index.min(sequence.len())];
        let vehicle = EfficiencyBaseline::rolling(prior, config.baseline.window);

        let (average_efficiency, baseline_source) = match vehicle.average {
            Some(avg) if vehicle.samples >= config.baseline.min_samples => {
                (Some(avg), BaselineSource::Vehicle)
            }
            _ => match fleet.0.average {
                Some(avg) => (Some(avg), BaselineSource::Fleet),
                None => (None, BaselineSource::Unavailable),
            },
        };

        Self {
            average_efficiency,
            baseline_source,
            bounds: config.anomaly.clone(),
        }
    }
}

/// Evaluate every trip of a vehicle in sequence order.
pub fn evaluate_sequence(
    sequence: &TripSequence,
    fleet: &FleetBaseline,
    config: &EngineConfig,
) -> Vec<TripEvaluation> {
    let evaluations: Vec<TripEvaluation> = sequence
        .trips()
        .iter()
        .enumerate()
        .map(|(i, trip)| {
            let context = EvaluationContext::for_trip(sequence, i, fleet, config);
            evaluate_trip(trip, &context)
        })
        .collect();

    debug!(
        "evaluated {} trips for vehicle {}: {} flagged",
        evaluations.len(),
        sequence.vehicle_id(),
        evaluations.iter().filter(|e| !e.is_clean()).count()
    );

    evaluations
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
