//! Data structures for trip plausibility checks.

use serde::{Deserialize, Serialize};

use crate::trip::TripId;

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

/// Kind of implausibility detected on a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyKind {
    ExcessiveDistance,
    ExcessiveFuelVolume,
    SuspiciouslyHighEfficiency,
    PoorEfficiency,
}

impl AnomalyKind {
    /// Return a stable string tag.
    pub fn as_tag(&self) -> &str {
        match self {
            Self::ExcessiveDistance => "excessive_distance",
            Self::ExcessiveFuelVolume => "excessive_fuel_volume",
            Self::SuspiciouslyHighEfficiency => "suspiciously_high_efficiency",
            Self::PoorEfficiency => "poor_efficiency",
        }
    }
}

/// How urgently a flag should be reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnomalySeverity {
    Warning,
    Critical,
}

/// One advisory classification attached to a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFlag {
    pub kind: AnomalyKind,
    pub severity: AnomalySeverity,
    /// Machine-readable `key=value` pairs describing the trigger.
    pub reason: String,
}

/// Flags raised for one trip, with the numbers they were derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripEvaluation {
    pub trip_id: TripId,
    pub efficiency: Option<f64>,
    pub baseline_efficiency: Option<f64>,
    pub flags: Vec<AnomalyFlag>,
}

impl TripEvaluation {
    pub fn is_clean(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn has(&self, kind: AnomalyKind) -> bool {
        self.flags.iter().any(|f| f.kind == kind)
    }
}

// ---------------------------------------------------------------------------
// Bounds and baselines
// ---------------------------------------------------------------------------

/// Plausibility bounds for a single trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyBounds {
    /// Longest plausible single trip.
    pub max_distance_km: u64,
    /// Largest plausible refuel.
    pub max_fuel_volume: f64,
    /// Efficiency at or above this percentage of the baseline is suspicious.
    pub high_efficiency_pct: f64,
    /// Efficiency at or below this percentage of the baseline is poor.
    pub poor_efficiency_pct: f64,
}

impl Default for AnomalyBounds {
    fn default() -> Self {
        Self {
            max_distance_km: 1000,
            max_fuel_volume: 200.0,
            high_efficiency_pct: 130.0,
            poor_efficiency_pct: 40.0,
        }
    }
}

/// How a vehicle's efficiency baseline is computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Number of most recent refuelling trips in the rolling average.
    pub window: usize,
    /// Below this many samples the fleet average is used instead.
    pub min_samples: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window: 10,
            min_samples: 3,
        }
    }
}

/// Where an evaluation's baseline efficiency came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaselineSource {
    Vehicle,
    Fleet,
    Unavailable,
}

/// Mean efficiency over a set of trips.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EfficiencyBaseline {
    pub average: Option<f64>,
    pub samples: usize,
}

/// Fleet-wide efficiency baseline, used when a vehicle has too little history.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FleetBaseline(pub EfficiencyBaseline);

/// Everything `evaluate` needs besides the trip itself.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationContext {
    /// Rolling average efficiency (km per fuel unit) to compare against.
    pub average_efficiency: Option<f64>,
    pub baseline_source: BaselineSource,
    pub bounds: AnomalyBounds,
}

impl EvaluationContext {
    /// Context with no efficiency baseline.
    pub fn new(bounds: AnomalyBounds) -> Self {
        Self {
            average_efficiency: None,
            baseline_source: BaselineSource::Unavailable,
            bounds,
        }
    }

    /// Use `average` as the vehicle baseline.
    pub fn with_average(mut self, average: f64) -> Self {
        self.average_efficiency = Some(average);
        self.baseline_source = BaselineSource::Vehicle;
        self
    }
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new(AnomalyBounds::default())
    }
}
