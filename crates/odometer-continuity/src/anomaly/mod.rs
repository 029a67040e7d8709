//! Trip anomaly detection: plausibility flags for distance, fuel, and efficiency.
//!
//! The anomaly module provides:
//! - Per-trip evaluation against configurable bounds
//! - Efficiency classification relative to a rolling vehicle baseline
//! - Fleet baseline fallback for vehicles with little history

pub mod engine;
pub mod types;

pub use types::{
    AnomalyBounds, AnomalyFlag, AnomalyKind, AnomalySeverity, BaselineConfig, BaselineSource,
    EfficiencyBaseline, EvaluationContext, FleetBaseline, TripEvaluation,
};

pub use engine::{evaluate, evaluate_sequence, evaluate_trip};
