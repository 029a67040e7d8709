//! Odometer continuity: cascading odometer corrections and trip anomaly
//! detection for vehicle fleets.
//!
//! Provides per-vehicle trip sequencing, previewable cascade corrections
//! with a manual-override circuit breaker, atomic and idempotent apply
//! through a pluggable store, continuity audits, and advisory plausibility
//! flags for distance, fuel volume, and fuel efficiency.

pub mod anomaly;
pub mod config;
pub mod continuity;
pub mod error;
pub mod orchestrator;
pub mod storage;
pub mod time;
pub mod trip;

// Re-export primary types
pub use config::EngineConfig;
pub use error::{OdometerError, Result};
pub use orchestrator::{CorrectionOrchestrator, CorrectionOutcome};
pub use storage::{FileTripStore, MemoryTripStore, TripBatch, TripStore, TripUpdate};
pub use trip::{SequenceKey, Trip, TripBuilder, TripId, TripSequence, VehicleId};

// Re-export continuity types
pub use continuity::{
    ApplyOutcome, BreakKind, BreakSeverity, CascadeKind, CascadeResult, CascadeRow, CascadeStatus,
    ContinuityBreak, ContinuityReport, ContinuityResult,
};

// Re-export anomaly types
pub use anomaly::{
    AnomalyBounds, AnomalyFlag, AnomalyKind, AnomalySeverity, BaselineConfig, BaselineSource,
    EfficiencyBaseline, EvaluationContext, FleetBaseline, TripEvaluation,
};
