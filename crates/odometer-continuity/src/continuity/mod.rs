//! Odometer continuity: cascading corrections and continuity audits.
//!
//! The continuity module provides:
//! - Cascade planning and preview when one trip's end reading is edited
//! - Manual-override circuit breaking during propagation
//! - Atomic, idempotent application of a previewed cascade through a store
//! - Re-linking of trips left unanchored by an external deletion
//! - Break detection (gaps and overlaps) and continuity reports

pub mod engine;
pub mod types;

pub use types::{
    ApplyOutcome, BreakKind, BreakSeverity, CascadeKind, CascadeResult, CascadeRow, CascadeStatus,
    ContinuityBreak, ContinuityReport, ContinuityResult,
};

pub use engine::{
    apply, continuity_break, detect_breaks, plan_cascade, preview, preview_sequence, relink,
    verify_continuity,
};
