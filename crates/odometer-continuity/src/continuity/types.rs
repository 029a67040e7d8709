//! Data structures for odometer cascades and continuity audits.

use serde::{Deserialize, Serialize};

use crate::trip::{TripId, VehicleId};

// ---------------------------------------------------------------------------
// Cascade
// ---------------------------------------------------------------------------

/// One trip's readings before and after a cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeRow {
    pub trip_id: TripId,
    pub current_start_km: u64,
    pub new_start_km: u64,
    pub current_end_km: u64,
    pub new_end_km: u64,
}

impl CascadeRow {
    /// Whether applying this row changes anything.
    pub fn is_change(&self) -> bool {
        self.current_start_km != self.new_start_km || self.current_end_km != self.new_end_km
    }

    pub fn current_distance_km(&self) -> u64 {
        self.current_end_km.saturating_sub(self.current_start_km)
    }

    pub fn new_distance_km(&self) -> u64 {
        self.new_end_km.saturating_sub(self.new_start_km)
    }
}

/// What triggered a cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CascadeKind {
    /// A user changed one trip's end reading.
    Edit,
    /// An unanchored trip is moved back onto its predecessor's end reading.
    Relink,
}

impl CascadeKind {
    /// Return a stable string tag.
    pub fn as_tag(&self) -> &str {
        match self {
            Self::Edit => "edit",
            Self::Relink => "relink",
        }
    }
}

/// Overall status of a cascade plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CascadeStatus {
    Ok,
    /// Shifting `trip_id` would drive its start reading below zero.
    OutOfRange {
        trip_id: TripId,
        shifted_start_km: i64,
    },
}

/// Result of computing a cascade for one vehicle.
///
/// `rows[0]` is always the edited (or relinked) trip. Later rows are the
/// shifted downstream trips in sequence order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeResult {
    pub vehicle_id: VehicleId,
    pub kind: CascadeKind,
    pub edited_trip_id: TripId,
    /// Signed shift applied to every downstream row.
    pub delta_km: i64,
    pub rows: Vec<CascadeRow>,
    pub status: CascadeStatus,
    /// First manual-override trip that stopped propagation, if any.
    pub stopped_at: Option<TripId>,
    /// Fingerprint of the sequence the cascade was computed from.
    pub sequence_fingerprint: String,
}

impl CascadeResult {
    pub fn is_ok(&self) -> bool {
        self.status == CascadeStatus::Ok
    }

    /// Number of trips after the edited one that would be shifted.
    pub fn downstream_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    /// Rows whose readings would actually change.
    pub fn changed_rows(&self) -> impl Iterator<Item = &CascadeRow> {
        self.rows.iter().filter(|r| r.is_change())
    }

    pub fn row(&self, trip_id: &TripId) -> Option<&CascadeRow> {
        self.rows.iter().find(|r| &r.trip_id == trip_id)
    }
}

/// Outcome of applying a cascade through a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The batch was committed; lists the trips whose readings changed.
    Applied { updated: Vec<TripId> },
    /// Every row already held its new readings.
    AlreadyApplied,
}

impl ApplyOutcome {
    pub fn updated(&self) -> &[TripId] {
        match self {
            Self::Applied { updated } => updated,
            Self::AlreadyApplied => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Continuity audit
// ---------------------------------------------------------------------------

/// Direction of a continuity break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakKind {
    /// The next trip starts beyond the previous end (kilometres unaccounted).
    Gap,
    /// The next trip starts before the previous end (kilometres counted twice).
    Overlap,
}

/// Severity of a continuity break, by magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BreakSeverity {
    Minor,
    Moderate,
    Major,
    Critical,
}

impl BreakSeverity {
    pub fn for_magnitude(km: u64) -> Self {
        match km {
            0..=1 => Self::Minor,
            2..=50 => Self::Moderate,
            51..=500 => Self::Major,
            _ => Self::Critical,
        }
    }
}

/// A place where a trip's start does not match its predecessor's end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuityBreak {
    pub previous_trip_id: TripId,
    pub trip_id: TripId,
    pub expected_start_km: u64,
    pub actual_start_km: u64,
    pub kind: BreakKind,
    pub magnitude_km: u64,
    pub severity: BreakSeverity,
    /// The later trip is a manual override and anchors its own readings.
    pub at_manual_boundary: bool,
}

/// Summary of a vehicle's continuity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuityReport {
    pub vehicle_id: VehicleId,
    pub trip_count: usize,
    pub total_distance_km: u64,
    pub breaks: Vec<ContinuityBreak>,
    pub result: ContinuityResult,
}

impl ContinuityReport {
    pub fn is_continuous(&self) -> bool {
        self.result == ContinuityResult::Continuous
    }
}

/// Overall continuity result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContinuityResult {
    Continuous,
    Broken {
        break_count: usize,
        max_break_km: u64,
    },
}
