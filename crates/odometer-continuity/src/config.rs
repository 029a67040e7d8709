//! Engine configuration.
//!
//! Loaded from a JSON file; every field is optional and falls back to its
//! default:
//!
//! ```json
//! {
//!     "anomaly": {
//!         "max_distance_km": 1000,
//!         "max_fuel_volume": 200.0,
//!         "high_efficiency_pct": 130.0,
//!         "poor_efficiency_pct": 40.0
//!     },
//!     "baseline": { "window": 10, "min_samples": 3 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::anomaly::{AnomalyBounds, BaselineConfig};
use crate::error::{OdometerError, Result};

/// Tunable settings for anomaly detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub anomaly: AnomalyBounds,
    pub baseline: BaselineConfig,
}

impl EngineConfig {
    /// Load and validate a config file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `InvalidFileFormat` if it is not
    /// valid JSON, `InvalidConfig` if a value is out of range.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|e| {
            OdometerError::InvalidFileFormat(format!(
                "failed to parse config {}: {e}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject bounds that would make every trip (or none) anomalous.
    pub fn validate(&self) -> Result<()> {
        let a = &self.anomaly;
        if a.max_distance_km == 0 {
            return Err(OdometerError::InvalidConfig(
                "anomaly.max_distance_km must be positive".into(),
            ));
        }
        if !(a.max_fuel_volume.is_finite() && a.max_fuel_volume > 0.0) {
            return Err(OdometerError::InvalidConfig(
                "anomaly.max_fuel_volume must be a positive number".into(),
            ));
        }
        if !(a.poor_efficiency_pct.is_finite() && a.poor_efficiency_pct > 0.0) {
            return Err(OdometerError::InvalidConfig(
                "anomaly.poor_efficiency_pct must be a positive number".into(),
            ));
        }
        if !a.high_efficiency_pct.is_finite() || a.poor_efficiency_pct >= a.high_efficiency_pct {
            return Err(OdometerError::InvalidConfig(format!(
                "anomaly.poor_efficiency_pct ({}) must be below high_efficiency_pct ({})",
                a.poor_efficiency_pct, a.high_efficiency_pct
            )));
        }
        if self.baseline.window == 0 {
            return Err(OdometerError::InvalidConfig(
                "baseline.window must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
