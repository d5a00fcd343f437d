use crate::prelude::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordinal severity band derived from estimated pothole depth.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Severity::ALL
            .into_iter()
            .find(|severity| severity.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CoreError::InvalidInput(format!("unknown severity '{s}'")))
    }
}

/// One row of the threshold table: depths at or above `lower_bound` map to `severity`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityBand {
    pub lower_bound: f64,
    pub severity: Severity,
}

impl SeverityBand {
    pub fn new(lower_bound: f64, severity: Severity) -> Self {
        Self {
            lower_bound,
            severity,
        }
    }
}

/// Step function over an ordered, validated threshold table.
#[derive(Debug, Clone, PartialEq)]
pub struct SeverityThresholds {
    bands: Vec<SeverityBand>,
}

impl SeverityThresholds {
    /// Bounds must be finite and strictly increasing and severities must not
    /// decrease, so classification stays monotonic in depth.
    pub fn new(bands: Vec<SeverityBand>) -> CoreResult<Self> {
        if bands.is_empty() {
            return Err(CoreError::InvalidInput(
                "severity threshold table is empty".into(),
            ));
        }
        if let Some(band) = bands.iter().find(|band| !band.lower_bound.is_finite()) {
            return Err(CoreError::InvalidInput(format!(
                "severity bound {} for {} is not finite",
                band.lower_bound, band.severity
            )));
        }
        for pair in bands.windows(2) {
            if pair[1].lower_bound <= pair[0].lower_bound {
                return Err(CoreError::InvalidInput(format!(
                    "severity bounds must increase: {} then {}",
                    pair[0].lower_bound, pair[1].lower_bound
                )));
            }
            if pair[1].severity < pair[0].severity {
                return Err(CoreError::InvalidInput(format!(
                    "severity {} listed above {}",
                    pair[0].severity, pair[1].severity
                )));
            }
        }
        Ok(Self { bands })
    }

    /// Depth bands in meters.
    pub fn default_bands() -> Vec<SeverityBand> {
        vec![
            SeverityBand::new(0.0, Severity::Low),
            SeverityBand::new(0.05, Severity::Medium),
            SeverityBand::new(0.15, Severity::High),
            SeverityBand::new(0.30, Severity::Critical),
        ]
    }

    pub fn bands(&self) -> &[SeverityBand] {
        &self.bands
    }

    /// Lower bounds are inclusive; depths under the first bound fall into the first band.
    pub fn classify(&self, depth_estimate: f64) -> CoreResult<Severity> {
        if !depth_estimate.is_finite() {
            return Err(CoreError::InvalidInput(format!(
                "depth estimate {depth_estimate} is not finite"
            )));
        }
        let above = self
            .bands
            .partition_point(|band| band.lower_bound <= depth_estimate);
        Ok(self.bands[above.saturating_sub(1)].severity)
    }
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            bands: Self::default_bands(),
        }
    }
}
