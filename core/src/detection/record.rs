use crate::detection::{Coordinate, Severity};
use crate::prelude::CoreResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to the video frame a detection came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameRef(String);

impl FrameRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One detection handed over by the capture/inference stage.
#[derive(Debug, Clone)]
pub struct DetectionCandidate {
    pub coordinate: Coordinate,
    pub depth_estimate: f64,
    pub captured_at: DateTime<Utc>,
    pub frame_reference: FrameRef,
}

impl DetectionCandidate {
    pub fn new(
        coordinate: Coordinate,
        depth_estimate: f64,
        captured_at: DateTime<Utc>,
        frame_reference: FrameRef,
    ) -> Self {
        Self {
            coordinate,
            depth_estimate,
            captured_at,
            frame_reference,
        }
    }
}

/// Accepted detection. Immutable once built; fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    latitude: f64,
    longitude: f64,
    depth_estimate: f64,
    severity: Severity,
    captured_at: DateTime<Utc>,
    frame_reference: FrameRef,
}

impl DetectionRecord {
    pub fn new(
        coordinate: Coordinate,
        depth_estimate: f64,
        severity: Severity,
        captured_at: DateTime<Utc>,
        frame_reference: FrameRef,
    ) -> Self {
        Self {
            latitude: coordinate.latitude(),
            longitude: coordinate.longitude(),
            depth_estimate,
            severity,
            captured_at,
            frame_reference,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Re-validates the stored position; records read back from disk may be malformed.
    pub fn coordinate(&self) -> CoreResult<Coordinate> {
        Coordinate::new(self.latitude, self.longitude)
    }

    pub fn depth_estimate(&self) -> f64 {
        self.depth_estimate
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn frame_reference(&self) -> &FrameRef {
        &self.frame_reference
    }
}
