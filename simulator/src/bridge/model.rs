use chrono::{DateTime, Utc};
use potholecore::detection::{DetectionRecord, Severity};
use potholecore::pipeline::maps_link;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct LocationView {
    pub latitude: f64,
    pub longitude: f64,
    pub severity: Severity,
    pub depth_estimate: f64,
    pub captured_at: DateTime<Utc>,
    pub frame_reference: String,
    pub maps_url: String,
}

impl From<&DetectionRecord> for LocationView {
    fn from(record: &DetectionRecord) -> Self {
        Self {
            latitude: record.latitude(),
            longitude: record.longitude(),
            severity: record.severity(),
            depth_estimate: record.depth_estimate(),
            captured_at: record.captured_at(),
            frame_reference: record.frame_reference().to_string(),
            maps_url: format!(
                "https://www.google.com/maps?q={:.6},{:.6}",
                record.latitude(),
                record.longitude()
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationsResponse {
    pub count: usize,
    pub locations: Vec<LocationView>,
    pub route_url: Option<String>,
}

impl LocationsResponse {
    pub fn from_records(records: &[DetectionRecord]) -> Self {
        Self {
            count: records.len(),
            locations: records.iter().map(LocationView::from).collect(),
            route_url: maps_link(records),
        }
    }
}
