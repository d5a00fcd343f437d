use crate::detection::{DetectionRecord, Severity};
use crate::math::StatsHelper;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

const MAPS_DIRECTIONS_URL: &str = "https://www.google.com/maps/dir/?api=1";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub recent_24h: usize,
    pub mean_depth: f64,
}

pub fn summarize(records: &[DetectionRecord], now: DateTime<Utc>) -> Statistics {
    let mut by_severity: BTreeMap<Severity, usize> =
        Severity::ALL.into_iter().map(|severity| (severity, 0)).collect();
    for record in records {
        *by_severity.entry(record.severity()).or_default() += 1;
    }

    let since = now - Duration::hours(24);
    let recent_24h = records
        .iter()
        .filter(|record| record.captured_at() > since)
        .count();
    let depths: Vec<f64> = records.iter().map(DetectionRecord::depth_estimate).collect();

    Statistics {
        total: records.len(),
        by_severity,
        recent_24h,
        mean_depth: StatsHelper::mean(&depths),
    }
}

/// Newest first. With a severity filter the band's deepest potholes come first.
pub fn select_locations(
    records: &[DetectionRecord],
    severity: Option<Severity>,
    limit: usize,
) -> Vec<DetectionRecord> {
    let mut selected: Vec<DetectionRecord> = records
        .iter()
        .filter(|record| severity.map_or(true, |wanted| record.severity() == wanted))
        .cloned()
        .collect();
    match severity {
        Some(_) => selected.sort_by(|a, b| b.depth_estimate().total_cmp(&a.depth_estimate())),
        None => selected.sort_by(|a, b| b.captured_at().cmp(&a.captured_at())),
    }
    selected.truncate(limit);
    selected
}

/// Directions link with the first record as destination and the rest as waypoints.
pub fn maps_link(records: &[DetectionRecord]) -> Option<String> {
    let (first, rest) = records.split_first()?;
    let point = |record: &DetectionRecord| {
        format!("{:.6},{:.6}", record.latitude(), record.longitude())
    };

    let mut url = format!(
        "{}&destination={}",
        MAPS_DIRECTIONS_URL,
        urlencoding::encode(&point(first))
    );
    if !rest.is_empty() {
        let waypoints = rest.iter().map(point).collect::<Vec<_>>().join("|");
        url.push_str("&waypoints=");
        url.push_str(&urlencoding::encode(&waypoints));
    }
    Some(url)
}
