use anyhow::{ensure, Context};
use chrono::{DateTime, Duration, Utc};
use potholecore::detection::{Coordinate, DetectionCandidate, FrameRef};
use potholecore::math::GeodesyHelper;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Half-width, in degrees, of the GPS noise added when the drive passes an
/// already detected pothole again (well under a meter).
const REVISIT_JITTER_DEG: f64 = 0.000005;

/// Configuration for a simulated survey drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub points: usize,
    pub base_latitude: f64,
    pub base_longitude: f64,
    pub heading_deg: f64,
    pub heading_drift_deg: f64,
    pub speed_mps: f64,
    pub interval_s: f64,
    /// Chance that a point re-detects an earlier pothole instead of advancing.
    pub revisit_probability: f64,
    pub max_depth_m: f64,
    pub seed: u64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            points: 200,
            base_latitude: 44.8125,
            base_longitude: 20.4612,
            heading_deg: 45.0,
            heading_drift_deg: 10.0,
            speed_mps: 8.3,
            interval_s: 1.0,
            revisit_probability: 0.15,
            max_depth_m: 0.4,
            seed: 0,
        }
    }
}

impl RouteConfig {
    fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.speed_mps.is_finite() && self.speed_mps >= 0.0,
            "route speed must be a non-negative number of m/s"
        );
        ensure!(
            self.interval_s.is_finite() && self.interval_s > 0.0,
            "route interval must be positive"
        );
        ensure!(
            self.heading_drift_deg.is_finite() && self.heading_drift_deg >= 0.0,
            "heading drift must be non-negative"
        );
        ensure!(
            (0.0..=1.0).contains(&self.revisit_probability),
            "revisit probability must lie in [0, 1]"
        );
        ensure!(
            self.max_depth_m.is_finite() && self.max_depth_m > 0.0,
            "maximum depth must be positive"
        );
        Ok(())
    }
}

/// Drives from the base coordinate with a slowly drifting heading, emitting
/// one candidate per GPS fix with a synthetic depth.
pub fn build_route_candidates(
    config: &RouteConfig,
    start: DateTime<Utc>,
) -> anyhow::Result<Vec<DetectionCandidate>> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut candidates = Vec::with_capacity(config.points);
    let mut fresh: Vec<(f64, f64)> = Vec::new();
    let (mut lat, mut lon) = (config.base_latitude, config.base_longitude);
    let mut heading = config.heading_deg;
    let step_m = config.speed_mps * config.interval_s;
    let drift = config.heading_drift_deg;

    for index in 0..config.points {
        let (point_lat, point_lon) = if !fresh.is_empty() && rng.gen_bool(config.revisit_probability)
        {
            let (seen_lat, seen_lon) = fresh[rng.gen_range(0..fresh.len())];
            (
                seen_lat + rng.gen_range(-REVISIT_JITTER_DEG..REVISIT_JITTER_DEG),
                seen_lon + rng.gen_range(-REVISIT_JITTER_DEG..REVISIT_JITTER_DEG),
            )
        } else {
            if index > 0 {
                heading = (heading + rng.gen_range(-drift..=drift)).rem_euclid(360.0);
                (lat, lon) = GeodesyHelper::destination(lat, lon, heading, step_m);
            }
            fresh.push((lat, lon));
            (lat, lon)
        };

        let coordinate = Coordinate::new(point_lat, point_lon)
            .with_context(|| format!("route point {index} left the valid coordinate range"))?;
        let offset_ms = (index as f64 * config.interval_s * 1000.0).round() as i64;
        candidates.push(DetectionCandidate::new(
            coordinate,
            rng.gen_range(0.0..config.max_depth_m),
            start + Duration::milliseconds(offset_ms),
            FrameRef::new(format!("frame-{index:06}")),
        ));
    }

    Ok(candidates)
}
