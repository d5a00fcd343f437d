use crate::detection::{Coordinate, DetectionRecord};
use crate::prelude::{CoreError, CoreResult};

/// Existing record that lies within the duplicate radius of a candidate.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateMatch<'a> {
    pub record: &'a DetectionRecord,
    pub distance_m: f64,
}

fn validate_radius(radius_meters: f64) -> CoreResult<()> {
    if !radius_meters.is_finite() || radius_meters < 0.0 {
        return Err(CoreError::InvalidInput(format!(
            "duplicate radius {radius_meters} must be a finite, non-negative distance"
        )));
    }
    Ok(())
}

/// First record, in iteration order, whose great-circle distance to the
/// candidate is at most `radius_meters`.
pub fn find_duplicate<'a>(
    candidate: &Coordinate,
    existing: &'a [DetectionRecord],
    radius_meters: f64,
) -> CoreResult<Option<DuplicateMatch<'a>>> {
    validate_radius(radius_meters)?;
    for record in existing {
        let distance_m = candidate.distance_m(&record.coordinate()?);
        if distance_m <= radius_meters {
            return Ok(Some(DuplicateMatch { record, distance_m }));
        }
    }
    Ok(None)
}

pub fn is_duplicate(
    candidate: &Coordinate,
    existing: &[DetectionRecord],
    radius_meters: f64,
) -> CoreResult<bool> {
    Ok(find_duplicate(candidate, existing, radius_meters)?.is_some())
}

/// Duplicate check bound to the radius configured at startup.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateFilter {
    radius_meters: f64,
}

impl DuplicateFilter {
    pub fn new(radius_meters: f64) -> CoreResult<Self> {
        validate_radius(radius_meters)?;
        Ok(Self { radius_meters })
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    pub fn check<'a>(
        &self,
        candidate: &Coordinate,
        existing: &'a [DetectionRecord],
    ) -> CoreResult<Option<DuplicateMatch<'a>>> {
        find_duplicate(candidate, existing, self.radius_meters)
    }
}
