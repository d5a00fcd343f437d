pub mod geodesy;
pub mod stats;

pub use geodesy::{GeodesyHelper, EARTH_RADIUS_M};
pub use stats::StatsHelper;
