pub mod coordinate;
pub mod duplicate;
pub mod index;
pub mod record;
pub mod severity;

pub use coordinate::Coordinate;
pub use duplicate::{find_duplicate, is_duplicate, DuplicateFilter, DuplicateMatch};
pub use index::LocationIndex;
pub use record::{DetectionCandidate, DetectionRecord, FrameRef};
pub use severity::{Severity, SeverityBand, SeverityThresholds};
