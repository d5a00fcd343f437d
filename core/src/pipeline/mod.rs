pub mod coordinator;
pub mod statistics;

pub use coordinator::{DetectionPipeline, Outcome};
pub use statistics::{maps_link, select_locations, summarize, Statistics};
