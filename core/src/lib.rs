//! Geospatial core for the pothole detection pipeline.
//!
//! Candidates produced by the capture/inference stage are classified by
//! estimated depth, checked against previously recorded potholes within a
//! fixed radius, and persisted to the primary store with an append-only
//! offline log taking over whenever the primary store fails.

pub mod detection;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod storage;
pub mod telemetry;

pub use prelude::{CoreConfig, CoreError, CoreResult};
