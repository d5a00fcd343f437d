use crate::detection::{SeverityBand, SeverityThresholds};
use crate::storage::{OfflineLogError, StoreError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Startup configuration handed to each component at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub duplicate_radius_meters: f64,
    pub severity_thresholds: Vec<SeverityBand>,
    pub primary_store_location: PathBuf,
    pub offline_log_path: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            duplicate_radius_meters: 5.0,
            severity_thresholds: SeverityThresholds::default_bands(),
            primary_store_location: PathBuf::from("data/potholes.sled"),
            offline_log_path: PathBuf::from("data/offline_logs/detections.jsonl"),
        }
    }
}

/// Common error type for the detection core.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("primary store failure: {0}")]
    PrimaryStore(#[from] StoreError),
    #[error("offline log failure: {0}")]
    OfflineLog(#[from] OfflineLogError),
    #[error("record could not be persisted: primary store failed ({primary}), offline log failed ({offline})")]
    FatalPersistence {
        primary: StoreError,
        offline: OfflineLogError,
    },
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
