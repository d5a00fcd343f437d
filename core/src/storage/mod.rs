pub mod gateway;
pub mod memory;
pub mod offline_log;
pub mod primary;
pub mod promotion;

pub use gateway::{Ack, PersistState, PersistenceGateway};
pub use memory::MemoryStore;
pub use offline_log::{OfflineEntries, OfflineLog, OfflineLogError};
pub use primary::SledStore;
pub use promotion::{promote_offline, PromotionReport};

use crate::detection::DetectionRecord;
use std::sync::Arc;

/// Failure reported by a primary store backend.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("primary store unavailable: {0}")]
    Unavailable(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("record codec error: {0}")]
    Codec(String),
}

/// Durable, append-only store for accepted detections.
pub trait PrimaryStore: Send + Sync {
    /// Writes the record and returns the id the store assigned to it.
    fn insert(&self, record: &DetectionRecord) -> Result<u64, StoreError>;
    /// Every stored record in insertion order.
    fn records(&self) -> Result<Vec<(u64, DetectionRecord)>, StoreError>;
    fn describe(&self) -> String;
}

impl<T: PrimaryStore + ?Sized> PrimaryStore for Arc<T> {
    fn insert(&self, record: &DetectionRecord) -> Result<u64, StoreError> {
        (**self).insert(record)
    }

    fn records(&self) -> Result<Vec<(u64, DetectionRecord)>, StoreError> {
        (**self).records()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
