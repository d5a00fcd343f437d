use crate::detection::DetectionRecord;
use crate::prelude::{CoreConfig, CoreError, CoreResult};
use crate::storage::{OfflineLog, PrimaryStore, SledStore, StoreError};
use crate::telemetry::log::LogManager;
use log::{error, warn};
use std::sync::atomic::{AtomicBool, Ordering};

/// Where a single record ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistState {
    Pending,
    StoredPrimary,
    StoredOffline,
    Failed,
}

impl PersistState {
    /// Terminal state of a finished `persist` call. Errors other than a
    /// fatal persistence failure never reached storage, so the record stays
    /// pending.
    pub fn of(result: &CoreResult<Ack>) -> Self {
        match result {
            Ok(ack) => ack.state(),
            Err(CoreError::FatalPersistence { .. }) => PersistState::Failed,
            Err(_) => PersistState::Pending,
        }
    }
}

/// Acknowledgment returned to the caller for a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    StoredPrimary { id: u64 },
    StoredOffline,
}

impl Ack {
    pub fn state(&self) -> PersistState {
        match self {
            Ack::StoredPrimary { .. } => PersistState::StoredPrimary,
            Ack::StoredOffline => PersistState::StoredOffline,
        }
    }
}

/// Writes records to the primary store, falling back to the offline log.
///
/// When the primary store could not be read while seeding the location
/// index, writes keep going to the offline log until
/// [`PersistenceGateway::recover_primary_seed`] has handed the missing
/// records over. Otherwise a pothole already in the primary store could be
/// stored a second time.
pub struct PersistenceGateway {
    primary: Box<dyn PrimaryStore>,
    offline: OfflineLog,
    primary_seed_missing: AtomicBool,
    logger: LogManager,
}

/// Drops records whose stored coordinate is out of range so they never reach
/// the location index.
fn indexable(records: Vec<DetectionRecord>, source: &str) -> Vec<DetectionRecord> {
    records
        .into_iter()
        .filter(|record| match record.coordinate() {
            Ok(_) => true,
            Err(err) => {
                warn!(
                    "skipping frame {} from {}: {}",
                    record.frame_reference(),
                    source,
                    err
                );
                false
            }
        })
        .collect()
}

impl PersistenceGateway {
    pub fn new(primary: Box<dyn PrimaryStore>, offline: OfflineLog) -> Self {
        Self {
            primary,
            offline,
            primary_seed_missing: AtomicBool::new(false),
            logger: LogManager::for_component("gateway"),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(
            Box::new(SledStore::connect(&config.primary_store_location)),
            OfflineLog::new(&config.offline_log_path),
        )
    }

    pub fn primary(&self) -> &dyn PrimaryStore {
        self.primary.as_ref()
    }

    pub fn offline_log(&self) -> &OfflineLog {
        &self.offline
    }

    pub fn primary_seed_missing(&self) -> bool {
        self.primary_seed_missing.load(Ordering::Acquire)
    }

    /// Exactly one of: primary write, offline append, or `FatalPersistence`.
    pub fn persist(&self, record: &DetectionRecord) -> CoreResult<Ack> {
        let attempt = if self.primary_seed_missing() {
            Err(StoreError::Unavailable(
                "primary records not yet merged into the location index".into(),
            ))
        } else {
            self.primary.insert(record)
        };
        let primary_err = match attempt {
            Ok(id) => {
                self.logger.record(&format!(
                    "stored {} pothole at ({:.6}, {:.6}) as #{} in {}",
                    record.severity(),
                    record.latitude(),
                    record.longitude(),
                    id,
                    self.primary.describe()
                ));
                return Ok(Ack::StoredPrimary { id });
            }
            Err(err) => err,
        };

        warn!(
            "primary store {} rejected frame {}: {}; writing to offline log {}",
            self.primary.describe(),
            record.frame_reference(),
            primary_err,
            self.offline.path().display()
        );

        match self.offline.append(record) {
            Ok(()) => Ok(Ack::StoredOffline),
            Err(offline_err) => {
                error!(
                    "frame {} lost: primary ({}) and offline log ({}) both failed",
                    record.frame_reference(),
                    primary_err,
                    offline_err
                );
                Err(CoreError::FatalPersistence {
                    primary: primary_err,
                    offline: offline_err,
                })
            }
        }
    }

    /// Union of primary and offline records with valid coordinates. An
    /// unreachable primary store is tolerated at startup and marks the
    /// primary seed as missing; an unreadable offline log is an error.
    pub fn load_known_records(&self) -> CoreResult<Vec<DetectionRecord>> {
        let mut known = match self.primary.records() {
            Ok(records) => {
                self.primary_seed_missing.store(false, Ordering::Release);
                indexable(
                    records.into_iter().map(|(_, record)| record).collect(),
                    "primary store",
                )
            }
            Err(err) => {
                warn!(
                    "could not read primary store {}: {}; duplicate checks start from the offline log only",
                    self.primary.describe(),
                    err
                );
                self.primary_seed_missing.store(true, Ordering::Release);
                Vec::new()
            }
        };
        let offline = self.offline.read_all()?;
        known.extend(offline.records);
        Ok(known)
    }

    /// Retries the primary read missed at startup. Returns the records once,
    /// on the first successful read, and clears the missing-seed flag. The
    /// caller must merge them into its index before the next `persist`.
    pub fn recover_primary_seed(&self) -> Option<Vec<DetectionRecord>> {
        if !self.primary_seed_missing() {
            return None;
        }
        match self.primary.records() {
            Ok(records) => {
                self.primary_seed_missing.store(false, Ordering::Release);
                let records = indexable(
                    records.into_iter().map(|(_, record)| record).collect(),
                    "primary store",
                );
                self.logger.record(&format!(
                    "primary store {} reachable again, merging {} known potholes",
                    self.primary.describe(),
                    records.len()
                ));
                Some(records)
            }
            Err(err) => {
                self.logger.detail(&format!(
                    "primary store {} still unreadable: {}",
                    self.primary.describe(),
                    err
                ));
                None
            }
        }
    }
}
