use crate::detection::DetectionRecord;
use crate::storage::{PrimaryStore, StoreError};
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const RECORDS_TREE: &str = "detections";

fn backend(err: sled::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Primary store backed by a sled database directory.
///
/// The database is opened eagerly when possible. When it cannot be opened
/// (path not writable, lock held by another process) the store stays
/// disconnected and each subsequent call retries the open.
pub struct SledStore {
    path: PathBuf,
    db: Mutex<Option<sled::Db>>,
}

impl SledStore {
    pub fn connect<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let db = match Self::open(&path) {
            Ok(db) => Some(db),
            Err(err) => {
                warn!("primary store not reachable at startup: {}", err);
                None
            }
        };
        Self {
            path,
            db: Mutex::new(db),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_connected(&self) -> bool {
        self.db.lock().map(|db| db.is_some()).unwrap_or(false)
    }

    fn open(path: &Path) -> Result<sled::Db, StoreError> {
        sled::open(path)
            .map_err(|err| StoreError::Unavailable(format!("opening {}: {}", path.display(), err)))
    }

    fn db(&self) -> Result<sled::Db, StoreError> {
        let mut guard = self
            .db
            .lock()
            .map_err(|_| StoreError::Backend("connection lock poisoned".into()))?;
        match guard.as_ref() {
            Some(db) => Ok(db.clone()),
            None => {
                let db = Self::open(&self.path)?;
                *guard = Some(db.clone());
                Ok(db)
            }
        }
    }

    fn tree(&self) -> Result<(sled::Db, sled::Tree), StoreError> {
        let db = self.db()?;
        let tree = db.open_tree(RECORDS_TREE).map_err(backend)?;
        Ok((db, tree))
    }
}

impl PrimaryStore for SledStore {
    fn insert(&self, record: &DetectionRecord) -> Result<u64, StoreError> {
        let (db, tree) = self.tree()?;
        let id = db.generate_id().map_err(backend)?;
        let bytes = serde_json::to_vec(record).map_err(|err| StoreError::Codec(err.to_string()))?;
        tree.insert(id.to_be_bytes(), bytes).map_err(backend)?;
        tree.flush().map_err(backend)?;
        Ok(id)
    }

    fn records(&self) -> Result<Vec<(u64, DetectionRecord)>, StoreError> {
        let (_, tree) = self.tree()?;
        let mut records = Vec::with_capacity(tree.len());
        for entry in tree.iter() {
            let (key, value) = entry.map_err(backend)?;
            let id_bytes: [u8; 8] = key[..].try_into().map_err(|_| {
                StoreError::Codec(format!("record key of {} bytes is not an id", key.len()))
            })?;
            let record = serde_json::from_slice(&value)
                .map_err(|err| StoreError::Codec(err.to_string()))?;
            records.push((u64::from_be_bytes(id_bytes), record));
        }
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("sled:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Coordinate, FrameRef, Severity};
    use chrono::Utc;
    use std::fs;
    use tempfile::tempdir;

    fn sample(frame: &str) -> DetectionRecord {
        DetectionRecord::new(
            Coordinate::new(44.8125, 20.4612).unwrap(),
            0.2,
            Severity::High,
            Utc::now(),
            FrameRef::new(frame),
        )
    }

    #[test]
    fn insert_then_read_back_in_order() {
        let dir = tempdir().unwrap();
        let store = SledStore::connect(dir.path().join("db"));
        assert!(store.is_connected());

        let first = store.insert(&sample("a")).unwrap();
        let second = store.insert(&sample("b")).unwrap();
        assert!(second > first);

        let records = store.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, first);
        assert_eq!(records[1].1.frame_reference().as_str(), "b");
    }

    #[test]
    fn unreachable_path_reports_unavailable_then_reconnects() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocked");
        fs::write(&path, b"not a database directory").unwrap();

        let store = SledStore::connect(&path);
        assert!(!store.is_connected());
        assert!(matches!(
            store.insert(&sample("x")),
            Err(StoreError::Unavailable(_))
        ));

        fs::remove_file(&path).unwrap();
        store.insert(&sample("y")).unwrap();
        assert!(store.is_connected());
        assert_eq!(store.describe(), format!("sled:{}", path.display()));
    }
}
