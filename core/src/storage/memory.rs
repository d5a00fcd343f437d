use crate::detection::DetectionRecord;
use crate::storage::{PrimaryStore, StoreError};
use std::sync::Mutex;

/// Volatile primary store for dry runs; can be switched offline to
/// exercise the fallback path.
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

struct MemoryState {
    next_id: u64,
    available: bool,
    records: Vec<(u64, DetectionRecord)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryState {
                next_id: 1,
                available: true,
                records: Vec::new(),
            }),
        }
    }

    pub fn unavailable() -> Self {
        let store = Self::new();
        store.set_available(false);
        store
    }

    pub fn set_available(&self, available: bool) {
        if let Ok(mut state) = self.inner.lock() {
            state.available = available;
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .map(|state| state.records.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PrimaryStore for MemoryStore {
    fn insert(&self, record: &DetectionRecord) -> Result<u64, StoreError> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))?;
        if !state.available {
            return Err(StoreError::Unavailable("memory store switched offline".into()));
        }
        let id = state.next_id;
        state.next_id += 1;
        state.records.push((id, record.clone()));
        Ok(id)
    }

    fn records(&self) -> Result<Vec<(u64, DetectionRecord)>, StoreError> {
        let state = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))?;
        if !state.available {
            return Err(StoreError::Unavailable("memory store switched offline".into()));
        }
        Ok(state.records.clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
