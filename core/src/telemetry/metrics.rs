use crate::storage::PersistState;
use serde::Serialize;
use std::sync::Mutex;

/// Per-outcome counters for processed detection candidates.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub stored_primary: usize,
    pub stored_offline: usize,
    pub suppressed: usize,
    pub rejected: usize,
    pub failed: usize,
    /// Lock poisoning and other faults inside the pipeline itself.
    pub internal: usize,
}

impl MetricsSnapshot {
    pub fn processed(&self) -> usize {
        self.stored_primary
            + self.stored_offline
            + self.suppressed
            + self.rejected
            + self.failed
            + self.internal
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_persisted(&self, state: PersistState) {
        if let Ok(mut metrics) = self.inner.lock() {
            match state {
                PersistState::StoredPrimary => metrics.stored_primary += 1,
                PersistState::StoredOffline => metrics.stored_offline += 1,
                PersistState::Failed => metrics.failed += 1,
                PersistState::Pending => metrics.rejected += 1,
            }
        }
    }

    pub fn record_suppressed(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.suppressed += 1;
        }
    }

    pub fn record_internal(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.internal += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
