use crate::detection::{
    DetectionCandidate, DetectionRecord, DuplicateFilter, LocationIndex, Severity,
    SeverityThresholds,
};
use crate::pipeline::statistics::{self, Statistics};
use crate::prelude::{CoreConfig, CoreError, CoreResult};
use crate::storage::{Ack, PersistState, PersistenceGateway};
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use chrono::{DateTime, Utc};
use log::error;
use std::sync::{Mutex, MutexGuard};

/// Result of pushing one candidate through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Stored {
        record: DetectionRecord,
        ack: Ack,
    },
    /// An already recorded pothole lies within the duplicate radius.
    Suppressed {
        matched: DetectionRecord,
        distance_m: f64,
    },
}

/// Classify, deduplicate, and persist detection candidates.
///
/// The duplicate check and the write happen under one lock, so concurrent
/// callers can never both store two detections of the same pothole.
pub struct DetectionPipeline {
    classifier: SeverityThresholds,
    filter: DuplicateFilter,
    gateway: PersistenceGateway,
    index: Mutex<LocationIndex>,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl DetectionPipeline {
    /// Seeds the location index from everything the gateway already holds.
    pub fn new(config: &CoreConfig, gateway: PersistenceGateway) -> CoreResult<Self> {
        let classifier = SeverityThresholds::new(config.severity_thresholds.clone())?;
        let filter = DuplicateFilter::new(config.duplicate_radius_meters)?;
        let known = gateway.load_known_records()?;
        let logger = LogManager::for_component("pipeline");
        logger.record(&format!(
            "loaded {} known potholes, duplicate radius {} m",
            known.len(),
            filter.radius_meters()
        ));

        Ok(Self {
            classifier,
            filter,
            gateway,
            index: Mutex::new(LocationIndex::from_records(known)),
            metrics: MetricsRecorder::new(),
            logger,
        })
    }

    pub fn from_config(config: &CoreConfig) -> CoreResult<Self> {
        Self::new(config, PersistenceGateway::from_config(config))
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Locks the index, first merging any primary records that could not
    /// be read at startup.
    fn lock_index(&self) -> CoreResult<MutexGuard<'_, LocationIndex>> {
        let mut index = self
            .index
            .lock()
            .map_err(|_| CoreError::Internal("location index lock poisoned".into()))?;
        if let Some(missed) = self.gateway.recover_primary_seed() {
            index.extend(missed);
        }
        Ok(index)
    }

    pub fn process(&self, candidate: DetectionCandidate) -> CoreResult<Outcome> {
        let result = self.process_inner(candidate);
        match &result {
            Ok(Outcome::Suppressed { .. }) => self.metrics.record_suppressed(),
            Ok(Outcome::Stored { ack, .. }) => self.metrics.record_persisted(ack.state()),
            Err(CoreError::FatalPersistence { .. }) => {
                self.metrics.record_persisted(PersistState::Failed)
            }
            Err(err @ CoreError::Internal(_)) => {
                error!("[pipeline] candidate dropped: {}", err);
                self.metrics.record_internal();
            }
            Err(_) => self.metrics.record_persisted(PersistState::Pending),
        }
        result
    }

    fn process_inner(&self, candidate: DetectionCandidate) -> CoreResult<Outcome> {
        let DetectionCandidate {
            coordinate,
            depth_estimate,
            captured_at,
            frame_reference,
        } = candidate;
        let severity = self.classifier.classify(depth_estimate)?;

        let mut index = self.lock_index()?;
        if let Some(found) = self.filter.check(&coordinate, index.records())? {
            self.logger.detail(&format!(
                "frame {} at {} suppressed: {:.2} m from pothole seen in frame {}",
                frame_reference,
                coordinate,
                found.distance_m,
                found.record.frame_reference()
            ));
            return Ok(Outcome::Suppressed {
                matched: found.record.clone(),
                distance_m: found.distance_m,
            });
        }

        let record = DetectionRecord::new(
            coordinate,
            depth_estimate,
            severity,
            captured_at,
            frame_reference,
        );
        let ack = self.gateway.persist(&record)?;
        index.push(record.clone());
        Ok(Outcome::Stored { record, ack })
    }

    /// Processes candidates in order; a failing candidate does not stop the rest.
    pub fn process_batch<I>(&self, candidates: I) -> Vec<CoreResult<Outcome>>
    where
        I: IntoIterator<Item = DetectionCandidate>,
    {
        candidates
            .into_iter()
            .map(|candidate| self.process(candidate))
            .collect()
    }

    pub fn known_count(&self) -> CoreResult<usize> {
        Ok(self.lock_index()?.len())
    }

    pub fn statistics(&self, now: DateTime<Utc>) -> CoreResult<Statistics> {
        let index = self.lock_index()?;
        Ok(statistics::summarize(index.records(), now))
    }

    pub fn locations(
        &self,
        severity: Option<Severity>,
        limit: usize,
    ) -> CoreResult<Vec<DetectionRecord>> {
        let index = self.lock_index()?;
        Ok(statistics::select_locations(index.records(), severity, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Coordinate, FrameRef};
    use crate::storage::{MemoryStore, OfflineLog, PrimaryStore, SledStore};
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn candidate(lat: f64, lon: f64, depth: f64, frame: &str) -> DetectionCandidate {
        DetectionCandidate::new(
            Coordinate::new(lat, lon).unwrap(),
            depth,
            Utc::now(),
            FrameRef::new(frame),
        )
    }

    fn memory_pipeline(dir: &std::path::Path, store: Arc<MemoryStore>) -> DetectionPipeline {
        let gateway = PersistenceGateway::new(
            Box::new(store),
            OfflineLog::new(dir.join("offline.jsonl")),
        );
        DetectionPipeline::new(&CoreConfig::default(), gateway).unwrap()
    }

    #[test]
    fn nearby_detection_is_stored_and_close_one_suppressed() {
        let dir = tempdir().unwrap();
        let pipeline = memory_pipeline(dir.path(), Arc::new(MemoryStore::new()));

        let first = pipeline
            .process(candidate(44.8125, 20.4612, 0.2, "f1"))
            .unwrap();
        assert!(matches!(first, Outcome::Stored { .. }));

        let eight_m = pipeline
            .process(candidate(44.8125, 20.4613, 0.1, "f2"))
            .unwrap();
        assert!(matches!(eight_m, Outcome::Stored { .. }));

        match pipeline
            .process(candidate(44.81251, 20.46121, 0.4, "f3"))
            .unwrap()
        {
            Outcome::Suppressed { matched, distance_m } => {
                assert_eq!(matched.frame_reference().as_str(), "f1");
                assert!(distance_m < 1.5);
            }
            other => panic!("expected suppression, got {other:?}"),
        }

        let metrics = pipeline.metrics();
        assert_eq!(metrics.stored_primary, 2);
        assert_eq!(metrics.suppressed, 1);
        assert_eq!(pipeline.known_count().unwrap(), 2);
    }

    #[test]
    fn stored_record_carries_classified_severity() {
        let dir = tempdir().unwrap();
        let pipeline = memory_pipeline(dir.path(), Arc::new(MemoryStore::new()));
        match pipeline.process(candidate(1.0, 1.0, 0.31, "deep")).unwrap() {
            Outcome::Stored { record, ack } => {
                assert_eq!(record.severity(), Severity::Critical);
                assert_eq!(ack.state(), PersistState::StoredPrimary);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn primary_outage_stores_offline_without_error() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let pipeline = memory_pipeline(dir.path(), store.clone());
        store.set_available(false);

        match pipeline.process(candidate(44.8, 20.4, 0.02, "f")).unwrap() {
            Outcome::Stored { ack, .. } => assert_eq!(ack, Ack::StoredOffline),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(pipeline.metrics().stored_offline, 1);

        // offline records still count for duplicate checks
        let again = pipeline.process(candidate(44.8, 20.4, 0.02, "g")).unwrap();
        assert!(matches!(again, Outcome::Suppressed { .. }));
    }

    #[test]
    fn invalid_depth_is_rejected_before_storage() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let pipeline = memory_pipeline(dir.path(), store.clone());
        let err = pipeline
            .process(candidate(10.0, 10.0, f64::NAN, "nan"))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        assert!(store.is_empty());
        assert_eq!(pipeline.metrics().rejected, 1);
    }

    #[test]
    fn fatal_persistence_is_surfaced_and_not_indexed() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let gateway = PersistenceGateway::new(
            Box::new(MemoryStore::unavailable()),
            OfflineLog::new(blocker.join("offline.jsonl")),
        );
        let pipeline = DetectionPipeline::new(&CoreConfig::default(), gateway).unwrap();

        let err = pipeline.process(candidate(3.0, 3.0, 0.1, "x")).unwrap_err();
        assert!(matches!(err, CoreError::FatalPersistence { .. }));
        assert_eq!(pipeline.known_count().unwrap(), 0);
        assert_eq!(pipeline.metrics().failed, 1);
    }

    #[test]
    fn batch_continues_past_bad_candidates() {
        let dir = tempdir().unwrap();
        let pipeline = memory_pipeline(dir.path(), Arc::new(MemoryStore::new()));
        let results = pipeline.process_batch(vec![
            candidate(5.0, 5.0, 0.1, "a"),
            candidate(5.0, 5.0, f64::INFINITY, "b"),
            candidate(6.0, 6.0, 0.1, "c"),
        ]);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(matches!(results[2], Ok(Outcome::Stored { .. })));
    }

    #[test]
    fn concurrent_detections_of_same_pothole_store_once() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let pipeline = Arc::new(memory_pipeline(dir.path(), store.clone()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pipeline = pipeline.clone();
                thread::spawn(move || {
                    let jitter = i as f64 * 0.000001;
                    pipeline
                        .process(candidate(44.8125 + jitter, 20.4612, 0.2, &format!("t{i}")))
                        .unwrap()
                })
            })
            .collect();
        let stored = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|outcome| matches!(outcome, Outcome::Stored { .. }))
            .count();

        assert_eq!(stored, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn restart_reloads_known_potholes_from_sled_and_offline_log() {
        let dir = tempdir().unwrap();
        let config = CoreConfig {
            primary_store_location: dir.path().join("db"),
            offline_log_path: dir.path().join("offline/detections.jsonl"),
            ..CoreConfig::default()
        };
        OfflineLog::new(&config.offline_log_path)
            .append(&DetectionRecord::new(
                Coordinate::new(44.0, 20.0).unwrap(),
                0.1,
                Severity::Medium,
                Utc::now(),
                FrameRef::new("earlier"),
            ))
            .unwrap();

        let gateway = PersistenceGateway::new(
            Box::new(SledStore::connect(&config.primary_store_location)),
            OfflineLog::new(&config.offline_log_path),
        );
        let pipeline = DetectionPipeline::new(&config, gateway).unwrap();
        assert_eq!(pipeline.known_count().unwrap(), 1);
        assert!(matches!(
            pipeline.process(candidate(44.0, 20.00001, 0.1, "now")).unwrap(),
            Outcome::Suppressed { .. }
        ));
        assert!(matches!(
            pipeline.process(candidate(45.0, 20.0, 0.1, "new")).unwrap(),
            Outcome::Stored { ack: Ack::StoredPrimary { .. }, .. }
        ));
    }

    #[test]
    fn primary_back_after_startup_outage_still_suppresses_known_pothole() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store
            .insert(&DetectionRecord::new(
                Coordinate::new(44.8125, 20.4612).unwrap(),
                0.2,
                Severity::High,
                Utc::now(),
                FrameRef::new("before-restart"),
            ))
            .unwrap();
        store.set_available(false);
        let pipeline = memory_pipeline(dir.path(), store.clone());
        assert_eq!(pipeline.known_count().unwrap(), 0);

        store.set_available(true);
        match pipeline
            .process(candidate(44.8125, 20.4612, 0.2, "again"))
            .unwrap()
        {
            Outcome::Suppressed { matched, .. } => {
                assert_eq!(matched.frame_reference().as_str(), "before-restart")
            }
            other => panic!("expected suppression, got {other:?}"),
        }
        assert_eq!(store.len(), 1);
        assert_eq!(pipeline.known_count().unwrap(), 1);
    }

    #[test]
    fn writes_stay_offline_while_primary_seed_is_unreadable() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryStore::unavailable());
        let pipeline = memory_pipeline(dir.path(), store.clone());

        let first = pipeline.process(candidate(1.0, 1.0, 0.1, "a")).unwrap();
        assert!(matches!(first, Outcome::Stored { ack: Ack::StoredOffline, .. }));

        store.set_available(true);
        let second = pipeline.process(candidate(2.0, 2.0, 0.1, "b")).unwrap();
        assert!(matches!(second, Outcome::Stored { ack: Ack::StoredPrimary { .. }, .. }));
        assert_eq!(store.len(), 1);
        assert_eq!(pipeline.known_count().unwrap(), 2);
    }

    #[test]
    fn out_of_range_offline_line_does_not_block_later_detections() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("offline.jsonl"),
            r#"{"latitude":999.0,"longitude":20.0,"depth_estimate":0.1,"severity":"low","captured_at":"2024-05-01T08:30:00Z","frame_reference":"bad"}"#,
        )
        .unwrap();
        let pipeline = memory_pipeline(dir.path(), Arc::new(MemoryStore::new()));
        assert_eq!(pipeline.known_count().unwrap(), 0);

        for lat in [10.0, 11.0, 12.0] {
            let outcome = pipeline.process(candidate(lat, 10.0, 0.1, "ok")).unwrap();
            assert!(matches!(outcome, Outcome::Stored { .. }));
        }
        let metrics = pipeline.metrics();
        assert_eq!(metrics.stored_primary, 3);
        assert_eq!(metrics.rejected, 0);
    }

    #[test]
    fn poisoned_index_is_counted_apart_from_rejections() {
        let dir = tempdir().unwrap();
        let pipeline = Arc::new(memory_pipeline(dir.path(), Arc::new(MemoryStore::new())));
        let poisoner = pipeline.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.index.lock().unwrap();
            panic!("poison the index lock");
        })
        .join();

        let err = pipeline.process(candidate(1.0, 1.0, 0.1, "p")).unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
        let metrics = pipeline.metrics();
        assert_eq!(metrics.internal, 1);
        assert_eq!(metrics.rejected, 0);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let dir = tempdir().unwrap();
        let gateway = PersistenceGateway::new(
            Box::new(MemoryStore::new()),
            OfflineLog::new(dir.path().join("offline.jsonl")),
        );
        let config = CoreConfig {
            duplicate_radius_meters: -3.0,
            ..CoreConfig::default()
        };
        assert!(matches!(
            DetectionPipeline::new(&config, gateway),
            Err(CoreError::InvalidInput(_))
        ));
    }
}
