use anyhow::Context;
use log::warn;
use potholecore::detection::{DetectionCandidate, Severity};
use potholecore::pipeline::{DetectionPipeline, Outcome};
use potholecore::storage::Ack;
use potholecore::CoreError;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub stored_primary: usize,
    pub stored_offline: usize,
    pub suppressed: usize,
    pub rejected: usize,
    pub by_severity: BTreeMap<Severity, usize>,
}

impl RunSummary {
    pub fn stored(&self) -> usize {
        self.stored_primary + self.stored_offline
    }

    pub fn report_line(&self) -> String {
        let severities = self
            .by_severity
            .iter()
            .map(|(severity, count)| format!("{severity}={count}"))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "processed={} stored={} stored_primary={} stored_offline={} suppressed={} rejected={} severities=[{}]",
            self.processed,
            self.stored(),
            self.stored_primary,
            self.stored_offline,
            self.suppressed,
            self.rejected,
            severities
        )
    }

    pub fn append_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening run summary {}", path.display()))?;
        writeln!(file, "{}", self.report_line())?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Runner {
    pipeline: Arc<DetectionPipeline>,
}

impl Runner {
    pub fn new(pipeline: Arc<DetectionPipeline>) -> Self {
        Self { pipeline }
    }

    /// Feeds candidates in order. Invalid candidates are skipped; a record
    /// that neither store could take halts the run.
    pub fn execute(&self, candidates: Vec<DetectionCandidate>) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary::default();
        for candidate in candidates {
            let frame = candidate.frame_reference.clone();
            summary.processed += 1;
            match self.pipeline.process(candidate) {
                Ok(Outcome::Stored { record, ack }) => {
                    match ack {
                        Ack::StoredPrimary { .. } => summary.stored_primary += 1,
                        Ack::StoredOffline => summary.stored_offline += 1,
                    }
                    *summary.by_severity.entry(record.severity()).or_default() += 1;
                }
                Ok(Outcome::Suppressed { .. }) => summary.suppressed += 1,
                Err(err @ CoreError::FatalPersistence { .. }) => {
                    return Err(err).with_context(|| format!("persisting frame {frame}"));
                }
                Err(err) => {
                    warn!("frame {} rejected: {}", frame, err);
                    summary.rejected += 1;
                }
            }
        }
        Ok(summary)
    }
}
