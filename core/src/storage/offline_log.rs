use crate::detection::DetectionRecord;
use log::warn;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(thiserror::Error, Debug)]
pub enum OfflineLogError {
    #[error("offline log I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("offline log encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Contents of the offline log as read back from disk.
#[derive(Debug, Default)]
pub struct OfflineEntries {
    pub records: Vec<DetectionRecord>,
    /// Lines that did not decode; kept verbatim so nothing is dropped.
    pub unparsable: Vec<String>,
}

/// Append-only JSON-lines file used when the primary store is down.
pub struct OfflineLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl OfflineLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> OfflineLogError {
        OfflineLogError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn ensure_parent(&self) -> Result<(), OfflineLogError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_err(err))?;
        }
        Ok(())
    }

    /// Appends one record as a single line and syncs it to disk.
    pub fn append(&self, record: &DetectionRecord) -> Result<(), OfflineLogError> {
        let line = serde_json::to_string(record)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.ensure_parent()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| self.io_err(err))?;
        writeln!(file, "{line}").map_err(|err| self.io_err(err))?;
        file.sync_data().map_err(|err| self.io_err(err))?;
        Ok(())
    }

    /// Reads every line; a missing file is an empty log. Lines that fail to
    /// decode or carry an out-of-range coordinate land in `unparsable`.
    pub fn read_all(&self) -> Result<OfflineEntries, OfflineLogError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(OfflineEntries::default())
            }
            Err(err) => return Err(self.io_err(err)),
        };

        let mut entries = OfflineEntries::default();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|err| self.io_err(err))?;
            if line.trim().is_empty() {
                continue;
            }
            let decoded = serde_json::from_str::<DetectionRecord>(&line)
                .map_err(|err| err.to_string())
                .and_then(|record| {
                    record
                        .coordinate()
                        .map(|_| record)
                        .map_err(|err| err.to_string())
                });
            match decoded {
                Ok(record) => entries.records.push(record),
                Err(reason) => {
                    warn!(
                        "offline log {} line {} is unreadable ({}); keeping it as-is",
                        self.path.display(),
                        number + 1,
                        reason
                    );
                    entries.unparsable.push(line);
                }
            }
        }
        Ok(entries)
    }

    /// Read-modify-rewrite under the write lock, so no append can land
    /// between the read and the rewrite. `update` returns `None` to leave
    /// the file untouched.
    pub fn compact<F>(&self, update: F) -> Result<(), OfflineLogError>
    where
        F: FnOnce(OfflineEntries) -> Option<OfflineEntries>,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let entries = self.read_all()?;
        match update(entries) {
            Some(kept) => self.write_replacement(&kept.records, &kept.unparsable),
            None => Ok(()),
        }
    }

    /// Replaces the log contents through a temp file and rename.
    fn write_replacement(
        &self,
        records: &[DetectionRecord],
        unparsable: &[String],
    ) -> Result<(), OfflineLogError> {
        self.ensure_parent()?;
        let mut tmp_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        {
            let mut file = File::create(&tmp_path).map_err(|err| self.io_err(err))?;
            for record in records {
                writeln!(file, "{}", serde_json::to_string(record)?)
                    .map_err(|err| self.io_err(err))?;
            }
            for line in unparsable {
                writeln!(file, "{line}").map_err(|err| self.io_err(err))?;
            }
            file.sync_all().map_err(|err| self.io_err(err))?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|err| self.io_err(err))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Coordinate, FrameRef, Severity};
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample(frame: &str) -> DetectionRecord {
        DetectionRecord::new(
            Coordinate::new(44.81, 20.46).unwrap(),
            0.07,
            Severity::Medium,
            Utc::now(),
            FrameRef::new(frame),
        )
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let log = OfflineLog::new(dir.path().join("absent.jsonl"));
        let entries = log.read_all().unwrap();
        assert!(entries.records.is_empty());
        assert!(entries.unparsable.is_empty());
    }

    #[test]
    fn append_creates_parents_and_writes_one_line_per_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/offline/detections.jsonl");
        let log = OfflineLog::new(&path);
        log.append(&sample("one")).unwrap();
        log.append(&sample("two")).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        let entries = log.read_all().unwrap();
        assert_eq!(entries.records[1].frame_reference().as_str(), "two");
    }

    #[test]
    fn garbage_lines_are_kept_not_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let log = OfflineLog::new(&path);
        log.append(&sample("good")).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{truncated\n\n")
            .unwrap();

        let entries = log.read_all().unwrap();
        assert_eq!(entries.records.len(), 1);
        assert_eq!(entries.unparsable, vec!["{truncated".to_string()]);
    }

    #[test]
    fn compact_replaces_contents() {
        let dir = tempdir().unwrap();
        let log = OfflineLog::new(dir.path().join("log.jsonl"));
        log.append(&sample("a")).unwrap();
        log.append(&sample("b")).unwrap();

        log.compact(|_| {
            Some(OfflineEntries {
                records: vec![sample("c")],
                unparsable: vec!["junk".to_string()],
            })
        })
        .unwrap();
        let entries = log.read_all().unwrap();
        assert_eq!(entries.records.len(), 1);
        assert_eq!(entries.records[0].frame_reference().as_str(), "c");
        assert_eq!(entries.unparsable, vec!["junk".to_string()]);
        assert!(!dir.path().join("log.jsonl.tmp").exists());
    }

    #[test]
    fn out_of_range_coordinates_are_kept_as_unparsable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let bad = r#"{"latitude":999.0,"longitude":20.0,"depth_estimate":0.1,"severity":"low","captured_at":"2024-05-01T08:30:00Z","frame_reference":"bad"}"#;
        fs::write(&path, format!("{bad}\n")).unwrap();
        let log = OfflineLog::new(&path);
        log.append(&sample("good")).unwrap();

        let entries = log.read_all().unwrap();
        assert_eq!(entries.records.len(), 1);
        assert_eq!(entries.records[0].frame_reference().as_str(), "good");
        assert_eq!(entries.unparsable, vec![bad.to_string()]);
    }

    #[test]
    fn compact_without_changes_leaves_file_bytes_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let log = OfflineLog::new(&path);
        log.append(&sample("a")).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"\n{junk\n")
            .unwrap();
        let before = fs::read(&path).unwrap();

        log.compact(|_| None).unwrap();
        assert_eq!(fs::read(&path).unwrap(), before);

        log.compact(|entries| {
            Some(OfflineEntries {
                records: Vec::new(),
                unparsable: entries.unparsable,
            })
        })
        .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{junk\n");
    }

    #[test]
    fn append_into_unwritable_location_fails() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let log = OfflineLog::new(blocker.join("log.jsonl"));
        assert!(matches!(
            log.append(&sample("x")),
            Err(OfflineLogError::Io { .. })
        ));
    }
}
