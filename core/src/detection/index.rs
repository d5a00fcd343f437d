use crate::detection::DetectionRecord;

/// In-memory view of every recorded pothole, primary and offline alike.
#[derive(Debug, Clone, Default)]
pub struct LocationIndex {
    records: Vec<DetectionRecord>,
}

impl LocationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<DetectionRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: DetectionRecord) {
        self.records.push(record);
    }

    pub fn extend<I: IntoIterator<Item = DetectionRecord>>(&mut self, records: I) {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[DetectionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
