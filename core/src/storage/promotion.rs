use crate::prelude::CoreResult;
use crate::storage::{OfflineEntries, OfflineLog, PrimaryStore};
use log::{info, warn};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PromotionReport {
    pub promoted: usize,
    pub remaining: usize,
    pub unparsable: usize,
}

/// Batch move of offline-logged records into the primary store.
///
/// Records are inserted in log order. After the first primary failure the
/// rest are left in place. The log is then rewritten with whatever was not
/// promoted, unparsable lines included, while holding the log's write lock
/// so concurrent appends are not overwritten. Nothing promoted means the log
/// is left untouched. A crash between insert and rewrite can duplicate a
/// record in the primary store but never loses one.
pub fn promote_offline(
    primary: &dyn PrimaryStore,
    log: &OfflineLog,
) -> CoreResult<PromotionReport> {
    let mut report = PromotionReport::default();
    log.compact(|entries| {
        report.unparsable = entries.unparsable.len();
        let mut remaining = Vec::new();
        let mut records = entries.records.into_iter();
        for record in records.by_ref() {
            match primary.insert(&record) {
                Ok(_) => report.promoted += 1,
                Err(err) => {
                    warn!(
                        "promotion stopped at frame {}: {}",
                        record.frame_reference(),
                        err
                    );
                    remaining.push(record);
                    break;
                }
            }
        }
        remaining.extend(records);
        report.remaining = remaining.len();

        (report.promoted > 0).then(|| OfflineEntries {
            records: remaining,
            unparsable: entries.unparsable,
        })
    })?;

    info!(
        "promoted {} offline records into {} ({} remaining, {} unparsable)",
        report.promoted,
        primary.describe(),
        report.remaining,
        report.unparsable
    );
    Ok(report)
}
