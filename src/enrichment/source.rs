//! Selection of the records a run still has to enrich

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::enrichment::tracker::{ProcessedLog, ProcessedSet};
use crate::storage::{CallRecord, CallStore};
use crate::Result;

/// Records still pending for this run, in store order.
#[derive(Debug, Default)]
pub struct Backlog {
    pending: VecDeque<CallRecord>,
    pub already_processed: usize,
    pub missing_transcript: usize,
    pub quarantined: usize,
    pub untrackable: usize,
}

impl Backlog {
    /// List every record once and keep the ones that need work.
    ///
    /// `max_attempts` of 0 disables quarantine.
    pub fn collect<S, P>(store: &S, processed: &P, max_attempts: u32) -> Result<Self>
    where
        S: CallStore + ?Sized,
        P: ProcessedSet + ?Sized,
    {
        let records = store.list_records()?;
        let total = records.len();
        let mut backlog = Self::default();

        for record in records {
            if processed.contains(&record.id) {
                backlog.already_processed += 1;
            } else if !ProcessedLog::is_trackable(&record.id) {
                warn!("Skipping record with unusable id {:?}", record.id);
                backlog.untrackable += 1;
            } else if record.transcript.trim().is_empty() {
                debug!("Skipping {}: no transcript", record.id);
                backlog.missing_transcript += 1;
            } else if max_attempts > 0 && record.failed_attempts >= max_attempts {
                debug!(
                    "Skipping {}: quarantined after {} failed attempts",
                    record.id, record.failed_attempts
                );
                backlog.quarantined += 1;
            } else {
                backlog.pending.push_back(record);
            }
        }

        debug!(
            "Listed {} records: {} pending, {} skipped",
            total,
            backlog.pending.len(),
            backlog.skipped()
        );

        Ok(backlog)
    }

    /// Records left out of this run for any reason
    pub fn skipped(&self) -> usize {
        self.already_processed + self.missing_transcript + self.quarantined + self.untrackable
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Iterator for Backlog {
    type Item = CallRecord;

    fn next(&mut self) -> Option<CallRecord> {
        self.pending.pop_front()
    }
}
