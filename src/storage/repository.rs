//! Store abstraction used by the enrichment pipeline
//!
//! The pipeline only needs "list all", "read one", and "update fields of one",
//! so it talks to this trait rather than to SQLite directly.

use crate::storage::{CallRecord, Database, Enrichment};
use crate::{EnrichError, Result};

/// Document-style access to call records, keyed by identifier
pub trait CallStore {
    /// Every stored record. A failure here aborts the run.
    fn list_records(&self) -> Result<Vec<CallRecord>>;

    /// One record by identifier
    fn get_record(&self, id: &str) -> Result<Option<CallRecord>>;

    /// Write all enrichment fields of one record in a single update
    fn write_enrichment(&self, id: &str, enrichment: &Enrichment) -> Result<()>;

    /// Count a failed enrichment attempt against a record
    fn record_failure(&self, id: &str, reason: &str) -> Result<()>;
}

impl CallStore for Database {
    fn list_records(&self) -> Result<Vec<CallRecord>> {
        self.list_all().map_err(|e| match EnrichError::from(e) {
            // A listing that cannot complete is never partial
            EnrichError::WriteConflict(msg) => EnrichError::Connectivity(msg),
            other => other,
        })
    }

    fn get_record(&self, id: &str) -> Result<Option<CallRecord>> {
        Ok(Database::get_record(self, id)?)
    }

    fn write_enrichment(&self, id: &str, enrichment: &Enrichment) -> Result<()> {
        match self.update_enrichment(id, enrichment)? {
            0 => Err(EnrichError::NotFound(format!("call record {}", id))),
            _ => Ok(()),
        }
    }

    fn record_failure(&self, id: &str, reason: &str) -> Result<()> {
        match self.increment_failures(id, reason)? {
            0 => Err(EnrichError::NotFound(format!("call record {}", id))),
            _ => Ok(()),
        }
    }
}
