//! SQLite database management

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::config::Settings;
use crate::storage::models::{CallRecord, Enrichment, InterestLevel, Sentiment};

/// Database wrapper for callsift
pub struct Database {
    conn: Connection,
}

const CURRENT_SCHEMA_VERSION: i64 = 1;

const RECORD_COLUMNS: &str = "id, source, caller_phone, call_time, transcript, created_at, \
     summary, name, phone, location, age, date_of_birth, reschedule_mentioned, reschedule_detail, \
     sentiment, interest_level, enriched_at, failed_attempts, last_error";

impl Database {
    /// Open or create the database
    pub fn open(settings: &Settings) -> Result<Self> {
        let db_path = settings.database_path();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::open_path(&db_path)
    }

    /// Open database at a specific path (useful for testing)
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        // Concurrent readers wait instead of failing straight away
        self.conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let current_version = self.schema_version()?;
        if current_version > CURRENT_SCHEMA_VERSION {
            anyhow::bail!(
                "Database schema version {} is newer than supported version {}",
                current_version,
                CURRENT_SCHEMA_VERSION
            );
        }

        if current_version < 1 {
            self.migrate_to_v1()?;
            self.set_schema_version(1)?;
        }

        Ok(())
    }

    /// Current schema version tracked in PRAGMA user_version.
    pub fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))?)
    }

    fn set_schema_version(&self, version: i64) -> Result<()> {
        self.conn
            .execute(&format!("PRAGMA user_version = {}", version), [])?;
        Ok(())
    }

    fn migrate_to_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS call_records (
                id TEXT PRIMARY KEY,
                source TEXT,
                caller_phone TEXT,
                call_time TEXT,
                transcript TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                summary TEXT,
                name TEXT,
                phone TEXT,
                location TEXT,
                age TEXT,
                date_of_birth TEXT,
                reschedule_mentioned INTEGER NOT NULL DEFAULT 0,
                reschedule_detail TEXT,
                sentiment TEXT,
                interest_level TEXT,
                enriched_at INTEGER,
                failed_attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_call_records_created_at
                ON call_records(created_at);
            CREATE INDEX IF NOT EXISTS idx_call_records_enriched_at
                ON call_records(enriched_at);
            "#,
        )?;

        Ok(())
    }

    /// Insert a new call record
    pub fn insert_record(&self, record: &CallRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO call_records (id, source, caller_phone, call_time, transcript, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.source,
                record.caller_phone,
                record.call_time,
                record.transcript,
                record.created_at.timestamp(),
            ],
        )?;

        Ok(())
    }

    /// Insert a record unless one with the same id exists. Returns whether a row was added.
    pub fn insert_record_if_absent(&self, record: &CallRecord) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO call_records (id, source, caller_phone, call_time, transcript, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.source,
                record.caller_phone,
                record.call_time,
                record.transcript,
                record.created_at.timestamp(),
            ],
        )?;

        Ok(inserted > 0)
    }

    /// Get a record by ID
    pub fn get_record(&self, id: &str) -> rusqlite::Result<Option<CallRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM call_records WHERE id = ?1", RECORD_COLUMNS),
                params![id],
                Self::row_to_record,
            )
            .optional()
    }

    /// Find a record by exact ID, falling back to the first ID that starts
    /// with `prefix`.
    ///
    /// The prefix is compared literally and case-sensitively; `_` and `%`
    /// in recorder file names are not wildcards.
    pub fn find_record_by_prefix(&self, prefix: &str) -> Result<Option<CallRecord>> {
        if let Some(record) = self.get_record(prefix)? {
            return Ok(Some(record));
        }
        if prefix.is_empty() {
            return Ok(None);
        }

        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM call_records WHERE substr(id, 1, ?2) = ?1 ORDER BY id LIMIT 1",
                    RECORD_COLUMNS
                ),
                params![prefix, prefix.chars().count() as i64],
                Self::row_to_record,
            )
            .optional()?)
    }

    /// All records, oldest first
    pub fn list_all(&self) -> rusqlite::Result<Vec<CallRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM call_records ORDER BY created_at ASC, id ASC",
            RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// List records, newest first
    pub fn list_recent(&self, limit: usize, pending_only: bool) -> Result<Vec<CallRecord>> {
        let filter = if pending_only {
            "WHERE enriched_at IS NULL"
        } else {
            ""
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM call_records {} ORDER BY created_at DESC, id ASC LIMIT ?1",
            RECORD_COLUMNS, filter
        ))?;

        let records = stmt
            .query_map(params![limit], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Overwrite the enrichment columns of one record. Returns rows touched.
    pub fn update_enrichment(&self, id: &str, enrichment: &Enrichment) -> rusqlite::Result<usize> {
        self.conn.execute(
            r#"
            UPDATE call_records
            SET summary = ?2, name = ?3, phone = ?4, location = ?5, age = ?6,
                date_of_birth = ?7, reschedule_mentioned = ?8, reschedule_detail = ?9,
                sentiment = ?10, interest_level = ?11, enriched_at = ?12, last_error = NULL
            WHERE id = ?1
            "#,
            params![
                id,
                enrichment.summary,
                enrichment.name,
                enrichment.phone,
                enrichment.location,
                enrichment.age,
                enrichment.date_of_birth,
                enrichment.reschedule_mentioned,
                enrichment.reschedule_detail,
                enrichment.sentiment.map(|s| s.as_str()),
                enrichment.interest_level.map(|i| i.as_str()),
                Utc::now().timestamp(),
            ],
        )
    }

    /// Bump the failure counter of one record. Returns rows touched.
    pub fn increment_failures(&self, id: &str, reason: &str) -> rusqlite::Result<usize> {
        self.conn.execute(
            "UPDATE call_records SET failed_attempts = failed_attempts + 1, last_error = ?2 WHERE id = ?1",
            params![id, reason],
        )
    }

    /// Clear the failure counter so a quarantined record is attempted again
    pub fn reset_failures(&self, id: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE call_records SET failed_attempts = 0, last_error = NULL WHERE id = ?1",
            params![id],
        )?;
        Ok(changed > 0)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<CallRecord> {
        let created_timestamp: i64 = row.get(5)?;
        let enriched_timestamp: Option<i64> = row.get(16)?;

        let enrichment = if enriched_timestamp.is_some() {
            let sentiment: Option<String> = row.get(14)?;
            let interest: Option<String> = row.get(15)?;
            Some(Enrichment {
                summary: row.get(6)?,
                name: row.get(7)?,
                phone: row.get(8)?,
                location: row.get(9)?,
                age: row.get(10)?,
                date_of_birth: row.get(11)?,
                reschedule_mentioned: row.get(12)?,
                reschedule_detail: row.get(13)?,
                sentiment: sentiment.as_deref().and_then(Sentiment::from_str),
                interest_level: interest.as_deref().and_then(InterestLevel::from_str),
            })
        } else {
            None
        };

        Ok(CallRecord {
            id: row.get(0)?,
            source: row.get(1)?,
            caller_phone: row.get(2)?,
            call_time: row.get(3)?,
            transcript: row.get(4)?,
            created_at: timestamp_to_utc(created_timestamp),
            enrichment,
            enriched_at: enriched_timestamp.map(timestamp_to_utc),
            failed_attempts: row.get(17)?,
            last_error: row.get(18)?,
        })
    }

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let (total, enriched, failing): (i64, i64, i64) = self.conn.query_row(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN enriched_at IS NOT NULL THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN enriched_at IS NULL AND failed_attempts > 0 THEN 1 ELSE 0 END), 0)
            FROM call_records
            "#,
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(DatabaseStats {
            total_records: total as usize,
            enriched_records: enriched as usize,
            failing_records: failing as usize,
        })
    }
}

fn timestamp_to_utc(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub total_records: usize,
    pub enriched_records: usize,
    pub failing_records: usize,
}
