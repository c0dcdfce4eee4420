//! callsift - Batch enrichment of call transcripts with LLM-extracted insights
//!
//! Reads stored call transcripts, asks a hosted model for a summary plus
//! contact details, sentiment and interest, and writes the results back.

pub mod cli;
pub mod config;
pub mod enrichment;
pub mod llm;
pub mod storage;

use std::time::Duration;

use thiserror::Error;

/// Main error type for callsift
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Rate limited by model provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Model request timed out")]
    Timeout,

    #[error("Model provider unavailable: {0}")]
    Unavailable(String),

    #[error("Enrichment failed: {0}")]
    EnrichmentFailed(String),

    #[error("Unparseable model output: {0}")]
    Parse(String),

    #[error("Write conflict: {0}")]
    WriteConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnrichError {
    /// Fatal errors abort the whole run; everything else is scoped to one record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Connectivity(_) | Self::Auth(_) | Self::Database(_) | Self::Io(_)
        )
    }

    /// Transient provider failures worth another attempt after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout | Self::Unavailable(_)
        )
    }
}

impl From<rusqlite::Error> for EnrichError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                Self::WriteConflict(err.to_string())
            }
            Some(ErrorCode::CannotOpen) => Self::Connectivity(err.to_string()),
            _ => Self::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, EnrichError>;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "callsift";
