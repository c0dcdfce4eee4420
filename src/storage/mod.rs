//! Storage module for callsift
//!
//! Call records live in SQLite; the pipeline reaches them through [`CallStore`].

mod database;
mod import;
mod models;
mod repository;

pub use database::{Database, DatabaseStats};
pub use import::{import_transcripts, parse_file_name, FileMetadata, ImportReport};
pub use models::{CallRecord, Enrichment, InterestLevel, Sentiment};
pub use repository::CallStore;
