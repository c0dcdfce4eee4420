//! Transcript enrichment
//!
//! Selects unprocessed records, runs them through the model, parses the
//! replies and writes results back before marking records as processed.

pub mod parse;
pub mod pipeline;
pub mod reschedule;
pub mod source;
pub mod tracker;

pub use parse::{parse_response, ParsedResponse};
pub use pipeline::{EnrichmentPipeline, PipelineOptions, RunSummary};
pub use reschedule::{apply_reschedule_fallback, detect_reschedule_phrase};
pub use source::Backlog;
pub use tracker::{ProcessedLog, ProcessedSet};
