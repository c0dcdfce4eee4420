//! Load transcript files from disk into the store

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::storage::{CallRecord, Database};

/// Outcome of an import
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub duplicates: usize,
    pub empty: usize,
}

/// Metadata encoded in recorder file names such as
/// `out_9876543210_2025-3-7-14-5-22_abc.txt`
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub caller_phone: Option<String>,
    pub call_time: Option<String>,
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"_(\d{10})_").expect("valid phone pattern"))
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"_(\d{4})-(\d{1,2})-(\d{1,2})-(\d{1,2})-(\d{1,2})-\d{1,2}_")
            .expect("valid timestamp pattern")
    })
}

/// Pull the caller number and call time out of a file name.
pub fn parse_file_name(name: &str) -> FileMetadata {
    let caller_phone = phone_pattern()
        .captures(name)
        .map(|caps| caps[1].to_string());

    let call_time = time_pattern().captures(name).and_then(|caps| {
        let part = |i: usize| caps[i].parse::<u32>().ok();
        Some(format!(
            "{}-{:02}-{:02} {:02}:{:02}",
            &caps[1],
            part(2)?,
            part(3)?,
            part(4)?,
            part(5)?
        ))
    });

    FileMetadata {
        caller_phone,
        call_time,
    }
}

/// Expand directories into the `.txt` files directly inside them.
fn collect_transcript_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let entries = std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory: {}", path.display()))?;
            let mut found: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }

    Ok(files)
}

fn record_from_file(path: &Path) -> Result<CallRecord> {
    let transcript = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript: {}", path.display()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string());

    let mut record = match &file_name {
        Some(name) => CallRecord::new(name.clone(), transcript.trim()),
        None => CallRecord::with_generated_id(transcript.trim()),
    };

    if let Some(name) = &file_name {
        let metadata = parse_file_name(name);
        record.caller_phone = metadata.caller_phone;
        record.call_time = metadata.call_time;
    }
    record.source = file_name;

    Ok(record)
}

/// Import transcript files (or directories of them). Existing ids are left untouched.
pub fn import_transcripts(db: &Database, paths: &[PathBuf]) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for path in collect_transcript_files(paths)? {
        let record = record_from_file(&path)?;

        if record.transcript.is_empty() {
            warn!("Skipping {}: transcript is empty", path.display());
            report.empty += 1;
            continue;
        }

        if db.insert_record_if_absent(&record)? {
            debug!("Imported {}", record.id);
            report.imported += 1;
        } else {
            debug!("Already stored: {}", record.id);
            report.duplicates += 1;
        }
    }

    Ok(report)
}
