//! CLI command implementations

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::cli::args::ConfigCommand;
use crate::config::Settings;
use crate::enrichment::{EnrichmentPipeline, PipelineOptions, ProcessedLog, RunSummary};
use crate::llm::build_provider;
use crate::storage::{import_transcripts, CallRecord, Database};

/// Exit code when some records failed but the run finished
const EXIT_PARTIAL: u8 = 2;

/// Exit code when the run was stopped by Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

/// Run the enrichment pipeline over every unprocessed record
pub async fn run_pipeline(settings: &Settings, concurrency: Option<usize>) -> Result<ExitCode> {
    settings.ensure_dirs()?;

    // Fail on a missing key before touching the store
    let provider = build_provider(settings)?;

    let db = Database::open(settings)?;
    let log_path = settings.processed_log_path();
    let processed = ProcessedLog::open(&log_path)
        .with_context(|| format!("Failed to open processed log: {}", log_path.display()))?;

    let mut options = PipelineOptions::from_settings(settings);
    if let Some(n) = concurrency {
        options.concurrency = n.max(1);
    }

    let mut pipeline = EnrichmentPipeline::new(db, processed, provider, options);
    let summary = pipeline.run_until(shutdown_signal()).await?;

    print_summary(&summary);
    Ok(exit_code(&summary))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; never interrupt
        std::future::pending::<()>().await;
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "processed={} failed={} skipped={}",
        summary.processed, summary.failed, summary.skipped
    );
    if summary.interrupted {
        println!("Interrupted; remaining records will be picked up by the next run");
    }
}

fn exit_code(summary: &RunSummary) -> ExitCode {
    if summary.interrupted {
        ExitCode::from(EXIT_INTERRUPTED)
    } else if summary.failed > 0 {
        ExitCode::from(EXIT_PARTIAL)
    } else {
        ExitCode::SUCCESS
    }
}

/// Import transcript files into the store
pub fn import_files(settings: &Settings, paths: &[PathBuf]) -> Result<()> {
    let db = Database::open(settings)?;
    let report = import_transcripts(&db, paths)?;

    println!(
        "Imported {} transcripts ({} already stored, {} empty)",
        report.imported, report.duplicates, report.empty
    );

    Ok(())
}

/// List stored call records
pub fn list_records(settings: &Settings, limit: usize, pending: bool) -> Result<()> {
    let db = Database::open(settings)?;
    let records = db.list_recent(limit, pending)?;

    if records.is_empty() {
        println!("No call records found");
        return Ok(());
    }

    println!(
        "{:<40} {:<17} {:<12} {:<15}",
        "ID", "Call time", "Status", "Interest"
    );
    println!("{}", "-".repeat(86));

    for record in records {
        let call_time = record
            .call_time
            .clone()
            .unwrap_or_else(|| record.created_at.format("%Y-%m-%d %H:%M").to_string());
        let interest = record
            .enrichment
            .as_ref()
            .and_then(|e| e.interest_level)
            .map(|level| level.as_str())
            .unwrap_or("-");

        println!(
            "{:<40} {:<17} {:<12} {:<15}",
            truncate(&record.id, 38),
            call_time,
            record_status(&record),
            interest
        );
    }

    Ok(())
}

fn record_status(record: &CallRecord) -> String {
    if record.is_enriched() {
        "enriched".to_string()
    } else if record.failed_attempts > 0 {
        format!("failed x{}", record.failed_attempts)
    } else {
        "pending".to_string()
    }
}

/// View a call record and its enrichment
pub fn view_record(settings: &Settings, id: &str, json: bool) -> Result<()> {
    let db = Database::open(settings)?;

    let record = db
        .find_record_by_prefix(id)?
        .context("Call record not found")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("ID: {}", record.id);
    if let Some(phone) = &record.caller_phone {
        println!("Caller: {}", phone);
    }
    if let Some(time) = &record.call_time {
        println!("Call time: {}", time);
    }
    println!("Status: {}", record_status(&record));
    if let Some(err) = &record.last_error {
        println!("Last error: {}", err);
    }

    if let Some(enrichment) = &record.enrichment {
        println!();
        if let Some(summary) = &enrichment.summary {
            println!("Summary:");
            println!("{}", summary);
            println!();
        }

        let fields = [
            ("Name", enrichment.name.as_deref()),
            ("Phone", enrichment.phone.as_deref()),
            ("Location", enrichment.location.as_deref()),
            ("Age", enrichment.age.as_deref()),
            ("Date of birth", enrichment.date_of_birth.as_deref()),
            ("Reschedule", enrichment.reschedule_detail.as_deref()),
            ("Sentiment", enrichment.sentiment.map(|s| s.as_str())),
            ("Interest", enrichment.interest_level.map(|i| i.as_str())),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                println!("{}: {}", label, value);
            }
        }
        if enrichment.reschedule_mentioned && enrichment.reschedule_detail.is_none() {
            println!("Reschedule: mentioned");
        }
    }

    println!();
    println!("Transcript:");
    println!("{}", record.transcript);

    Ok(())
}

/// Show store and processed-log counts
pub fn show_status(settings: &Settings) -> Result<()> {
    let db = Database::open(settings)?;
    let stats = db.get_stats()?;

    let log_path = settings.processed_log_path();
    let processed = ProcessedLog::read_ids(&log_path)
        .with_context(|| format!("Failed to read processed log: {}", log_path.display()))?;

    println!("Database: {}", settings.database_path().display());
    println!("Processed log: {}", log_path.display());
    println!("  Records: {}", stats.total_records);
    println!("  Enriched: {}", stats.enriched_records);
    println!("  Failing: {}", stats.failing_records);
    println!("  Marked processed: {}", processed.len());

    Ok(())
}

/// Clear the failure count of a record so the next run tries it again
pub fn retry_record(settings: &Settings, id: &str) -> Result<()> {
    let db = Database::open(settings)?;

    let record = db
        .find_record_by_prefix(id)?
        .with_context(|| format!("Call record not found: {}", id))?;
    db.reset_failures(&record.id)?;
    println!("Cleared failures for {}", record.id);

    Ok(())
}

/// Handle config subcommands
pub fn config_command(settings: &Settings, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let mut shown = settings.clone();
            if !shown.llm.api_key.is_empty() {
                shown.llm.api_key = "********".to_string();
            }
            let toml = toml::to_string_pretty(&shown)?;
            println!("{}", toml);
        }
        ConfigCommand::Path => {
            let path = Settings::config_path()?;
            println!("{}", path.display());
        }
        ConfigCommand::Init { force } => {
            let path = Settings::config_path()?;
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            Settings::write_default(&path)?;
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
