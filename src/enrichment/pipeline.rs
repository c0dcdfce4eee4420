//! The enrichment run: list, prompt, call, parse, write, mark.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::enrichment::parse::{parse_response, ParsedResponse};
use crate::enrichment::reschedule::apply_reschedule_fallback;
use crate::enrichment::source::Backlog;
use crate::enrichment::tracker::ProcessedSet;
use crate::llm::{build_enrichment_prompt, complete_with_retry, LlmProvider, RetryPolicy};
use crate::storage::{CallStore, Enrichment};
use crate::{EnrichError, Result};

/// Counts reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Stopped early on shutdown; unstarted records remain for the next run
    pub interrupted: bool,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && !self.interrupted
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Maximum model calls in flight
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Failed runs after which a record is skipped; 0 never quarantines
    pub max_attempts: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry: RetryPolicy::default(),
            max_attempts: 3,
        }
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            concurrency: settings.pipeline.concurrency.max(1),
            retry: RetryPolicy::from_settings(settings),
            max_attempts: settings.pipeline.max_attempts,
        }
    }
}

type TaskOutcome = (String, Result<Enrichment>);

/// Batch enrichment over a store, tracked by a processed set.
pub struct EnrichmentPipeline<S, P> {
    store: S,
    processed: P,
    provider: Arc<dyn LlmProvider>,
    options: PipelineOptions,
}

impl<S: CallStore, P: ProcessedSet> EnrichmentPipeline<S, P> {
    pub fn new(
        store: S,
        processed: P,
        provider: Arc<dyn LlmProvider>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            processed,
            provider,
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn processed(&self) -> &P {
        &self.processed
    }

    pub fn into_parts(self) -> (S, P) {
        (self.store, self.processed)
    }

    /// Process every pending record once.
    pub async fn run(&mut self) -> Result<RunSummary> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Process pending records until done or until `shutdown` resolves.
    ///
    /// On shutdown no new records are started; results already in flight are
    /// still written. A fatal error aborts all in-flight calls and is returned.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let mut backlog =
            Backlog::collect(&self.store, &self.processed, self.options.max_attempts)?;

        let mut summary = RunSummary {
            skipped: backlog.skipped(),
            ..RunSummary::default()
        };

        info!(
            "Enriching {} records with {} ({} skipped)",
            backlog.len(),
            self.provider.name(),
            summary.skipped
        );

        let concurrency = self.options.concurrency.max(1);
        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            if !summary.interrupted {
                while tasks.len() < concurrency {
                    let Some(record) = backlog.next() else {
                        break;
                    };
                    debug!("Starting {}", record.id);
                    tasks.spawn(enrich_one(
                        Arc::clone(&self.provider),
                        self.options.retry,
                        record.id,
                        record.transcript,
                    ));
                }
            }

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                _ = &mut shutdown, if !summary.interrupted => {
                    warn!(
                        "Shutdown requested, finishing {} in-flight records",
                        tasks.len()
                    );
                    summary.interrupted = true;
                }
                joined = tasks.join_next() => {
                    let Some(joined) = joined else {
                        continue;
                    };
                    let settled = match joined {
                        Ok((id, outcome)) => self.settle(&id, outcome, &mut summary),
                        Err(e) => {
                            error!("Enrichment task failed: {}", e);
                            summary.failed += 1;
                            Ok(())
                        }
                    };
                    if let Err(e) = settled {
                        tasks.abort_all();
                        error!("Aborting run: {}", e);
                        return Err(e);
                    }
                }
            }
        }

        info!(
            "processed={} failed={} skipped={}",
            summary.processed, summary.failed, summary.skipped
        );

        Ok(summary)
    }

    /// Persist one outcome. Only fatal errors are returned.
    fn settle(
        &mut self,
        id: &str,
        outcome: Result<Enrichment>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let failure = match outcome {
            Ok(enrichment) => match self.store.write_enrichment(id, &enrichment) {
                Ok(()) => {
                    self.processed.mark(id)?;
                    summary.processed += 1;
                    debug!("Enriched {}", id);
                    return Ok(());
                }
                Err(e) => e,
            },
            Err(e) => e,
        };

        if failure.is_fatal() {
            return Err(failure);
        }

        warn!("Failed to enrich {}: {}", id, failure);
        summary.failed += 1;

        if matches!(
            failure,
            EnrichError::Parse(_) | EnrichError::EnrichmentFailed(_)
        ) {
            if let Err(e) = self.store.record_failure(id, &failure.to_string()) {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!("Could not record failure for {}: {}", id, e);
            }
        }

        Ok(())
    }
}

/// Worker body: everything except the store and the processed set.
async fn enrich_one(
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    id: String,
    transcript: String,
) -> TaskOutcome {
    let outcome = async {
        let prompt = build_enrichment_prompt(&transcript);
        let raw = complete_with_retry(provider.as_ref(), &prompt, &retry).await?;

        match parse_response(&raw) {
            ParsedResponse::Valid(mut enrichment) => {
                apply_reschedule_fallback(&mut enrichment, &transcript);
                Ok(enrichment)
            }
            ParsedResponse::Invalid { raw, reason } => {
                debug!("Unparseable reply for {}: {:?}", id, raw);
                Err(EnrichError::Parse(reason))
            }
        }
    }
    .await;

    (id, outcome)
}
