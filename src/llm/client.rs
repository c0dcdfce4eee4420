use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

use crate::config::Settings;
use crate::llm::gemini::GeminiClient;
use crate::llm::groq::GroqClient;
use crate::EnrichError;

/// A hosted model that turns a prompt into text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Send one prompt and return the raw reply text.
    async fn complete(&self, prompt: &str) -> crate::Result<String>;
}

/// Build an LLM provider from runtime settings.
pub fn build_provider(settings: &Settings) -> Result<Arc<dyn LlmProvider>> {
    match settings.llm.provider.to_lowercase().as_str() {
        "groq" => Ok(Arc::new(GroqClient::from_settings(settings)?)),
        "gemini" => Ok(Arc::new(GeminiClient::from_settings(settings)?)),
        other => anyhow::bail!(
            "Unsupported llm.provider '{}'. Supported providers: groq, gemini",
            other
        ),
    }
}

/// Map a non-success HTTP response onto the error taxonomy.
pub(crate) fn classify_status(
    provider: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> EnrichError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            EnrichError::Auth(format!("{} rejected the API key ({})", provider, status))
        }
        StatusCode::TOO_MANY_REQUESTS => EnrichError::RateLimited {
            retry_after: retry_after(headers),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => EnrichError::Timeout,
        s if s.is_server_error() => {
            EnrichError::Unavailable(format!("{} returned {}: {}", provider, s, snippet(body)))
        }
        s => EnrichError::EnrichmentFailed(format!(
            "{} returned {}: {}",
            provider,
            s,
            snippet(body)
        )),
    }
}

/// Map a transport-level failure onto the error taxonomy.
pub(crate) fn classify_transport(provider: &str, err: reqwest::Error) -> EnrichError {
    if err.is_timeout() {
        EnrichError::Timeout
    } else if err.is_connect() {
        EnrichError::Connectivity(format!("cannot reach {}: {}", provider, err))
    } else if err.is_decode() {
        EnrichError::EnrichmentFailed(format!("{} sent an undecodable body: {}", provider, err))
    } else {
        EnrichError::Unavailable(format!("{} request failed: {}", provider, err))
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
