//! LLM module for callsift
//!
//! Prompt construction, provider clients (Groq, Gemini) and retry handling.

mod client;
mod gemini;
mod groq;
mod prompts;
mod retry;

pub use client::{build_provider, LlmProvider};
pub use gemini::GeminiClient;
pub use groq::GroqClient;
pub use prompts::build_enrichment_prompt;
pub use retry::{complete_with_retry, RetryPolicy};
