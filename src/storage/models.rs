//! Data models for storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller sentiment as judged from the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }
}

/// How interested the customer sounded in the offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestLevel {
    Interested,
    NotSure,
    NotInterested,
}

impl InterestLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interested => "interested",
            Self::NotSure => "not_sure",
            Self::NotInterested => "not_interested",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "interested" => Some(Self::Interested),
            "not_sure" => Some(Self::NotSure),
            "not_interested" => Some(Self::NotInterested),
            _ => None,
        }
    }

    /// Map a 0-10 score onto the three levels.
    pub fn from_score(score: f64) -> Option<Self> {
        if !(0.0..=10.0).contains(&score) {
            return None;
        }
        Some(if score >= 7.0 {
            Self::Interested
        } else if score >= 4.0 {
            Self::NotSure
        } else {
            Self::NotInterested
        })
    }
}

/// Fields extracted from a transcript by the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub summary: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub age: Option<String>,
    pub date_of_birth: Option<String>,
    pub reschedule_mentioned: bool,
    pub reschedule_detail: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub interest_level: Option<InterestLevel>,
}

/// A stored call transcript and its enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// Unique identifier (the source file name when imported from disk)
    pub id: String,

    /// Original file name, if the transcript came from a file
    pub source: Option<String>,

    /// Caller number taken from the recording metadata
    pub caller_phone: Option<String>,

    /// Time of the call taken from the recording metadata
    pub call_time: Option<String>,

    /// Raw transcript text
    pub transcript: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Extracted fields, absent until processed
    pub enrichment: Option<Enrichment>,

    /// When the enrichment was written
    pub enriched_at: Option<DateTime<Utc>>,

    /// Runs in which this record failed to enrich
    pub failed_attempts: u32,

    /// Most recent failure reason
    pub last_error: Option<String>,
}

impl CallRecord {
    /// Create a new unprocessed record
    pub fn new(id: impl Into<String>, transcript: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: None,
            caller_phone: None,
            call_time: None,
            transcript: transcript.into(),
            created_at: Utc::now(),
            enrichment: None,
            enriched_at: None,
            failed_attempts: 0,
            last_error: None,
        }
    }

    /// Create a record with a generated identifier
    pub fn with_generated_id(transcript: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), transcript)
    }

    pub fn is_enriched(&self) -> bool {
        self.enrichment.is_some()
    }
}
