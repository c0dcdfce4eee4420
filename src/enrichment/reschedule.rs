//! Find callback / reschedule phrases directly in a transcript.
//!
//! Used when the model leaves the reschedule field empty even though the
//! caller named a day or time.

use regex::Regex;
use std::sync::OnceLock;

use crate::storage::Enrichment;

fn phrase_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?ix)
            \b(?:
                (?:
                    day\s+after\s+tomorrow | tomorrow | today | tonight
                  | this\s+(?:morning|afternoon|evening|weekend)
                  | next\s+(?:week|month|weekend|monday|tuesday|wednesday|thursday|friday|saturday|sunday)
                  | (?:on\s+)?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)
                )
                (?:\s+(?:morning|afternoon|evening|night))?
                (?:\s+(?:at|after|around|by|before)\s+\d{1,2}(?:[:.]\d{2})?(?:\s*(?:am|pm|a\.m\.|p\.m\.|o'clock))?)?
              | (?:at|after|around|by|before)\s+\d{1,2}[:.]\d{2}(?:\s*(?:am|pm|a\.m\.|p\.m\.|o'clock))?
              | (?:at|after|around|by|before)\s+\d{1,2}\s*(?:am|pm|a\.m\.|p\.m\.|o'clock)
            )",
        )
        .expect("valid reschedule pattern")
    })
}

fn callback_cue() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:call|calling|callback|ring|reschedule|talk|speak|meet|connect|contact)\b",
        )
        .expect("valid callback cue pattern")
    })
}

fn refusal_cue() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:don'?t|do\s+not|never|stop|no\s+need\s+to)\s+(?:\w+\s+)?(?:call|calling|ring|contact)",
        )
        .expect("valid refusal cue pattern")
    })
}

/// The sentence of `text` that contains byte offset `at`.
fn sentence_around(text: &str, at: usize) -> &str {
    let is_break = |c: char| matches!(c, '.' | '!' | '?' | '\n');
    let start = text[..at].rfind(is_break).map(|i| i + 1).unwrap_or(0);
    let end = text[at..]
        .find(is_break)
        .map(|i| at + i)
        .unwrap_or(text.len());
    &text[start..end]
}

/// First date/time phrase that reads like a callback arrangement.
///
/// A phrase with a clock time counts; a bare day word ("tomorrow", "Friday")
/// only counts when its sentence talks about calling or meeting. Sentences
/// that turn a call down ("don't call again") never count.
pub fn detect_reschedule_phrase(transcript: &str) -> Option<String> {
    phrase_pattern().find_iter(transcript).find_map(|m| {
        let phrase = m.as_str().trim();
        let sentence = sentence_around(transcript, m.start());
        if refusal_cue().is_match(sentence) {
            return None;
        }
        let has_time = phrase.chars().any(|c| c.is_ascii_digit());
        if has_time || callback_cue().is_match(sentence) {
            Some(phrase.to_string())
        } else {
            None
        }
    })
}

/// Fill the reschedule fields from the transcript when the model left them empty.
pub fn apply_reschedule_fallback(enrichment: &mut Enrichment, transcript: &str) {
    if enrichment.reschedule_detail.is_some() {
        enrichment.reschedule_mentioned = true;
        return;
    }

    if let Some(phrase) = detect_reschedule_phrase(transcript) {
        enrichment.reschedule_mentioned = true;
        enrichment.reschedule_detail = Some(phrase);
    }
}
