//! Tolerant extraction of enrichment fields from free-text model replies.
//!
//! Models are asked for JSON but do not always comply: replies arrive wrapped in
//! prose or code fences, with trailing commas, with fields flattened or nested,
//! or as `Label: value` lines. Anything recognisable is kept; anything missing
//! is absent. Only a reply with no recognisable field at all is invalid.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::storage::{Enrichment, InterestLevel, Sentiment};

/// Result of parsing one model reply
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Valid(Enrichment),
    Invalid { raw: String, reason: String },
}

impl ParsedResponse {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Summary,
    Name,
    Phone,
    Location,
    Age,
    DateOfBirth,
    RescheduleMentioned,
    RescheduleDetail,
    Sentiment,
    Interest,
}

fn field_for_key(key: &str) -> Option<Field> {
    let key: String = key
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let field = match key.trim_matches('_') {
        "summary" | "call_summary" | "conversation_summary" => Field::Summary,
        "name" | "customer_name" | "caller_name" | "full_name" => Field::Name,
        "phone" | "phone_number" | "phone_no" | "contact_number" | "mobile" | "mobile_number" => {
            Field::Phone
        }
        "location" | "city" | "address" => Field::Location,
        "age" => Field::Age,
        "dob" | "date_of_birth" | "birth_date" | "birthdate" => Field::DateOfBirth,
        "reschedule_mentioned" | "reschedule_requested" => Field::RescheduleMentioned,
        "call_reschedule_time" | "reschedule_time" | "reschedule" | "reschedule_detail"
        | "callback_time" | "call_back_time" => Field::RescheduleDetail,
        "sentiment" | "customer_sentiment" => Field::Sentiment,
        "customer_interest" | "interest" | "interest_level" => Field::Interest,
        _ => return None,
    };
    Some(field)
}

/// Field values gathered from a reply; the first value seen for a field wins.
///
/// `present` counts known fields that carried a real value. Placeholders such
/// as `"..."` or `N/A` are kept as absent and do not count.
#[derive(Debug, Default)]
struct Collected {
    present: usize,
    values: Vec<(Field, Option<String>)>,
}

impl Collected {
    fn push(&mut self, field: Field, value: Option<String>) {
        if value.is_some() {
            self.present += 1;
        }
        if !self.values.iter().any(|(f, v)| *f == field && v.is_some()) {
            self.values.retain(|(f, _)| *f != field);
            self.values.push((field, value));
        }
    }

    fn get(&self, field: Field) -> Option<&str> {
        self.values
            .iter()
            .find(|(f, _)| *f == field)
            .and_then(|(_, v)| v.as_deref())
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        let mut collected = Self::default();
        collected.walk(object, 0);
        collected
    }

    fn walk(&mut self, object: &Map<String, Value>, depth: usize) {
        for (key, value) in object {
            match (field_for_key(key), value) {
                (_, Value::Object(nested)) if depth < 2 => self.walk(nested, depth + 1),
                (Some(field), value) => self.push(field, json_text(value)),
                (None, _) => {}
            }
        }
    }

    fn from_labeled_lines(text: &str) -> Self {
        let mut collected = Self::default();
        for line in text.lines() {
            let line = line
                .trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || "-*•#.) ".contains(c))
                .replace("**", "");
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            // Labels are short; a colon deep inside a sentence is prose
            if key.split_whitespace().count() > 4 {
                continue;
            }
            if let Some(field) = field_for_key(key) {
                collected.push(field, clean_value(value));
            }
        }
        collected
    }

    fn into_enrichment(self) -> Enrichment {
        let detail = self.get(Field::RescheduleDetail).map(str::to_string);
        let mentioned = self
            .get(Field::RescheduleMentioned)
            .and_then(parse_flag)
            .unwrap_or(false)
            || detail.is_some();

        Enrichment {
            summary: self.get(Field::Summary).map(str::to_string),
            name: self.get(Field::Name).map(str::to_string),
            phone: self.get(Field::Phone).map(str::to_string),
            location: self.get(Field::Location).map(str::to_string),
            age: self.get(Field::Age).map(str::to_string),
            date_of_birth: self.get(Field::DateOfBirth).map(str::to_string),
            reschedule_mentioned: mentioned,
            reschedule_detail: detail,
            sentiment: self.get(Field::Sentiment).and_then(parse_sentiment),
            interest_level: self.get(Field::Interest).and_then(parse_interest),
        }
    }
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_value(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(json_text).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        Value::Null | Value::Object(_) => None,
    }
}

/// Trim a value and drop the placeholders models use for "not mentioned".
fn clean_value(raw: &str) -> Option<String> {
    let value = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == ',')
        .trim();
    let lower = value.to_lowercase();

    let placeholder = matches!(
        lower.as_str(),
        "" | "n/a" | "na" | "null" | "none" | "nil" | "unknown" | "-" | "..." | "not available"
    ) || lower.starts_with("not mentioned")
        || lower.starts_with("not provided")
        || lower.starts_with("not specified")
        || lower.starts_with("no mention");

    if placeholder {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn parse_sentiment(value: &str) -> Option<Sentiment> {
    let lower = value.to_lowercase();
    if lower.contains("negative") {
        Some(Sentiment::Negative)
    } else if lower.contains("positive") {
        Some(Sentiment::Positive)
    } else if lower.contains("neutral") {
        Some(Sentiment::Neutral)
    } else {
        None
    }
}

fn parse_interest(value: &str) -> Option<InterestLevel> {
    let lower = value.to_lowercase().replace(&['_', '-'][..], " ");
    let lower = lower.trim();

    if let Ok(score) = lower.trim_end_matches("/10").trim().parse::<f64>() {
        return InterestLevel::from_score(score);
    }

    if lower.contains("not interested")
        || lower.contains("uninterested")
        || lower.contains("no interest")
        || lower == "low"
    {
        Some(InterestLevel::NotInterested)
    } else if ["not sure", "unsure", "maybe", "undecided", "uncertain", "neutral", "medium"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        Some(InterestLevel::NotSure)
    } else if lower.contains("interested") || lower == "high" || lower == "yes" {
        Some(InterestLevel::Interested)
    } else {
        None
    }
}

fn trailing_comma() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r",\s*([}\]])").expect("valid trailing comma pattern"))
}

fn fenced_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```[a-zA-Z]*\s*(.*?)```").expect("valid fenced block pattern")
    })
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    let attempt = |text: &str| match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        Ok(Value::Array(items)) => items.into_iter().find_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        }),
        _ => None,
    };

    attempt(candidate).or_else(|| attempt(&trailing_comma().replace_all(candidate, "$1")))
}

/// Locate the JSON object inside a reply that may carry prose or code fences.
fn find_json_object(text: &str) -> Option<Map<String, Value>> {
    if let Some(map) = parse_object(text) {
        return Some(map);
    }

    for caps in fenced_block().captures_iter(text) {
        if let Some(map) = parse_object(caps[1].trim()) {
            return Some(map);
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Some(map) = parse_object(&text[start..=end]) {
                return Some(map);
            }
        }
    }

    // Prose with stray braces: try each balanced span in turn
    for (start, _) in text.match_indices('{') {
        if let Some(end) = balanced_end(&text[start..]) {
            if let Some(map) = parse_object(&text[start..start + end]) {
                return Some(map);
            }
        }
    }

    None
}

/// Byte length of the brace-balanced span at the start of `text`.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a raw model reply into enrichment fields.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let text = raw.trim();
    let invalid = |reason: &str| ParsedResponse::Invalid {
        raw: raw.to_string(),
        reason: reason.to_string(),
    };

    if text.is_empty() {
        return invalid("empty reply");
    }

    if let Some(object) = find_json_object(text) {
        let collected = Collected::from_object(&object);
        if collected.present > 0 {
            return ParsedResponse::Valid(collected.into_enrichment());
        }
    }

    let collected = Collected::from_labeled_lines(text);
    if collected.present > 0 {
        return ParsedResponse::Valid(collected.into_enrichment());
    }

    invalid("no JSON object or labelled fields with a value found")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(raw: &str) -> Enrichment {
        match parse_response(raw) {
            ParsedResponse::Valid(e) => e,
            ParsedResponse::Invalid { reason, .. } => panic!("expected valid parse: {reason}"),
        }
    }

    #[test]
    fn parses_well_formed_reply() {
        let e = valid(
            r#"{
                "summary": "Customer wants a callback about the loan.",
                "entities": {
                    "name": "Anita Sharma",
                    "location": "Pune",
                    "phone_number": "9876543210",
                    "age": 34,
                    "dob": null,
                    "call_reschedule_time": "tomorrow at 7"
                },
                "sentiment": "Positive",
                "customer_interest": "Interested"
            }"#,
        );

        assert_eq!(e.summary.as_deref(), Some("Customer wants a callback about the loan."));
        assert_eq!(e.name.as_deref(), Some("Anita Sharma"));
        assert_eq!(e.location.as_deref(), Some("Pune"));
        assert_eq!(e.phone.as_deref(), Some("9876543210"));
        assert_eq!(e.age.as_deref(), Some("34"));
        assert_eq!(e.date_of_birth, None);
        assert!(e.reschedule_mentioned);
        assert_eq!(e.reschedule_detail.as_deref(), Some("tomorrow at 7"));
        assert_eq!(e.sentiment, Some(Sentiment::Positive));
        assert_eq!(e.interest_level, Some(InterestLevel::Interested));
    }

    #[test]
    fn tolerates_prose_and_code_fences() {
        let e = valid(
            "Sure! Here is the analysis you asked for:\n```json\n{\"summary\": \"Short call.\", \"sentiment\": \"neutral\"}\n```\nLet me know if you need more.",
        );
        assert_eq!(e.summary.as_deref(), Some("Short call."));
        assert_eq!(e.sentiment, Some(Sentiment::Neutral));
    }

    #[test]
    fn missing_fields_are_absent_not_errors() {
        let e = valid(r#"{"summary": "Wrong number."}"#);
        assert_eq!(e.summary.as_deref(), Some("Wrong number."));
        assert_eq!(e.name, None);
        assert_eq!(e.sentiment, None);
        assert_eq!(e.interest_level, None);
        assert!(!e.reschedule_mentioned);
        assert_eq!(e.reschedule_detail, None);
    }

    #[test]
    fn placeholders_count_as_absent() {
        let e = valid(
            r#"{"summary": "Busy.", "entities": {"name": "N/A", "location": "Not mentioned in the call", "call_reschedule_time": "None"}}"#,
        );
        assert_eq!(e.name, None);
        assert_eq!(e.location, None);
        assert!(!e.reschedule_mentioned);
    }

    #[test]
    fn repairs_trailing_commas() {
        let e = valid("{\"summary\": \"Asked for pricing.\", \"customer_interest\": \"Not sure\",}");
        assert_eq!(e.interest_level, Some(InterestLevel::NotSure));
    }

    #[test]
    fn skips_stray_braces_in_prose() {
        let e = valid(
            "Template {name} was filled. Result: {\"summary\": \"Declined offer.\", \"customer_interest\": \"Not Interested\"} thanks {bye}",
        );
        assert_eq!(e.summary.as_deref(), Some("Declined offer."));
        assert_eq!(e.interest_level, Some(InterestLevel::NotInterested));
    }

    #[test]
    fn falls_back_to_labelled_lines() {
        let e = valid(
            "Here is what I found:\n**Summary:** The caller asked to be called back.\n- Name: Rahul\n- Sentiment: negative\n- Customer interest: 8/10\n- Call reschedule time: after 9:30",
        );
        assert_eq!(e.summary.as_deref(), Some("The caller asked to be called back."));
        assert_eq!(e.name.as_deref(), Some("Rahul"));
        assert_eq!(e.sentiment, Some(Sentiment::Negative));
        assert_eq!(e.interest_level, Some(InterestLevel::Interested));
        assert_eq!(e.reschedule_detail.as_deref(), Some("after 9:30"));
    }

    #[test]
    fn unstructured_text_is_invalid() {
        let reply = "I'm sorry, I can't help with that request.";
        match parse_response(reply) {
            ParsedResponse::Invalid { raw, .. } => assert_eq!(raw, reply),
            ParsedResponse::Valid(e) => panic!("expected invalid, got {e:?}"),
        }
        assert!(!parse_response("").is_valid());
        assert!(!parse_response("{ not json at all").is_valid());
    }

    #[test]
    fn unknown_labels_do_not_validate_a_reply() {
        assert!(!parse_response("{\"foo\": 1, \"bar\": {\"baz\": 2}}").is_valid());
        assert!(!parse_response("Note: the call dropped after ten seconds.").is_valid());
    }

    #[test]
    fn template_echo_is_invalid() {
        let echo = r#"{
  "summary": "...",
  "entities": {
    "name": "...",
    "location": "...",
    "phone_number": "...",
    "age": "...",
    "dob": "...",
    "call_reschedule_time": "..."
  },
  "sentiment": "...",
  "customer_interest": "..."
}"#;
        match parse_response(echo) {
            ParsedResponse::Invalid { raw, .. } => assert_eq!(raw, echo),
            ParsedResponse::Valid(e) => panic!("expected invalid, got {e:?}"),
        }
    }

    #[test]
    fn reply_with_only_placeholders_is_invalid() {
        assert!(!parse_response(
            r#"{"summary": null, "entities": {"name": "N/A", "location": "unknown"}, "sentiment": "none"}"#
        )
        .is_valid());
        assert!(!parse_response("Summary: N/A\nName: unknown\nSentiment: -").is_valid());
    }

    #[test]
    fn explicit_reschedule_flag_is_honoured() {
        let e = valid(r#"{"summary": "x", "reschedule_mentioned": true}"#);
        assert!(e.reschedule_mentioned);
        assert_eq!(e.reschedule_detail, None);
    }

    #[test]
    fn interest_labels_cover_common_phrasings() {
        assert_eq!(parse_interest("Not Interested"), Some(InterestLevel::NotInterested));
        assert_eq!(parse_interest("not_sure"), Some(InterestLevel::NotSure));
        assert_eq!(parse_interest("Maybe later"), Some(InterestLevel::NotSure));
        assert_eq!(parse_interest("Very interested"), Some(InterestLevel::Interested));
        assert_eq!(parse_interest("2"), Some(InterestLevel::NotInterested));
        assert_eq!(parse_interest("purple"), None);
    }
}
