/// Build the deterministic extraction prompt for one call transcript.
///
/// The requested keys and their order never change, so replies keep the same
/// shape from call to call.
pub fn build_enrichment_prompt(transcript: &str) -> String {
    format!(
        "You analyse phone call transcripts between a sales agent and a customer.\n\
Perform the following analysis on the transcript below:\n\
- Summarize the conversation in 2-4 clear, factual sentences.\n\
- Extract the customer's name, location, phone number, age and date of birth.\n\
- Extract any mention of a time to call back or reschedule (for example \"tomorrow at 7\", \"next Tuesday\", \"after 9:30\").\n\
- Classify the customer's sentiment as exactly one of: positive, neutral, negative.\n\
- Classify the customer's interest as exactly one of: Interested, Not sure, Not Interested.\n\
\n\
Rules:\n\
- Use only information present in the transcript.\n\
- Use null for anything that is not mentioned.\n\
- Respond with a single valid JSON object and no other text.\n\
\n\
Respond in exactly this shape:\n\
{{\n\
  \"summary\": \"...\",\n\
  \"entities\": {{\n\
    \"name\": \"...\",\n\
    \"location\": \"...\",\n\
    \"phone_number\": \"...\",\n\
    \"age\": \"...\",\n\
    \"dob\": \"...\",\n\
    \"call_reschedule_time\": \"...\"\n\
  }},\n\
  \"sentiment\": \"...\",\n\
  \"customer_interest\": \"...\"\n\
}}\n\
\n\
Transcript:\n\
{transcript}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_stable_and_embeds_transcript() {
        let a = build_enrichment_prompt("Agent: hello\nCustomer: hi");
        let b = build_enrichment_prompt("Agent: hello\nCustomer: hi");
        assert_eq!(a, b);
        assert!(a.ends_with("Customer: hi"));
    }

    #[test]
    fn prompt_requests_fields_in_fixed_order() {
        let prompt = build_enrichment_prompt("x");
        let keys = [
            "\"summary\"",
            "\"name\"",
            "\"location\"",
            "\"phone_number\"",
            "\"age\"",
            "\"dob\"",
            "\"call_reschedule_time\"",
            "\"sentiment\"",
            "\"customer_interest\"",
        ];
        let positions: Vec<usize> = keys
            .iter()
            .map(|k| prompt.find(k).unwrap_or_else(|| panic!("missing {k}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
