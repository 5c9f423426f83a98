use std::sync::LazyLock;

use regex::Regex;

use super::types::SummaryLength;

/// Characters of source text sent with a summary request.
pub const SUMMARY_INPUT_CHARS: usize = 50_000;

/// Characters of source text sent alongside the summary for suggestions.
pub const SUGGESTION_INPUT_CHARS: usize = 5_000;

pub const MAX_SUGGESTIONS: usize = 3;

/// Suggestions this short are list noise, not advice.
const MIN_SUGGESTION_CHARS: usize = 10;

const TRUNCATION_MARKER: &str = "...(truncated for processing)";

static LIST_NUMBERING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\s*").unwrap());

/// First `max_chars` characters of `text`, and whether anything was cut.
fn head_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

pub fn build_summary_prompt(text: &str, length: SummaryLength) -> String {
    let (head, truncated) = head_chars(text, SUMMARY_INPUT_CHARS);
    let marker = if truncated { TRUNCATION_MARKER } else { "" };

    format!(
        "Please provide a comprehensive summary of the following text {instruction}.\n\
         Focus on the main ideas, key points, and important details. Make it clear, well-structured, and actionable.\n\
         Use bullet points for key takeaways when appropriate.\n\
         \n\
         Text to summarize:\n\
         {head} {marker}\n",
        instruction = length.instruction(),
    )
}

pub fn build_suggestion_prompt(summary: &str, text: &str) -> String {
    let (head, _) = head_chars(text, SUGGESTION_INPUT_CHARS);

    format!(
        "Based on the following summary and original text, provide exactly {MAX_SUGGESTIONS} specific improvement suggestions.\n\
         Focus on:\n\
         1. Clarity and readability improvements\n\
         2. Structural organization enhancements\n\
         3. Missing critical information or better emphasis\n\
         \n\
         Return only the suggestions as a simple numbered list without additional commentary.\n\
         Each suggestion should be actionable and specific.\n\
         \n\
         Summary:\n\
         {summary}\n\
         \n\
         Original Text (first {SUGGESTION_INPUT_CHARS} chars):\n\
         {head}\n"
    )
}

/// Turn a numbered-list response into at most three suggestions.
pub fn parse_suggestions(response: &str) -> Vec<String> {
    response
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| LIST_NUMBERING.replace(line, "").trim().to_string())
        .filter(|s| s.chars().count() > MIN_SUGGESTION_CHARS)
        .take(MAX_SUGGESTIONS)
        .collect()
}
