use std::collections::VecDeque;
use std::sync::Mutex;

use super::prompt::{build_suggestion_prompt, build_summary_prompt, parse_suggestions};
use super::types::{Summarizer, SummaryLength, TextGenerator};
use super::SummarizeError;

/// Summarizer that drives any `TextGenerator` with the standard prompts.
pub struct PromptSummarizer<G> {
    generator: G,
}

impl<G: TextGenerator> PromptSummarizer<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }
}

impl<G: TextGenerator> Summarizer for PromptSummarizer<G> {
    fn summarize(&self, text: &str, length: SummaryLength) -> Result<String, SummarizeError> {
        let prompt = build_summary_prompt(text, length);
        let summary = self.generator.generate(&prompt)?;
        tracing::info!(
            length = length.as_str(),
            input_len = text.len(),
            summary_len = summary.len(),
            "Summary generated"
        );
        Ok(summary)
    }

    fn suggest(&self, summary: &str, text: &str) -> Result<Vec<String>, SummarizeError> {
        let prompt = build_suggestion_prompt(summary, text);
        let response = self.generator.generate(&prompt)?;
        let suggestions = parse_suggestions(&response);
        tracing::info!(count = suggestions.len(), "Suggestions generated");
        Ok(suggestions)
    }
}

/// Generator returning canned responses in call order, recording prompts.
pub struct MockTextGenerator {
    responses: Mutex<VecDeque<Result<String, SummarizeError>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn then_respond(self, response: &str) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Ok(response.to_string()));
        }
        self
    }

    pub fn then_fail(self, error: SummarizeError) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Err(error));
        }
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Default for MockTextGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TextGenerator for MockTextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, SummarizeError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or(Err(SummarizeError::EmptyResponse))
    }
}

/// Summarizer with fixed output, for workflow tests.
pub struct MockSummarizer {
    summary: String,
    suggestions: Vec<String>,
    fail_summary: bool,
    lengths: Mutex<Vec<SummaryLength>>,
}

impl MockSummarizer {
    pub fn new(summary: &str, suggestions: &[&str]) -> Self {
        Self {
            summary: summary.to_string(),
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
            fail_summary: false,
            lengths: Mutex::new(Vec::new()),
        }
    }

    /// Every `summarize` call fails with `MissingApiKey`.
    pub fn failing() -> Self {
        let mut mock = Self::new("", &[]);
        mock.fail_summary = true;
        mock
    }

    pub fn lengths_seen(&self) -> Vec<SummaryLength> {
        self.lengths.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl Summarizer for MockSummarizer {
    fn summarize(&self, _text: &str, length: SummaryLength) -> Result<String, SummarizeError> {
        if let Ok(mut lengths) = self.lengths.lock() {
            lengths.push(length);
        }
        if self.fail_summary {
            return Err(SummarizeError::MissingApiKey);
        }
        Ok(self.summary.clone())
    }

    fn suggest(&self, _summary: &str, _text: &str) -> Result<Vec<String>, SummarizeError> {
        Ok(self.suggestions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_sends_summary_prompt() {
        let summarizer =
            PromptSummarizer::new(MockTextGenerator::new().then_respond("A short summary."));
        let summary = summarizer
            .summarize("Revenue rose in the third quarter.", SummaryLength::Long)
            .unwrap();
        assert_eq!(summary, "A short summary.");

        let prompts = summarizer.generator().prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("max 300 words"));
        assert!(prompts[0].contains("Revenue rose in the third quarter."));
    }

    #[test]
    fn suggest_parses_generator_output() {
        let summarizer = PromptSummarizer::new(MockTextGenerator::new().then_respond(
            "1. State the main finding in the first line\n2. x\n3. Define every acronym on first use",
        ));
        let suggestions = summarizer.suggest("summary", "text").unwrap();
        assert_eq!(
            suggestions,
            vec![
                "State the main finding in the first line",
                "Define every acronym on first use"
            ]
        );
    }

    #[test]
    fn generator_errors_propagate() {
        let generator = MockTextGenerator::new().then_fail(SummarizeError::MissingApiKey);
        let summarizer = PromptSummarizer::new(generator);
        assert!(matches!(
            summarizer.summarize("text", SummaryLength::Short),
            Err(SummarizeError::MissingApiKey)
        ));
    }

    #[test]
    fn exhausted_mock_generator_is_empty_response() {
        let generator = MockTextGenerator::new();
        assert!(matches!(
            generator.generate("p"),
            Err(SummarizeError::EmptyResponse)
        ));
    }

    #[test]
    fn mock_summarizer_records_lengths() {
        let mock = MockSummarizer::new("s", &["one suggestion here"]);
        mock.summarize("t", SummaryLength::Short).unwrap();
        assert_eq!(mock.lengths_seen(), vec![SummaryLength::Short]);
        assert_eq!(mock.suggest("s", "t").unwrap(), vec!["one suggestion here"]);
        assert!(MockSummarizer::failing().summarize("t", SummaryLength::Medium).is_err());
    }
}
