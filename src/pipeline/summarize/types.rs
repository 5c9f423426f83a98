use serde::{Deserialize, Serialize};

use super::SummarizeError;

/// Requested summary size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl SummaryLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }

    /// Instruction appended to the summary prompt.
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Short => {
                "in 2-3 concise sentences, focusing only on the most critical points (max 60 words)"
            }
            Self::Medium => {
                "in 1-2 well-structured paragraphs, covering main ideas and key details (max 150 words)"
            }
            Self::Long => {
                "in 3-4 comprehensive paragraphs, providing thorough analysis and context (max 300 words)"
            }
        }
    }
}

impl std::str::FromStr for SummaryLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            other => Err(format!("unknown summary length: {other}")),
        }
    }
}

/// Prompt in, text out. One call per request, no streaming.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, SummarizeError>;
}

/// Summary and suggestion capability used by the upload workflow.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str, length: SummaryLength) -> Result<String, SummarizeError>;

    /// Up to three improvement suggestions for a summary of `text`.
    fn suggest(&self, summary: &str, text: &str) -> Result<Vec<String>, SummarizeError>;
}
