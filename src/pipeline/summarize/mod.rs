pub mod types;
pub mod prompt;
pub mod gemini;
pub mod summarizer;

pub use types::*;
pub use prompt::*;
pub use gemini::*;
pub use summarizer::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("Gemini API key is required. Set GEMINI_API_KEY to continue.")]
    MissingApiKey,

    #[error("Could not reach the summarization service at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Summarization service returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Summarization service returned no text")]
    EmptyResponse,
}
