use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::FileKind;
use crate::pipeline::summarize::SummaryLength;

/// A summarized upload as kept in the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    /// Extracted text.
    pub content: String,
    pub summary: String,
    pub suggestions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub file_type: FileKind,
    pub summary_length: SummaryLength,
    pub user_id: Option<String>,
}

/// Fields supplied by the caller; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub filename: String,
    pub content: String,
    pub summary: String,
    pub suggestions: Vec<String>,
    pub file_type: FileKind,
    pub summary_length: SummaryLength,
    pub user_id: Option<String>,
}

impl NewDocument {
    pub fn into_document(self, id: Uuid, created_at: DateTime<Utc>) -> Document {
        Document {
            id,
            filename: self.filename,
            content: self.content,
            summary: self.summary,
            suggestions: self.suggestions,
            created_at,
            file_type: self.file_type,
            summary_length: self.summary_length,
            user_id: self.user_id,
        }
    }
}
