pub mod sqlite;
pub mod memory;

pub use sqlite::*;
pub use memory::*;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{Document, NewDocument};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// Persistence for summarized documents, keyed by an opaque id.
pub trait DocumentStore: Send + Sync {
    fn create(&self, document: NewDocument) -> Result<Document, DatabaseError>;

    /// Newest first.
    fn list(&self) -> Result<Vec<Document>, DatabaseError>;

    fn get(&self, id: &Uuid) -> Result<Option<Document>, DatabaseError>;

    /// `NotFound` when no document has this id.
    fn delete(&self, id: &Uuid) -> Result<(), DatabaseError>;
}

pub(crate) fn document_not_found(id: &Uuid) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: "document".into(),
        id: id.to_string(),
    }
}
