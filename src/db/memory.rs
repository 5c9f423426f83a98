use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use super::{document_not_found, DatabaseError, DocumentStore};
use crate::models::{Document, NewDocument};

/// Non-persistent store, kept in insertion order.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<Vec<Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn create(&self, new: NewDocument) -> Result<Document, DatabaseError> {
        let document = new.into_document(Uuid::new_v4(), Utc::now());
        self.documents
            .lock()
            .map_err(|_| DatabaseError::LockPoisoned)?
            .push(document.clone());
        Ok(document)
    }

    fn list(&self) -> Result<Vec<Document>, DatabaseError> {
        let documents = self.documents.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let mut newest_first: Vec<Document> = documents.iter().rev().cloned().collect();
        // Stable: equal timestamps keep the later insert first.
        newest_first.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(newest_first)
    }

    fn get(&self, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
        let documents = self.documents.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        Ok(documents.iter().find(|d| d.id == *id).cloned())
    }

    fn delete(&self, id: &Uuid) -> Result<(), DatabaseError> {
        let mut documents = self.documents.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let before = documents.len();
        documents.retain(|d| d.id != *id);
        if documents.len() == before {
            return Err(document_not_found(id));
        }
        Ok(())
    }
}
