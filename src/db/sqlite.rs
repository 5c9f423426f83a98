use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{document_not_found, DatabaseError, DocumentStore};
use crate::models::{Document, FileKind, NewDocument};
use crate::pipeline::summarize::SummaryLength;

/// Open a SQLite connection to the given path and run migrations
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        include_str!("../../resources/migrations/001_documents.sql"),
    )];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| DatabaseError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

/// `DocumentStore` over one SQLite connection.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_database(path)?))
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

struct DocumentRow {
    id: String,
    filename: String,
    content: String,
    summary: String,
    suggestions: String,
    created_at: DateTime<Utc>,
    file_type: String,
    summary_length: String,
    user_id: Option<String>,
}

const SELECT_COLUMNS: &str = "SELECT id, filename, content, summary, suggestions, created_at,
     file_type, summary_length, user_id FROM documents";

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        filename: row.get(1)?,
        content: row.get(2)?,
        summary: row.get(3)?,
        suggestions: row.get(4)?,
        created_at: row.get(5)?,
        file_type: row.get(6)?,
        summary_length: row.get(7)?,
        user_id: row.get(8)?,
    })
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    Ok(Document {
        id: Uuid::parse_str(&row.id).map_err(|_| DatabaseError::InvalidEnum {
            field: "id".into(),
            value: row.id.clone(),
        })?,
        filename: row.filename,
        content: row.content,
        summary: row.summary,
        suggestions: serde_json::from_str(&row.suggestions)?,
        created_at: row.created_at,
        file_type: FileKind::from_str(&row.file_type)?,
        summary_length: SummaryLength::from_str(&row.summary_length).map_err(|_| {
            DatabaseError::InvalidEnum {
                field: "SummaryLength".into(),
                value: row.summary_length.clone(),
            }
        })?,
        user_id: row.user_id,
    })
}

impl DocumentStore for SqliteDocumentStore {
    fn create(&self, new: NewDocument) -> Result<Document, DatabaseError> {
        let document = new.into_document(Uuid::new_v4(), Utc::now());
        let suggestions = serde_json::to_string(&document.suggestions)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (id, filename, content, summary, suggestions, created_at,
                 file_type, summary_length, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    document.id.to_string(),
                    document.filename,
                    document.content,
                    document.summary,
                    suggestions,
                    document.created_at,
                    document.file_type.as_str(),
                    document.summary_length.as_str(),
                    document.user_id,
                ],
            )?;
            Ok(())
        })?;

        tracing::info!(
            id = %document.id,
            file_type = document.file_type.as_str(),
            "Document saved"
        );
        Ok(document)
    }

    fn list(&self) -> Result<Vec<Document>, DatabaseError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC"))?;
            let rows = stmt.query_map([], read_row)?;

            let mut documents = Vec::new();
            for row in rows {
                documents.push(document_from_row(row?)?);
            }
            Ok(documents)
        })
    }

    fn get(&self, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
            match stmt.query_row(params![id.to_string()], read_row) {
                Ok(row) => Ok(Some(document_from_row(row)?)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn delete(&self, id: &Uuid) -> Result<(), DatabaseError> {
        let deleted = self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM documents WHERE id = ?1", params![id.to_string()])?)
        })?;
        if deleted == 0 {
            return Err(document_not_found(id));
        }
        tracing::info!(id = %id, "Document deleted");
        Ok(())
    }
}
