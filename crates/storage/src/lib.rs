mod kv;

pub use kv::{FallbackStore, KeyValueStore, SessionStore};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use smartnotes_notes::{Note, NoteRepository};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        tracing::debug!(path = %path.display(), "Opened database");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_notes_created_at ON notes(created_at DESC);
            "#,
        )?;
        Ok(())
    }
}

fn row_to_note(id: String, source: String, content: String, created_ms: i64) -> Result<Note> {
    let id = Uuid::parse_str(&id).map_err(|e| StorageError::Corrupt(format!("note id {id}: {e}")))?;
    let created_at: DateTime<Utc> = DateTime::from_timestamp_millis(created_ms)
        .ok_or_else(|| StorageError::Corrupt(format!("note {id} timestamp {created_ms}")))?;
    Ok(Note {
        id,
        source,
        content,
        created_at,
    })
}

impl NoteRepository for Database {
    type Error = StorageError;

    fn save(&self, note: &Note) -> Result<()> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO notes (id, source, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            (
                note.id.to_string(),
                &note.source,
                &note.content,
                note.created_at.timestamp_millis(),
            ),
        )?;
        tracing::debug!(id = %note.id, source_len = note.source.len(), "Saved note");
        Ok(())
    }

    fn get(&self, id: &Uuid) -> Result<Note> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let (nid, source, content, created): (String, String, String, i64) = conn
            .query_row(
                "SELECT id, source, content, created_at FROM notes WHERE id = ?1",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StorageError::NotFound(format!("note {id}")),
                other => StorageError::DatabaseError(other),
            })?;
        row_to_note(nid, source, content, created)
    }

    fn list_all(&self) -> Result<Vec<Note>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, source, content, created_at FROM notes ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut notes = Vec::new();
        for row in rows {
            let (id, source, content, created) = row?;
            match row_to_note(id, source, content, created) {
                Ok(note) => notes.push(note),
                Err(e) => tracing::warn!("Skipping unreadable note: {}", e),
            }
        }
        Ok(notes)
    }

    fn delete(&self, id: &Uuid) -> Result<()> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let affected = conn.execute("DELETE FROM notes WHERE id = ?1", [id.to_string()])?;
        if affected == 0 {
            return Err(StorageError::NotFound(format!("note {id}")));
        }
        Ok(())
    }
}

impl KeyValueStore for Database {
    fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let raw: Option<String> = match conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [key],
            |row| row.get(0),
        ) {
            Ok(v) => Some(v),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(StorageError::from)
    }

    fn set_value(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let conn = self.conn.lock().expect("database mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            (key, json),
        )?;
        Ok(())
    }

    fn remove_value(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(())
    }
}
