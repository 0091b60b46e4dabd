use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Repository trait for note persistence.
/// Implemented by storage layer, allowing domain to remain decoupled.
pub trait NoteRepository: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn save(&self, note: &Note) -> Result<(), Self::Error>;
    fn get(&self, id: &Uuid) -> Result<Note, Self::Error>;
    /// All notes, newest first.
    fn list_all(&self) -> Result<Vec<Note>, Self::Error>;
    fn delete(&self, id: &Uuid) -> Result<(), Self::Error>;
}

/// A saved result: the selection it came from and the generated text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub source: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// First line of the content, shortened for list views.
    pub fn preview(&self, max_chars: usize) -> String {
        let first_line = self.content.lines().next().unwrap_or_default();
        if first_line.chars().count() <= max_chars {
            return first_line.to_string();
        }
        let cut: String = first_line.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
