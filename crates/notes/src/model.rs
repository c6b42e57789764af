use chrono::{DateTime, Utc};
use serde::Serialize;

use notas_core::{DomainError, DomainResult, Entity, NoteId, UserId};

pub const TITLE_MAX_CHARS: usize = 255;
pub const DISPLAY_NAME_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub owner: UserId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Note {
    type Id = NoteId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Validated title and content for a create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    title: String,
    content: String,
}

impl NoteDraft {
    pub fn new(title: &str, content: &str) -> DomainResult<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("title must not be blank"));
        }
        if title.chars().count() > TITLE_MAX_CHARS {
            return Err(DomainError::validation(format!(
                "title must be at most {TITLE_MAX_CHARS} characters"
            )));
        }
        if content.trim().is_empty() {
            return Err(DomainError::validation("content must not be blank"));
        }
        Ok(Self {
            title: title.to_string(),
            content: content.to_string(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Per-user profile, created lazily on first access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: UserId,
    pub display_name: Option<String>,
    /// Favorite notes in the order they were added; no duplicates.
    pub favorite_notes: Vec<NoteId>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn empty(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            display_name: None,
            favorite_notes: Vec::new(),
            updated_at: now,
        }
    }

    /// Returns whether the list changed.
    pub fn add_favorite(&mut self, note: NoteId) -> bool {
        if self.favorite_notes.contains(&note) {
            return false;
        }
        self.favorite_notes.push(note);
        true
    }

    pub fn remove_favorite(&mut self, note: NoteId) -> bool {
        let before = self.favorite_notes.len();
        self.favorite_notes.retain(|n| *n != note);
        before != self.favorite_notes.len()
    }
}
