use async_trait::async_trait;
use thiserror::Error;

use notas_core::{DomainError, NoteId, UserId};

use crate::{Note, Profile};

mod memory;

pub use memory::InMemoryNoteStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NoteStoreError {
    #[error("note store unavailable: {0}")]
    Unavailable(String),
}

impl From<NoteStoreError> for DomainError {
    fn from(err: NoteStoreError) -> Self {
        match err {
            NoteStoreError::Unavailable(msg) => DomainError::internal(msg),
        }
    }
}

/// Persistence for notes and profiles.
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn insert_note(&self, note: Note) -> Result<(), NoteStoreError>;

    async fn get_note(&self, id: NoteId) -> Result<Option<Note>, NoteStoreError>;

    async fn list_notes_by_owner(&self, owner: UserId) -> Result<Vec<Note>, NoteStoreError>;

    /// Returns false when the note no longer exists.
    async fn update_note(&self, note: Note) -> Result<bool, NoteStoreError>;

    /// Deletes the note and drops it from every favorites list.
    async fn delete_note(&self, id: NoteId) -> Result<bool, NoteStoreError>;

    async fn get_profile(&self, user: UserId) -> Result<Option<Profile>, NoteStoreError>;

    async fn save_profile(&self, profile: Profile) -> Result<(), NoteStoreError>;

    /// Removes every note and the profile owned by `user`.
    async fn purge_owner(&self, user: UserId) -> Result<(), NoteStoreError>;
}
