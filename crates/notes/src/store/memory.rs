use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use notas_core::{NoteId, UserId};

use super::{NoteStore, NoteStoreError};
use crate::{Note, Profile};

#[derive(Debug, Default)]
struct Inner {
    notes: HashMap<NoteId, Note>,
    profiles: HashMap<UserId, Profile>,
}

#[derive(Debug, Default)]
pub struct InMemoryNoteStore {
    inner: RwLock<Inner>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn insert_note(&self, note: Note) -> Result<(), NoteStoreError> {
        self.inner.write().await.notes.insert(note.id, note);
        Ok(())
    }

    async fn get_note(&self, id: NoteId) -> Result<Option<Note>, NoteStoreError> {
        Ok(self.inner.read().await.notes.get(&id).cloned())
    }

    async fn list_notes_by_owner(&self, owner: UserId) -> Result<Vec<Note>, NoteStoreError> {
        Ok(self
            .inner
            .read()
            .await
            .notes
            .values()
            .filter(|n| n.owner == owner)
            .cloned()
            .collect())
    }

    async fn update_note(&self, note: Note) -> Result<bool, NoteStoreError> {
        let mut inner = self.inner.write().await;
        match inner.notes.get_mut(&note.id) {
            Some(slot) => {
                *slot = note;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_note(&self, id: NoteId) -> Result<bool, NoteStoreError> {
        let mut inner = self.inner.write().await;
        if inner.notes.remove(&id).is_none() {
            return Ok(false);
        }
        for profile in inner.profiles.values_mut() {
            profile.remove_favorite(id);
        }
        Ok(true)
    }

    async fn get_profile(&self, user: UserId) -> Result<Option<Profile>, NoteStoreError> {
        Ok(self.inner.read().await.profiles.get(&user).cloned())
    }

    async fn save_profile(&self, profile: Profile) -> Result<(), NoteStoreError> {
        self.inner.write().await.profiles.insert(profile.user_id, profile);
        Ok(())
    }

    async fn purge_owner(&self, user: UserId) -> Result<(), NoteStoreError> {
        let mut inner = self.inner.write().await;
        let owned: Vec<NoteId> = inner
            .notes
            .values()
            .filter(|n| n.owner == user)
            .map(|n| n.id)
            .collect();
        for id in &owned {
            inner.notes.remove(id);
        }
        inner.profiles.remove(&user);
        for profile in inner.profiles.values_mut() {
            profile.favorite_notes.retain(|n| !owned.contains(n));
        }
        Ok(())
    }
}
