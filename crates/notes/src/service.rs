//! Owner-scoped operations on notes and profiles.
//!
//! Every call takes the caller's identity explicitly; nothing is read from
//! ambient state.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use notas_auth::{AccountCleanup, AuthenticatedIdentity};
use notas_core::{DomainError, DomainResult, NoteId, UserId};

use crate::{
    Note, NoteDraft, NoteStore, Profile,
    model::DISPLAY_NAME_MAX_CHARS,
};

#[derive(Clone)]
pub struct NoteService {
    store: Arc<dyn NoteStore>,
}

impl NoteService {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, caller: &AuthenticatedIdentity, draft: NoteDraft) -> DomainResult<Note> {
        let now = Utc::now();
        let note = Note {
            id: NoteId::new(),
            owner: caller.user_id,
            title: draft.title().to_string(),
            content: draft.content().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_note(note.clone()).await?;
        tracing::debug!(note_id = %note.id, owner = %note.owner, "note created");
        Ok(note)
    }

    /// The caller's notes, newest first.
    pub async fn list(&self, caller: &AuthenticatedIdentity) -> DomainResult<Vec<Note>> {
        let mut notes = self.store.list_notes_by_owner(caller.user_id).await?;
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(notes)
    }

    pub async fn get(&self, caller: &AuthenticatedIdentity, id: NoteId) -> DomainResult<Note> {
        self.owned_note(caller, id).await
    }

    pub async fn update(
        &self,
        caller: &AuthenticatedIdentity,
        id: NoteId,
        draft: NoteDraft,
    ) -> DomainResult<Note> {
        let mut note = self.owned_note(caller, id).await?;
        note.title = draft.title().to_string();
        note.content = draft.content().to_string();
        note.updated_at = Utc::now();

        if !self.store.update_note(note.clone()).await? {
            return Err(not_found(id));
        }
        Ok(note)
    }

    pub async fn delete(&self, caller: &AuthenticatedIdentity, id: NoteId) -> DomainResult<()> {
        self.owned_note(caller, id).await?;
        if !self.store.delete_note(id).await? {
            return Err(not_found(id));
        }
        tracing::debug!(note_id = %id, "note deleted");
        Ok(())
    }

    pub async fn profile(&self, caller: &AuthenticatedIdentity, user: UserId) -> DomainResult<Profile> {
        ensure_can_act_for(caller, user)?;
        self.load_or_create_profile(user).await
    }

    pub async fn update_profile(
        &self,
        caller: &AuthenticatedIdentity,
        user: UserId,
        display_name: Option<String>,
    ) -> DomainResult<Profile> {
        ensure_can_act_for(caller, user)?;

        let display_name = display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if display_name
            .as_ref()
            .is_some_and(|n| n.chars().count() > DISPLAY_NAME_MAX_CHARS)
        {
            return Err(DomainError::validation(format!(
                "displayName must be at most {DISPLAY_NAME_MAX_CHARS} characters"
            )));
        }

        let mut profile = self.load_or_create_profile(user).await?;
        profile.display_name = display_name;
        profile.updated_at = Utc::now();
        self.store.save_profile(profile.clone()).await?;
        Ok(profile)
    }

    /// Idempotent. The note must exist and belong to `user`.
    pub async fn add_favorite(
        &self,
        caller: &AuthenticatedIdentity,
        user: UserId,
        note_id: NoteId,
    ) -> DomainResult<Profile> {
        ensure_can_act_for(caller, user)?;

        let note = self
            .store
            .get_note(note_id)
            .await?
            .ok_or_else(|| not_found(note_id))?;
        if note.owner != user {
            return Err(DomainError::forbidden("only your own notes can be favorites"));
        }

        let mut profile = self.load_or_create_profile(user).await?;
        if profile.add_favorite(note_id) {
            profile.updated_at = Utc::now();
            self.store.save_profile(profile.clone()).await?;
        }
        Ok(profile)
    }

    /// Idempotent.
    pub async fn remove_favorite(
        &self,
        caller: &AuthenticatedIdentity,
        user: UserId,
        note_id: NoteId,
    ) -> DomainResult<Profile> {
        ensure_can_act_for(caller, user)?;

        let mut profile = self.load_or_create_profile(user).await?;
        if profile.remove_favorite(note_id) {
            profile.updated_at = Utc::now();
            self.store.save_profile(profile.clone()).await?;
        }
        Ok(profile)
    }

    async fn owned_note(&self, caller: &AuthenticatedIdentity, id: NoteId) -> DomainResult<Note> {
        let note = self.store.get_note(id).await?.ok_or_else(|| not_found(id))?;
        if note.owner != caller.user_id {
            tracing::warn!(note_id = %id, caller = %caller.user_id, "access to foreign note denied");
            return Err(DomainError::forbidden("you do not own this note"));
        }
        Ok(note)
    }

    async fn load_or_create_profile(&self, user: UserId) -> DomainResult<Profile> {
        if let Some(profile) = self.store.get_profile(user).await? {
            return Ok(profile);
        }
        let profile = Profile::empty(user, Utc::now());
        self.store.save_profile(profile.clone()).await?;
        Ok(profile)
    }
}

#[async_trait]
impl AccountCleanup for NoteService {
    async fn purge_user_data(&self, user_id: UserId) -> DomainResult<()> {
        self.store.purge_owner(user_id).await?;
        Ok(())
    }
}

fn ensure_can_act_for(caller: &AuthenticatedIdentity, user: UserId) -> DomainResult<()> {
    if caller.can_act_for(user) {
        Ok(())
    } else {
        Err(DomainError::forbidden("you may only access your own profile"))
    }
}

fn not_found(id: NoteId) -> DomainError {
    DomainError::not_found(format!("note {id} not found"))
}
