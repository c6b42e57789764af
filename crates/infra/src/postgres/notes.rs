use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use notas_core::{NoteId, UserId};
use notas_notes::{Note, NoteStore, NoteStoreError, Profile};

/// Note and profile store over the `notes` and `profiles` tables.
#[derive(Clone)]
pub struct PostgresNoteStore {
    pool: Arc<PgPool>,
}

impl PostgresNoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

fn unavailable(err: sqlx::Error) -> NoteStoreError {
    tracing::error!(error = %err, "note store query failed");
    NoteStoreError::Unavailable(err.to_string())
}

fn note_from_row(row: &PgRow) -> Result<Note, NoteStoreError> {
    let bad = |e: sqlx::Error| NoteStoreError::Unavailable(format!("bad notes row: {e}"));
    Ok(Note {
        id: NoteId::from_uuid(row.try_get::<Uuid, _>("id").map_err(bad)?),
        owner: UserId::from_uuid(row.try_get::<Uuid, _>("owner_id").map_err(bad)?),
        title: row.try_get("title").map_err(bad)?,
        content: row.try_get("content").map_err(bad)?,
        created_at: row.try_get("created_at").map_err(bad)?,
        updated_at: row.try_get("updated_at").map_err(bad)?,
    })
}

fn profile_from_row(row: &PgRow) -> Result<Profile, NoteStoreError> {
    let bad = |e: sqlx::Error| NoteStoreError::Unavailable(format!("bad profiles row: {e}"));
    let favorites: Vec<Uuid> = row.try_get("favorite_notes").map_err(bad)?;
    Ok(Profile {
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id").map_err(bad)?),
        display_name: row.try_get("display_name").map_err(bad)?,
        favorite_notes: favorites.into_iter().map(NoteId::from_uuid).collect(),
        updated_at: row.try_get("updated_at").map_err(bad)?,
    })
}

#[async_trait]
impl NoteStore for PostgresNoteStore {
    async fn insert_note(&self, note: Note) -> Result<(), NoteStoreError> {
        sqlx::query(
            r#"
            INSERT INTO notes (id, owner_id, title, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(note.id.as_uuid())
        .bind(note.owner.as_uuid())
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.created_at)
        .bind(note.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn get_note(&self, id: NoteId) -> Result<Option<Note>, NoteStoreError> {
        let row = sqlx::query(
            "SELECT id, owner_id, title, content, created_at, updated_at FROM notes WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(unavailable)?;
        row.as_ref().map(note_from_row).transpose()
    }

    async fn list_notes_by_owner(&self, owner: UserId) -> Result<Vec<Note>, NoteStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, title, content, created_at, updated_at
              FROM notes
             WHERE owner_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(owner.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(unavailable)?;
        rows.iter().map(note_from_row).collect()
    }

    async fn update_note(&self, note: Note) -> Result<bool, NoteStoreError> {
        let result = sqlx::query(
            "UPDATE notes SET title = $2, content = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(note.id.as_uuid())
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(unavailable)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_note(&self, id: NoteId) -> Result<bool, NoteStoreError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let deleted = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?
            .rows_affected();

        if deleted == 1 {
            sqlx::query("UPDATE profiles SET favorite_notes = array_remove(favorite_notes, $1)")
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(unavailable)?;
        }

        tx.commit().await.map_err(unavailable)?;
        Ok(deleted == 1)
    }

    async fn get_profile(&self, user: UserId) -> Result<Option<Profile>, NoteStoreError> {
        let row = sqlx::query(
            "SELECT user_id, display_name, favorite_notes, updated_at FROM profiles WHERE user_id = $1",
        )
        .bind(user.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(unavailable)?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn save_profile(&self, profile: Profile) -> Result<(), NoteStoreError> {
        let favorites: Vec<Uuid> = profile.favorite_notes.iter().map(|n| *n.as_uuid()).collect();
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, display_name, favorite_notes, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
               SET display_name = EXCLUDED.display_name,
                   favorite_notes = EXCLUDED.favorite_notes,
                   updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(profile.user_id.as_uuid())
        .bind(&profile.display_name)
        .bind(&favorites)
        .bind(profile.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn purge_owner(&self, user: UserId) -> Result<(), NoteStoreError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let owned: Vec<Uuid> = sqlx::query("DELETE FROM notes WHERE owner_id = $1 RETURNING id")
            .bind(user.as_uuid())
            .fetch_all(&mut *tx)
            .await
            .map_err(unavailable)?
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<Result<_, _>>()
            .map_err(unavailable)?;

        sqlx::query("DELETE FROM profiles WHERE user_id = $1")
            .bind(user.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        if !owned.is_empty() {
            sqlx::query(
                r#"
                UPDATE profiles
                   SET favorite_notes = ARRAY(
                       SELECT f FROM unnest(favorite_notes) AS f WHERE f <> ALL($1)
                   )
                 WHERE favorite_notes && $1
                "#,
            )
            .bind(&owned)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        }

        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }
}
