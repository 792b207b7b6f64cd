use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite};
use thiserror::Error;
use ts_rs::TS;

use super::{EntityRef, conference::Conference, same_identity, speaker::Speaker};
use crate::pagination::{Pageable, PaginationError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error("Session not found")]
    NotFound,
}

const COLUMNS: &str = "id, title, description, room, speaker_id, conference_id";

/// Sortable wire properties and their columns.
pub const SORT_COLUMNS: &[(&str, &str)] = &[
    ("id", "id"),
    ("title", "title"),
    ("description", "description"),
    ("room", "room"),
];

#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub room: Option<String>,
    #[serde(skip)]
    #[ts(skip)]
    pub speaker_id: Option<i64>,
    #[serde(skip)]
    #[ts(skip)]
    pub conference_id: Option<i64>,
    /// Filled by `SessionRepository::fetch_references`.
    #[sqlx(skip)]
    #[serde(default)]
    pub speaker: Option<Speaker>,
    #[sqlx(skip)]
    #[serde(default)]
    pub conference: Option<Conference>,
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        same_identity(self.id, other.id)
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub room: Option<String>,
    pub speaker: Option<EntityRef>,
    pub conference: Option<EntityRef>,
}

impl SessionPayload {
    /// Scalar fields only; references are applied through the entity graph.
    pub fn to_session(&self) -> Session {
        Session {
            id: self.id,
            title: self.title.clone().unwrap_or_default(),
            description: self.description.clone(),
            room: self.room.clone(),
            ..Session::default()
        }
    }
}

impl Session {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Full update of the scalar fields; absent ones are cleared. Foreign
    /// keys are left to the entity graph.
    pub fn overwrite(&mut self, payload: &SessionPayload) {
        self.title = payload.title.clone().unwrap_or_default();
        self.description = payload.description.clone();
        self.room = payload.room.clone();
    }

    pub fn merge(&mut self, patch: &SessionPayload) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(room) = &patch.room {
            self.room = Some(room.clone());
        }
    }

    pub async fn count<'e, E>(executor: E) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM session")
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    /// One page of sessions, references left unloaded.
    pub async fn find_page<'e, E>(
        executor: E,
        pageable: &Pageable,
    ) -> Result<Vec<Self>, SessionError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let order_by = pageable.order_by(SORT_COLUMNS)?;
        let sessions = sqlx::query_as::<_, Session>(&format!(
            "SELECT {COLUMNS} FROM session ORDER BY {order_by} LIMIT ?1 OFFSET ?2"
        ))
        .bind(pageable.size)
        .bind(pageable.offset())
        .fetch_all(executor)
        .await?;
        Ok(sessions)
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Session>(&format!("SELECT {COLUMNS} FROM session WHERE id = ?1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_ids<'e, E>(executor: E, ids: &[i64]) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM session WHERE id IN ("));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        builder.push(") ORDER BY id");

        builder.build_query_as::<Session>().fetch_all(executor).await
    }

    pub async fn find_by_conference<'e, E>(
        executor: E,
        conference_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Session>(&format!(
            "SELECT {COLUMNS} FROM session WHERE conference_id = ?1 ORDER BY id"
        ))
        .bind(conference_id)
        .fetch_all(executor)
        .await
    }

    /// Sessions an attendee is registered for, through the join table.
    pub async fn find_by_attendee<'e, E>(
        executor: E,
        attendee_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Session>(
            r#"SELECT s.id, s.title, s.description, s.room, s.speaker_id, s.conference_id
               FROM session s
               JOIN rel_attendee__session r ON r.session_id = s.id
               WHERE r.attendee_id = ?1
               ORDER BY s.id"#,
        )
        .bind(attendee_id)
        .fetch_all(executor)
        .await
    }

    pub async fn exists<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM session WHERE id = ?1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(found.is_some())
    }

    pub async fn create<'e, E>(executor: E, data: &Session) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Session>(&format!(
            "INSERT INTO session (title, description, room, speaker_id, conference_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING {COLUMNS}"
        ))
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.room)
        .bind(data.speaker_id)
        .bind(data.conference_id)
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(executor: E, data: &Session) -> Result<Self, SessionError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = data.id.ok_or(SessionError::NotFound)?;
        sqlx::query_as::<_, Session>(&format!(
            "UPDATE session
             SET title = ?2, description = ?3, room = ?4, speaker_id = ?5, conference_id = ?6
             WHERE id = ?1
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.room)
        .bind(data.speaker_id)
        .bind(data.conference_id)
        .fetch_optional(executor)
        .await?
        .ok_or(SessionError::NotFound)
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM session WHERE id = ?1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
