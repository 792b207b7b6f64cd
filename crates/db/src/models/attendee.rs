use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection};
use thiserror::Error;
use ts_rs::TS;

use super::{EntityRef, same_identity, session::Session};
use crate::pagination::{Pageable, PaginationError};

#[derive(Debug, Error)]
pub enum AttendeeError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error("Attendee not found")]
    NotFound,
}

const COLUMNS: &str = "id, first_name, last_name, email, telephone";

pub const SORT_COLUMNS: &[(&str, &str)] = &[
    ("id", "id"),
    ("firstName", "first_name"),
    ("lastName", "last_name"),
    ("email", "email"),
    ("telephone", "telephone"),
];

#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    /// `None` while lazy; filled by `AttendeeRepository`.
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub sessions: Option<Vec<Session>>,
}

impl PartialEq for Attendee {
    fn eq(&self, other: &Self) -> bool {
        same_identity(self.id, other.id)
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AttendeePayload {
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    /// Owning side of the attendee/session association.
    pub sessions: Option<Vec<EntityRef>>,
}

impl AttendeePayload {
    pub fn to_attendee(&self) -> Attendee {
        Attendee {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            telephone: self.telephone.clone(),
            sessions: None,
        }
    }

    pub fn session_ids(&self) -> Option<Vec<i64>> {
        self.sessions
            .as_ref()
            .map(|refs| refs.iter().map(|r| r.id).collect())
    }
}

impl Attendee {
    pub fn merge(&mut self, patch: &AttendeePayload) {
        if let Some(first_name) = &patch.first_name {
            self.first_name = Some(first_name.clone());
        }
        if let Some(last_name) = &patch.last_name {
            self.last_name = Some(last_name.clone());
        }
        if let Some(email) = &patch.email {
            self.email = Some(email.clone());
        }
        if let Some(telephone) = &patch.telephone {
            self.telephone = Some(telephone.clone());
        }
    }

    pub async fn count<'e, E>(executor: E) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attendee")
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    pub async fn find_page<'e, E>(
        executor: E,
        pageable: &Pageable,
    ) -> Result<Vec<Self>, AttendeeError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let order_by = pageable.order_by(SORT_COLUMNS)?;
        let attendees = sqlx::query_as::<_, Attendee>(&format!(
            "SELECT {COLUMNS} FROM attendee ORDER BY {order_by} LIMIT ?1 OFFSET ?2"
        ))
        .bind(pageable.size)
        .bind(pageable.offset())
        .fetch_all(executor)
        .await?;
        Ok(attendees)
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Attendee>(&format!("SELECT {COLUMNS} FROM attendee WHERE id = ?1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Attendees registered for a session, through the join table.
    pub async fn find_by_session<'e, E>(
        executor: E,
        session_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Attendee>(
            r#"SELECT a.id, a.first_name, a.last_name, a.email, a.telephone
               FROM attendee a
               JOIN rel_attendee__session r ON r.attendee_id = a.id
               WHERE r.session_id = ?1
               ORDER BY a.id"#,
        )
        .bind(session_id)
        .fetch_all(executor)
        .await
    }

    pub async fn exists<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM attendee WHERE id = ?1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(found.is_some())
    }

    pub async fn create<'e, E>(executor: E, data: &Attendee) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Attendee>(&format!(
            "INSERT INTO attendee (first_name, last_name, email, telephone)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {COLUMNS}"
        ))
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(&data.telephone)
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(executor: E, data: &Attendee) -> Result<Self, AttendeeError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = data.id.ok_or(AttendeeError::NotFound)?;
        sqlx::query_as::<_, Attendee>(&format!(
            "UPDATE attendee
             SET first_name = ?2, last_name = ?3, email = ?4, telephone = ?5
             WHERE id = ?1
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(&data.telephone)
        .fetch_optional(executor)
        .await?
        .ok_or(AttendeeError::NotFound)
    }

    /// Rewrites the attendee's rows in `rel_attendee__session` to exactly
    /// `session_ids`.
    pub async fn replace_sessions(
        conn: &mut SqliteConnection,
        attendee_id: i64,
        session_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM rel_attendee__session WHERE attendee_id = ?1")
            .bind(attendee_id)
            .execute(&mut *conn)
            .await?;

        if session_ids.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO rel_attendee__session (attendee_id, session_id) ",
        );
        builder.push_values(session_ids, |mut b, session_id| {
            b.push_bind(attendee_id).push_bind(*session_id);
        });
        builder.build().execute(&mut *conn).await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM attendee WHERE id = ?1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
