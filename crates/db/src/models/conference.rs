use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite};
use thiserror::Error;
use ts_rs::TS;

use super::same_identity;

#[derive(Debug, Error)]
pub enum ConferenceError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Conference not found")]
    NotFound,
}

const COLUMNS: &str = "id, title, description, date, place";

#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Conference {
    pub id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub place: Option<String>,
}

/// Identity is the database id; unsaved conferences never compare equal.
impl PartialEq for Conference {
    fn eq(&self, other: &Self) -> bool {
        same_identity(self.id, other.id)
    }
}

/// Request body for create, full update and merge-patch.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ConferencePayload {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub place: Option<String>,
}

impl ConferencePayload {
    /// Every field replaced, absent ones cleared.
    pub fn into_conference(self) -> Conference {
        Conference {
            id: self.id,
            title: self.title.unwrap_or_default(),
            description: self.description,
            date: self.date,
            place: self.place,
        }
    }
}

impl Conference {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Merge-patch: only fields present in `patch` overwrite.
    pub fn merge(&mut self, patch: ConferencePayload) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(date) = patch.date {
            self.date = Some(date);
        }
        if let Some(place) = patch.place {
            self.place = Some(place);
        }
    }

    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Conference>(&format!("SELECT {COLUMNS} FROM conference ORDER BY id"))
            .fetch_all(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Conference>(&format!("SELECT {COLUMNS} FROM conference WHERE id = ?1"))
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
            QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM conference WHERE id IN ("));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        builder.push(") ORDER BY id");

        builder
            .build_query_as::<Conference>()
            .fetch_all(executor)
            .await
    }

    /// Conferences the speaker is booked for, through the join table.
    pub async fn find_by_speaker<'e, E>(
        executor: E,
        speaker_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Conference>(
            r#"SELECT c.id, c.title, c.description, c.date, c.place
               FROM conference c
               JOIN rel_speaker__conference r ON r.conference_id = c.id
               WHERE r.speaker_id = ?1
               ORDER BY c.id"#,
        )
        .bind(speaker_id)
        .fetch_all(executor)
        .await
    }

    pub async fn exists<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM conference WHERE id = ?1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(found.is_some())
    }

    /// Inserts a new row; any id on `data` is ignored and a fresh one assigned.
    pub async fn create<'e, E>(executor: E, data: &Conference) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Conference>(&format!(
            "INSERT INTO conference (title, description, date, place)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {COLUMNS}"
        ))
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.date)
        .bind(&data.place)
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(executor: E, data: &Conference) -> Result<Self, ConferenceError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = data.id.ok_or(ConferenceError::NotFound)?;
        sqlx::query_as::<_, Conference>(&format!(
            "UPDATE conference
             SET title = ?2, description = ?3, date = ?4, place = ?5
             WHERE id = ?1
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.date)
        .bind(&data.place)
        .fetch_optional(executor)
        .await?
        .ok_or(ConferenceError::NotFound)
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM conference WHERE id = ?1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
