use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection};
use thiserror::Error;
use ts_rs::TS;

use super::{EntityRef, conference::Conference, same_identity};

#[derive(Debug, Error)]
pub enum SpeakerError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Speaker not found")]
    NotFound,
}

const COLUMNS: &str = "id, full_name, email, company";

#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Speaker {
    pub id: Option<i64>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    /// `None` until the bag is fetched; see `SpeakerRepository`.
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub conferences: Option<Vec<Conference>>,
}

impl PartialEq for Speaker {
    fn eq(&self, other: &Self) -> bool {
        same_identity(self.id, other.id)
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerPayload {
    pub id: Option<i64>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    /// Owning side of the speaker/conference association.
    pub conferences: Option<Vec<EntityRef>>,
}

impl SpeakerPayload {
    pub fn to_speaker(&self) -> Speaker {
        Speaker {
            id: self.id,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            company: self.company.clone(),
            conferences: None,
        }
    }

    pub fn conference_ids(&self) -> Option<Vec<i64>> {
        self.conferences
            .as_ref()
            .map(|refs| refs.iter().map(|r| r.id).collect())
    }
}

impl Speaker {
    pub fn merge(&mut self, patch: &SpeakerPayload) {
        if let Some(full_name) = &patch.full_name {
            self.full_name = Some(full_name.clone());
        }
        if let Some(email) = &patch.email {
            self.email = Some(email.clone());
        }
        if let Some(company) = &patch.company {
            self.company = Some(company.clone());
        }
    }

    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Speaker>(&format!("SELECT {COLUMNS} FROM speaker ORDER BY id"))
            .fetch_all(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Speaker>(&format!("SELECT {COLUMNS} FROM speaker WHERE id = ?1"))
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
            QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM speaker WHERE id IN ("));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        builder.push(") ORDER BY id");

        builder.build_query_as::<Speaker>().fetch_all(executor).await
    }

    pub async fn exists<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM speaker WHERE id = ?1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(found.is_some())
    }

    pub async fn create<'e, E>(executor: E, data: &Speaker) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Speaker>(&format!(
            "INSERT INTO speaker (full_name, email, company)
             VALUES (?1, ?2, ?3)
             RETURNING {COLUMNS}"
        ))
        .bind(&data.full_name)
        .bind(&data.email)
        .bind(&data.company)
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(executor: E, data: &Speaker) -> Result<Self, SpeakerError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = data.id.ok_or(SpeakerError::NotFound)?;
        sqlx::query_as::<_, Speaker>(&format!(
            "UPDATE speaker SET full_name = ?2, email = ?3, company = ?4
             WHERE id = ?1
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(&data.full_name)
        .bind(&data.email)
        .bind(&data.company)
        .fetch_optional(executor)
        .await?
        .ok_or(SpeakerError::NotFound)
    }

    /// Rewrites the speaker's rows in `rel_speaker__conference` to exactly
    /// `conference_ids`.
    pub async fn replace_conferences(
        conn: &mut SqliteConnection,
        speaker_id: i64,
        conference_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM rel_speaker__conference WHERE speaker_id = ?1")
            .bind(speaker_id)
            .execute(&mut *conn)
            .await?;

        if conference_ids.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO rel_speaker__conference (speaker_id, conference_id) ",
        );
        builder.push_values(conference_ids, |mut b, conference_id| {
            b.push_bind(speaker_id).push_bind(*conference_id);
        });
        builder.build().execute(&mut *conn).await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM speaker WHERE id = ?1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
