use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection};

use super::bag::restore_input_order;
use crate::models::{conference::Conference, speaker::Speaker};

const EAGER_SELECT: &str = r#"SELECT sp.id, sp.full_name, sp.email, sp.company,
       c.id AS conference_id, c.title AS conference_title,
       c.description AS conference_description, c.date AS conference_date,
       c.place AS conference_place
  FROM speaker sp
  LEFT JOIN rel_speaker__conference r ON r.speaker_id = sp.id
  LEFT JOIN conference c ON c.id = r.conference_id"#;

#[derive(Debug, FromRow)]
struct SpeakerConferenceRow {
    id: i64,
    full_name: Option<String>,
    email: Option<String>,
    company: Option<String>,
    conference_id: Option<i64>,
    conference_title: Option<String>,
    conference_description: Option<String>,
    conference_date: Option<NaiveDate>,
    conference_place: Option<String>,
}

impl SpeakerConferenceRow {
    fn speaker(&self) -> Speaker {
        Speaker {
            id: Some(self.id),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            company: self.company.clone(),
            conferences: Some(Vec::new()),
        }
    }

    fn conference(self) -> Option<Conference> {
        Some(Conference {
            id: Some(self.conference_id?),
            title: self.conference_title.unwrap_or_default(),
            description: self.conference_description,
            date: self.conference_date,
            place: self.conference_place,
        })
    }
}

fn assemble(rows: Vec<SpeakerConferenceRow>) -> Vec<Speaker> {
    let mut speakers: Vec<Speaker> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();
    for row in rows {
        let position = *index.entry(row.id).or_insert_with(|| {
            speakers.push(row.speaker());
            speakers.len() - 1
        });
        if let Some(conference) = row.conference() {
            speakers[position]
                .conferences
                .get_or_insert_with(Vec::new)
                .push(conference);
        }
    }
    speakers
}

pub struct SpeakerRepository;

impl SpeakerRepository {
    pub async fn find_one_with_eager_relationships<'e, E>(
        executor: E,
        id: i64,
    ) -> Result<Option<Speaker>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, SpeakerConferenceRow>(&format!(
            "{EAGER_SELECT} WHERE sp.id = ?1 ORDER BY c.id"
        ))
        .bind(id)
        .fetch_all(executor)
        .await?;
        Ok(assemble(rows).into_iter().next())
    }

    pub async fn find_all_with_eager_relationships(
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Speaker>, sqlx::Error> {
        let speakers = Speaker::find_all(&mut *conn).await?;
        Self::fetch_bag_relationships(&mut *conn, speakers).await
    }

    /// Re-reads `speakers` with their conferences in one query, returning
    /// them in the order given. Inputs are expected to be persisted and
    /// distinct: unsaved speakers and repeated ids do not come back.
    pub async fn fetch_bag_relationships<'e, E>(
        executor: E,
        speakers: Vec<Speaker>,
    ) -> Result<Vec<Speaker>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let ids: Vec<i64> = speakers.iter().filter_map(|s| s.id).collect();
        if ids.is_empty() {
            return Ok(speakers);
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!("{EAGER_SELECT} WHERE sp.id IN ("));
        let mut separated = builder.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        builder.push(") ORDER BY c.id");

        let rows = builder
            .build_query_as::<SpeakerConferenceRow>()
            .fetch_all(executor)
            .await?;
        Ok(restore_input_order(&ids, assemble(rows), |s| s.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Samples, setup_test_pool};

    #[tokio::test]
    async fn find_one_populates_conferences() {
        let pool = setup_test_pool().await;
        let mut samples = Samples::seeded(31);
        let speaker = Speaker::create(&pool, &samples.speaker()).await.unwrap();
        let mut dated = samples.conference();
        dated.date = NaiveDate::from_ymd_opt(2024, 9, 12);
        let conference = Conference::create(&pool, &dated).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        Speaker::replace_conferences(&mut conn, speaker.id.unwrap(), &[conference.id.unwrap()])
            .await
            .unwrap();

        let loaded =
            SpeakerRepository::find_one_with_eager_relationships(&mut *conn, speaker.id.unwrap())
                .await
                .unwrap()
                .unwrap();
        let conferences = loaded.conferences.unwrap();
        assert_eq!(conferences, vec![conference]);
        assert_eq!(conferences[0].date, NaiveDate::from_ymd_opt(2024, 9, 12));
    }

    #[tokio::test]
    async fn find_all_keeps_speakers_without_conferences() {
        let pool = setup_test_pool().await;
        let mut samples = Samples::seeded(32);
        let booked = Speaker::create(&pool, &samples.speaker()).await.unwrap();
        let idle = Speaker::create(&pool, &samples.speaker()).await.unwrap();
        let a = Conference::create(&pool, &samples.conference()).await.unwrap();
        let b = Conference::create(&pool, &samples.conference()).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        Speaker::replace_conferences(&mut conn, booked.id.unwrap(), &[b.id.unwrap(), a.id.unwrap()])
            .await
            .unwrap();

        let speakers = SpeakerRepository::find_all_with_eager_relationships(&mut conn)
            .await
            .unwrap();
        assert_eq!(speakers, vec![booked, idle]);
        assert_eq!(speakers[0].conferences, Some(vec![a, b]));
        assert_eq!(speakers[1].conferences, Some(vec![]));
    }

    #[tokio::test]
    async fn fetch_many_follows_input_order() {
        let pool = setup_test_pool().await;
        let mut samples = Samples::seeded(33);
        let mut speakers = Vec::new();
        for _ in 0..3 {
            speakers.push(Speaker::create(&pool, &samples.speaker()).await.unwrap());
        }
        speakers.reverse();

        let fetched = SpeakerRepository::fetch_bag_relationships(&pool, speakers.clone())
            .await
            .unwrap();
        assert_eq!(fetched, speakers);
        assert_eq!(fetched.len(), 3);
    }
}
