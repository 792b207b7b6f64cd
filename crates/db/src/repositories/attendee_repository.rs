use std::collections::HashMap;

use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection};

use super::bag::restore_input_order;
use crate::{
    models::{
        attendee::{Attendee, AttendeeError},
        session::Session,
    },
    pagination::{Page, Pageable},
};

const EAGER_SELECT: &str = r#"SELECT a.id, a.first_name, a.last_name, a.email, a.telephone,
       s.id AS session_id, s.title AS session_title, s.description AS session_description,
       s.room AS session_room, s.speaker_id AS session_speaker_id,
       s.conference_id AS session_conference_id
  FROM attendee a
  LEFT JOIN rel_attendee__session r ON r.attendee_id = a.id
  LEFT JOIN session s ON s.id = r.session_id"#;

/// One attendee joined with at most one of its sessions.
#[derive(Debug, FromRow)]
struct AttendeeSessionRow {
    id: i64,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    telephone: Option<String>,
    session_id: Option<i64>,
    session_title: Option<String>,
    session_description: Option<String>,
    session_room: Option<String>,
    session_speaker_id: Option<i64>,
    session_conference_id: Option<i64>,
}

impl AttendeeSessionRow {
    fn attendee(&self) -> Attendee {
        Attendee {
            id: Some(self.id),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            telephone: self.telephone.clone(),
            sessions: Some(Vec::new()),
        }
    }

    fn session(self) -> Option<Session> {
        let id = self.session_id?;
        Some(Session {
            id: Some(id),
            title: self.session_title.unwrap_or_default(),
            description: self.session_description,
            room: self.session_room,
            speaker_id: self.session_speaker_id,
            conference_id: self.session_conference_id,
            ..Session::default()
        })
    }
}

/// Folds joined rows into attendees; an attendee with no sessions keeps an
/// empty list.
fn assemble(rows: Vec<AttendeeSessionRow>) -> Vec<Attendee> {
    let mut attendees: Vec<Attendee> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();
    for row in rows {
        let position = *index.entry(row.id).or_insert_with(|| {
            attendees.push(row.attendee());
            attendees.len() - 1
        });
        if let Some(session) = row.session() {
            attendees[position]
                .sessions
                .get_or_insert_with(Vec::new)
                .push(session);
        }
    }
    attendees
}

pub struct AttendeeRepository;

impl AttendeeRepository {
    pub async fn find_one_with_eager_relationships<'e, E>(
        executor: E,
        id: i64,
    ) -> Result<Option<Attendee>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, AttendeeSessionRow>(&format!(
            "{EAGER_SELECT} WHERE a.id = ?1 ORDER BY s.id"
        ))
        .bind(id)
        .fetch_all(executor)
        .await?;
        Ok(assemble(rows).into_iter().next())
    }

    /// Lazy page: attendees without sessions.
    pub async fn find_all(
        conn: &mut SqliteConnection,
        pageable: &Pageable,
    ) -> Result<Page<Attendee>, AttendeeError> {
        let total = Attendee::count(&mut *conn).await?;
        let content = Attendee::find_page(&mut *conn, pageable).await?;
        Ok(Page::new(content, pageable, total))
    }

    pub async fn find_all_with_eager_relationships(
        conn: &mut SqliteConnection,
        pageable: &Pageable,
    ) -> Result<Page<Attendee>, AttendeeError> {
        let page = Self::find_all(&mut *conn, pageable).await?;
        Ok(Self::fetch_bag_relationships_page(&mut *conn, page).await?)
    }

    /// Re-reads `attendees` with their sessions in one query, returning them
    /// in the order given. Inputs are expected to be persisted and distinct:
    /// unsaved attendees and repeated ids do not come back.
    pub async fn fetch_bag_relationships<'e, E>(
        executor: E,
        attendees: Vec<Attendee>,
    ) -> Result<Vec<Attendee>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let ids: Vec<i64> = attendees.iter().filter_map(|a| a.id).collect();
        if ids.is_empty() {
            return Ok(attendees);
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!("{EAGER_SELECT} WHERE a.id IN ("));
        let mut separated = builder.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        builder.push(") ORDER BY s.id");

        let rows = builder
            .build_query_as::<AttendeeSessionRow>()
            .fetch_all(executor)
            .await?;
        tracing::trace!("Fetched session bags for {} attendees", ids.len());
        Ok(restore_input_order(&ids, assemble(rows), |a| a.id))
    }

    pub async fn fetch_bag_relationships_page<'e, E>(
        executor: E,
        mut page: Page<Attendee>,
    ) -> Result<Page<Attendee>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let content = std::mem::take(&mut page.content);
        let content = Self::fetch_bag_relationships(executor, content).await?;
        Ok(page.with_content(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Samples, setup_test_pool};

    async fn registered(
        conn: &mut SqliteConnection,
        attendee: &Attendee,
        sessions: &[&Session],
    ) {
        let ids: Vec<i64> = sessions.iter().filter_map(|s| s.id).collect();
        Attendee::replace_sessions(conn, attendee.id.unwrap(), &ids)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn find_one_populates_sessions() {
        let pool = setup_test_pool().await;
        let mut samples = Samples::seeded(21);
        let attendee = Attendee::create(&pool, &samples.attendee()).await.unwrap();
        let first = Session::create(&pool, &samples.session()).await.unwrap();
        let second = Session::create(&pool, &samples.session()).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        registered(&mut conn, &attendee, &[&second, &first]).await;

        let loaded = AttendeeRepository::find_one_with_eager_relationships(
            &mut *conn,
            attendee.id.unwrap(),
        )
        .await
        .unwrap()
        .expect("attendee exists");
        assert_eq!(loaded.first_name, attendee.first_name);
        assert_eq!(loaded.sessions, Some(vec![first.clone(), second.clone()]));
        assert_eq!(loaded.sessions.as_ref().unwrap()[0].title, first.title);
    }

    #[tokio::test]
    async fn find_one_keeps_attendee_without_sessions() {
        let pool = setup_test_pool().await;
        let attendee = Attendee::create(&pool, &Attendee::default()).await.unwrap();

        let loaded = AttendeeRepository::find_one_with_eager_relationships(
            &pool,
            attendee.id.unwrap(),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(loaded.sessions, Some(vec![]));

        assert!(
            AttendeeRepository::find_one_with_eager_relationships(&pool, 404)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn fetch_many_preserves_input_order() {
        let pool = setup_test_pool().await;
        let mut samples = Samples::seeded(22);
        let mut attendees = Vec::new();
        for _ in 0..4 {
            attendees.push(Attendee::create(&pool, &samples.attendee()).await.unwrap());
        }
        let session = Session::create(&pool, &samples.session()).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        registered(&mut conn, &attendees[1], &[&session]).await;
        registered(&mut conn, &attendees[3], &[&session]).await;

        let input = vec![
            attendees[2].clone(),
            attendees[0].clone(),
            attendees[3].clone(),
            attendees[1].clone(),
        ];
        let fetched = AttendeeRepository::fetch_bag_relationships(&mut *conn, input.clone())
            .await
            .unwrap();

        let input_ids: Vec<_> = input.iter().map(|a| a.id).collect();
        let fetched_ids: Vec<_> = fetched.iter().map(|a| a.id).collect();
        assert_eq!(fetched_ids, input_ids);
        assert_eq!(fetched[0].sessions, Some(vec![]));
        assert_eq!(fetched[2].sessions, Some(vec![session.clone()]));
        assert_eq!(fetched[3].sessions, Some(vec![session]));
    }

    #[tokio::test]
    async fn page_keeps_metadata() {
        let pool = setup_test_pool().await;
        let mut samples = Samples::seeded(23);
        for _ in 0..5 {
            Attendee::create(&pool, &samples.attendee()).await.unwrap();
        }

        let mut conn = pool.acquire().await.unwrap();
        let pageable = Pageable::new(1, 2);
        let lazy = AttendeeRepository::find_all(&mut conn, &pageable).await.unwrap();
        assert!(lazy.content.iter().all(|a| a.sessions.is_none()));

        let eager = AttendeeRepository::find_all_with_eager_relationships(&mut conn, &pageable)
            .await
            .unwrap();
        assert_eq!(eager.total_elements, 5);
        assert_eq!(eager.page, 1);
        assert_eq!(eager.size, 2);
        assert_eq!(eager.total_pages(), 3);
        assert_eq!(eager.content, lazy.content);
        assert!(eager.content.iter().all(|a| a.sessions == Some(vec![])));
    }

    #[tokio::test]
    async fn fetch_many_skips_unsaved_and_repeated_inputs() {
        let pool = setup_test_pool().await;
        let mut samples = Samples::seeded(24);
        let attendee = Attendee::create(&pool, &samples.attendee()).await.unwrap();
        let session = Session::create(&pool, &samples.session()).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        registered(&mut conn, &attendee, &[&session]).await;

        let input = vec![attendee.clone(), samples.attendee(), attendee.clone()];
        let fetched = AttendeeRepository::fetch_bag_relationships(&mut *conn, input)
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, attendee.id);
        assert_eq!(fetched[0].sessions, Some(vec![session]));
    }
}
