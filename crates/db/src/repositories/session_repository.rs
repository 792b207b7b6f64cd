use std::collections::{BTreeSet, HashMap};

use sqlx::SqliteConnection;

use crate::models::{conference::Conference, session::Session, speaker::Speaker};

pub struct SessionRepository;

impl SessionRepository {
    /// Embeds each session's speaker and conference, one query per
    /// reference type regardless of how many sessions are passed.
    pub async fn fetch_references(
        conn: &mut SqliteConnection,
        mut sessions: Vec<Session>,
    ) -> Result<Vec<Session>, sqlx::Error> {
        let speaker_ids: Vec<i64> = sessions
            .iter()
            .filter_map(|s| s.speaker_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let conference_ids: Vec<i64> = sessions
            .iter()
            .filter_map(|s| s.conference_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let speakers: HashMap<i64, Speaker> = Speaker::find_by_ids(&mut *conn, &speaker_ids)
            .await?
            .into_iter()
            .filter_map(|s| Some((s.id?, s)))
            .collect();
        let conferences: HashMap<i64, Conference> =
            Conference::find_by_ids(&mut *conn, &conference_ids)
                .await?
                .into_iter()
                .filter_map(|c| Some((c.id?, c)))
                .collect();

        for session in &mut sessions {
            session.speaker = session.speaker_id.and_then(|id| speakers.get(&id).cloned());
            session.conference = session
                .conference_id
                .and_then(|id| conferences.get(&id).cloned());
        }
        Ok(sessions)
    }

    pub async fn find_one_with_references(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<Session>, sqlx::Error> {
        let Some(session) = Session::find_by_id(&mut *conn, id).await? else {
            return Ok(None);
        };
        Ok(Self::fetch_references(conn, vec![session])
            .await?
            .into_iter()
            .next())
    }
}
