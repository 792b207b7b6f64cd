use rand::{Rng, SeedableRng, rngs::StdRng};
use sqlx::SqlitePool;

use crate::{
    DBService,
    models::{attendee::Attendee, conference::Conference, session::Session, speaker::Speaker},
};

pub(crate) async fn setup_test_pool() -> SqlitePool {
    DBService::new_in_memory()
        .await
        .expect("failed to open sqlite memory db")
        .pool
}

/// Deterministic sample data; each test owns its generator.
pub(crate) struct Samples {
    rng: StdRng,
}

impl Samples {
    pub(crate) fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn word(&mut self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.rng.r#gen::<u32>())
    }

    pub(crate) fn conference(&mut self) -> Conference {
        Conference::new(self.word("conference"))
    }

    pub(crate) fn session(&mut self) -> Session {
        let mut session = Session::new(self.word("session"));
        session.room = Some(self.word("room"));
        session
    }

    pub(crate) fn speaker(&mut self) -> Speaker {
        Speaker {
            full_name: Some(self.word("speaker")),
            ..Speaker::default()
        }
    }

    pub(crate) fn attendee(&mut self) -> Attendee {
        Attendee {
            first_name: Some(self.word("first")),
            last_name: Some(self.word("last")),
            ..Attendee::default()
        }
    }
}
