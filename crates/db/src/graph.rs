//! In-memory object graph for the conference domain.
//!
//! Entities live in per-type arenas and are addressed by typed keys; every
//! association is stored on both ends as key sets (or an optional key for the
//! many-to-one side). All mutation goes through the methods below, each of
//! which updates both ends in the same call, so these invariants hold after
//! every call:
//!
//! * a session's `conference` is `Some(c)` iff `c`'s session set contains it
//!   (same for `speaker`);
//! * speaker/conference and attendee/session membership is symmetric.
//!
//! Nothing here touches the database. Route handlers load the persisted
//! state into a graph, apply the requested change, then write the owning
//! side back from [`EntityGraph::session_record`],
//! [`EntityGraph::speaker_conference_ids`] and
//! [`EntityGraph::attendee_session_ids`].
//!
//! Keys are only meaningful for the graph that issued them.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::models::{
    attendee::Attendee, conference::Conference, session::Session, speaker::Speaker,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("{entity} already has identifier {current}, cannot reassign to {requested}")]
    IdentifierAlreadyAssigned {
        entity: &'static str,
        current: i64,
        requested: i64,
    },
    #[error("identifier {id} already belongs to another {entity} in this graph")]
    DuplicateIdentifier { entity: &'static str, id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConferenceKey(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeakerKey(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttendeeKey(usize);

#[derive(Debug)]
struct ConferenceNode {
    record: Conference,
    sessions: HashSet<SessionKey>,
    speakers: HashSet<SpeakerKey>,
}

#[derive(Debug)]
struct SessionNode {
    record: Session,
    conference: Option<ConferenceKey>,
    speaker: Option<SpeakerKey>,
    attendees: HashSet<AttendeeKey>,
}

#[derive(Debug)]
struct SpeakerNode {
    record: Speaker,
    sessions: HashSet<SessionKey>,
    conferences: HashSet<ConferenceKey>,
}

#[derive(Debug)]
struct AttendeeNode {
    record: Attendee,
    sessions: HashSet<SessionKey>,
}

#[derive(Debug, Default)]
pub struct EntityGraph {
    conferences: Vec<ConferenceNode>,
    sessions: Vec<SessionNode>,
    speakers: Vec<SpeakerNode>,
    attendees: Vec<AttendeeNode>,
    conference_ids: HashMap<i64, ConferenceKey>,
    session_ids: HashMap<i64, SessionKey>,
    speaker_ids: HashMap<i64, SpeakerKey>,
    attendee_ids: HashMap<i64, AttendeeKey>,
}

fn check_assignment(
    entity: &'static str,
    current: Option<i64>,
    requested: i64,
) -> Result<bool, GraphError> {
    match current {
        Some(current) if current == requested => Ok(false),
        Some(current) => Err(GraphError::IdentifierAlreadyAssigned {
            entity,
            current,
            requested,
        }),
        None => Ok(true),
    }
}

fn sorted_ids(ids: impl Iterator<Item = Option<i64>>) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.flatten().collect();
    ids.sort_unstable();
    ids
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // Insertion. A persisted record whose id is already in the graph resolves
    // to the existing key, so each row has exactly one node.

    pub fn insert_conference(&mut self, record: Conference) -> ConferenceKey {
        if let Some(key) = record.id.and_then(|id| self.conference_ids.get(&id)) {
            return *key;
        }
        let key = ConferenceKey(self.conferences.len());
        if let Some(id) = record.id {
            self.conference_ids.insert(id, key);
        }
        self.conferences.push(ConferenceNode {
            record,
            sessions: HashSet::new(),
            speakers: HashSet::new(),
        });
        key
    }

    pub fn insert_session(&mut self, record: Session) -> SessionKey {
        if let Some(key) = record.id.and_then(|id| self.session_ids.get(&id)) {
            return *key;
        }
        let key = SessionKey(self.sessions.len());
        if let Some(id) = record.id {
            self.session_ids.insert(id, key);
        }
        self.sessions.push(SessionNode {
            record,
            conference: None,
            speaker: None,
            attendees: HashSet::new(),
        });
        key
    }

    pub fn insert_speaker(&mut self, record: Speaker) -> SpeakerKey {
        if let Some(key) = record.id.and_then(|id| self.speaker_ids.get(&id)) {
            return *key;
        }
        let key = SpeakerKey(self.speakers.len());
        if let Some(id) = record.id {
            self.speaker_ids.insert(id, key);
        }
        self.speakers.push(SpeakerNode {
            record,
            sessions: HashSet::new(),
            conferences: HashSet::new(),
        });
        key
    }

    pub fn insert_attendee(&mut self, record: Attendee) -> AttendeeKey {
        if let Some(key) = record.id.and_then(|id| self.attendee_ids.get(&id)) {
            return *key;
        }
        let key = AttendeeKey(self.attendees.len());
        if let Some(id) = record.id {
            self.attendee_ids.insert(id, key);
        }
        self.attendees.push(AttendeeNode {
            record,
            sessions: HashSet::new(),
        });
        key
    }

    pub fn find_conference(&self, id: i64) -> Option<ConferenceKey> {
        self.conference_ids.get(&id).copied()
    }

    pub fn find_session(&self, id: i64) -> Option<SessionKey> {
        self.session_ids.get(&id).copied()
    }

    pub fn find_speaker(&self, id: i64) -> Option<SpeakerKey> {
        self.speaker_ids.get(&id).copied()
    }

    pub fn find_attendee(&self, id: i64) -> Option<AttendeeKey> {
        self.attendee_ids.get(&id).copied()
    }

    // Identifier assignment after the first save. Ids never change once set.

    pub fn assign_conference_id(&mut self, key: ConferenceKey, id: i64) -> Result<(), GraphError> {
        if check_assignment("conference", self.conferences[key.0].record.id, id)? {
            if self.conference_ids.contains_key(&id) {
                return Err(GraphError::DuplicateIdentifier {
                    entity: "conference",
                    id,
                });
            }
            self.conferences[key.0].record.id = Some(id);
            self.conference_ids.insert(id, key);
        }
        Ok(())
    }

    pub fn assign_session_id(&mut self, key: SessionKey, id: i64) -> Result<(), GraphError> {
        if check_assignment("session", self.sessions[key.0].record.id, id)? {
            if self.session_ids.contains_key(&id) {
                return Err(GraphError::DuplicateIdentifier {
                    entity: "session",
                    id,
                });
            }
            self.sessions[key.0].record.id = Some(id);
            self.session_ids.insert(id, key);
        }
        Ok(())
    }

    pub fn assign_speaker_id(&mut self, key: SpeakerKey, id: i64) -> Result<(), GraphError> {
        if check_assignment("speaker", self.speakers[key.0].record.id, id)? {
            if self.speaker_ids.contains_key(&id) {
                return Err(GraphError::DuplicateIdentifier {
                    entity: "speaker",
                    id,
                });
            }
            self.speakers[key.0].record.id = Some(id);
            self.speaker_ids.insert(id, key);
        }
        Ok(())
    }

    pub fn assign_attendee_id(&mut self, key: AttendeeKey, id: i64) -> Result<(), GraphError> {
        if check_assignment("attendee", self.attendees[key.0].record.id, id)? {
            if self.attendee_ids.contains_key(&id) {
                return Err(GraphError::DuplicateIdentifier {
                    entity: "attendee",
                    id,
                });
            }
            self.attendees[key.0].record.id = Some(id);
            self.attendee_ids.insert(id, key);
        }
        Ok(())
    }

    // Read access.

    pub fn conference(&self, key: ConferenceKey) -> &Conference {
        &self.conferences[key.0].record
    }

    pub fn session(&self, key: SessionKey) -> &Session {
        &self.sessions[key.0].record
    }

    pub fn speaker(&self, key: SpeakerKey) -> &Speaker {
        &self.speakers[key.0].record
    }

    pub fn attendee(&self, key: AttendeeKey) -> &Attendee {
        &self.attendees[key.0].record
    }

    pub fn conference_sessions(&self, key: ConferenceKey) -> impl Iterator<Item = SessionKey> + '_ {
        self.conferences[key.0].sessions.iter().copied()
    }

    pub fn conference_speakers(&self, key: ConferenceKey) -> impl Iterator<Item = SpeakerKey> + '_ {
        self.conferences[key.0].speakers.iter().copied()
    }

    pub fn session_conference(&self, key: SessionKey) -> Option<ConferenceKey> {
        self.sessions[key.0].conference
    }

    pub fn session_speaker(&self, key: SessionKey) -> Option<SpeakerKey> {
        self.sessions[key.0].speaker
    }

    pub fn session_attendees(&self, key: SessionKey) -> impl Iterator<Item = AttendeeKey> + '_ {
        self.sessions[key.0].attendees.iter().copied()
    }

    pub fn speaker_sessions(&self, key: SpeakerKey) -> impl Iterator<Item = SessionKey> + '_ {
        self.speakers[key.0].sessions.iter().copied()
    }

    pub fn speaker_conferences(&self, key: SpeakerKey) -> impl Iterator<Item = ConferenceKey> + '_ {
        self.speakers[key.0].conferences.iter().copied()
    }

    pub fn attendee_sessions(&self, key: AttendeeKey) -> impl Iterator<Item = SessionKey> + '_ {
        self.attendees[key.0].sessions.iter().copied()
    }

    /// The session row as it should be persisted: foreign keys come from the
    /// graph's edges, not from whatever the record was loaded with.
    pub fn session_record(&self, key: SessionKey) -> Session {
        let node = &self.sessions[key.0];
        Session {
            speaker_id: node.speaker.and_then(|s| self.speakers[s.0].record.id),
            conference_id: node.conference.and_then(|c| self.conferences[c.0].record.id),
            ..node.record.clone()
        }
    }

    /// Persisted conference ids for the speaker's join rows, ascending.
    pub fn speaker_conference_ids(&self, key: SpeakerKey) -> Vec<i64> {
        sorted_ids(
            self.speakers[key.0]
                .conferences
                .iter()
                .map(|c| self.conferences[c.0].record.id),
        )
    }

    /// Persisted session ids for the attendee's join rows, ascending.
    pub fn attendee_session_ids(&self, key: AttendeeKey) -> Vec<i64> {
        sorted_ids(
            self.attendees[key.0]
                .sessions
                .iter()
                .map(|s| self.sessions[s.0].record.id),
        )
    }

    // Conference 1 -> * Session

    /// Points `session` at `conference`, leaving its previous conference.
    fn attach_session_to_conference(&mut self, session: SessionKey, conference: ConferenceKey) {
        match self.sessions[session.0].conference {
            Some(previous) if previous != conference => {
                self.conferences[previous.0].sessions.remove(&session);
            }
            _ => {}
        }
        self.sessions[session.0].conference = Some(conference);
    }

    pub fn set_conference_sessions(
        &mut self,
        conference: ConferenceKey,
        sessions: impl IntoIterator<Item = SessionKey>,
    ) {
        let replacement: HashSet<SessionKey> = sessions.into_iter().collect();
        let current = std::mem::take(&mut self.conferences[conference.0].sessions);
        for dropped in current.difference(&replacement) {
            if self.sessions[dropped.0].conference == Some(conference) {
                self.sessions[dropped.0].conference = None;
            }
        }
        for session in &replacement {
            self.attach_session_to_conference(*session, conference);
        }
        self.conferences[conference.0].sessions = replacement;
    }

    pub fn add_conference_session(&mut self, conference: ConferenceKey, session: SessionKey) {
        self.attach_session_to_conference(session, conference);
        self.conferences[conference.0].sessions.insert(session);
    }

    pub fn remove_conference_session(&mut self, conference: ConferenceKey, session: SessionKey) {
        self.conferences[conference.0].sessions.remove(&session);
        if self.sessions[session.0].conference == Some(conference) {
            self.sessions[session.0].conference = None;
        }
    }

    /// Many-to-one form of the same association.
    pub fn set_session_conference(&mut self, session: SessionKey, conference: Option<ConferenceKey>) {
        match conference {
            Some(conference) => self.add_conference_session(conference, session),
            None => {
                if let Some(previous) = self.sessions[session.0].conference {
                    self.remove_conference_session(previous, session);
                }
            }
        }
    }

    // Speaker 1 -> * Session

    fn attach_session_to_speaker(&mut self, session: SessionKey, speaker: SpeakerKey) {
        match self.sessions[session.0].speaker {
            Some(previous) if previous != speaker => {
                self.speakers[previous.0].sessions.remove(&session);
            }
            _ => {}
        }
        self.sessions[session.0].speaker = Some(speaker);
    }

    pub fn set_speaker_sessions(
        &mut self,
        speaker: SpeakerKey,
        sessions: impl IntoIterator<Item = SessionKey>,
    ) {
        let replacement: HashSet<SessionKey> = sessions.into_iter().collect();
        let current = std::mem::take(&mut self.speakers[speaker.0].sessions);
        for dropped in current.difference(&replacement) {
            if self.sessions[dropped.0].speaker == Some(speaker) {
                self.sessions[dropped.0].speaker = None;
            }
        }
        for session in &replacement {
            self.attach_session_to_speaker(*session, speaker);
        }
        self.speakers[speaker.0].sessions = replacement;
    }

    pub fn add_speaker_session(&mut self, speaker: SpeakerKey, session: SessionKey) {
        self.attach_session_to_speaker(session, speaker);
        self.speakers[speaker.0].sessions.insert(session);
    }

    pub fn remove_speaker_session(&mut self, speaker: SpeakerKey, session: SessionKey) {
        self.speakers[speaker.0].sessions.remove(&session);
        if self.sessions[session.0].speaker == Some(speaker) {
            self.sessions[session.0].speaker = None;
        }
    }

    pub fn set_session_speaker(&mut self, session: SessionKey, speaker: Option<SpeakerKey>) {
        match speaker {
            Some(speaker) => self.add_speaker_session(speaker, session),
            None => {
                if let Some(previous) = self.sessions[session.0].speaker {
                    self.remove_speaker_session(previous, session);
                }
            }
        }
    }

    // Speaker * <-> * Conference

    pub fn set_conference_speakers(
        &mut self,
        conference: ConferenceKey,
        speakers: impl IntoIterator<Item = SpeakerKey>,
    ) {
        let replacement: HashSet<SpeakerKey> = speakers.into_iter().collect();
        let current = std::mem::take(&mut self.conferences[conference.0].speakers);
        for dropped in current.difference(&replacement) {
            self.speakers[dropped.0].conferences.remove(&conference);
        }
        for speaker in &replacement {
            self.speakers[speaker.0].conferences.insert(conference);
        }
        self.conferences[conference.0].speakers = replacement;
    }

    pub fn add_conference_speaker(&mut self, conference: ConferenceKey, speaker: SpeakerKey) {
        self.conferences[conference.0].speakers.insert(speaker);
        self.speakers[speaker.0].conferences.insert(conference);
    }

    pub fn remove_conference_speaker(&mut self, conference: ConferenceKey, speaker: SpeakerKey) {
        self.conferences[conference.0].speakers.remove(&speaker);
        self.speakers[speaker.0].conferences.remove(&conference);
    }

    pub fn set_speaker_conferences(
        &mut self,
        speaker: SpeakerKey,
        conferences: impl IntoIterator<Item = ConferenceKey>,
    ) {
        let replacement: HashSet<ConferenceKey> = conferences.into_iter().collect();
        let current = std::mem::take(&mut self.speakers[speaker.0].conferences);
        for dropped in current.difference(&replacement) {
            self.conferences[dropped.0].speakers.remove(&speaker);
        }
        for conference in &replacement {
            self.conferences[conference.0].speakers.insert(speaker);
        }
        self.speakers[speaker.0].conferences = replacement;
    }

    pub fn add_speaker_conference(&mut self, speaker: SpeakerKey, conference: ConferenceKey) {
        self.add_conference_speaker(conference, speaker);
    }

    pub fn remove_speaker_conference(&mut self, speaker: SpeakerKey, conference: ConferenceKey) {
        self.remove_conference_speaker(conference, speaker);
    }

    // Attendee * <-> * Session

    pub fn set_attendee_sessions(
        &mut self,
        attendee: AttendeeKey,
        sessions: impl IntoIterator<Item = SessionKey>,
    ) {
        let replacement: HashSet<SessionKey> = sessions.into_iter().collect();
        let current = std::mem::take(&mut self.attendees[attendee.0].sessions);
        for dropped in current.difference(&replacement) {
            self.sessions[dropped.0].attendees.remove(&attendee);
        }
        for session in &replacement {
            self.sessions[session.0].attendees.insert(attendee);
        }
        self.attendees[attendee.0].sessions = replacement;
    }

    pub fn add_attendee_session(&mut self, attendee: AttendeeKey, session: SessionKey) {
        self.attendees[attendee.0].sessions.insert(session);
        self.sessions[session.0].attendees.insert(attendee);
    }

    pub fn remove_attendee_session(&mut self, attendee: AttendeeKey, session: SessionKey) {
        self.attendees[attendee.0].sessions.remove(&session);
        self.sessions[session.0].attendees.remove(&attendee);
    }

    pub fn set_session_attendees(
        &mut self,
        session: SessionKey,
        attendees: impl IntoIterator<Item = AttendeeKey>,
    ) {
        let replacement: HashSet<AttendeeKey> = attendees.into_iter().collect();
        let current = std::mem::take(&mut self.sessions[session.0].attendees);
        for dropped in current.difference(&replacement) {
            self.attendees[dropped.0].sessions.remove(&session);
        }
        for attendee in &replacement {
            self.attendees[attendee.0].sessions.insert(session);
        }
        self.sessions[session.0].attendees = replacement;
    }

    pub fn add_session_attendee(&mut self, session: SessionKey, attendee: AttendeeKey) {
        self.add_attendee_session(attendee, session);
    }

    pub fn remove_session_attendee(&mut self, session: SessionKey, attendee: AttendeeKey) {
        self.remove_attendee_session(attendee, session);
    }
}
