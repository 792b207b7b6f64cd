//! Eager loading of many-valued associations.
//!
//! Models load without their collections. The repositories here add them
//! back with one extra join query per call and return entities in the order
//! they were passed in.

mod bag;

pub mod attendee_repository;
pub mod session_repository;
pub mod speaker_repository;

pub use attendee_repository::AttendeeRepository;
pub use session_repository::SessionRepository;
pub use speaker_repository::SpeakerRepository;
