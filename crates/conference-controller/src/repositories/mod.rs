//! Repository layer for the Conference Controller.
//!
//! Provides database access following the Handler -> Service -> Repository
//! architecture. All queries are parameterized; every check-then-act
//! operation (idempotent join, capacity enforcement, call exclusivity,
//! reaper sweeps) is a single atomic statement or an explicit transaction,
//! never an application-level check followed by a separate insert.

pub mod calls;
pub mod conferences;
pub mod contacts;
pub mod moderator_actions;
pub mod participants;
pub mod reminders;

pub use calls::CallsRepository;
pub use conferences::{ConferencesRepository, EndedConference, ScheduledConferenceParams};
pub use contacts::ContactsRepository;
pub use moderator_actions::ModeratorActionsRepository;
pub use participants::{AddOutcome, NewParticipant, ParticipantsRepository};
pub use reminders::RemindersRepository;
