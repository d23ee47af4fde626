//! Marketplace block: the task lifecycle and participation state machines,
//! composed from the atoms' stores, caches and collaborators.

pub mod deps;
mod effects;
mod notices;
pub mod participation;
pub mod tasks;
pub mod types;

pub use deps::Dependencies;
pub use participation::{participation_actor, Actor, ParticipationManager};
pub use tasks::{is_task_transition, TaskManager};
pub use types::{Caller, ParticipantEntry, Role, TaskView};
