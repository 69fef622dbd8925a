//! Conversation orchestration
//!
//! [`machine`] holds the turn-taking rules, [`ambient`] the idle animation
//! policy, and [`Orchestrator`] drives both against the real services.

pub mod ambient;
pub mod machine;
mod orchestrator;

pub use ambient::AmbientRotation;
pub use machine::{Command, Conversation, Event, LinkEvent, Phase, TurnId};
pub use orchestrator::{Orchestrator, OrchestratorHandle, Services, SessionInput};
