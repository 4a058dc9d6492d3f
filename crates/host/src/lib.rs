//! Orchestration core: history, command execution, personality evolution,
//! web context, and the chat orchestrator that ties them together.

pub mod exec;
pub mod fetch;
pub mod history;
pub mod orchestrator;
pub mod personality;
pub mod prompts;

mod evolve;

pub use evolve::Evolution;
pub use exec::CommandOutcome;
pub use history::History;
pub use orchestrator::{ChatEvent, Orchestrator};
