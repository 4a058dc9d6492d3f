//! Shared types for the Nova orchestration core: provider presets,
//! configuration, conversation turns, and data-file locations.

pub mod chat;
pub mod config;
pub mod paths;
pub mod presets;

pub use chat::{ChatRequest, Role, Turn};
pub use config::Config;
pub use paths::DataPaths;
pub use presets::{Preset, Protocol, ProviderKind};
