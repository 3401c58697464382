//! Stevedore Runtime - Dockerfile build engine.
//!
//! Executes Dockerfile instructions against a container daemon reached
//! through the [`EngineClient`] contract, committing each layer as it goes.

#![allow(clippy::result_large_err)]

pub mod build;
pub mod engine;

// Re-export common types
pub use build::{new_command, plan, Build, Command, ConfigCommand, ContainerConfig, State};
pub use engine::{ArchiveReader, EngineClient, ImageInfo, RecordingClient};

/// Stevedore Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
