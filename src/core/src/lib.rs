//! Stevedore Core - Foundational Types
//!
//! Errors, build configuration, logging setup and build events shared by
//! the stevedore build runtime and its embedders.

pub mod config;
pub mod error;
pub mod event;
pub mod log;

// Re-export commonly used types
pub use config::{BuildConfig, CleanupPolicy, LogLevel};
pub use error::{BuildError, EngineError, Result};
pub use event::{BuildEvent, EventEmitter, EventPayload};

/// Stevedore version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
