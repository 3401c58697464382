//! Engine client contract.
//!
//! The build engine talks to the container daemon only through
//! [`EngineClient`]. Adapters for a concrete daemon implement it;
//! [`recording::RecordingClient`] is a scripted double for tests.

pub mod recording;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stevedore_core::error::EngineError;
use tokio::io::AsyncRead;

use crate::build::{ContainerConfig, State};

pub use recording::{Call, RecordingClient};

/// Tar stream handed to [`EngineClient::upload_to_container`].
pub type ArchiveReader = Box<dyn AsyncRead + Send + Unpin>;

/// Result of a successful image inspection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: String,
    pub config: ContainerConfig,
}

/// Primitive daemon operations consumed by build instructions.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Inspect an image. `Ok(None)` means the image does not exist locally;
    /// it is not an error.
    async fn inspect_image(&self, name: &str) -> Result<Option<ImageInfo>, EngineError>;

    /// Pull an image from its registry.
    async fn pull_image(&self, name: &str) -> Result<(), EngineError>;

    /// Create a container from `state.image_id` with `state.config`.
    async fn create_container(&self, state: &State) -> Result<String, EngineError>;

    /// Start a container and wait for it to exit.
    async fn run_container(&self, id: &str, attach: bool) -> Result<(), EngineError>;

    /// Commit `state.container_id` with `state.config`, returning the new image id.
    async fn commit_container(&self, state: &State, message: &str) -> Result<String, EngineError>;

    async fn remove_container(&self, id: &str) -> Result<(), EngineError>;

    /// Extract a tar stream into the directory `dest_dir` of a container.
    async fn upload_to_container(
        &self,
        id: &str,
        archive: ArchiveReader,
        dest_dir: &str,
    ) -> Result<(), EngineError>;
}
