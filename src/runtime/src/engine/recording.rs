//! Scripted engine client for exercising instructions without a daemon.
//!
//! Every call is recorded with its arguments. Each operation answers from
//! its own FIFO of scripted replies; a call with nothing scripted fails with
//! [`EngineError::NotScripted`].

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use stevedore_core::error::EngineError;
use tokio::io::AsyncReadExt;

use super::{ArchiveReader, EngineClient, ImageInfo};
use crate::build::State;

/// A recorded engine call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    InspectImage(String),
    PullImage(String),
    CreateContainer(State),
    RunContainer { id: String, attach: bool },
    CommitContainer { state: State, message: String },
    RemoveContainer(String),
    /// `content` holds the drained archive bytes
    UploadToContainer {
        id: String,
        dest_dir: String,
        content: Vec<u8>,
    },
}

impl Call {
    pub fn operation(&self) -> &'static str {
        match self {
            Call::InspectImage(_) => "inspect_image",
            Call::PullImage(_) => "pull_image",
            Call::CreateContainer(_) => "create_container",
            Call::RunContainer { .. } => "run_container",
            Call::CommitContainer { .. } => "commit_container",
            Call::RemoveContainer(_) => "remove_container",
            Call::UploadToContainer { .. } => "upload_to_container",
        }
    }
}

type Replies<T> = VecDeque<Result<T, String>>;

#[derive(Default)]
struct Script {
    inspect_image: Replies<Option<ImageInfo>>,
    pull_image: Replies<()>,
    create_container: Replies<String>,
    run_container: Replies<()>,
    commit_container: Replies<String>,
    remove_container: Replies<()>,
    upload_to_container: Replies<()>,
}

impl Script {
    fn pending(&self) -> Vec<(&'static str, usize)> {
        [
            ("inspect_image", self.inspect_image.len()),
            ("pull_image", self.pull_image.len()),
            ("create_container", self.create_container.len()),
            ("run_container", self.run_container.len()),
            ("commit_container", self.commit_container.len()),
            ("remove_container", self.remove_container.len()),
            ("upload_to_container", self.upload_to_container.len()),
        ]
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .collect()
    }
}

fn next<T>(replies: &mut Replies<T>, operation: &str) -> Result<T, EngineError> {
    match replies.pop_front() {
        Some(Ok(value)) => Ok(value),
        Some(Err(message)) => Err(EngineError::Daemon(message)),
        None => Err(EngineError::NotScripted(operation.to_string())),
    }
}

/// Engine client double that records calls and replays scripted results.
#[derive(Default)]
pub struct RecordingClient {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_inspect_image(&self, reply: Result<Option<ImageInfo>, &str>) -> &Self {
        self.script
            .lock()
            .inspect_image
            .push_back(reply.map_err(str::to_string));
        self
    }

    pub fn on_pull_image(&self, reply: Result<(), &str>) -> &Self {
        self.script
            .lock()
            .pull_image
            .push_back(reply.map_err(str::to_string));
        self
    }

    pub fn on_create_container(&self, reply: Result<&str, &str>) -> &Self {
        self.script
            .lock()
            .create_container
            .push_back(reply.map(str::to_string).map_err(str::to_string));
        self
    }

    pub fn on_run_container(&self, reply: Result<(), &str>) -> &Self {
        self.script
            .lock()
            .run_container
            .push_back(reply.map_err(str::to_string));
        self
    }

    pub fn on_commit_container(&self, reply: Result<&str, &str>) -> &Self {
        self.script
            .lock()
            .commit_container
            .push_back(reply.map(str::to_string).map_err(str::to_string));
        self
    }

    pub fn on_remove_container(&self, reply: Result<(), &str>) -> &Self {
        self.script
            .lock()
            .remove_container
            .push_back(reply.map_err(str::to_string));
        self
    }

    /// Script an upload reply. An `Err` reply is returned before the
    /// archive is read, which closes the transfer pipe on the producer.
    pub fn on_upload_to_container(&self, reply: Result<(), &str>) -> &Self {
        self.script
            .lock()
            .upload_to_container
            .push_back(reply.map_err(str::to_string));
        self
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Number of calls made to `operation` (e.g. `"pull_image"`).
    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Panic if any scripted reply was never consumed.
    pub fn assert_exhausted(&self) {
        let pending = self.script.lock().pending();
        assert!(pending.is_empty(), "unconsumed scripted replies: {:?}", pending);
    }

    fn record(&self, call: Call) {
        tracing::trace!(operation = call.operation(), "Engine call recorded");
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl EngineClient for RecordingClient {
    async fn inspect_image(&self, name: &str) -> Result<Option<ImageInfo>, EngineError> {
        self.record(Call::InspectImage(name.to_string()));
        next(&mut self.script.lock().inspect_image, "inspect_image")
    }

    async fn pull_image(&self, name: &str) -> Result<(), EngineError> {
        self.record(Call::PullImage(name.to_string()));
        next(&mut self.script.lock().pull_image, "pull_image")
    }

    async fn create_container(&self, state: &State) -> Result<String, EngineError> {
        self.record(Call::CreateContainer(state.clone()));
        next(&mut self.script.lock().create_container, "create_container")
    }

    async fn run_container(&self, id: &str, attach: bool) -> Result<(), EngineError> {
        self.record(Call::RunContainer {
            id: id.to_string(),
            attach,
        });
        next(&mut self.script.lock().run_container, "run_container")
    }

    async fn commit_container(&self, state: &State, message: &str) -> Result<String, EngineError> {
        self.record(Call::CommitContainer {
            state: state.clone(),
            message: message.to_string(),
        });
        next(&mut self.script.lock().commit_container, "commit_container")
    }

    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        self.record(Call::RemoveContainer(id.to_string()));
        next(&mut self.script.lock().remove_container, "remove_container")
    }

    async fn upload_to_container(
        &self,
        id: &str,
        mut archive: ArchiveReader,
        dest_dir: &str,
    ) -> Result<(), EngineError> {
        let reply = next(
            &mut self.script.lock().upload_to_container,
            "upload_to_container",
        );

        let mut content = Vec::new();
        if reply.is_ok() {
            archive.read_to_end(&mut content).await?;
        }

        self.record(Call::UploadToContainer {
            id: id.to_string(),
            dest_dir: dest_dir.to_string(),
            content,
        });
        reply
    }
}
