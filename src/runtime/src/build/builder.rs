//! Build context and driver loop.
//!
//! [`Build`] owns the working [`State`] and hands commands a read-only view
//! of it. [`Build::run`] executes a plan strictly in order, installs each
//! returned state, and stops at the first failure.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use stevedore_core::config::BuildConfig;
use stevedore_core::error::{BuildError, EngineError, Result};
use stevedore_core::event::{events, BuildEvent, EventEmitter};
use tokio_util::sync::CancellationToken;

use super::command::{Command, ConfigCommand};
use super::plan::plan;
use super::state::State;
use crate::engine::EngineClient;

/// Context of a single build run.
pub struct Build {
    config: BuildConfig,
    client: Arc<dyn EngineClient>,
    state: State,
    events: EventEmitter,
    cancel: CancellationToken,
    /// State committed by the running step before it failed
    checkpoint: Mutex<Option<State>>,
}

impl Build {
    pub fn new(config: BuildConfig, client: Arc<dyn EngineClient>) -> Self {
        Self {
            config,
            client,
            state: State::default(),
            events: EventEmitter::default(),
            cancel: CancellationToken::new(),
            checkpoint: Mutex::new(None),
        }
    }

    /// Start from a given state instead of an empty one.
    pub fn with_state(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    /// Publish build events through an existing emitter.
    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    /// Current state. Only the driver replaces it.
    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn client(&self) -> &dyn EngineClient {
        self.client.as_ref()
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Token that cancels the in-flight build when triggered.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Await an engine call, attributing failures to `instruction` and
    /// giving up as soon as the build is cancelled.
    pub async fn call<T, F>(&self, instruction: &str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, EngineError>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(BuildError::Cancelled),
            result = call => result.map_err(|e| BuildError::engine(instruction, e)),
        }
    }

    /// Remove a container, reporting success as an event.
    pub async fn remove_container(&self, id: &str) -> std::result::Result<(), EngineError> {
        self.client.remove_container(id).await?;
        tracing::debug!(container_id = id, "Container removed");
        self.events
            .emit(BuildEvent::text(events::CONTAINER_REMOVED, id));
        Ok(())
    }

    /// Best-effort removal; failures are logged and swallowed.
    pub(crate) async fn discard_container(&self, instruction: &str, id: &str) {
        if let Err(e) = self.remove_container(id).await {
            tracing::warn!(
                instruction,
                container_id = id,
                error = %e,
                "Failed to remove container"
            );
        }
    }

    /// Record a state the running step has already committed. If the step
    /// then fails, the driver installs this state before cleaning up.
    pub(crate) fn checkpoint(&self, state: &State) {
        *self.checkpoint.lock() = Some(state.clone());
    }

    /// Plan and run parsed instructions.
    pub async fn run_script(&mut self, commands: Vec<ConfigCommand>) -> Result<State> {
        let plan = plan(commands)?;
        self.run(&plan).await
    }

    /// Execute `plan` in order and return the final state.
    ///
    /// On failure the live container tracked by the current state, if any,
    /// is removed before the error is returned.
    pub async fn run(&mut self, plan: &[Box<dyn Command>]) -> Result<State> {
        let total = plan.len();

        for (idx, command) in plan.iter().enumerate() {
            let step = idx + 1;
            let description = command.describe();

            tracing::info!("Step {}/{} : {}", step, total, description);
            self.events.emit(BuildEvent::step(
                events::BUILD_STEP_STARTED,
                step,
                total,
                description.as_str(),
            ));

            self.checkpoint.lock().take();
            let result = if self.cancel.is_cancelled() {
                Err(BuildError::Cancelled)
            } else {
                command.execute(self).await
            };

            match result {
                Ok(state) => {
                    tracing::debug!(
                        image_id = %state.image_id,
                        container_id = %state.container_id,
                        pending = state.commit_msg.len(),
                        "Step {} completed",
                        step
                    );
                    self.state = state;
                    self.events.emit(BuildEvent::step(
                        events::BUILD_STEP_COMPLETED,
                        step,
                        total,
                        description,
                    ));
                }
                Err(e) => {
                    tracing::error!(step, error = %e, "Build failed");
                    let committed = self.checkpoint.lock().take();
                    if let Some(committed) = committed {
                        self.state = committed;
                    }
                    self.cleanup().await;
                    self.events
                        .emit(BuildEvent::text(events::BUILD_FAILED, e.to_string()));
                    return Err(e);
                }
            }
        }

        tracing::info!(image_id = %self.state.image_id, "Build completed");
        self.events.emit(BuildEvent::text(
            events::BUILD_COMPLETED,
            self.state.image_id.as_str(),
        ));
        Ok(self.state.clone())
    }

    /// Remove the live container left in the current state.
    async fn cleanup(&mut self) {
        if !self.state.has_container() {
            return;
        }
        let id = std::mem::take(&mut self.state.container_id);
        self.discard_container("cleanup", &id).await;
    }
}
