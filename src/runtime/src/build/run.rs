use async_trait::async_trait;
use stevedore_core::error::Result;

use super::builder::Build;
use super::command::{require_args, shell_form, Command, ConfigCommand};
use super::commit::commit_state;
use super::state::State;

/// `RUN <command line>`: run a shell command in a fresh container.
///
/// The shell-wrapped command only exists on the transient config the
/// container is created with; the declared `Cmd` is left untouched.
#[derive(Debug, Clone)]
pub struct CommandRun {
    cfg: ConfigCommand,
}

impl CommandRun {
    pub fn new(cfg: ConfigCommand) -> Result<Self> {
        require_args(&cfg, 1, None)?;
        Ok(Self { cfg })
    }
}

#[async_trait]
impl Command for CommandRun {
    fn name(&self) -> &'static str {
        "RUN"
    }

    fn args(&self) -> &[String] {
        &self.cfg.args
    }

    async fn execute(&self, build: &Build) -> Result<State> {
        let client = build.client();
        let mut state = build.state().clone();

        if state.has_container() {
            tracing::debug!(
                container_id = %state.container_id,
                "Committing live container before RUN"
            );
            state = commit_state(build, self.name(), &state).await?;
            build.checkpoint(&state);
        }

        let mut transient = state.clone();
        transient.config.cmd = Some(shell_form(self.cfg.args.join(" ")));

        let id = build
            .call(self.name(), client.create_container(&transient))
            .await?;
        tracing::debug!(container_id = %id, "Created container");

        if let Err(e) = build.call(self.name(), client.run_container(&id, false)).await {
            build.discard_container(self.name(), &id).await;
            return Err(e);
        }

        state.container_id = id;
        Ok(state)
    }
}
