use async_trait::async_trait;
use stevedore_core::config::CleanupPolicy;
use stevedore_core::error::{BuildError, Result};

use super::builder::Build;
use super::command::{require_args, shell_form, Command, ConfigCommand};
use super::state::State;

/// `COMMIT`: finalize the live container or pending metadata into an image.
#[derive(Debug, Clone)]
pub struct CommandCommit {
    cfg: ConfigCommand,
}

impl CommandCommit {
    pub fn new(cfg: ConfigCommand) -> Result<Self> {
        require_args(&cfg, 0, Some(0))?;
        Ok(Self { cfg })
    }
}

impl Default for CommandCommit {
    fn default() -> Self {
        Self {
            cfg: ConfigCommand::new("commit", Vec::<String>::new()),
        }
    }
}

#[async_trait]
impl Command for CommandCommit {
    fn name(&self) -> &'static str {
        "COMMIT"
    }

    fn args(&self) -> &[String] {
        &self.cfg.args
    }

    async fn execute(&self, build: &Build) -> Result<State> {
        commit_state(build, self.name(), build.state()).await
    }
}

/// Commit `state` into a new image on behalf of `instruction`.
///
/// Without a live container the pending messages are carried by a no-op
/// container. The committed container is removed afterwards; whether a
/// failed removal fails the instruction follows the build's cleanup policy.
pub(crate) async fn commit_state(build: &Build, instruction: &str, state: &State) -> Result<State> {
    let client = build.client();
    let message = state.commit_msg.join("; ");
    let mut s = state.clone();
    let mut nop_container = false;

    if !s.has_container() {
        if s.commit_msg.is_empty() {
            return Err(BuildError::precondition(
                instruction,
                "Nothing to commit, set some commands to the build or RUN something",
            ));
        }

        let mut nop = s.clone();
        nop.config.cmd = Some(shell_form(format!("#(nop) {}", message)));
        s.container_id = build.call(instruction, client.create_container(&nop)).await?;
        nop_container = true;
    }

    let image_id = match build
        .call(instruction, client.commit_container(&s, &message))
        .await
    {
        Ok(id) => id,
        Err(e) => {
            // the driver only knows about containers recorded in its state
            if nop_container {
                build.discard_container(instruction, &s.container_id).await;
            }
            return Err(e);
        }
    };

    tracing::info!(
        image_id = %image_id,
        container_id = %s.container_id,
        message = %message,
        "Committed container"
    );

    if let Err(e) = build.remove_container(&s.container_id).await {
        match build.config().cleanup_policy {
            CleanupPolicy::Fail => {
                return Err(BuildError::Cleanup {
                    instruction: instruction.to_string(),
                    container_id: s.container_id.clone(),
                    image_id,
                    message: e.to_string(),
                });
            }
            CleanupPolicy::Warn => {
                tracing::warn!(
                    container_id = %s.container_id,
                    image_id = %image_id,
                    error = %e,
                    "Container left behind after commit"
                );
            }
        }
    }

    s.image_id = image_id;
    s.container_id.clear();
    s.commit_msg = Vec::new();
    s.config.cmd = None;
    Ok(s)
}
