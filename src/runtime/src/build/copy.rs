use async_trait::async_trait;
use stevedore_core::error::{BuildError, Result};

use super::archive::{plan_archive, write_archive, ArchivePlan};
use super::builder::Build;
use super::command::{require_args, shell_form, Command, ConfigCommand};
use super::metadata::resolve_path;
use super::state::State;

/// `COPY <src>... <dest>`: stream files from the build context into the
/// live container.
///
/// The archive is produced by a spawned task into a bounded in-memory pipe
/// while the engine consumes the other end, so memory use does not grow
/// with the size of the copied tree.
#[derive(Debug, Clone)]
pub struct CommandCopy {
    cfg: ConfigCommand,
}

impl CommandCopy {
    pub fn new(cfg: ConfigCommand) -> Result<Self> {
        require_args(&cfg, 2, None)?;
        Ok(Self { cfg })
    }

    fn sources(&self) -> &[String] {
        &self.cfg.args[..self.cfg.args.len() - 1]
    }

    fn destination(&self, workdir: &str) -> String {
        let dest = &self.cfg.args[self.cfg.args.len() - 1];
        if dest == "." || dest.ends_with("/.") {
            format!("{}/", resolve_path(workdir, dest.trim_end_matches('.')))
        } else {
            resolve_path(workdir, dest)
        }
    }

    async fn upload(&self, build: &Build, id: &str, plan: ArchivePlan) -> Result<()> {
        let (writer, reader) = tokio::io::duplex(build.config().copy_buffer_size);
        let producer = tokio::spawn(write_archive(plan.entries, writer));

        let uploaded = build
            .call(
                self.name(),
                build
                    .client()
                    .upload_to_container(id, Box::new(reader), &plan.dest_dir),
            )
            .await;

        if let Err(e) = uploaded {
            // The reader is gone by now; wait for the producer to wind down
            producer.abort();
            let _ = producer.await;
            return Err(e);
        }

        let archived = match producer.await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        archived.map_err(|message| BuildError::Archive {
            instruction: self.name().to_string(),
            source_path: self.sources().join(" "),
            message,
        })
    }
}

#[async_trait]
impl Command for CommandCopy {
    fn name(&self) -> &'static str {
        "COPY"
    }

    fn args(&self) -> &[String] {
        &self.cfg.args
    }

    async fn execute(&self, build: &Build) -> Result<State> {
        let client = build.client();
        let mut state = build.state().clone();

        let dest = self.destination(&state.config.working_dir);
        let plan = plan_archive(&build.config().context_dir, self.sources(), &dest)?;
        tracing::debug!(
            dest_dir = %plan.dest_dir,
            entries = plan.entries.len(),
            "Planned COPY archive"
        );

        let mut created = false;
        if !state.has_container() {
            let mut transient = state.clone();
            transient.config.cmd = Some(shell_form(format!(
                "#(nop) COPY {}",
                self.cfg.args.join(" ")
            )));
            state.container_id = build
                .call(self.name(), client.create_container(&transient))
                .await?;
            created = true;
            tracing::debug!(container_id = %state.container_id, "Created container");
        }

        if let Err(e) = self.upload(build, &state.container_id, plan).await {
            if created {
                build
                    .discard_container(self.name(), &state.container_id)
                    .await;
            }
            return Err(e);
        }

        Ok(state)
    }
}
