//! Image build engine.
//!
//! Executes tokenized Dockerfile instructions against an
//! [`EngineClient`](crate::engine::EngineClient), threading a [`State`]
//! through each step and turning metadata changes and container runs into
//! committed image layers.
//!
//! # Supported Instructions
//!
//! FROM, RUN, ENV, CMD, ENTRYPOINT, COPY, COMMIT, LABEL, WORKDIR, USER,
//! EXPOSE, MAINTAINER

pub mod archive;
pub mod builder;
pub mod command;
pub mod commit;
pub mod copy;
pub mod from;
pub mod metadata;
pub mod plan;
pub mod run;
pub mod state;

pub use builder::Build;
pub use command::{new_command, Command, ConfigCommand};
pub use plan::plan;
pub use state::{ContainerConfig, State};
