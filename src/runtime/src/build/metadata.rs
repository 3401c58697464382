//! Metadata-only instructions.
//!
//! These commands never touch the engine. They change the declared
//! configuration and record a history message that the next commit carries.

use async_trait::async_trait;
use stevedore_core::error::{BuildError, Result};

use super::builder::Build;
use super::command::{key_value_pairs, require_args, shell_form, Command, ConfigCommand};
use super::state::{env_key, State};

/// Implements the boilerplate of a metadata command around an `apply`
/// method that edits a state in place.
macro_rules! metadata_command {
    ($ty:ident, $name:literal) => {
        #[async_trait]
        impl Command for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn args(&self) -> &[String] {
                &self.cfg.args
            }

            async fn execute(&self, build: &Build) -> Result<State> {
                let mut state = build.state().clone();
                self.apply(&mut state)?;
                Ok(state)
            }
        }
    };
}

// =============================================================================
// ENV
// =============================================================================

/// `ENV <key> <value> [<key> <value> ...]`
#[derive(Debug, Clone)]
pub struct CommandEnv {
    cfg: ConfigCommand,
    pairs: Vec<(String, String)>,
}

impl CommandEnv {
    pub fn new(cfg: ConfigCommand) -> Result<Self> {
        let pairs = key_value_pairs(&cfg)?;
        if let Some((key, _)) = pairs.iter().find(|(k, _)| k.is_empty() || k.contains('=')) {
            return Err(BuildError::invalid_args(
                "ENV",
                format!("invalid variable name '{}'", key),
            ));
        }
        Ok(Self { cfg, pairs })
    }

    fn apply(&self, state: &mut State) -> Result<()> {
        state.config.env = merge_env(&state.config.env, &self.pairs);
        state.commit_msg.push(format!("ENV {}", render_pairs(&self.pairs)));
        Ok(())
    }
}

metadata_command!(CommandEnv, "ENV");

/// Merge `pairs` into `env`.
///
/// Existing keys are updated in place; new keys are appended in the order
/// they first appear in `pairs`. A key repeated within `pairs` takes its
/// last value.
pub fn merge_env(env: &[String], pairs: &[(String, String)]) -> Vec<String> {
    let mut updates: Vec<(&str, &str)> = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        match updates.iter_mut().find(|(k, _)| *k == key.as_str()) {
            Some(existing) => existing.1 = value.as_str(),
            None => updates.push((key.as_str(), value.as_str())),
        }
    }

    let mut used = vec![false; updates.len()];
    let mut merged: Vec<String> = env
        .iter()
        .map(|entry| {
            let key = env_key(entry);
            match updates.iter().position(|(k, _)| *k == key) {
                Some(idx) => {
                    used[idx] = true;
                    format!("{}={}", key, updates[idx].1)
                }
                None => entry.clone(),
            }
        })
        .collect();

    for (idx, (key, value)) in updates.iter().enumerate() {
        if !used[idx] {
            merged.push(format!("{}={}", key, value));
        }
    }
    merged
}

fn render_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// CMD / ENTRYPOINT
// =============================================================================

/// Exec form when the `json` attribute is set, shell form otherwise.
fn command_form(cfg: &ConfigCommand) -> Vec<String> {
    if cfg.attr("json") {
        cfg.args.clone()
    } else {
        shell_form(cfg.args.join(" "))
    }
}

fn render_command(command: &[String]) -> String {
    serde_json::to_string(command).unwrap_or_else(|_| command.join(" "))
}

/// `CMD ["exec", "form"]` or `CMD command line`
#[derive(Debug, Clone)]
pub struct CommandCmd {
    cfg: ConfigCommand,
}

impl CommandCmd {
    pub fn new(cfg: ConfigCommand) -> Result<Self> {
        Ok(Self { cfg })
    }

    fn apply(&self, state: &mut State) -> Result<()> {
        let cmd = command_form(&self.cfg);
        state.commit_msg.push(format!("CMD {}", render_command(&cmd)));
        state.config.cmd = Some(cmd);
        Ok(())
    }
}

metadata_command!(CommandCmd, "CMD");

/// `ENTRYPOINT ["exec", "form"]` or `ENTRYPOINT command line`
#[derive(Debug, Clone)]
pub struct CommandEntrypoint {
    cfg: ConfigCommand,
}

impl CommandEntrypoint {
    pub fn new(cfg: ConfigCommand) -> Result<Self> {
        Ok(Self { cfg })
    }

    fn apply(&self, state: &mut State) -> Result<()> {
        let entrypoint = command_form(&self.cfg);
        state
            .commit_msg
            .push(format!("ENTRYPOINT {}", render_command(&entrypoint)));
        state.config.entrypoint = Some(entrypoint);
        Ok(())
    }
}

metadata_command!(CommandEntrypoint, "ENTRYPOINT");

// =============================================================================
// LABEL / WORKDIR / USER / EXPOSE / MAINTAINER
// =============================================================================

/// `LABEL <key> <value> [<key> <value> ...]`
#[derive(Debug, Clone)]
pub struct CommandLabel {
    cfg: ConfigCommand,
    pairs: Vec<(String, String)>,
}

impl CommandLabel {
    pub fn new(cfg: ConfigCommand) -> Result<Self> {
        let pairs = key_value_pairs(&cfg)?;
        Ok(Self { cfg, pairs })
    }

    fn apply(&self, state: &mut State) -> Result<()> {
        for (key, value) in &self.pairs {
            state.config.labels.insert(key.clone(), value.clone());
        }
        state
            .commit_msg
            .push(format!("LABEL {}", render_pairs(&self.pairs)));
        Ok(())
    }
}

metadata_command!(CommandLabel, "LABEL");

/// `WORKDIR <path>`
#[derive(Debug, Clone)]
pub struct CommandWorkdir {
    cfg: ConfigCommand,
}

impl CommandWorkdir {
    pub fn new(cfg: ConfigCommand) -> Result<Self> {
        require_args(&cfg, 1, Some(1))?;
        Ok(Self { cfg })
    }

    fn apply(&self, state: &mut State) -> Result<()> {
        let path = &self.cfg.args[0];
        state.config.working_dir = resolve_path(&state.config.working_dir, path);
        state.commit_msg.push(format!("WORKDIR {}", path));
        Ok(())
    }
}

metadata_command!(CommandWorkdir, "WORKDIR");

/// Resolve a path relative to a working directory.
///
/// If `path` is absolute, return it as-is. Otherwise, join with `workdir`,
/// where an empty `workdir` means `/`.
pub(crate) fn resolve_path(workdir: &str, path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", workdir.trim_end_matches('/'), path)
    }
}

/// `USER <user>[:<group>]`
#[derive(Debug, Clone)]
pub struct CommandUser {
    cfg: ConfigCommand,
}

impl CommandUser {
    pub fn new(cfg: ConfigCommand) -> Result<Self> {
        require_args(&cfg, 1, Some(1))?;
        Ok(Self { cfg })
    }

    fn apply(&self, state: &mut State) -> Result<()> {
        state.config.user = self.cfg.args[0].clone();
        state.commit_msg.push(format!("USER {}", self.cfg.args[0]));
        Ok(())
    }
}

metadata_command!(CommandUser, "USER");

/// `EXPOSE <port>[/<proto>] ...`
#[derive(Debug, Clone)]
pub struct CommandExpose {
    cfg: ConfigCommand,
    ports: Vec<String>,
}

impl CommandExpose {
    pub fn new(cfg: ConfigCommand) -> Result<Self> {
        require_args(&cfg, 1, None)?;
        let ports = cfg
            .args
            .iter()
            .map(|p| normalize_port(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { cfg, ports })
    }

    fn apply(&self, state: &mut State) -> Result<()> {
        for port in &self.ports {
            state
                .config
                .exposed_ports
                .entry(port.clone())
                .or_insert_with(|| serde_json::json!({}));
        }
        state
            .commit_msg
            .push(format!("EXPOSE {}", self.ports.join(" ")));
        Ok(())
    }
}

metadata_command!(CommandExpose, "EXPOSE");

/// `80` -> `80/tcp`; explicit protocols must be `tcp`, `udp` or `sctp`.
fn normalize_port(value: &str) -> Result<String> {
    let (port, proto) = value.split_once('/').unwrap_or((value, "tcp"));
    let proto = proto.to_ascii_lowercase();

    if port.parse::<u16>().is_err() || !matches!(proto.as_str(), "tcp" | "udp" | "sctp") {
        return Err(BuildError::invalid_args(
            "EXPOSE",
            format!("invalid port '{}'", value),
        ));
    }
    Ok(format!("{}/{}", port, proto))
}

/// `MAINTAINER <name>`: recorded in the image history only.
#[derive(Debug, Clone)]
pub struct CommandMaintainer {
    cfg: ConfigCommand,
}

impl CommandMaintainer {
    pub fn new(cfg: ConfigCommand) -> Result<Self> {
        require_args(&cfg, 1, None)?;
        Ok(Self { cfg })
    }

    fn apply(&self, state: &mut State) -> Result<()> {
        state
            .commit_msg
            .push(format!("MAINTAINER {}", self.cfg.args.join(" ")));
        Ok(())
    }
}

metadata_command!(CommandMaintainer, "MAINTAINER");
