//! Instruction representation and dispatch.

use std::collections::HashMap;

use async_trait::async_trait;
use stevedore_core::error::{BuildError, Result};

use super::builder::Build;
use super::commit::CommandCommit;
use super::copy::CommandCopy;
use super::from::CommandFrom;
use super::metadata::{
    CommandCmd, CommandEntrypoint, CommandEnv, CommandExpose, CommandLabel, CommandMaintainer,
    CommandUser, CommandWorkdir,
};
use super::run::CommandRun;
use super::state::State;

/// A tokenized instruction as handed over by the Dockerfile parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigCommand {
    /// Instruction name, matched case-insensitively
    pub name: String,
    /// Argument tokens in source order
    pub args: Vec<String>,
    /// Named boolean attributes, e.g. `json` for exec-form CMD
    pub attrs: HashMap<String, bool>,
}

impl ConfigCommand {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
            attrs: HashMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: bool) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    /// Whether a boolean attribute is set; absent attributes are `false`.
    pub fn attr(&self, key: &str) -> bool {
        self.attrs.get(key).copied().unwrap_or(false)
    }

    /// Upper-cased instruction name as used in messages.
    pub fn instruction(&self) -> String {
        self.name.to_ascii_uppercase()
    }
}

/// A single executable build instruction.
///
/// `execute` reads the build's current state and returns the next one. It
/// must not assume the returned state is installed; the driver decides.
#[async_trait]
pub trait Command: Send + Sync {
    /// Upper-case instruction name, e.g. `"FROM"`.
    fn name(&self) -> &'static str;

    /// Argument tokens the command was built from.
    fn args(&self) -> &[String];

    async fn execute(&self, build: &Build) -> Result<State>;

    /// Human-readable `NAME args` form used in build output.
    fn describe(&self) -> String {
        if self.args().is_empty() {
            self.name().to_string()
        } else {
            format!("{} {}", self.name(), self.args().join(" "))
        }
    }
}

impl std::fmt::Debug for dyn Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Command({})", self.describe())
    }
}

/// Build the command for a parsed instruction, validating its arguments.
pub fn new_command(cfg: ConfigCommand) -> Result<Box<dyn Command>> {
    let command: Box<dyn Command> = match cfg.name.to_ascii_lowercase().as_str() {
        "from" => Box::new(CommandFrom::new(cfg)?),
        "run" => Box::new(CommandRun::new(cfg)?),
        "env" => Box::new(CommandEnv::new(cfg)?),
        "cmd" => Box::new(CommandCmd::new(cfg)?),
        "entrypoint" => Box::new(CommandEntrypoint::new(cfg)?),
        "copy" => Box::new(CommandCopy::new(cfg)?),
        "commit" => Box::new(CommandCommit::new(cfg)?),
        "label" => Box::new(CommandLabel::new(cfg)?),
        "workdir" => Box::new(CommandWorkdir::new(cfg)?),
        "user" => Box::new(CommandUser::new(cfg)?),
        "expose" => Box::new(CommandExpose::new(cfg)?),
        "maintainer" => Box::new(CommandMaintainer::new(cfg)?),
        _ => return Err(BuildError::UnknownInstruction(cfg.instruction())),
    };
    Ok(command)
}

/// `["/bin/sh", "-c", <line>]`, the shell form of a command line.
pub(crate) fn shell_form(line: impl Into<String>) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), line.into()]
}

/// Argument count check shared by the command constructors.
pub(crate) fn require_args(cfg: &ConfigCommand, min: usize, max: Option<usize>) -> Result<()> {
    let n = cfg.args.len();
    let ok = n >= min && max.map_or(true, |max| n <= max);
    if ok {
        return Ok(());
    }

    let expected = match max {
        Some(max) if max == min => format!("exactly {}", min),
        Some(max) => format!("between {} and {}", min, max),
        None => format!("at least {}", min),
    };
    Err(BuildError::invalid_args(
        cfg.instruction(),
        format!("expected {} argument(s), got {}", expected, n),
    ))
}

/// Split arguments into key/value pairs; an odd count is an error.
pub(crate) fn key_value_pairs(cfg: &ConfigCommand) -> Result<Vec<(String, String)>> {
    if cfg.args.is_empty() || cfg.args.len() % 2 != 0 {
        return Err(BuildError::invalid_args(
            cfg.instruction(),
            format!(
                "expected key/value pairs, got {} argument(s)",
                cfg.args.len()
            ),
        ));
    }
    Ok(cfg
        .args
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}
