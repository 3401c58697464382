//! Turns parsed instructions into an executable plan.
//!
//! Metadata instructions only touch the state, so the planner inserts the
//! COMMITs that turn them (and every RUN or COPY) into image layers.

use stevedore_core::error::Result;

use super::command::{new_command, Command, ConfigCommand};
use super::commit::CommandCommit;

/// Build commands for `commands`, inserting implicit COMMITs.
///
/// - before FROM, when there are uncommitted changes
/// - after every RUN
/// - after COPY, unless the next instruction is also COPY
/// - at the end, when there are uncommitted changes
///
/// An explicit COMMIT clears the uncommitted flag. No implicit COMMIT is
/// added right before an explicit one, so `RUN make; COMMIT` commits once.
pub fn plan(commands: Vec<ConfigCommand>) -> Result<Vec<Box<dyn Command>>> {
    let commands = commands
        .into_iter()
        .map(new_command)
        .collect::<Result<Vec<_>>>()?;

    let next_names: Vec<Option<&'static str>> = commands
        .iter()
        .skip(1)
        .map(|c| Some(c.name()))
        .chain(std::iter::once(None))
        .collect();

    let mut planned: Vec<Box<dyn Command>> = Vec::with_capacity(commands.len() * 2);
    let mut dirty = false;

    for (command, next) in commands.into_iter().zip(next_names) {
        match command.name() {
            "FROM" => {
                if dirty {
                    planned.push(Box::new(CommandCommit::default()));
                }
                dirty = false;
                planned.push(command);
            }
            "COMMIT" => {
                dirty = false;
                planned.push(command);
            }
            "RUN" | "COPY" => {
                let name = command.name();
                planned.push(command);
                if next == Some("COMMIT") || (name == "COPY" && next == Some("COPY")) {
                    dirty = true;
                } else {
                    planned.push(Box::new(CommandCommit::default()));
                    dirty = false;
                }
            }
            _ => {
                dirty = true;
                planned.push(command);
            }
        }
    }

    if dirty {
        planned.push(Box::new(CommandCommit::default()));
    }

    tracing::debug!(steps = planned.len(), "Planned build");
    Ok(planned)
}
