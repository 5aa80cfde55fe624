//! Built-in commands: the help sentinel and `version`.

use crate::cmd::{Command, CommandKey, DispatchContext, ExecutionKind, ParameterSet};
use crate::error::Result;

/// Help entry of a command set. Never dispatched for real: the executor
/// renders contextual help when it resolves to this command.
pub struct HelpCommand {
    key: CommandKey,
    params: ParameterSet,
}

impl HelpCommand {
    pub fn new() -> Self {
        Self {
            key: CommandKey::new("help", Some("h"), "Print help"),
            params: ParameterSet::default(),
        }
    }
}

impl Default for HelpCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl Command for HelpCommand {
    fn key(&self) -> &CommandKey {
        &self.key
    }

    fn params(&self) -> &ParameterSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }

    fn kind(&self) -> ExecutionKind {
        ExecutionKind::Local
    }

    fn is_help_sentinel(&self) -> bool {
        true
    }

    fn dispatch(&self, _ctx: &mut DispatchContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Prints the program version.
pub struct VersionCommand {
    key: CommandKey,
    params: ParameterSet,
}

impl VersionCommand {
    pub fn new() -> Self {
        Self {
            key: CommandKey::new("version", Some("V"), "Print version"),
            params: ParameterSet::default(),
        }
    }
}

impl Default for VersionCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl Command for VersionCommand {
    fn key(&self) -> &CommandKey {
        &self.key
    }

    fn params(&self) -> &ParameterSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }

    fn kind(&self) -> ExecutionKind {
        ExecutionKind::Local
    }

    fn dispatch(&self, ctx: &mut DispatchContext<'_>) -> Result<()> {
        writeln!(
            ctx.out,
            "{} {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )?;
        Ok(())
    }
}
