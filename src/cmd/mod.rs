/*!
Command abstraction.

Every command (built-in, bound to a local interface method, or described
by a node schema) implements `Command`. The executor never looks at the
concrete type: it asks for the execution kind, parses parameters and
calls `dispatch`.

Layout:
  src/cmd/
    mod.rs      (this file: Command trait, keys, dispatch context)
    param.rs    (Parameter / ParameterSet + token parsing)
    set.rs      (CommandSet)
    builtin.rs  (help sentinel, version)
    local.rs    (LocalInterface + LocalCommand)
    schema.rs   (SchemaCommand, the remote variant)
    nodes.rs    (local `nodes` module: manifest management)
    help.rs     (usage / help / payload rendering)
    format.rs   (styling primitives)
*/

pub mod builtin;
pub mod format;
pub mod help;
pub mod local;
pub mod nodes;
pub mod param;
pub mod schema;
pub mod set;

use std::io::Write;
use std::time::Duration;

use tracing::debug;

use crate::error::Result;
use crate::node::GenericChannel;

pub use builtin::{HelpCommand, VersionCommand};
pub use format::StyleOptions;
pub use local::{LocalCommand, LocalInterface, MethodDescriptor};
pub use param::{Parameter, ParameterSet};
pub use schema::SchemaCommand;
pub use set::CommandSet;

/// Where a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionKind {
    Local,
    Remote,
}

/// Identity of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandKey {
    pub long: String,
    pub short: Option<String>,
    pub description: String,
}

impl CommandKey {
    pub fn new(long: impl Into<String>, short: Option<&str>, description: impl Into<String>) -> Self {
        Self {
            long: long.into(),
            short: short.filter(|s| !s.is_empty()).map(str::to_string),
            description: description.into(),
        }
    }

    /// Case-sensitive match on long or short key.
    pub fn matches(&self, name: &str) -> bool {
        self.long == name || self.short.as_deref() == Some(name)
    }

    pub fn collides_with(&self, other: &CommandKey) -> bool {
        self.matches(&other.long) || other.short.as_deref().is_some_and(|s| self.matches(s))
    }
}

/// Everything a command may need while dispatching.
pub struct DispatchContext<'a> {
    /// Call channel of the active node session, if any.
    pub channel: Option<&'a dyn GenericChannel>,
    pub out: &'a mut dyn Write,
    pub style: &'a StyleOptions,
    /// Opt-in bound for remote calls.
    pub call_timeout: Option<Duration>,
}

/// Polymorphic unit of work.
pub trait Command: Send {
    fn key(&self) -> &CommandKey;

    fn params(&self) -> &ParameterSet;

    fn params_mut(&mut self) -> &mut ParameterSet;

    fn kind(&self) -> ExecutionKind;

    /// Marks the entry the executor treats as "help requested".
    fn is_help_sentinel(&self) -> bool {
        false
    }

    /// Run the command with its parsed parameter values.
    fn dispatch(&self, ctx: &mut DispatchContext<'_>) -> Result<()>;

    /// Fill parameter values from tokens. `false` on malformed input, in
    /// which case the previous values are kept.
    fn parse_parameters(&mut self, tokens: &[String]) -> bool {
        match self.params_mut().parse(tokens) {
            Ok(()) => true,
            Err(e) => {
                debug!(command = %self.key().long, error = %e, "parameter parse failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_matching_is_exact_and_case_sensitive() {
        let k = CommandKey::new("stat", Some("s"), "");
        assert!(k.matches("stat"));
        assert!(k.matches("s"));
        assert!(!k.matches("Stat"));
        assert!(!k.matches("st"));
    }

    #[test]
    fn collisions_consider_both_keys() {
        let a = CommandKey::new("stat", Some("s"), "");
        assert!(a.collides_with(&CommandKey::new("scan", Some("s"), "")));
        assert!(a.collides_with(&CommandKey::new("s", None, "")));
        assert!(a.collides_with(&CommandKey::new("other", Some("stat"), "")));
        assert!(!a.collides_with(&CommandKey::new("scan", Some("c"), "")));
    }
}
