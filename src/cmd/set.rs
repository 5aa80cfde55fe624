//! Insertion-ordered command set with a designated help entry.

use crate::cmd::{Command, HelpCommand};
use crate::error::{Error, Result};

/// Commands of one module (or the top level).
pub struct CommandSet {
    commands: Vec<Box<dyn Command>>,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandSet {
    /// New set holding only its help sentinel.
    pub fn new() -> Self {
        Self {
            commands: vec![Box::new(HelpCommand::new())],
        }
    }

    /// Add a command; its long or short key must not be taken.
    pub fn add(&mut self, command: Box<dyn Command>) -> Result<()> {
        if let Some(existing) = self
            .commands
            .iter()
            .find(|c| c.key().collides_with(command.key()))
        {
            return Err(Error::DuplicateCommand(format!(
                "{} (conflicts with {})",
                command.key().long,
                existing.key().long
            )));
        }
        self.commands.push(command);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands
            .iter()
            .find(|c| c.key().matches(name))
            .map(|c| c.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut dyn Command> {
        for c in self.commands.iter_mut() {
            if c.key().matches(name) {
                return Some(c.as_mut());
            }
        }
        None
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn help_command(&self) -> &dyn Command {
        // Slot 0 is filled by `new` and never removed.
        self.commands[0].as_ref()
    }

    /// All commands in insertion order, help sentinel included.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Command> {
        self.commands.iter().map(|c| c.as_ref() as &dyn Command)
    }

    /// Number of commands besides the help sentinel.
    pub fn len(&self) -> usize {
        self.commands.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::VersionCommand;

    #[test]
    fn new_set_only_has_help() {
        let set = CommandSet::new();
        assert!(set.is_empty());
        assert!(set.has("help"));
        assert!(set.has("h"));
        assert!(set.help_command().is_help_sentinel());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut set = CommandSet::new();
        set.add(Box::new(VersionCommand::new())).unwrap();
        let err = set.add(Box::new(VersionCommand::new())).unwrap_err();
        assert!(matches!(err, Error::DuplicateCommand(_)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn lookup_by_both_keys() {
        let mut set = CommandSet::new();
        set.add(Box::new(VersionCommand::new())).unwrap();
        assert_eq!(set.get("V").unwrap().key().long, "version");
        assert!(set.get_mut("version").is_some());
        assert!(set.get("Version").is_none());
        let keys: Vec<&str> = set.iter().map(|c| c.key().long.as_str()).collect();
        assert_eq!(keys, vec!["help", "version"]);
    }
}
