/*!
executor.rs - resolves CLI tokens into a module, a command and its
parameters, then runs it locally or through the active node session.

Resolution:
  [] / help / -h            -> top-level help
  <module>                  -> module help
  <module> help             -> module help
  <module> <command> args.. -> parse, dispatch (or command help on bad args)
  <command> args..          -> top-level local command
  <unknown>                 -> top-level help, then UnknownCommand

Module keys shadow local command names. Remote command sets are fetched
once per module and cached for the executor's lifetime; a name missing
from a loaded set triggers one single-command fetch.
*/

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cmd::format::StyleOptions;
use crate::cmd::help;
use crate::cmd::{
    Command, CommandSet, DispatchContext, LocalCommand, LocalInterface, SchemaCommand,
    VersionCommand,
};
use crate::error::{Error, Result};
use crate::module::{Module, ModuleRegistry, NodeSource};
use crate::node::{CommandSetDescription, GenericChannel, NodeSession, SessionFactory};
use crate::utils::logging;

/// Knobs of one executor.
#[derive(Debug, Clone, Default)]
pub struct ExecutorOptions {
    /// Bound for remote calls; `None` waits forever.
    pub call_timeout: Option<Duration>,
    /// Render a progress bar on stderr while loading a command set.
    pub progress: bool,
    pub style: StyleOptions,
}

/// What `execute` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Executed,
    TopLevelHelp,
    ModuleHelp(String),
    CommandHelp(String),
}

pub struct Executor {
    registry: ModuleRegistry,
    local_set: CommandSet,
    local_modules: HashMap<String, CommandSet>,
    remote_sets: HashMap<String, CommandSet>,
    active: Option<Module>,
    session: Option<Box<dyn NodeSession>>,
    factory: Box<dyn SessionFactory>,
    last_percent: u64,
    options: ExecutorOptions,
}

impl Executor {
    pub fn new(factory: Box<dyn SessionFactory>, options: ExecutorOptions) -> Result<Self> {
        let mut local_set = CommandSet::new();
        local_set.add(Box::new(VersionCommand::new()))?;
        Ok(Self {
            registry: ModuleRegistry::new(),
            local_set,
            local_modules: HashMap::new(),
            remote_sets: HashMap::new(),
            active: None,
            session: None,
            factory,
            last_percent: 0,
            options,
        })
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn active_module(&self) -> Option<&Module> {
        self.active.as_ref()
    }

    /// Cached command set of a module, if it was loaded already.
    pub fn command_set(&self, module_key: &str) -> Option<&CommandSet> {
        self.local_modules
            .get(module_key)
            .or_else(|| self.remote_sets.get(module_key))
    }

    /* ---- Registration ---- */

    /// Register remote modules found in `source`. Returns the added ones.
    pub fn discover(&mut self, source: &NodeSource) -> Result<Vec<Module>> {
        let added = self.registry.discover_remote(source)?;
        debug!(count = added.len(), "node discovery finished");
        Ok(added)
    }

    pub fn add_local_command(&mut self, command: Box<dyn Command>) -> Result<()> {
        self.local_set.add(command)
    }

    /// Every method of `interface` becomes a top-level local command.
    pub fn register_local_interface(&mut self, interface: Arc<dyn LocalInterface>) -> Result<()> {
        for method in interface.methods() {
            self.local_set
                .add(Box::new(LocalCommand::new(interface.clone(), method)))?;
        }
        Ok(())
    }

    /// Register `interface` as its own local module.
    pub fn register_local_module(
        &mut self,
        interface: Arc<dyn LocalInterface>,
        long_key: &str,
        description: &str,
        short_key: Option<&str>,
    ) -> Result<()> {
        let mut set = CommandSet::new();
        for method in interface.methods() {
            set.add(Box::new(LocalCommand::new(interface.clone(), method)))?;
        }
        self.registry
            .register(Module::local(long_key, description, short_key))?;
        self.local_modules.insert(long_key.to_string(), set);
        Ok(())
    }

    /// Drop the cached command set of a remote module. The next access
    /// fetches it again.
    pub fn invalidate_module(&mut self, module_key: &str) -> bool {
        self.remote_sets.remove(module_key).is_some()
    }

    /* ---- Execution ---- */

    pub fn execute(&mut self, tokens: &[String], out: &mut dyn Write) -> Result<Outcome> {
        let Some(first) = tokens.first() else {
            self.print_top_level_help(out)?;
            return Ok(Outcome::TopLevelHelp);
        };
        let first = normalize_flag(first);
        if first.starts_with('-') {
            self.print_top_level_help(out)?;
            return Err(Error::MalformedInput(format!("unexpected option '{first}'")));
        }

        if let Some(module) = self.registry.lookup(first).cloned() {
            self.set_module(&module)?;
            return self.execute_in_module(&module, &tokens[1..], out);
        }

        let Some(command) = self.local_set.get(first) else {
            self.print_top_level_help(out)?;
            return Err(Error::UnknownCommand(first.to_string()));
        };
        if command.is_help_sentinel() {
            self.print_top_level_help(out)?;
            return Ok(Outcome::TopLevelHelp);
        }
        let channel = self.session.as_deref().map(|s| s.call_channel());
        run_command(
            &mut self.local_set,
            None,
            first,
            &tokens[1..],
            channel,
            out,
            &self.options,
        )
    }

    fn execute_in_module(
        &mut self,
        module: &Module,
        rest: &[String],
        out: &mut dyn Write,
    ) -> Result<Outcome> {
        let key = module.long_key().to_string();
        if !module.is_local() {
            self.ensure_remote_set(module)?;
        }
        let Some(name) = rest.first().map(|t| normalize_flag(t)) else {
            self.print_module_help(module, out)?;
            return Ok(Outcome::ModuleHelp(key));
        };
        if !module.is_local() {
            self.fetch_missing_command(&key, name)?;
        }

        let set = if module.is_local() {
            self.local_modules.get_mut(&key)
        } else {
            self.remote_sets.get_mut(&key)
        };
        let Some(set) = set else {
            self.print_module_help(module, out)?;
            return Ok(Outcome::ModuleHelp(key));
        };
        match set.get(name) {
            Some(cmd) if !cmd.is_help_sentinel() => {}
            _ => {
                help::print_usage(out, Some(module), None, true, &self.options.style)?;
                print_module_description(out, module)?;
                help::print_cmd_set_help(out, set, &self.options.style)?;
                return Ok(Outcome::ModuleHelp(key));
            }
        }

        let channel = self.session.as_deref().map(|s| s.call_channel());
        run_command(set, Some(module), name, &rest[1..], channel, out, &self.options)
    }

    /// Make `module` the active one. Switching tears down the previous
    /// session first; remote modules get a freshly initialized session.
    fn set_module(&mut self, module: &Module) -> Result<()> {
        let same = self
            .active
            .as_ref()
            .is_some_and(|m| m.long_key() == module.long_key());
        if same && (module.is_local() || self.session.is_some()) {
            return Ok(());
        }

        if let Some(old) = self.session.take() {
            debug!(node = %old.module_key(), "closing node session");
        }
        self.active = Some(module.clone());
        if module.is_local() {
            return Ok(());
        }

        let mut session = self.factory.create(module);
        if !session.init() {
            self.active = None;
            return Err(Error::PluginUnavailable(format!(
                "cannot start node '{}'",
                module.long_key()
            )));
        }
        debug!(node = %module.long_key(), "node session ready");
        self.session = Some(session);
        Ok(())
    }

    fn ensure_remote_set(&mut self, module: &Module) -> Result<()> {
        if self.remote_sets.contains_key(module.long_key()) {
            return Ok(());
        }
        let session = self
            .session
            .as_deref()
            .ok_or_else(|| Error::PluginUnavailable("no active node session".into()))?;
        let description = session.schema_stub().command_set_description()?;
        let set = self.materialize(module.long_key(), description);
        debug!(node = %module.long_key(), commands = set.len(), "command set cached");
        self.remote_sets.insert(module.long_key().to_string(), set);
        Ok(())
    }

    /// Build a command set from a description. Anything structurally
    /// wrong yields an empty set. A node command named like the help
    /// sentinel is left out; the rest of the set is kept.
    fn materialize(&mut self, module_key: &str, description: CommandSetDescription) -> CommandSet {
        if !description.is_valid() {
            warn!(node = %module_key, "node returned an invalid command set description");
            return CommandSet::new();
        }
        let total = description.commands.len();
        let mut set = CommandSet::new();
        for (i, desc) in description.commands.into_iter().enumerate() {
            let command = SchemaCommand::from_description(desc);
            if set.help_command().key().collides_with(command.key()) {
                warn!(
                    node = %module_key,
                    command = %command.key().long,
                    "node command shadows built-in help; skipped"
                );
                continue;
            }
            if let Err(e) = set.add(Box::new(command)) {
                warn!(node = %module_key, error = %e, "dropping command set");
                return CommandSet::new();
            }
            if self.options.progress {
                let mut sink = io::stderr();
                self.set_progress((i + 1) as f64 / total as f64, &mut sink);
            }
        }
        self.last_percent = 0;
        set
    }

    fn fetch_missing_command(&mut self, module_key: &str, name: &str) -> Result<()> {
        let Some(set) = self.remote_sets.get_mut(module_key) else {
            return Ok(());
        };
        if set.has(name) {
            return Ok(());
        }
        let Some(session) = self.session.as_deref() else {
            return Ok(());
        };
        let Some(desc) = session.schema_stub().command_description(name)? else {
            return Ok(());
        };
        if !desc.is_valid() || !desc.matches(name) {
            warn!(node = %module_key, command = name, "ignoring invalid command description");
            return Ok(());
        }
        if let Err(e) = set.add(Box::new(SchemaCommand::from_description(desc))) {
            warn!(node = %module_key, error = %e, "cannot add fetched command");
        }
        Ok(())
    }

    /* ---- Progress ---- */

    /// Report progress; the bar is redrawn only when the whole percentage changes.
    pub fn set_progress(&mut self, fraction: f64, sink: &mut dyn Write) {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        let percent = (fraction * 100.0) as u64;
        if self.last_percent == percent {
            return;
        }
        self.last_percent = percent;
        if let Err(e) = help::print_progress_bar(sink, fraction, &self.options.style) {
            debug!(error = %e, "progress sink closed");
        }
    }

    /* ---- Help ---- */

    fn print_top_level_help(&self, out: &mut dyn Write) -> io::Result<()> {
        let style = &self.options.style;
        help::print_usage(out, None, None, !self.registry.is_empty(), style)?;
        help::print_modules(out, self.registry.iter(), style)?;
        help::print_cmd_set_help(out, &self.local_set, style)
    }

    fn print_module_help(&self, module: &Module, out: &mut dyn Write) -> io::Result<()> {
        let style = &self.options.style;
        help::print_usage(out, Some(module), None, true, style)?;
        print_module_description(out, module)?;
        let empty = CommandSet::new();
        let set = self.command_set(module.long_key()).unwrap_or(&empty);
        help::print_cmd_set_help(out, set, style)
    }
}

fn print_module_description(out: &mut dyn Write, module: &Module) -> io::Result<()> {
    if module.description().is_empty() {
        return Ok(());
    }
    writeln!(out, "\n{}", module.description())
}

/// Conventional flags standing in for the built-in commands.
fn normalize_flag(token: &str) -> &str {
    match token {
        "-h" | "--help" => "help",
        "-V" | "--version" => "version",
        other => other,
    }
}

/// Parse and dispatch `name` out of `set`. Parameter values are cleared
/// afterwards so every invocation starts fresh.
fn run_command(
    set: &mut CommandSet,
    module: Option<&Module>,
    name: &str,
    args: &[String],
    channel: Option<&dyn GenericChannel>,
    out: &mut dyn Write,
    options: &ExecutorOptions,
) -> Result<Outcome> {
    let Some(command) = set.get_mut(name) else {
        return Err(Error::UnknownCommand(name.to_string()));
    };
    if !command.parse_parameters(args) {
        help::print_cmd_help(out, command, module, &options.style)?;
        return Ok(Outcome::CommandHelp(command.key().long.clone()));
    }

    logging::enable_command_logs();
    debug!(command = %command.key().long, kind = ?command.kind(), "dispatching");
    let mut ctx = DispatchContext {
        channel,
        out: &mut *out,
        style: &options.style,
        call_timeout: options.call_timeout,
    };
    let result = command.dispatch(&mut ctx);
    command.params_mut().reset();
    result.map(|()| Outcome::Executed)
}
