//! Node session contract: schema descriptions, the schema RPC stub, the
//! generic call channel and the session lifecycle.
//!
//! The executor only talks to nodes through these traits. `crate::mcp`
//! provides the MCP-backed implementation; tests use in-memory doubles.

pub mod call;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::module::Module;
use crate::payload::MessageSchema;

pub use call::{CallCompleter, CallState, GenericCall};

/// Description of one remotely callable command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDescription {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_key: Option<String>,
    #[serde(default)]
    pub description: String,
    pub interface_id: String,
    pub method_id: String,
    #[serde(default)]
    pub input: MessageSchema,
    #[serde(default)]
    pub output: MessageSchema,
}

impl CommandDescription {
    /// Structural check: keys and method id present, schemas well formed.
    pub fn is_valid(&self) -> bool {
        !self.key.is_empty()
            && self.short_key.as_deref() != Some("")
            && !self.method_id.is_empty()
            && self.input.is_well_formed()
            && self.output.is_well_formed()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.key == name || self.short_key.as_deref() == Some(name)
    }
}

/// Description of a node's full command set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandSetDescription {
    #[serde(default)]
    pub commands: Vec<CommandDescription>,
}

impl CommandSetDescription {
    /// Non-empty, every command valid, no key (long or short) used twice.
    pub fn is_valid(&self) -> bool {
        if self.commands.is_empty() {
            return false;
        }
        let mut keys = HashSet::new();
        self.commands.iter().all(|c| {
            c.is_valid()
                && keys.insert(c.key.as_str())
                && c.short_key.as_deref().is_none_or(|s| keys.insert(s))
        })
    }
}

/// Schema-description RPC exposed by a node.
pub trait SchemaRpc {
    fn command_set_description(&self) -> Result<CommandSetDescription>;

    /// `Ok(None)` when the node has no such command.
    fn command_description(&self, key: &str) -> Result<Option<CommandDescription>>;
}

/// Generic method invocation by interface id / method id.
///
/// Implementations never return partial output: they either complete the
/// call with a full payload or fail it with text.
pub trait GenericChannel {
    fn generic_call(&self, interface_id: &str, method_id: &str, call: &mut GenericCall);
}

/// Live connection to one node.
pub trait NodeSession {
    /// Long key of the module this session serves.
    fn module_key(&self) -> &str;

    /// Establish connectivity; `false` is terminal for this session.
    fn init(&mut self) -> bool;

    fn schema_stub(&self) -> &dyn SchemaRpc;

    fn call_channel(&self) -> &dyn GenericChannel;
}

/// Creates (uninitialized) sessions for remote modules.
pub trait SessionFactory {
    fn create(&self, module: &Module) -> Box<dyn NodeSession>;
}
