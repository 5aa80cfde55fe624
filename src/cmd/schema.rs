//! Remote command materialized from a node's command description.
//!
//! Parameters are derived from the input schema. Dispatch serializes the
//! parameter values into an input payload, issues a generic call on the
//! active session's channel, blocks on it and prints the output payload.

use std::io::Write;

use tracing::debug;

use crate::cmd::format::StyleOptions;
use crate::cmd::help::print_payload;
use crate::cmd::{Command, CommandKey, DispatchContext, ExecutionKind, ParameterSet};
use crate::error::{Error, Result};
use crate::node::{CommandDescription, GenericCall};
use crate::payload::{MessageSchema, Payload};

pub struct SchemaCommand {
    key: CommandKey,
    interface_id: String,
    method_id: String,
    input: MessageSchema,
    output: MessageSchema,
    params: ParameterSet,
}

impl SchemaCommand {
    pub fn from_description(desc: CommandDescription) -> Self {
        Self {
            key: CommandKey::new(desc.key, desc.short_key.as_deref(), desc.description),
            params: ParameterSet::from_schema(&desc.input),
            interface_id: desc.interface_id,
            method_id: desc.method_id,
            input: desc.input,
            output: desc.output,
        }
    }

    pub fn interface_id(&self) -> &str {
        &self.interface_id
    }

    pub fn method_id(&self) -> &str {
        &self.method_id
    }

    /// Input payload holding the current parameter values.
    pub fn to_payload(&self) -> Result<Payload> {
        let mut payload = Payload::new(self.input.clone());
        self.params.write_into(&mut payload)?;
        Ok(payload)
    }

    /// Render a reply.
    pub fn from_payload(&self, payload: &Payload, out: &mut dyn Write, style: &StyleOptions) -> Result<()> {
        if payload.schema() != &self.output {
            return Err(Error::SchemaMismatch(format!(
                "reply of '{}' carries message '{}'",
                self.key.long,
                payload.schema().name
            )));
        }
        print_payload(out, payload, style)?;
        Ok(())
    }
}

impl Command for SchemaCommand {
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
        ExecutionKind::Remote
    }

    fn dispatch(&self, ctx: &mut DispatchContext<'_>) -> Result<()> {
        let channel = ctx
            .channel
            .ok_or_else(|| Error::PluginUnavailable("no active node session".into()))?;

        let mut call =
            GenericCall::new(self.to_payload()?, self.output.clone()).with_timeout(ctx.call_timeout);
        debug!(
            interface = %self.interface_id,
            method = %self.method_id,
            "issuing generic call"
        );
        channel.generic_call(&self.interface_id, &self.method_id, &mut call);
        let output = call.into_result()?;
        self.from_payload(&output, ctx.out, ctx.style)
    }
}
