/*!
local.rs - commands bound to an in-process interface.

A `LocalInterface` publishes method descriptors (key, schemas) and
services invocations. `LocalCommand` wraps one method: its parameters
come from the input schema, execution fills an input payload, invokes
the method and renders the output payload.
*/

use std::sync::Arc;

use tracing::debug;

use crate::cmd::help::print_payload;
use crate::cmd::{Command, CommandKey, DispatchContext, ExecutionKind, ParameterSet};
use crate::error::{Error, Result};
use crate::payload::{MessageSchema, Payload};

/// One invocable method of a local interface.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub id: String,
    pub key: String,
    pub short_key: Option<String>,
    pub description: String,
    pub input: MessageSchema,
    pub output: MessageSchema,
}

/// In-process service exposing methods to the command line.
pub trait LocalInterface: Send + Sync {
    fn interface_id(&self) -> &str;

    fn methods(&self) -> Vec<MethodDescriptor>;

    /// Run `method_id`, writing results into `output` (built against the
    /// method's output schema).
    fn invoke(&self, method_id: &str, input: &Payload, output: &mut Payload) -> anyhow::Result<()>;
}

/// Command bound to a local interface method.
pub struct LocalCommand {
    key: CommandKey,
    interface: Arc<dyn LocalInterface>,
    method: MethodDescriptor,
    params: ParameterSet,
}

impl LocalCommand {
    pub fn new(interface: Arc<dyn LocalInterface>, method: MethodDescriptor) -> Self {
        Self {
            key: CommandKey::new(
                method.key.clone(),
                method.short_key.as_deref(),
                method.description.clone(),
            ),
            params: ParameterSet::from_schema(&method.input),
            interface,
            method,
        }
    }

    /// Invoke the bound method and print its output.
    pub fn execute(&self, ctx: &mut DispatchContext<'_>) -> Result<()> {
        let mut input = Payload::new(self.method.input.clone());
        self.params.write_into(&mut input)?;
        let mut output = Payload::new(self.method.output.clone());

        debug!(
            interface = %self.interface.interface_id(),
            method = %self.method.id,
            "invoking local method"
        );
        self.interface
            .invoke(&self.method.id, &input, &mut output)
            .map_err(|e| Error::Execution(format!("{e:#}")))?;

        print_payload(ctx.out, &output, ctx.style)?;
        Ok(())
    }
}

impl Command for LocalCommand {
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
        self.execute(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::StyleOptions;
    use crate::payload::{FieldSchema, FieldType, Value};

    struct Greeter;

    impl LocalInterface for Greeter {
        fn interface_id(&self) -> &str {
            "greeter"
        }

        fn methods(&self) -> Vec<MethodDescriptor> {
            vec![MethodDescriptor {
                id: "greet".into(),
                key: "greet".into(),
                short_key: Some("g".into()),
                description: "Say hello".into(),
                input: MessageSchema::new(
                    "GreetIn",
                    vec![FieldSchema::new("name", FieldType::String).required()],
                ),
                output: MessageSchema::new(
                    "GreetOut",
                    vec![FieldSchema::new("line", FieldType::String)],
                ),
            }]
        }

        fn invoke(&self, _method: &str, input: &Payload, output: &mut Payload) -> anyhow::Result<()> {
            let name = input.get("name").map(|v| v.to_string()).unwrap_or_default();
            if name == "nobody" {
                anyhow::bail!("nobody to greet");
            }
            output.set("line", Value::String(format!("hello {name}")))?;
            Ok(())
        }
    }

    fn command() -> LocalCommand {
        let iface: Arc<dyn LocalInterface> = Arc::new(Greeter);
        let method = iface.methods().remove(0);
        LocalCommand::new(iface, method)
    }

    fn run(cmd: &LocalCommand) -> (Result<()>, String) {
        let mut out = Vec::new();
        let style = StyleOptions::plain();
        let mut ctx = DispatchContext {
            channel: None,
            out: &mut out,
            style: &style,
            call_timeout: None,
        };
        let res = cmd.dispatch(&mut ctx);
        (res, String::from_utf8(out).unwrap())
    }

    #[test]
    fn key_and_params_come_from_descriptor() {
        let cmd = command();
        assert_eq!(cmd.key().long, "greet");
        assert!(cmd.key().matches("g"));
        assert_eq!(cmd.kind(), ExecutionKind::Local);
        assert!(cmd.params().get("name").unwrap().is_required());
    }

    #[test]
    fn executes_and_renders_output() {
        let mut cmd = command();
        assert!(cmd.parse_parameters(&["--name".into(), "world".into()]));
        let (res, text) = run(&cmd);
        res.unwrap();
        assert_eq!(text, "hello world\n");
    }

    #[test]
    fn interface_failure_is_execution_error() {
        let mut cmd = command();
        assert!(cmd.parse_parameters(&["--name=nobody".into()]));
        let (res, text) = run(&cmd);
        match res.unwrap_err() {
            Error::Execution(msg) => assert_eq!(msg, "nobody to greet"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(text.is_empty());
    }
}
