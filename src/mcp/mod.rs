//! MCP-backed node sessions.
//!
//! parse_target -> TargetSpec { LocalCommand | RemoteUrl }
//! McpSession implements the node session contract over an MCP client:
//!   tools/list -> command-set description
//!   tools/call -> generic call
//! Only local process targets can be connected; remote URL targets are
//! recognised but report the session as unavailable.
//!
use std::fmt;
use std::process::Stdio;

use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value as Json;
use shell_words::split as shell_split;
use tokio::process::Command;
use tokio::runtime::Runtime;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::module::Module;
use crate::node::{
    CallCompleter, CommandDescription, CommandSetDescription, GenericCall, GenericChannel,
    NodeSession, SchemaRpc, SessionFactory,
};
use crate::payload::{FieldSchema, FieldType, MessageSchema};

/// Output field used when a tool declares no output schema.
pub const TEXT_FIELD: &str = "text";

/// Classification of the high-level target kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    LocalProcess,
    RemoteHttp,
    RemoteWs,
    Unknown,
}

/// A parsed node target.
#[derive(Debug, Clone)]
pub enum TargetSpec {
    /// A local process to be spawned. Contains command + arguments.
    LocalCommand {
        original: String,
        program: String,
        args: Vec<String>,
    },
    /// Remote endpoint specified by URL (http/https or ws/wss).
    RemoteUrl { original: String, url: Url },
}

impl TargetSpec {
    pub fn original(&self) -> &str {
        match self {
            TargetSpec::LocalCommand { original, .. } => original,
            TargetSpec::RemoteUrl { original, .. } => original,
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            TargetSpec::LocalCommand { .. } => TargetKind::LocalProcess,
            TargetSpec::RemoteUrl { url, .. } => match url.scheme() {
                "http" | "https" => TargetKind::RemoteHttp,
                "ws" | "wss" => TargetKind::RemoteWs,
                _ => TargetKind::Unknown,
            },
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.kind(), TargetKind::LocalProcess)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSpec::LocalCommand { program, args, .. } => {
                if args.is_empty() {
                    write!(f, "local: {}", program)
                } else {
                    write!(f, "local: {} {}", program, args.join(" "))
                }
            }
            TargetSpec::RemoteUrl { url, .. } => write!(f, "remote: {}", url),
        }
    }
}

/// Parse a node target.
///
/// URLs with an http/https/ws/wss scheme are remote; anything else is a
/// local command line split with shell rules.
pub fn parse_target(raw: &str) -> Result<TargetSpec> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Config("target string is empty".into()));
    }

    if let Ok(url) = Url::parse(trimmed)
        && matches!(url.scheme(), "http" | "https" | "ws" | "wss")
    {
        return Ok(TargetSpec::RemoteUrl {
            original: raw.to_string(),
            url,
        });
    }

    let parts = shell_split(trimmed)
        .map_err(|e| Error::Config(format!("cannot split target command line: {e}")))?;
    let Some((program, args)) = parts.split_first() else {
        return Err(Error::Config("no tokens in local command target".into()));
    };
    if program.is_empty() {
        return Err(Error::Config("empty program name in local command target".into()));
    }
    Ok(TargetSpec::LocalCommand {
        original: raw.to_string(),
        program: program.clone(),
        args: args.to_vec(),
    })
}

/* ---- Schema mapping ---- */

/// Build a message schema from a JSON-schema object (`properties` + `required`).
pub fn schema_from_json_schema(name: &str, schema: Option<&Json>) -> MessageSchema {
    let Some(obj) = schema.and_then(Json::as_object) else {
        return MessageSchema::new(name, Vec::new());
    };
    let required: Vec<&str> = obj
        .get("required")
        .and_then(Json::as_array)
        .map(|arr| arr.iter().filter_map(Json::as_str).collect())
        .unwrap_or_default();

    let mut fields = Vec::new();
    if let Some(props) = obj.get("properties").and_then(Json::as_object) {
        for (pname, pobj) in props {
            let type_of = |v: &Json| {
                v.get("type")
                    .and_then(Json::as_str)
                    .unwrap_or("string")
                    .to_string()
            };
            let ptype = type_of(pobj);
            let mut field = if ptype == "array" {
                let item = pobj.get("items").map(type_of).unwrap_or_default();
                FieldSchema::new(pname.clone(), FieldType::from_json_schema(&item)).repeated()
            } else {
                FieldSchema::new(pname.clone(), FieldType::from_json_schema(&ptype))
            };
            if let Some(desc) = pobj.get("description").and_then(Json::as_str) {
                field = field.describe(desc);
            }
            if required.contains(&pname.as_str()) {
                field = field.required();
            }
            fields.push(field);
        }
    }
    MessageSchema::new(name, fields)
}

/// Output schema used for tools without `outputSchema`.
pub fn text_output_schema(tool: &str) -> MessageSchema {
    MessageSchema::new(
        format!("{tool}.output"),
        vec![FieldSchema::new(TEXT_FIELD, FieldType::String).repeated()],
    )
}

/// Map one MCP tool object (as JSON) to a command description.
pub fn tool_to_description(node_id: &str, tool: &Json) -> Option<CommandDescription> {
    let name = tool.get("name").and_then(Json::as_str)?.to_string();
    let field = |snake: &str, camel: &str| tool.get(snake).or_else(|| tool.get(camel));

    let input = schema_from_json_schema(
        &format!("{name}.input"),
        field("input_schema", "inputSchema"),
    );
    let output = match field("output_schema", "outputSchema").filter(|v| !v.is_null()) {
        Some(schema) => schema_from_json_schema(&format!("{name}.output"), Some(schema)),
        None => text_output_schema(&name),
    };

    Some(CommandDescription {
        description: tool
            .get("description")
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string(),
        short_key: None,
        interface_id: node_id.to_string(),
        method_id: name.clone(),
        key: name,
        input,
        output,
    })
}

/// Complete a call from a serialized `CallToolResult`.
pub fn complete_from_tool_result(completer: CallCompleter, result: &Json) {
    let field = |snake: &str, camel: &str| result.get(snake).or_else(|| result.get(camel));

    let texts: Vec<String> = result
        .get("content")
        .and_then(Json::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|c| c.get("text").and_then(Json::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let is_error = field("is_error", "isError")
        .and_then(Json::as_bool)
        .unwrap_or(false);
    if is_error {
        let text = if texts.is_empty() {
            "tool reported an error".to_string()
        } else {
            texts.join("\n")
        };
        return completer.fail(text);
    }

    match field("structured_content", "structuredContent").filter(|v| v.is_object()) {
        Some(structured) => completer.succeed_json(structured),
        None => completer.succeed_json(&serde_json::json!({ TEXT_FIELD: texts })),
    }
}

/* ---- Session ---- */

/// Node session over an MCP client connection.
pub struct McpSession {
    module_key: String,
    endpoint: Option<String>,
    runtime: Option<Runtime>,
    service: Option<RunningService<RoleClient, ()>>,
}

impl McpSession {
    pub fn new(module: &Module) -> Self {
        Self {
            module_key: module.long_key().to_string(),
            endpoint: module.endpoint().map(str::to_string),
            runtime: None,
            service: None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            Error::PluginUnavailable(format!("node '{}' has no endpoint", self.module_key))
        })?;
        let spec = parse_target(endpoint)?;
        let TargetSpec::LocalCommand { program, args, .. } = &spec else {
            return Err(Error::PluginUnavailable(format!(
                "remote transport not supported ({spec})"
            )));
        };

        let runtime = Runtime::new()?;
        let service = runtime.block_on(async {
            let transport = TokioChildProcess::new(Command::new(program).configure(|c| {
                for a in args {
                    c.arg(a);
                }
                // Child stderr is noise; stdout carries the protocol.
                c.stderr(Stdio::null());
            }))?;
            let service = ().serve(transport).await.map_err(|e| {
                Error::PluginUnavailable(format!("failed to initialize MCP service '{program}': {e}"))
            })?;
            Ok::<_, Error>(service)
        })?;

        debug!(node = %self.module_key, target = %spec, "node session connected");
        self.runtime = Some(runtime);
        self.service = Some(service);
        Ok(())
    }

    fn live(&self) -> Result<(&Runtime, &RunningService<RoleClient, ()>)> {
        match (&self.runtime, &self.service) {
            (Some(rt), Some(svc)) => Ok((rt, svc)),
            _ => Err(Error::PluginUnavailable(format!(
                "node session '{}' is not initialized",
                self.module_key
            ))),
        }
    }

    fn list_tools(&self) -> Result<Vec<Json>> {
        let (rt, svc) = self.live()?;
        let resp = rt
            .block_on(svc.list_tools(Default::default()))
            .map_err(|e| Error::SchemaFetch(e.to_string()))?;
        let val = serde_json::to_value(&resp)?;
        Ok(val
            .get("tools")
            .and_then(Json::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

impl NodeSession for McpSession {
    fn module_key(&self) -> &str {
        &self.module_key
    }

    fn init(&mut self) -> bool {
        match self.connect() {
            Ok(()) => true,
            Err(e) => {
                warn!(node = %self.module_key, error = %e, "node session init failed");
                false
            }
        }
    }

    fn schema_stub(&self) -> &dyn SchemaRpc {
        self
    }

    fn call_channel(&self) -> &dyn GenericChannel {
        self
    }
}

impl SchemaRpc for McpSession {
    fn command_set_description(&self) -> Result<CommandSetDescription> {
        let tools = self.list_tools()?;
        let mut commands = Vec::with_capacity(tools.len());
        for tool in &tools {
            match tool_to_description(&self.module_key, tool) {
                Some(desc) => commands.push(desc),
                // Keep the slot so validation sees the set as malformed.
                None => commands.push(CommandDescription {
                    key: String::new(),
                    short_key: None,
                    description: String::new(),
                    interface_id: self.module_key.clone(),
                    method_id: String::new(),
                    input: MessageSchema::default(),
                    output: MessageSchema::default(),
                }),
            }
        }
        Ok(CommandSetDescription { commands })
    }

    fn command_description(&self, key: &str) -> Result<Option<CommandDescription>> {
        Ok(self
            .list_tools()?
            .iter()
            .filter(|t| t.get("name").and_then(Json::as_str) == Some(key))
            .find_map(|t| tool_to_description(&self.module_key, t)))
    }
}

impl GenericChannel for McpSession {
    fn generic_call(&self, interface_id: &str, method_id: &str, call: &mut GenericCall) {
        let Some(completer) = call.completer() else {
            return;
        };
        let (rt, svc) = match self.live() {
            Ok(live) => live,
            Err(e) => return completer.fail(e.to_string()),
        };

        let peer = svc.peer().clone();
        let arguments = call.input().to_json();
        let name = method_id.to_string();
        debug!(interface_id, method_id, "issuing generic call");

        rt.spawn(async move {
            let result = peer
                .call_tool(CallToolRequestParam {
                    name: name.clone().into(),
                    arguments: if arguments.is_empty() {
                        None
                    } else {
                        Some(arguments)
                    },
                })
                .await;
            match result.map(|r| serde_json::to_value(&r)) {
                Ok(Ok(value)) => complete_from_tool_result(completer, &value),
                Ok(Err(e)) => completer.fail(format!("cannot read result of '{name}': {e}")),
                Err(e) => completer.fail(format!("tool invocation failed: {name}: {e}")),
            }
        });
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        if let (Some(rt), Some(svc)) = (self.runtime.as_ref(), self.service.take()) {
            let _ = rt.block_on(svc.cancel());
            debug!(node = %self.module_key, "node session closed");
        }
    }
}

/// Creates `McpSession`s for remote modules.
#[derive(Debug, Default, Clone, Copy)]
pub struct McpSessionFactory;

impl SessionFactory for McpSessionFactory {
    fn create(&self, module: &Module) -> Box<dyn NodeSession> {
        Box::new(McpSession::new(module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Payload, Value};
    use serde_json::json;

    #[test]
    fn parse_remote_http() {
        let spec = parse_target("https://example.com/mcp").unwrap();
        assert!(!spec.is_local());
        assert!(matches!(spec.kind(), TargetKind::RemoteHttp));
    }

    #[test]
    fn parse_remote_ws() {
        let spec = parse_target("wss://mcp.example/ws").unwrap();
        assert!(matches!(spec.kind(), TargetKind::RemoteWs));
    }

    #[test]
    fn parse_local_quoted() {
        let spec = parse_target(r#"my-node --path "/tmp/my dir""#).unwrap();
        let TargetSpec::LocalCommand { program, args, .. } = spec else {
            panic!("expected LocalCommand");
        };
        assert_eq!(program, "my-node");
        assert_eq!(args, vec!["--path", "/tmp/my dir"]);
    }

    #[test]
    fn url_with_unknown_scheme_falls_back_to_command() {
        let spec = parse_target("ftp://example.com/resource").unwrap();
        assert!(spec.is_local());
    }

    #[test]
    fn empty_target_rejected() {
        let err = parse_target("   ").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn tool_maps_to_description() {
        let tool = json!({
            "name": "scan",
            "description": "Scan a device",
            "inputSchema": {
                "type": "object",
                "required": ["device"],
                "properties": {
                    "device": {"type": "string", "description": "block device"},
                    "depth": {"type": "integer"},
                    "ratio": {"type": "number"},
                    "dry_run": {"type": "boolean"},
                    "ranges": {"type": "array", "items": {"type": "integer"}},
                    "opts": {"type": "object"}
                }
            }
        });
        let d = tool_to_description("disk", &tool).unwrap();
        assert_eq!(d.key, "scan");
        assert_eq!(d.interface_id, "disk");
        assert_eq!(d.method_id, "scan");
        assert!(d.is_valid());

        let f = |n: &str| d.input.field(n).unwrap().clone();
        assert!(f("device").required);
        assert_eq!(f("device").description, "block device");
        assert_eq!(f("depth").field_type, FieldType::Int64);
        assert_eq!(f("ratio").field_type, FieldType::Double);
        assert_eq!(f("dry_run").field_type, FieldType::Bool);
        assert!(f("ranges").repeated);
        assert_eq!(f("ranges").field_type, FieldType::Int64);
        assert_eq!(f("opts").field_type, FieldType::String);
        assert_eq!(d.output, text_output_schema("scan"));
    }

    #[test]
    fn tool_without_name_is_rejected() {
        assert!(tool_to_description("disk", &json!({"description": "x"})).is_none());
    }

    fn finished(output: MessageSchema, result: Json) -> GenericCall {
        let mut call = GenericCall::new(Payload::new(MessageSchema::default()), output);
        complete_from_tool_result(call.completer().unwrap(), &result);
        call.wait();
        call
    }

    #[test]
    fn error_result_fails_call_with_text() {
        let call = finished(
            text_output_schema("t"),
            json!({"content": [{"type": "text", "text": "disk full"}], "isError": true}),
        );
        assert!(call.failed());
        assert_eq!(call.error_text(), "disk full");
    }

    #[test]
    fn text_result_fills_text_field() {
        let call = finished(
            text_output_schema("t"),
            json!({"content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]}),
        );
        assert_eq!(
            call.output().unwrap().get(TEXT_FIELD),
            Some(Value::List(vec![
                Value::String("a".into()),
                Value::String("b".into())
            ]))
        );
    }

    #[test]
    fn structured_result_uses_output_schema() {
        let schema = schema_from_json_schema(
            "t.output",
            Some(&json!({"properties": {"written": {"type": "integer"}}})),
        );
        let call = finished(
            schema,
            json!({"content": [], "structuredContent": {"written": 4096}}),
        );
        assert_eq!(
            call.output().unwrap().get("written"),
            Some(Value::Int64(4096))
        );
    }

    #[test]
    fn session_without_runtime_fails_calls() {
        let session = McpSession::new(&Module::remote("fs", "fs-node"));
        let mut call = GenericCall::new(
            Payload::new(MessageSchema::default()),
            text_output_schema("t"),
        );
        session.generic_call("fs", "stat", &mut call);
        call.wait();
        assert!(call.failed());
        assert!(call.error_text().contains("not initialized"));
    }

    #[test]
    fn remote_url_session_does_not_init() {
        let mut session = McpSession::new(&Module::remote("web", "https://example.com/mcp"));
        assert!(!session.init());
    }
}
