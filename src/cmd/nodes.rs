/*!
nodes.rs - local `nodes` module: manage node manifests on disk.

  nodectl nodes list
  nodectl nodes add --id disk --target "disk-node --stdio" [--short-key d] [--description "..."]
  nodectl nodes remove --id disk

Manifests are `<id>.yaml` files in the nodes directory; discovery reads
the same directory on the next invocation.
*/

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use tracing::info;

use crate::cmd::{LocalInterface, MethodDescriptor};
use crate::mcp;
use crate::module::{NodeManifest, NodeSource};
use crate::payload::{FieldSchema, FieldType, MessageSchema, Payload, Value};

pub const MODULE_KEY: &str = "nodes";
pub const MODULE_SHORT_KEY: &str = "n";
pub const MODULE_DESCRIPTION: &str = "Manage node manifests";

pub struct NodesInterface {
    dir: PathBuf,
}

impl NodesInterface {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn list(&self, output: &mut Payload) -> anyhow::Result<()> {
        let source = NodeSource {
            dir: Some(self.dir.clone()),
            inline: Vec::new(),
        };
        let lines: Vec<Value> = source
            .manifests()?
            .into_iter()
            .map(|m| {
                let keys = match &m.short_key {
                    Some(s) => format!("{}, {s}", m.id),
                    None => m.id.clone(),
                };
                Value::String(format!("{keys}  {}", m.target))
            })
            .collect();
        output.set("nodes", Value::List(lines))?;
        Ok(())
    }

    fn add(&self, input: &Payload, output: &mut Payload) -> anyhow::Result<()> {
        let text = |name: &str| input.get(name).map(|v| v.to_string()).unwrap_or_default();
        let short_key = text("short-key");
        let manifest = NodeManifest {
            id: text("id"),
            short_key: (!short_key.is_empty()).then_some(short_key),
            description: text("description"),
            target: text("target"),
        };
        NodeManifest::validate_id(&manifest.id)?;
        mcp::parse_target(&manifest.target)
            .with_context(|| format!("invalid target for node '{}'", manifest.id))?;

        let path = manifest
            .save(&self.dir)
            .with_context(|| format!("cannot write manifest for '{}'", manifest.id))?;
        info!(node = %manifest.id, path = %path.display(), "node manifest written");
        output.set("path", Value::String(path.display().to_string()))?;
        Ok(())
    }

    fn remove(&self, input: &Payload, output: &mut Payload) -> anyhow::Result<()> {
        let id = input.get("id").map(|v| v.to_string()).unwrap_or_default();
        NodeManifest::validate_id(&id)?;
        let candidates = ["yaml", "yml", "json"].map(|ext| self.dir.join(format!("{id}.{ext}")));
        let Some(path) = candidates.iter().find(|p| p.is_file()) else {
            bail!("no manifest for node '{id}' in {}", self.dir.display());
        };
        fs::remove_file(path).with_context(|| format!("cannot remove {}", path.display()))?;
        info!(node = %id, "node manifest removed");
        output.set("path", Value::String(path.display().to_string()))?;
        Ok(())
    }
}

fn path_output(name: &str) -> MessageSchema {
    MessageSchema::new(name, vec![FieldSchema::new("path", FieldType::String)])
}

impl LocalInterface for NodesInterface {
    fn interface_id(&self) -> &str {
        MODULE_KEY
    }

    fn methods(&self) -> Vec<MethodDescriptor> {
        vec![
            MethodDescriptor {
                id: "list".into(),
                key: "list".into(),
                short_key: Some("l".into()),
                description: "List node manifests".into(),
                input: MessageSchema::new("ListNodes", vec![]),
                output: MessageSchema::new(
                    "NodeList",
                    vec![FieldSchema::new("nodes", FieldType::String).repeated()],
                ),
            },
            MethodDescriptor {
                id: "add".into(),
                key: "add".into(),
                short_key: Some("a".into()),
                description: "Write a node manifest".into(),
                input: MessageSchema::new(
                    "AddNode",
                    vec![
                        FieldSchema::new("id", FieldType::String)
                            .required()
                            .short("i")
                            .describe("module key of the node"),
                        FieldSchema::new("target", FieldType::String)
                            .required()
                            .short("t")
                            .describe("command line launching the node"),
                        FieldSchema::new("short-key", FieldType::String)
                            .short("s")
                            .describe("optional short module key"),
                        FieldSchema::new("description", FieldType::String)
                            .short("d")
                            .describe("one-line description"),
                    ],
                ),
                output: path_output("NodeWritten"),
            },
            MethodDescriptor {
                id: "remove".into(),
                key: "remove".into(),
                short_key: Some("rm".into()),
                description: "Delete a node manifest".into(),
                input: MessageSchema::new(
                    "RemoveNode",
                    vec![FieldSchema::new("id", FieldType::String)
                        .required()
                        .short("i")
                        .describe("module key of the node")],
                ),
                output: path_output("NodeRemoved"),
            },
        ]
    }

    fn invoke(&self, method_id: &str, input: &Payload, output: &mut Payload) -> anyhow::Result<()> {
        match method_id {
            "list" => self.list(output),
            "add" => self.add(input, output),
            "remove" => self.remove(input, output),
            other => bail!("nodes: unknown method '{other}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(iface: &NodesInterface, id: &str) -> MethodDescriptor {
        iface.methods().into_iter().find(|m| m.id == id).unwrap()
    }

    fn call(iface: &NodesInterface, id: &str, args: &[(&str, &str)]) -> anyhow::Result<Payload> {
        let m = method(iface, id);
        let mut input = Payload::new(m.input.clone());
        for (k, v) in args {
            input.set(k, Value::String((*v).into()))?;
        }
        let mut output = Payload::new(m.output.clone());
        iface.invoke(id, &input, &mut output)?;
        Ok(output)
    }

    #[test]
    fn add_list_remove_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let iface = NodesInterface::new(tmp.path().join("nodes.d"));

        let out = call(
            &iface,
            "add",
            &[("id", "disk"), ("target", "disk-node --stdio"), ("short-key", "d")],
        )
        .unwrap();
        let path = out.get("path").unwrap().to_string();
        assert!(path.ends_with("disk.yaml"));

        let manifest = NodeManifest::load(Path::new(&path)).unwrap();
        assert_eq!(manifest.short_key.as_deref(), Some("d"));
        assert_eq!(manifest.target, "disk-node --stdio");

        let listed = call(&iface, "list", &[]).unwrap();
        assert_eq!(
            listed.get("nodes"),
            Some(Value::List(vec![Value::String("disk, d  disk-node --stdio".into())]))
        );

        call(&iface, "remove", &[("id", "disk")]).unwrap();
        let listed = call(&iface, "list", &[]).unwrap();
        assert_eq!(listed.get("nodes"), Some(Value::List(vec![])));
    }

    #[test]
    fn add_rejects_bad_target_and_id() {
        let tmp = tempfile::tempdir().unwrap();
        let iface = NodesInterface::new(tmp.path());
        assert!(call(&iface, "add", &[("id", "x"), ("target", "  ")]).is_err());
        assert!(call(&iface, "add", &[("id", "../x"), ("target", "node")]).is_err());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn remove_missing_manifest_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let iface = NodesInterface::new(tmp.path());
        let err = call(&iface, "remove", &[("id", "ghost")]).unwrap_err();
        assert!(err.to_string().contains("no manifest for node 'ghost'"));
    }

    #[test]
    fn remove_refuses_ids_outside_the_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let victim = tmp.path().join("victim.yaml");
        fs::write(&victim, "id: victim\ntarget: x\n").unwrap();
        let iface = NodesInterface::new(tmp.path().join("nodes.d"));
        fs::create_dir_all(iface.dir()).unwrap();

        for id in ["../victim", ".victim", "sub/victim"] {
            let err = call(&iface, "remove", &[("id", id)]).unwrap_err();
            assert!(err.to_string().contains("invalid node id"), "{id}: {err}");
        }
        assert!(victim.exists());
    }

    #[test]
    fn list_of_missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let iface = NodesInterface::new(tmp.path().join("absent"));
        let listed = call(&iface, "list", &[]).unwrap();
        assert_eq!(listed.get("nodes"), Some(Value::List(vec![])));
    }
}
