/*!
module.rs - modules, the module registry and node discovery.

A module is an addressable unit of commands: a local interface compiled
into the binary, or a remote node reached through a node session.

Discovery sources (remote modules):
  - inline manifests (config file `nodes:` list, `--node ID=TARGET`)
  - manifest files (`*.yaml`, `*.yml`, `*.json`) in the nodes directory

A manifest that cannot be read, parsed or verified (target must parse) is
skipped with a warning; only failing to enumerate the directory itself
is a discovery error.
*/

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::mcp;

/* ---- Module ---- */

/// Identity and locality of a unit of functionality.
#[derive(Debug, Clone)]
pub struct Module {
    long_key: String,
    short_key: Option<String>,
    description: String,
    local: bool,
    endpoint: Option<String>,
}

impl Module {
    pub fn local(
        long_key: impl Into<String>,
        description: impl Into<String>,
        short_key: Option<&str>,
    ) -> Self {
        Self {
            long_key: long_key.into(),
            short_key: short_key.filter(|s| !s.is_empty()).map(str::to_string),
            description: description.into(),
            local: true,
            endpoint: None,
        }
    }

    pub fn remote(long_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            long_key: long_key.into(),
            short_key: None,
            description: String::new(),
            local: false,
            endpoint: Some(endpoint.into()),
        }
    }

    pub fn with_short_key(mut self, key: Option<String>) -> Self {
        self.short_key = key.filter(|s| !s.is_empty());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn long_key(&self) -> &str {
        &self.long_key
    }

    pub fn short_key(&self) -> Option<&str> {
        self.short_key.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Target string of a remote node.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Whether `key` is this module's long or short key.
    pub fn matches(&self, key: &str) -> bool {
        self.long_key == key || self.short_key.as_deref() == Some(key)
    }

    fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.long_key.as_str()).chain(self.short_key.as_deref())
    }
}

/// Modules are equal when their long or short keys match.
impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.long_key == other.long_key
            || (self.short_key.is_some() && self.short_key == other.short_key)
    }
}

/* ---- Node Manifests ---- */

/// On-disk / config description of a remote node endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeManifest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_key: Option<String>,
    #[serde(default)]
    pub description: String,
    pub target: String,
}

impl NodeManifest {
    /// Parse `ID=TARGET` (as given to `--node`).
    pub fn parse_cli(raw: &str) -> Result<Self> {
        let (id, target) = raw
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("expected ID=TARGET, got '{raw}'")))?;
        let (id, target) = (id.trim(), target.trim());
        if id.is_empty() || target.is_empty() {
            return Err(Error::Config(format!("expected ID=TARGET, got '{raw}'")));
        }
        Ok(Self {
            id: id.to_string(),
            short_key: None,
            description: String::new(),
            target: target.to_string(),
        })
    }

    /// Load a manifest; YAML for `.yaml`/`.yml`, JSON otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        if is_yaml(path) {
            Ok(serde_yaml::from_str(&raw)?)
        } else {
            Ok(serde_json::from_str(&raw)?)
        }
    }

    /// An id names a file inside the nodes directory: non-empty, no path
    /// separators, no leading dot.
    pub fn validate_id(id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(Error::Config("node id is empty".into()));
        }
        if id.contains(['/', '\\', '\0']) || id.starts_with('.') {
            return Err(Error::Config(format!("invalid node id '{id}'")));
        }
        Ok(())
    }

    /// Write as `<dir>/<id>.yaml`, creating the directory if needed.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        Self::validate_id(&self.id)?;
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.yaml", self.id));
        fs::write(&path, serde_yaml::to_string(self)?)?;
        Ok(path)
    }

    /// Check that the manifest names a usable endpoint.
    pub fn verify(&self) -> Result<()> {
        Self::validate_id(&self.id)?;
        mcp::parse_target(&self.target).map(|_| ())
    }

    pub fn into_module(self) -> Module {
        Module::remote(self.id, self.target)
            .with_short_key(self.short_key)
            .with_description(self.description)
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn is_manifest(path: &Path) -> bool {
    is_yaml(path) || path.extension().and_then(|e| e.to_str()) == Some("json")
}

/// Where remote nodes are looked up.
#[derive(Debug, Clone, Default)]
pub struct NodeSource {
    pub dir: Option<PathBuf>,
    pub inline: Vec<NodeManifest>,
}

impl NodeSource {
    /// Every manifest this source yields, inline entries first.
    /// Unreadable manifest files are skipped.
    pub fn manifests(&self) -> Result<Vec<NodeManifest>> {
        let mut found = self.inline.clone();

        let Some(dir) = &self.dir else {
            return Ok(found);
        };
        if !dir.exists() {
            debug!(dir = %dir.display(), "nodes directory absent");
            return Ok(found);
        }

        let entries = fs::read_dir(dir).map_err(|e| {
            Error::Discovery(format!("cannot read nodes directory {}: {e}", dir.display()))
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable nodes directory entry");
                    None
                }
            })
            .filter(|p| p.is_file() && is_manifest(p))
            .collect();
        paths.sort();

        for path in paths {
            match NodeManifest::load(&path) {
                Ok(manifest) => found.push(manifest),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping node manifest"),
            }
        }
        Ok(found)
    }
}

/* ---- Registry ---- */

/// All known modules, keyed by long key.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Module>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module. Long keys and short keys must not collide with any
    /// key already registered; on failure nothing changes.
    pub fn register(&mut self, module: Module) -> Result<()> {
        if module.long_key.is_empty() {
            return Err(Error::Config("module long key is empty".into()));
        }
        if self.modules.contains_key(&module.long_key) {
            return Err(Error::DuplicateModule(module.long_key));
        }
        if let Some(clash) = module.keys().find(|k| self.lookup(k).is_some()) {
            return Err(Error::DuplicateModule(clash.to_string()));
        }
        self.modules.insert(module.long_key.clone(), module);
        Ok(())
    }

    /// Find a module by long key or short key.
    pub fn lookup(&self, key: &str) -> Option<&Module> {
        self.modules
            .get(key)
            .or_else(|| self.modules.values().find(|m| m.matches(key)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Register one remote module per reachable node. Returns the modules
    /// that were added; endpoints that fail to load, verify or register are
    /// left out.
    pub fn discover_remote(&mut self, source: &NodeSource) -> Result<Vec<Module>> {
        let mut added = Vec::new();
        for manifest in source.manifests()? {
            if let Err(e) = manifest.verify() {
                warn!(node = %manifest.id, error = %e, "node endpoint not usable");
                continue;
            }
            let module = manifest.into_module();
            match self.register(module.clone()) {
                Ok(()) => {
                    debug!(node = %module.long_key(), "discovered node");
                    added.push(module);
                }
                Err(e) => warn!(node = %module.long_key(), error = %e, "skipping node"),
            }
        }
        Ok(added)
    }
}
