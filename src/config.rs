//! Configuration: optional YAML/JSON file merged with CLI/env overrides.
//!
//! Precedence is CLI flag > environment > config file > default. Clap
//! folds the environment into the flag values, so `resolve` only sees two
//! layers.
//!
//! ```yaml
//! nodes_dir: /etc/nodectl/nodes.d
//! call_timeout_ms: 30000
//! progress: false
//! nodes:
//!   - id: disk
//!     short_key: d
//!     target: disk-node --stdio
//! ```

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::module::{NodeManifest, NodeSource};

pub const DEFAULT_NODES_DIR: &str = "nodes.d";

/// Contents of a config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub nodes_dir: Option<PathBuf>,
    /// `0` disables the timeout.
    pub call_timeout_ms: Option<u64>,
    pub progress: Option<bool>,
    pub nodes: Vec<NodeManifest>,
}

impl Config {
    /// Parse a config file; YAML for `.yaml`/`.yml`, JSON for `.json`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let parsed = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&raw)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?,
            "json" => serde_json::from_str(&raw)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension '{other}' ({})",
                    path.display()
                )));
            }
        };
        debug!(path = %path.display(), "config loaded");
        Ok(parsed)
    }

    /// `load` when a path is given, defaults otherwise.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

/// Values coming from the command line (or its env fallbacks).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub nodes_dir: Option<PathBuf>,
    pub call_timeout_ms: Option<u64>,
    /// `ID=TARGET` entries.
    pub nodes: Vec<String>,
}

/// Effective settings after merging.
#[derive(Debug, Clone)]
pub struct Settings {
    pub nodes_dir: PathBuf,
    pub call_timeout: Option<Duration>,
    pub progress: bool,
    pub source: NodeSource,
}

pub fn resolve(file: Config, overrides: Overrides) -> Result<Settings> {
    let nodes_dir = overrides
        .nodes_dir
        .or(file.nodes_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_NODES_DIR));

    let call_timeout = overrides
        .call_timeout_ms
        .or(file.call_timeout_ms)
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis);

    let progress = file
        .progress
        .unwrap_or_else(|| std::io::stderr().is_terminal());

    // CLI nodes come first so they win key collisions during discovery.
    let mut inline = overrides
        .nodes
        .iter()
        .map(|raw| NodeManifest::parse_cli(raw))
        .collect::<Result<Vec<_>>>()?;
    inline.extend(file.nodes);

    Ok(Settings {
        source: NodeSource {
            dir: Some(nodes_dir.clone()),
            inline,
        },
        nodes_dir,
        call_timeout,
        progress,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file_or_flags() {
        let s = resolve(
            Config {
                progress: Some(false),
                ..Default::default()
            },
            Overrides::default(),
        )
        .unwrap();
        assert_eq!(s.nodes_dir, PathBuf::from(DEFAULT_NODES_DIR));
        assert_eq!(s.call_timeout, None);
        assert!(!s.progress);
        assert!(s.source.inline.is_empty());
    }

    #[test]
    fn flags_override_file() {
        let file = Config {
            nodes_dir: Some("/from/file".into()),
            call_timeout_ms: Some(1000),
            progress: Some(true),
            nodes: vec![NodeManifest::parse_cli("disk=disk-node").unwrap()],
        };
        let overrides = Overrides {
            nodes_dir: Some("/from/flag".into()),
            call_timeout_ms: Some(250),
            nodes: vec!["net=net-node --stdio".into()],
        };
        let s = resolve(file, overrides).unwrap();
        assert_eq!(s.nodes_dir, PathBuf::from("/from/flag"));
        assert_eq!(s.call_timeout, Some(Duration::from_millis(250)));
        assert!(s.progress);
        let ids: Vec<&str> = s.source.inline.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["net", "disk"]);
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let file = Config {
            call_timeout_ms: Some(0),
            ..Default::default()
        };
        assert_eq!(resolve(file, Overrides::default()).unwrap().call_timeout, None);
    }

    #[test]
    fn bad_node_flag_is_config_error() {
        let overrides = Overrides {
            nodes: vec!["no-equals-sign".into()],
            ..Default::default()
        };
        assert!(matches!(
            resolve(Config::default(), overrides),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn loads_yaml_and_json() {
        let tmp = tempfile::tempdir().unwrap();
        let yaml = tmp.path().join("nodectl.yaml");
        fs::write(
            &yaml,
            "nodes_dir: /srv/nodes\ncall_timeout_ms: 500\nnodes:\n  - id: disk\n    target: disk-node\n",
        )
        .unwrap();
        let c = Config::load(&yaml).unwrap();
        assert_eq!(c.nodes_dir, Some(PathBuf::from("/srv/nodes")));
        assert_eq!(c.call_timeout_ms, Some(500));
        assert_eq!(c.nodes[0].id, "disk");

        let json = tmp.path().join("nodectl.json");
        fs::write(&json, r#"{"progress": false}"#).unwrap();
        assert_eq!(Config::load(&json).unwrap().progress, Some(false));
    }

    #[test]
    fn unknown_keys_and_extensions_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let bad_key = tmp.path().join("c.yaml");
        fs::write(&bad_key, "nodez: []\n").unwrap();
        assert!(matches!(Config::load(&bad_key), Err(Error::Config(_))));

        let bad_ext = tmp.path().join("c.toml");
        fs::write(&bad_ext, "").unwrap();
        assert!(matches!(Config::load(&bad_ext), Err(Error::Config(_))));

        assert!(Config::load_optional(None).unwrap().nodes.is_empty());
    }
}
