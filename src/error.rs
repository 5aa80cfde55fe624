//! Error types for nodectl

use thiserror::Error;

/// Result type alias for nodectl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while registering, resolving and dispatching commands
#[derive(Debug, Error)]
pub enum Error {
    /// A module with the same long (or short) key is already registered
    #[error("module already registered: {0}")]
    DuplicateModule(String),

    /// A command with the same short or long key already exists in the set
    #[error("command already registered: {0}")]
    DuplicateCommand(String),

    /// Node endpoints could not be enumerated at all
    #[error("node discovery failed: {0}")]
    Discovery(String),

    /// Node session failed to initialize
    #[error("plugin unavailable: {0}")]
    PluginUnavailable(String),

    /// Parameter and schema field disagree while marshalling
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Local method failed; carries the method's message
    #[error("{0}")]
    Execution(String),

    /// Generic call completed with failure text supplied by the node
    #[error("{0}")]
    RemoteCall(String),

    /// Command name did not resolve (recovered by rendering help)
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Tokens could not be parsed (recovered by rendering help)
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Schema RPC itself failed (transport level)
    #[error("cannot get command description: {0}")]
    SchemaFetch(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether the executor recovers from this error by rendering help
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedInput(_) | Self::UnknownCommand(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_call_error_displays_node_text_verbatim() {
        let err = Error::RemoteCall("disk full".into());
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn resolution_errors_are_recoverable() {
        assert!(Error::MalformedInput("x".into()).is_recoverable());
        assert!(Error::UnknownCommand("x".into()).is_recoverable());
        assert!(!Error::RemoteCall("x".into()).is_recoverable());
        assert!(!Error::PluginUnavailable("x".into()).is_recoverable());
    }
}
