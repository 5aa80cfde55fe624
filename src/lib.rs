//! nodectl: command-line front end for MCP nodes.
//!
//! Commands are discovered at runtime from each node's tool list and
//! dispatched as generic calls; local modules run in process.
//!
//!   nodectl [OPTIONS] [<module>] <command> [params...]

pub mod cmd;
pub mod config;
pub mod error;
pub mod executor;
pub mod mcp;
pub mod module;
pub mod node;
pub mod payload;
pub mod utils;

pub use error::{Error, Result};
pub use executor::{Executor, ExecutorOptions, Outcome};
pub use module::{Module, ModuleRegistry, NodeManifest, NodeSource};
