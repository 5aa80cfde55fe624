use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use nodectl::cmd::StyleOptions;
use nodectl::cmd::nodes::{self, NodesInterface};
use nodectl::config::{self, Config, Overrides};
use nodectl::mcp::McpSessionFactory;
use nodectl::utils::{derive_level, init_logging};
use nodectl::{Executor, ExecutorOptions, Outcome};

/// nodectl - run commands exposed by MCP nodes and local modules.
///
/// Usage:
///   nodectl [OPTIONS] [<module>] <command> [params...]
///
/// Nodes are read from manifests in the nodes directory (`nodectl nodes add`
/// writes them) and from `--node ID=TARGET`. Each node's tools become the
/// commands of a module named after the node id.
///
/// Examples:
///   nodectl nodes add --id everything --target "npx -y @modelcontextprotocol/server-everything"
///   nodectl everything help
///   nodectl everything echo --message hi
///   nodectl -n disk="disk-node --stdio" disk stat --device sda
///
/// Env:
///   NODECTL_CONFIG     config file (YAML or JSON)
///   NODECTL_NODES_DIR  nodes directory
///   VERBOSE            enable debug logs for the executed command
///   RUST_LOG           explicit log filter
#[derive(Parser, Debug)]
#[command(
    name = "nodectl",
    version,
    author,
    about = "nodectl - schema-driven command dispatch for local modules and MCP nodes",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Errors only
    #[arg(short, long)]
    quiet: bool,

    /// Config file (YAML or JSON)
    #[arg(long, env = "NODECTL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding node manifests
    #[arg(long, env = "NODECTL_NODES_DIR", value_name = "DIR")]
    nodes_dir: Option<PathBuf>,

    /// Extra node (repeatable ID=TARGET)
    #[arg(short = 'n', long = "node", value_name = "ID=TARGET")]
    nodes: Vec<String>,

    /// Bound remote calls (milliseconds; 0 waits forever)
    #[arg(long = "call-timeout", value_name = "MS")]
    call_timeout: Option<u64>,

    /// [module] <command> [params...]
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    tokens: Vec<String>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(derive_level(cli.verbose, cli.quiet));

    let file = Config::load_optional(cli.config.as_deref()).context("loading configuration")?;
    let settings = config::resolve(
        file,
        Overrides {
            nodes_dir: cli.nodes_dir,
            call_timeout_ms: cli.call_timeout,
            nodes: cli.nodes,
        },
    )
    .context("resolving configuration")?;

    let options = ExecutorOptions {
        call_timeout: settings.call_timeout,
        progress: settings.progress && !cli.quiet,
        style: StyleOptions::detect(),
    };
    let mut executor =
        Executor::new(Box::new(McpSessionFactory), options).context("building executor")?;

    // Local modules first: a discovered node reusing their keys is skipped.
    executor
        .register_local_module(
            Arc::new(NodesInterface::new(&settings.nodes_dir)),
            nodes::MODULE_KEY,
            nodes::MODULE_DESCRIPTION,
            Some(nodes::MODULE_SHORT_KEY),
        )
        .context("registering local modules")?;
    executor
        .discover(&settings.source)
        .context("discovering nodes")?;

    let outcome = {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        executor.execute(&cli.tokens, &mut out)
    };
    // Close the node session before reporting.
    drop(executor);

    match outcome {
        Ok(Outcome::CommandHelp(_)) => Ok(ExitCode::from(2)),
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) if e.is_recoverable() => {
            eprintln!("error: {e}");
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e.into()),
    }
}
