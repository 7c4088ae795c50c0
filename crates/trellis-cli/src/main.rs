//! The `trellis` binary.
//!
//! Subcommands:
//! - `serve`: build the tool catalog and run the MCP server
//! - `tools`: print the catalog a given caller would see
//! - `check`: validate configuration, model, and catalog generation

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "trellis", version, about = "Expose a data service as MCP tools")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the MCP server.
    Serve(commands::serve::ServeArgs),

    /// List the generated tools for a caller.
    Tools(commands::tools::ToolsArgs),

    /// Validate configuration and catalog generation without serving.
    Check(commands::check::CheckArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr: the stdio transport owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Serve(args) => commands::serve::execute(args).await,
        Command::Tools(args) => commands::tools::execute(args),
        Command::Check(args) => commands::check::execute(args),
    }
}
