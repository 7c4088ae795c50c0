//! The `trellis serve` command.

use super::load_project;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use trellis_core::Transport;
use trellis_mcp::{CallerIdentity, CatalogBuilder, ExecutorSettings, McpServer, RefreshSource};
use trellis_odata::ODataClient;

/// Arguments for `trellis serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Configuration file path.
    #[arg(short, long, default_value = "trellis.yaml")]
    pub config: PathBuf,

    /// Transport override (stdio or http).
    #[arg(long)]
    pub transport: Option<String>,

    /// HTTP port override (http transport only).
    #[arg(long)]
    pub port: Option<u16>,
}

/// Build the catalog and run the server until the transport closes.
pub async fn execute(args: ServeArgs) -> Result<()> {
    let project = load_project(&args.config)?;
    let mut mcp_config = project.config.mcp.clone();

    if let Some(transport) = &args.transport {
        mcp_config.transport = match transport.as_str() {
            "stdio" => Transport::Stdio,
            "http" => Transport::Http,
            other => anyhow::bail!("unknown transport '{other}'; use 'stdio' or 'http'"),
        };
    }
    if let Some(port) = args.port {
        mcp_config.port = port;
    }

    for issue in project.model.issues() {
        tracing::warn!(issue = %issue, "metadata model issue");
    }

    let catalog = CatalogBuilder::new(project.policy.clone())
        .build(&project.model)
        .context("tool catalog generation failed")?;

    let client =
        ODataClient::from_config(&project.config.service).context("invalid service configuration")?;

    let caller = CallerIdentity {
        scopes: project.config.caller.scopes.clone(),
        roles: project.config.caller.roles.clone(),
        subject: project.config.caller.subject.clone(),
    };

    info!(
        tool_count = catalog.len(),
        transport = ?mcp_config.transport,
        service = %project.config.service.base_url,
        "starting Trellis MCP server"
    );

    let server = McpServer::new(
        mcp_config,
        catalog,
        Arc::new(client),
        ExecutorSettings::from_policy(&project.policy),
    )
    .with_stdio_caller(caller)
    .with_call_timeout(project.config.service.timeout())
    .with_refresh_source(RefreshSource {
        model_path: project.model_path,
        policy: project.policy,
    });

    server.run().await?;
    Ok(())
}
