//! The `trellis tools` command: print the catalog a caller would see.

use super::load_project;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use trellis_mcp::{AuthorizationFilter, CallerIdentity, CatalogBuilder};

/// Arguments for `trellis tools`.
#[derive(Debug, Args)]
pub struct ToolsArgs {
    /// Configuration file path.
    #[arg(short, long, default_value = "trellis.yaml")]
    pub config: PathBuf,

    /// Comma-separated caller scopes (defaults to the config's caller).
    #[arg(long)]
    pub scopes: Option<String>,

    /// Comma-separated caller roles (defaults to the config's caller).
    #[arg(long)]
    pub roles: Option<String>,

    /// Print each tool's input schema.
    #[arg(long)]
    pub verbose: bool,
}

/// List the visible tools with their access badges.
pub fn execute(args: ToolsArgs) -> Result<()> {
    let project = load_project(&args.config)?;

    let catalog = CatalogBuilder::new(project.policy.clone())
        .build(&project.model)
        .context("tool catalog generation failed")?;

    let caller = match (&args.scopes, &args.roles) {
        (None, None) => CallerIdentity {
            scopes: project.config.caller.scopes.clone(),
            roles: project.config.caller.roles.clone(),
            subject: project.config.caller.subject.clone(),
        },
        _ => CallerIdentity::from_header_values(args.scopes.as_deref(), args.roles.as_deref(), None),
    };

    let visible = AuthorizationFilter.visible_tools(&catalog, &caller);

    println!(
        "\nTools visible to caller ({} of {} generated):",
        visible.len(),
        catalog.len()
    );

    for tool in visible {
        let mut badges = vec![if tool.operation.is_mutation() {
            "write"
        } else {
            "read"
        }];
        if !tool.required_scopes.is_empty() {
            badges.push("scoped");
        }

        println!("  • {} ({})", tool.name, badges.join(", "));
        println!("    {}", tool.description);

        if args.verbose {
            println!(
                "    Schema: {}",
                serde_json::to_string_pretty(&tool.input_schema)?
            );
        }
    }

    let hidden = catalog.len() - AuthorizationFilter.visible_tools(&catalog, &caller).len();
    if hidden > 0 {
        println!("\n{hidden} tool(s) hidden by scope/role requirements.");
    }
    println!();

    Ok(())
}
