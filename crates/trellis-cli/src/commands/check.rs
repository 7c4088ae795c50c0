//! The `trellis check` command: validate without serving.

use super::load_project;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use trellis_core::OperationKind;
use trellis_mcp::CatalogBuilder;

/// Arguments for `trellis check`.
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Configuration file path.
    #[arg(short, long, default_value = "trellis.yaml")]
    pub config: PathBuf,
}

/// Load everything, run one generation pass, and report.
pub fn execute(args: CheckArgs) -> Result<()> {
    let project = load_project(&args.config)?;

    println!(
        "Model: {} entity type(s), {} entity set(s) ({})",
        project.model.entity_types.len(),
        project.model.entity_sets.len(),
        project.model_path.display()
    );

    let issues = project.model.issues();
    if issues.is_empty() {
        println!("Model consistency: ok");
    } else {
        println!("Model issues ({}; affected entity types are skipped):", issues.len());
        for issue in &issues {
            println!("  ! {issue}");
        }
    }

    let catalog = CatalogBuilder::new(project.policy.clone())
        .build(&project.model)
        .context("tool catalog generation failed")?;

    let count_of = |kind: OperationKind| catalog.iter().filter(|t| t.operation == kind).count();
    println!("Catalog: {} tool(s)", catalog.len());
    println!(
        "  create={} read={} update={} delete={} navigate={} list={} query={}",
        count_of(OperationKind::Create),
        count_of(OperationKind::Read),
        count_of(OperationKind::Update),
        count_of(OperationKind::Delete),
        count_of(OperationKind::Navigate),
        count_of(OperationKind::List),
        count_of(OperationKind::Query),
    );

    println!("Service: {}", project.config.service.base_url);
    println!("OK");
    Ok(())
}
