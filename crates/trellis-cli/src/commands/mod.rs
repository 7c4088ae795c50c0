//! CLI subcommands.

pub mod check;
pub mod serve;
pub mod tools;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use trellis_core::{EntityModel, GenerationPolicy, TrellisConfig};

/// Everything the subcommands need, loaded and resolved.
#[derive(Debug)]
pub(crate) struct LoadedProject {
    pub config: TrellisConfig,
    pub policy: GenerationPolicy,
    pub model: EntityModel,
    pub model_path: PathBuf,
}

/// Load config, policy, and model, resolving paths against the config
/// file's directory.
pub(crate) fn load_project(config_path: &Path) -> Result<LoadedProject> {
    let config = TrellisConfig::load(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let policy = config
        .resolved_policy(config_dir)
        .context("failed to resolve generation policy")?;

    let model_path = config.resolved_model_file(config_dir).with_context(|| {
        format!(
            "no model_file configured in {}; point it at the metadata model document",
            config_path.display()
        )
    })?;
    let model = EntityModel::from_path(&model_path)
        .with_context(|| format!("failed to load model from {}", model_path.display()))?;

    Ok(LoadedProject {
        config,
        policy,
        model,
        model_path,
    })
}
