//! Configuration types for Trellis.
//!
//! Configuration is loaded from a single YAML file (`trellis.yaml`) and
//! combined into a [`TrellisConfig`]. The generation policy may live inline
//! under `policy:` or in a separate file referenced by `policy_file:`;
//! relative paths are resolved against the config file's directory.

pub mod mcp;
pub mod policy;
pub mod service;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use mcp::{McpConfig, Transport};
pub use policy::{GenerationPolicy, OperationKind, PolicyError};
pub use service::ServiceConfig;

/// Complete Trellis configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrellisConfig {
    /// Project name, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Downstream data service endpoint.
    #[serde(default)]
    pub service: ServiceConfig,

    /// MCP transport settings.
    #[serde(default)]
    pub mcp: McpConfig,

    /// Path to the metadata model document (JSON).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_file: Option<PathBuf>,

    /// Inline generation policy.
    #[serde(default)]
    pub policy: GenerationPolicy,

    /// Path to a policy file; takes precedence over the inline policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_file: Option<PathBuf>,

    /// Caller identity assumed on the stdio transport, where no per-request
    /// headers exist.
    #[serde(default)]
    pub caller: CallerConfig,
}

/// Identity configuration for the stdio transport.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CallerConfig {
    /// Scopes granted to the stdio caller.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Roles granted to the stdio caller.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Optional subject identifier, used in logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl TrellisConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
        let config: TrellisConfig = serde_yaml::from_str(&content)?;
        config.policy.validate()?;
        Ok(config)
    }

    /// Resolve the effective generation policy, loading `policy_file` when
    /// set. `config_dir` anchors relative paths.
    pub fn resolved_policy(&self, config_dir: &Path) -> Result<GenerationPolicy, ConfigError> {
        match &self.policy_file {
            Some(file) => {
                let path = resolve_relative(config_dir, file);
                Ok(GenerationPolicy::from_file(path)?)
            }
            None => Ok(self.policy.clone()),
        }
    }

    /// Resolve the model document path against the config directory.
    pub fn resolved_model_file(&self, config_dir: &Path) -> Option<PathBuf> {
        self.model_file
            .as_ref()
            .map(|file| resolve_relative(config_dir, file))
    }
}

fn resolve_relative(config_dir: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        config_dir.join(file)
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {0}: {1}")]
    Io(String, #[source] std::io::Error),

    /// The config file is not valid YAML.
    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The embedded or referenced policy is invalid.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: TrellisConfig = serde_yaml::from_str("project: demo").unwrap();
        assert_eq!(config.project.as_deref(), Some("demo"));
        assert_eq!(config.mcp.transport, Transport::Stdio);
        assert!(config.policy.generate_crud);
        assert!(config.caller.scopes.is_empty());
    }

    #[test]
    fn load_from_file_with_inline_policy() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
service:
  base_url: https://api.example.com/odata
policy:
  excluded_entities: [AuditLog]
  default_scopes: [data.read]
caller:
  scopes: [data.read]
  roles: [agent]
"#
        )
        .unwrap();

        let config = TrellisConfig::load(file.path()).unwrap();
        assert_eq!(config.service.base_url, "https://api.example.com/odata");
        assert_eq!(config.policy.excluded_entities, vec!["AuditLog"]);
        assert_eq!(config.caller.roles, vec!["agent"]);

        let policy = config
            .resolved_policy(file.path().parent().unwrap())
            .unwrap();
        assert_eq!(policy.default_scopes, vec!["data.read"]);
    }

    #[test]
    fn policy_file_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("policy.yaml"),
            "excluded_entities: [Secret]\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("trellis.yaml"),
            "policy_file: policy.yaml\npolicy:\n  excluded_entities: [Inline]\n",
        )
        .unwrap();

        let config = TrellisConfig::load(dir.path().join("trellis.yaml")).unwrap();
        let policy = config.resolved_policy(dir.path()).unwrap();
        assert_eq!(policy.excluded_entities, vec!["Secret"]);
    }

    #[test]
    fn invalid_inline_policy_is_rejected_at_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "policy:\n  included_entities: [X]\n  excluded_entities: [X]\n"
        )
        .unwrap();
        assert!(matches!(
            TrellisConfig::load(file.path()),
            Err(ConfigError::Policy(_))
        ));
    }
}
