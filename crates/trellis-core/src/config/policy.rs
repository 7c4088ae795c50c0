//! Tool generation policy.
//!
//! The policy controls which entity types and operation kinds are exposed as
//! tools, how tools are named, which scopes and roles each tool requires,
//! and the generation limits. It is declarative and YAML-loadable; the
//! catalog builder applies it in a single pass.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// The kind of operation a generated tool performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Read,
    Update,
    Delete,
    List,
    Navigate,
    Query,
}

impl OperationKind {
    /// The verb used in generated tool names.
    pub fn verb(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Read => "get",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::List => "list",
            OperationKind::Navigate => "get",
            OperationKind::Query => "query",
        }
    }

    /// Whether the operation mutates downstream state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            OperationKind::Create | OperationKind::Update | OperationKind::Delete
        )
    }

    /// The four per-entity CRUD kinds, in generation order.
    pub fn crud() -> [OperationKind; 4] {
        [
            OperationKind::Create,
            OperationKind::Read,
            OperationKind::Update,
            OperationKind::Delete,
        ]
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationKind::Create => "create",
            OperationKind::Read => "read",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::List => "list",
            OperationKind::Navigate => "navigate",
            OperationKind::Query => "query",
        };
        f.write_str(name)
    }
}

/// Declarative rules for catalog generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationPolicy {
    /// Entity types to expose. Empty means "all except excluded". Names
    /// match either the full name (`Sample.Customer`) or the short name
    /// (`Customer`).
    #[serde(default)]
    pub included_entities: Vec<String>,

    /// Entity types to hide. Exclusion always wins over inclusion.
    #[serde(default)]
    pub excluded_entities: Vec<String>,

    /// Operation kinds to generate. Empty means "all except excluded".
    #[serde(default)]
    pub included_operations: Vec<OperationKind>,

    /// Operation kinds to suppress. Exclusion always wins over inclusion.
    #[serde(default)]
    pub excluded_operations: Vec<OperationKind>,

    /// Generate per-entity Create/Read/Update/Delete tools.
    #[serde(default = "default_true")]
    pub generate_crud: bool,

    /// Generate per-relationship navigation tools.
    #[serde(default = "default_true")]
    pub generate_navigation: bool,

    /// Generate per-entity-set listing tools.
    #[serde(default = "default_true")]
    pub generate_collection_listings: bool,

    /// Generate the single free-form query tool.
    #[serde(default = "default_true")]
    pub generate_query_tool: bool,

    /// Prefix prepended to every generated tool name.
    #[serde(default)]
    pub tool_prefix: String,

    /// Suffix appended to every generated tool name.
    #[serde(default)]
    pub tool_suffix: String,

    /// Scopes required by every generated tool.
    #[serde(default)]
    pub default_scopes: Vec<String>,

    /// Additional scopes required for tools targeting a given entity type.
    /// Keys match full or short entity names.
    #[serde(default)]
    pub entity_scopes: HashMap<String, Vec<String>>,

    /// Additional scopes required for tools of a given operation kind.
    #[serde(default)]
    pub operation_scopes: HashMap<OperationKind, Vec<String>>,

    /// Roles required by every generated tool. Empty means no role check.
    #[serde(default)]
    pub default_roles: Vec<String>,

    /// Stop generating once this many tools exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_count: Option<usize>,

    /// Maximum `expand` path depth accepted at invocation time.
    #[serde(default = "default_expand_depth")]
    pub max_expand_depth: usize,

    /// Omit binary/stream-typed fields from default field selection.
    #[serde(default = "default_true")]
    pub exclude_binary_by_default: bool,

    /// Page size applied to listings when the caller supplies none.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            included_entities: Vec::new(),
            excluded_entities: Vec::new(),
            included_operations: Vec::new(),
            excluded_operations: Vec::new(),
            generate_crud: true,
            generate_navigation: true,
            generate_collection_listings: true,
            generate_query_tool: true,
            tool_prefix: String::new(),
            tool_suffix: String::new(),
            default_scopes: Vec::new(),
            entity_scopes: HashMap::new(),
            operation_scopes: HashMap::new(),
            default_roles: Vec::new(),
            max_tool_count: None,
            max_expand_depth: default_expand_depth(),
            exclude_binary_by_default: true,
            default_page_size: default_page_size(),
        }
    }
}

impl GenerationPolicy {
    /// Load a policy from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PolicyError::Io(path.display().to_string(), e))?;
        let policy: GenerationPolicy = serde_yaml::from_str(&content)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Reject policies whose inclusion and exclusion sets overlap.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for name in &self.included_entities {
            if self.excluded_entities.contains(name) {
                return Err(PolicyError::ConflictingEntity(name.clone()));
            }
        }
        for op in &self.included_operations {
            if self.excluded_operations.contains(op) {
                return Err(PolicyError::ConflictingOperation(*op));
            }
        }
        Ok(())
    }

    /// Whether an entity type is exposed. `full_name` is the qualified
    /// name; `short_name` the unqualified one.
    pub fn entity_included(&self, full_name: &str, short_name: &str) -> bool {
        let matches = |name: &String| name == full_name || name == short_name;

        if self.excluded_entities.iter().any(matches) {
            return false;
        }
        if self.included_entities.is_empty() {
            return true;
        }
        self.included_entities.iter().any(matches)
    }

    /// Whether an operation kind is enabled, combining the coarse toggles
    /// with the include/exclude sets.
    pub fn operation_enabled(&self, kind: OperationKind) -> bool {
        let toggled_on = match kind {
            OperationKind::Create
            | OperationKind::Read
            | OperationKind::Update
            | OperationKind::Delete => self.generate_crud,
            OperationKind::Navigate => self.generate_navigation,
            OperationKind::List => self.generate_collection_listings,
            OperationKind::Query => self.generate_query_tool,
        };
        if !toggled_on {
            return false;
        }
        if self.excluded_operations.contains(&kind) {
            return false;
        }
        if self.included_operations.is_empty() {
            return true;
        }
        self.included_operations.contains(&kind)
    }

    /// The scope requirement for one tool: default scopes, entity-specific
    /// scopes, and operation-specific scopes, unioned without duplicates.
    pub fn scopes_for(
        &self,
        full_name: &str,
        short_name: &str,
        kind: OperationKind,
    ) -> Vec<String> {
        let mut scopes = self.default_scopes.clone();

        let entity_extra = self
            .entity_scopes
            .get(full_name)
            .or_else(|| self.entity_scopes.get(short_name));
        if let Some(extra) = entity_extra {
            for scope in extra {
                if !scopes.contains(scope) {
                    scopes.push(scope.clone());
                }
            }
        }

        if let Some(extra) = self.operation_scopes.get(&kind) {
            for scope in extra {
                if !scopes.contains(scope) {
                    scopes.push(scope.clone());
                }
            }
        }

        scopes
    }

    /// Decorate a base tool name with the configured prefix and suffix.
    pub fn format_tool_name(&self, base: &str) -> String {
        format!("{}{}{}", self.tool_prefix, base, self.tool_suffix)
    }
}

/// Errors raised while loading or validating a policy.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// An entity name appears in both the inclusion and exclusion sets.
    #[error("entity '{0}' appears in both included_entities and excluded_entities")]
    ConflictingEntity(String),

    /// An operation kind appears in both sets.
    #[error("operation '{0}' appears in both included_operations and excluded_operations")]
    ConflictingOperation(OperationKind),

    /// The policy file could not be read.
    #[error("failed to read policy file {0}: {1}")]
    Io(String, #[source] std::io::Error),

    /// The policy file is not valid YAML.
    #[error("invalid policy file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn default_true() -> bool {
    true
}

fn default_expand_depth() -> usize {
    3
}

fn default_page_size() -> u32 {
    20
}
