//! Tool catalog generation.
//!
//! The catalog builder consumes the metadata model and the generation
//! policy and produces the full set of tool definitions in one pass:
//! per-entity CRUD tools, per-relationship navigation tools, per-collection
//! listing tools, and a single free-form query tool.
//!
//! | Tool pattern | Generated when |
//! |---|---|
//! | `get_{entity}` / `create_{entity}` / `update_{entity}` / `delete_{entity}` | entity included, operation enabled |
//! | `get_{entity}_{relationship}` | navigation enabled, entity has a key |
//! | `list_{collection}` | collection listings enabled |
//! | `query_entities` | query tool enabled (exactly one) |
//!
//! The produced [`ToolCatalog`] is immutable; refreshes build a new catalog
//! and swap it into the [`CatalogHandle`] so in-flight invocations keep
//! their snapshot.

use crate::protocol::{ToolAnnotations, ToolDescriptor};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use trellis_core::{EntityModel, EntityType, GenerationPolicy, OperationKind};

/// The entity-level context a handler needs, resolved at generation time.
#[derive(Debug, Clone)]
pub struct EntityTarget {
    /// Full name of the entity type.
    pub entity_type: String,

    /// Entity set addressed in resource paths.
    pub collection: String,

    /// Key property names in declared key order.
    pub key_names: Vec<String>,

    /// All structural property names, in declared order.
    pub property_names: Vec<String>,

    /// Names of binary/stream-typed properties.
    pub binary_properties: Vec<String>,
}

/// Per-operation-kind context, fixed at generation time.
///
/// Tools dispatch over this tagged union rather than storing callables,
/// which keeps the catalog serializable to descriptors and directly
/// testable.
#[derive(Debug, Clone)]
pub enum ToolTarget {
    /// A CRUD tool addressing one entity type.
    Entity(EntityTarget),

    /// A navigation tool traversing one relationship.
    Navigation {
        entity: EntityTarget,
        navigation: String,
        target_entity_type: String,
    },

    /// A listing tool over one entity set.
    Collection(EntityTarget),

    /// The service-wide query tool.
    Service,
}

/// One callable tool: schema, metadata, and the typed handler context.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// What the handler does with the arguments.
    pub operation: OperationKind,

    /// Generation-time context for the handler.
    pub target: ToolTarget,

    /// JSON-Schema-shaped input description.
    pub input_schema: Value,

    /// Scopes required to see and invoke the tool.
    pub required_scopes: Vec<String>,

    /// Roles required to see and invoke the tool.
    pub required_roles: Vec<String>,
}

impl ToolDefinition {
    /// The wire descriptor published to callers.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: self.input_schema.clone(),
            annotations: Some(ToolAnnotations {
                read_only: Some(!self.operation.is_mutation()),
            }),
        }
    }
}

/// An immutable, insertion-ordered, name-indexed set of tools.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    /// Build a catalog from generated tools, validating uniqueness and
    /// completeness.
    pub fn from_tools(tools: Vec<ToolDefinition>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (position, tool) in tools.iter().enumerate() {
            if tool.name.is_empty() {
                return Err(CatalogError::InvalidTool {
                    name: format!("#{position}"),
                    reason: "empty tool name".to_string(),
                });
            }
            if !tool.input_schema.is_object() {
                return Err(CatalogError::InvalidTool {
                    name: tool.name.clone(),
                    reason: "input schema is not an object".to_string(),
                });
            }
            if index.insert(tool.name.clone(), position).is_some() {
                return Err(CatalogError::DuplicateToolName(tool.name.clone()));
            }
        }
        Ok(Self { tools, index })
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Iterate tools in generation order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter()
    }

    /// Tool names in generation order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Number of tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// The published catalog reference.
///
/// Invocations load a snapshot and keep it for their whole lifetime;
/// refresh swaps the `Arc` without mutating the old catalog.
#[derive(Debug)]
pub struct CatalogHandle {
    current: RwLock<Arc<ToolCatalog>>,
}

impl CatalogHandle {
    /// Publish an initial catalog.
    pub fn new(catalog: ToolCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// The current snapshot.
    pub fn load(&self) -> Arc<ToolCatalog> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the published catalog.
    pub fn swap(&self, catalog: ToolCatalog) {
        let next = Arc::new(catalog);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

/// Errors detected by post-build catalog validation.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Two generated tools share a name.
    #[error("duplicate tool name: {0}")]
    DuplicateToolName(String),

    /// A generated tool is structurally incomplete.
    #[error("invalid tool '{name}': {reason}")]
    InvalidTool { name: String, reason: String },
}

/// Builds a [`ToolCatalog`] from a model and a policy.
pub struct CatalogBuilder {
    policy: GenerationPolicy,
}

impl CatalogBuilder {
    /// Create a builder for the given policy.
    pub fn new(policy: GenerationPolicy) -> Self {
        Self { policy }
    }

    /// Run one generation pass.
    ///
    /// Entity types the builder cannot process (incomplete keys, no entity
    /// set) are logged and skipped; the pass itself only fails on
    /// post-build validation (duplicate names, malformed tools).
    pub fn build(&self, model: &EntityModel) -> Result<ToolCatalog, CatalogError> {
        let mut acc = ToolAccumulator::new(self.policy.max_tool_count);

        // Resolve each included entity type once; unprocessable ones are
        // logged inside entity_target and dropped here.
        let targets: Vec<(&EntityType, EntityTarget)> = model
            .entity_types
            .iter()
            .filter(|entity| {
                self.policy
                    .entity_included(&entity.full_name, entity.short_name())
            })
            .filter_map(|entity| self.entity_target(model, entity).map(|t| (entity, t)))
            .collect();

        'generation: {
            for (entity, target) in &targets {
                for kind in OperationKind::crud() {
                    if !self.policy.operation_enabled(kind) {
                        continue;
                    }
                    // Addressing a single entity needs a usable key.
                    if kind != OperationKind::Create && target.key_names.is_empty() {
                        tracing::debug!(
                            entity = %entity.full_name,
                            operation = %kind,
                            "skipping key-addressed operation for key-less entity type"
                        );
                        continue;
                    }
                    let tool = self.build_crud_tool(kind, entity, target);
                    if !acc.push(tool) {
                        break 'generation;
                    }
                }
            }

            if self.policy.operation_enabled(OperationKind::Navigate) {
                for (entity, target) in &targets {
                    if target.key_names.is_empty() {
                        continue;
                    }
                    for nav in &entity.navigation_properties {
                        let tool = self.build_navigation_tool(entity, target, nav);
                        if !acc.push(tool) {
                            break 'generation;
                        }
                    }
                }
            }

            if self.policy.operation_enabled(OperationKind::List) {
                for set in &model.entity_sets {
                    let Some(entity) = model.entity_type(&set.entity_type_full_name) else {
                        tracing::warn!(
                            entity_set = %set.name,
                            entity_type = %set.entity_type_full_name,
                            "entity set references unknown entity type; skipping listing tool"
                        );
                        continue;
                    };
                    let short = entity.short_name().to_string();
                    if !self.policy.entity_included(&entity.full_name, &short) {
                        continue;
                    }
                    let tool = self.build_list_tool(set.name.as_str(), entity);
                    if !acc.push(tool) {
                        break 'generation;
                    }
                }
            }

            if self.policy.operation_enabled(OperationKind::Query) {
                let tool = self.build_query_tool();
                if !acc.push(tool) {
                    break 'generation;
                }
            }
        }

        if acc.stopped_early {
            tracing::info!(
                max_tool_count = ?self.policy.max_tool_count,
                "tool generation stopped at the configured limit"
            );
        }

        let catalog = ToolCatalog::from_tools(acc.tools)?;
        tracing::info!(tool_count = catalog.len(), "generated tool catalog");
        Ok(catalog)
    }

    /// Resolve the generation-time context for an entity type, or log and
    /// skip when it cannot be addressed.
    fn entity_target(&self, model: &EntityModel, entity: &EntityType) -> Option<EntityTarget> {
        if !entity.key_property_names.is_empty() && !entity.has_complete_key() {
            tracing::warn!(
                entity = %entity.full_name,
                "declared key names a missing property; skipping entity type"
            );
            return None;
        }
        let Some(set) = model.entity_set_for(&entity.full_name) else {
            tracing::warn!(
                entity = %entity.full_name,
                "no entity set exposes this entity type; skipping entity type"
            );
            return None;
        };

        Some(EntityTarget {
            entity_type: entity.full_name.clone(),
            collection: set.name.clone(),
            key_names: entity.key_property_names.clone(),
            property_names: entity.properties.iter().map(|p| p.name.clone()).collect(),
            binary_properties: entity.binary_property_names(),
        })
    }

    fn build_crud_tool(
        &self,
        kind: OperationKind,
        entity: &EntityType,
        target: &EntityTarget,
    ) -> ToolDefinition {
        let short = entity.short_name();
        let key_list = entity.key_property_names.join(", ");

        let (schema, description) = match kind {
            OperationKind::Create => {
                let mut properties = serde_json::Map::new();
                let mut required = Vec::new();
                for prop in &entity.properties {
                    properties.insert(prop.name.clone(), property_schema(prop, short));
                    if prop.is_key || !prop.nullable {
                        required.push(prop.name.clone());
                    }
                }
                (
                    object_schema(properties, required, false),
                    format!("Create a new {short} in the {} collection", target.collection),
                )
            }
            OperationKind::Read => {
                let mut properties = key_schema_properties(entity, short);
                properties.insert(
                    "select".to_string(),
                    json!({
                        "type": "string",
                        "description": "Comma-separated list of properties to return"
                    }),
                );
                (
                    object_schema(properties, entity.key_property_names.clone(), false),
                    format!("Retrieve a single {short} by key ({key_list})"),
                )
            }
            OperationKind::Update => {
                let mut properties = key_schema_properties(entity, short);
                for prop in &entity.properties {
                    if prop.is_key {
                        continue;
                    }
                    properties.insert(prop.name.clone(), property_schema(prop, short));
                }
                properties.insert("etag".to_string(), etag_schema());
                (
                    object_schema(properties, entity.key_property_names.clone(), true),
                    format!(
                        "Update an existing {short} by key ({key_list}); omitted properties are left unchanged"
                    ),
                )
            }
            OperationKind::Delete => {
                let mut properties = key_schema_properties(entity, short);
                properties.insert("etag".to_string(), etag_schema());
                (
                    object_schema(properties, entity.key_property_names.clone(), false),
                    format!("Delete a {short} by key ({key_list})"),
                )
            }
            // Only the four CRUD kinds reach this function.
            other => unreachable!("build_crud_tool called with {other}"),
        };

        let base_name = format!("{}_{}", kind.verb(), snake_case(short));
        ToolDefinition {
            name: self.policy.format_tool_name(&base_name),
            description,
            operation: kind,
            target: ToolTarget::Entity(target.clone()),
            input_schema: schema,
            required_scopes: self.policy.scopes_for(&entity.full_name, short, kind),
            required_roles: self.policy.default_roles.clone(),
        }
    }

    fn build_navigation_tool(
        &self,
        entity: &EntityType,
        target: &EntityTarget,
        nav: &trellis_core::NavigationProperty,
    ) -> ToolDefinition {
        let short = entity.short_name();
        let mut properties = key_schema_properties(entity, short);
        for (name, schema) in query_parameter_schemas(false) {
            properties.insert(name, schema);
        }

        let base_name = format!("get_{}_{}", snake_case(short), snake_case(&nav.name));
        ToolDefinition {
            name: self.policy.format_tool_name(&base_name),
            description: format!("Retrieve the {} related to a {short}", nav.name),
            operation: OperationKind::Navigate,
            target: ToolTarget::Navigation {
                entity: target.clone(),
                navigation: nav.name.clone(),
                target_entity_type: nav.target_entity_type.clone(),
            },
            input_schema: object_schema(properties, entity.key_property_names.clone(), false),
            required_scopes: self
                .policy
                .scopes_for(&entity.full_name, short, OperationKind::Navigate),
            required_roles: self.policy.default_roles.clone(),
        }
    }

    fn build_list_tool(&self, set_name: &str, entity: &EntityType) -> ToolDefinition {
        let short = entity.short_name();
        let mut properties = serde_json::Map::new();
        for (name, schema) in query_parameter_schemas(true) {
            properties.insert(name, schema);
        }

        let binary = entity.binary_property_names();
        let mut description = format!("List entities from the {set_name} collection");
        if self.policy.exclude_binary_by_default && !binary.is_empty() {
            description.push_str(&format!(
                " (binary properties {} are omitted unless explicitly selected)",
                binary.join(", ")
            ));
        }

        let target = EntityTarget {
            entity_type: entity.full_name.clone(),
            collection: set_name.to_string(),
            key_names: Vec::new(),
            property_names: entity.properties.iter().map(|p| p.name.clone()).collect(),
            binary_properties: binary,
        };

        ToolDefinition {
            name: self
                .policy
                .format_tool_name(&format!("list_{}", snake_case(set_name))),
            description,
            operation: OperationKind::List,
            target: ToolTarget::Collection(target),
            input_schema: object_schema(properties, Vec::new(), false),
            required_scopes: self
                .policy
                .scopes_for(&entity.full_name, short, OperationKind::List),
            required_roles: self.policy.default_roles.clone(),
        }
    }

    fn build_query_tool(&self) -> ToolDefinition {
        let mut properties = serde_json::Map::new();
        properties.insert(
            "collection".to_string(),
            json!({
                "type": "string",
                "description": "Name of the collection to query"
            }),
        );
        for (name, schema) in query_parameter_schemas(true) {
            properties.insert(name, schema);
        }

        ToolDefinition {
            name: self.policy.format_tool_name("query_entities"),
            description:
                "Run an ad-hoc query against any exposed collection, with filtering, ordering, \
                 field selection, expansion, and pagination"
                    .to_string(),
            operation: OperationKind::Query,
            target: ToolTarget::Service,
            input_schema: object_schema(properties, vec!["collection".to_string()], false),
            required_scopes: self.policy.scopes_for("", "", OperationKind::Query),
            required_roles: self.policy.default_roles.clone(),
        }
    }
}

/// Accumulates tools up to the configured limit.
struct ToolAccumulator {
    tools: Vec<ToolDefinition>,
    limit: Option<usize>,
    stopped_early: bool,
}

impl ToolAccumulator {
    fn new(limit: Option<usize>) -> Self {
        Self {
            tools: Vec::new(),
            limit,
            stopped_early: false,
        }
    }

    /// Push unless the limit was reached. Returns false once generation
    /// must stop.
    fn push(&mut self, tool: ToolDefinition) -> bool {
        if self.limit.is_some_and(|max| self.tools.len() >= max) {
            self.stopped_early = true;
            return false;
        }
        self.tools.push(tool);
        true
    }
}

fn object_schema(
    properties: serde_json::Map<String, Value>,
    required: Vec<String>,
    closed: bool,
) -> Value {
    let mut schema = json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    if closed {
        schema["additionalProperties"] = json!(false);
    }
    schema
}

fn property_schema(prop: &trellis_core::Property, entity_short: &str) -> Value {
    let mut schema = json!({ "type": prop.primitive_kind().json_type() });
    if prop.is_key {
        schema["description"] = json!(format!("Key property of {entity_short}"));
    }
    schema
}

fn key_schema_properties(
    entity: &EntityType,
    entity_short: &str,
) -> serde_json::Map<String, Value> {
    let mut properties = serde_json::Map::new();
    for prop in entity.key_properties() {
        properties.insert(prop.name.clone(), property_schema(prop, entity_short));
    }
    properties
}

fn etag_schema() -> Value {
    json!({
        "type": "string",
        "description": "Concurrency token from a previous read; the current one is fetched automatically when omitted"
    })
}

/// The structured query parameters shared by list/navigate/query tools.
/// `full` adds the count and search parameters.
fn query_parameter_schemas(full: bool) -> Vec<(String, Value)> {
    let mut params = vec![
        (
            "filter".to_string(),
            json!({"type": "string", "description": "Filter expression, e.g. \"Status eq 'open'\""}),
        ),
        (
            "orderby".to_string(),
            json!({"type": "string", "description": "Ordering expression, e.g. \"Name desc\""}),
        ),
        (
            "select".to_string(),
            json!({"type": "string", "description": "Comma-separated list of properties to return"}),
        ),
        (
            "expand".to_string(),
            json!({"type": "string", "description": "Comma-separated list of relationships to expand"}),
        ),
        (
            "top".to_string(),
            json!({"type": "integer", "description": "Page size"}),
        ),
        (
            "skip".to_string(),
            json!({"type": "integer", "description": "Number of entities to skip"}),
        ),
    ];
    if full {
        params.push((
            "count".to_string(),
            json!({"type": "boolean", "description": "Include the total entity count"}),
        ));
        params.push((
            "search".to_string(),
            json!({"type": "string", "description": "Free-text search expression"}),
        ));
    }
    params
}

/// Convert a PascalCase name to snake_case.
fn snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
