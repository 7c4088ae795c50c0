//! Entity metadata model.
//!
//! This module provides the in-memory description of the downstream data
//! service: entity types with their properties and keys, navigation
//! relationships, and named entity sets. The model is produced by an
//! external metadata collaborator and handed to Trellis as a JSON document;
//! parsing of the service's native metadata format (CSDL) is out of scope.

use serde::{Deserialize, Serialize};

/// The complete metadata model for one downstream service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EntityModel {
    /// All entity types declared by the service.
    #[serde(default)]
    pub entity_types: Vec<EntityType>,

    /// Named, queryable collections.
    #[serde(default)]
    pub entity_sets: Vec<EntitySet>,
}

impl EntityModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entity type by its full name.
    pub fn entity_type(&self, full_name: &str) -> Option<&EntityType> {
        self.entity_types.iter().find(|t| t.full_name == full_name)
    }

    /// Look up an entity set by name.
    pub fn entity_set(&self, name: &str) -> Option<&EntitySet> {
        self.entity_sets.iter().find(|s| s.name == name)
    }

    /// Find the entity set whose element type matches the given full name.
    ///
    /// When a type is exposed through multiple sets, the first declared one
    /// wins.
    pub fn entity_set_for(&self, type_full_name: &str) -> Option<&EntitySet> {
        self.entity_sets
            .iter()
            .find(|s| s.entity_type_full_name == type_full_name)
    }

    /// Parse a model from the JSON document produced by the metadata
    /// collaborator.
    ///
    /// The document shape mirrors the model itself:
    ///
    /// ```json
    /// {
    ///   "entity_types": [
    ///     {
    ///       "full_name": "Sample.Customer",
    ///       "properties": [{"name": "Id", "type": "Edm.Int32", "nullable": false}],
    ///       "key": ["Id"],
    ///       "navigation_properties": [{"name": "Orders", "target": "Sample.Order", "collection": true}]
    ///     }
    ///   ],
    ///   "entity_sets": [{"name": "Customers", "entity_type": "Sample.Customer"}]
    /// }
    /// ```
    pub fn from_json(json: &serde_json::Value) -> Result<Self, ModelError> {
        let mut model = EntityModel::new();

        let types = json["entity_types"]
            .as_array()
            .ok_or_else(|| ModelError::MissingField("entity_types".to_string()))?;

        for type_json in types {
            model.entity_types.push(parse_entity_type(type_json)?);
        }

        if let Some(sets) = json["entity_sets"].as_array() {
            for set_json in sets {
                let name = set_json["name"]
                    .as_str()
                    .ok_or_else(|| ModelError::MissingField("entity_set.name".to_string()))?;
                let entity_type = set_json["entity_type"]
                    .as_str()
                    .ok_or_else(|| ModelError::MissingField("entity_set.entity_type".to_string()))?;
                model.entity_sets.push(EntitySet {
                    name: name.to_string(),
                    entity_type_full_name: entity_type.to_string(),
                });
            }
        }

        Ok(model)
    }

    /// Parse a model document from a string.
    pub fn from_json_str(content: &str) -> Result<Self, ModelError> {
        let json: serde_json::Value = serde_json::from_str(content)?;
        Self::from_json(&json)
    }

    /// Load a model document from a file path.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Io(path.display().to_string(), e))?;
        Self::from_json_str(&content)
    }

    /// Report model-level consistency issues.
    ///
    /// The catalog builder skips entity types with issues rather than
    /// failing the whole build, so this returns a list instead of an error.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for entity in &self.entity_types {
            for key in &entity.key_property_names {
                if entity.structural_property(key).is_none() {
                    issues.push(format!(
                        "entity type '{}' declares key '{}' with no matching property",
                        entity.full_name, key
                    ));
                }
            }
        }
        for set in &self.entity_sets {
            if self.entity_type(&set.entity_type_full_name).is_none() {
                issues.push(format!(
                    "entity set '{}' references unknown entity type '{}'",
                    set.name, set.entity_type_full_name
                ));
            }
        }
        issues
    }
}

/// One entity type: a named record shape with typed properties, a key, and
/// navigation relationships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityType {
    /// Namespace-qualified name, e.g. `Sample.Customer`.
    pub full_name: String,

    /// Structural properties.
    pub properties: Vec<Property>,

    /// Names of the properties forming the entity key, in declared order.
    #[serde(default)]
    pub key_property_names: Vec<String>,

    /// Relationships to other entity types.
    #[serde(default)]
    pub navigation_properties: Vec<NavigationProperty>,
}

impl EntityType {
    /// The unqualified type name (the segment after the last `.`).
    pub fn short_name(&self) -> &str {
        self.full_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.full_name)
    }

    /// Look up a structural property by name.
    pub fn structural_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// The key properties in declared key order.
    ///
    /// Properties whose names do not resolve are silently dropped; callers
    /// that care use [`EntityModel::issues`] first.
    pub fn key_properties(&self) -> Vec<&Property> {
        self.key_property_names
            .iter()
            .filter_map(|name| self.structural_property(name))
            .collect()
    }

    /// Whether every declared key name resolves to a property.
    pub fn has_complete_key(&self) -> bool {
        !self.key_property_names.is_empty()
            && self.key_properties().len() == self.key_property_names.len()
    }

    /// Names of binary/stream-typed properties, for default-selection
    /// suppression.
    pub fn binary_property_names(&self) -> Vec<String> {
        self.properties
            .iter()
            .filter(|p| p.is_binary())
            .map(|p| p.name.clone())
            .collect()
    }
}

/// A structural property of an entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    /// Property name.
    pub name: String,

    /// Declared type name, e.g. `Edm.Int32`.
    pub type_name: String,

    /// Whether null is an allowed value.
    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// Whether the property participates in the entity key.
    #[serde(default)]
    pub is_key: bool,
}

fn default_nullable() -> bool {
    true
}

impl Property {
    /// Create a property with the given name and type.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable: true,
            is_key: false,
        }
    }

    /// Map the declared type to an abstract schema primitive.
    ///
    /// Unknown type names default to [`PrimitiveKind::String`].
    pub fn primitive_kind(&self) -> PrimitiveKind {
        let local = self
            .type_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.type_name)
            .to_ascii_lowercase();

        match local.as_str() {
            "int16" | "int32" | "int64" | "byte" | "sbyte" => PrimitiveKind::Integer,
            "decimal" | "double" | "single" => PrimitiveKind::Number,
            "boolean" => PrimitiveKind::Boolean,
            _ => PrimitiveKind::String,
        }
    }

    /// Whether the property holds binary or stream content.
    pub fn is_binary(&self) -> bool {
        let local = self
            .type_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.type_name)
            .to_ascii_lowercase();
        local == "binary" || local == "stream"
    }
}

/// Abstract schema primitive used for input-schema generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Number,
    Integer,
    Boolean,
}

impl PrimitiveKind {
    /// The JSON Schema `type` keyword for this primitive.
    pub fn json_type(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Boolean => "boolean",
        }
    }
}

/// A named relationship from one entity type to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationProperty {
    /// Relationship name, e.g. `Orders`.
    pub name: String,

    /// Full name of the target entity type.
    pub target_entity_type: String,

    /// Whether the relationship targets a collection (vs a single instance).
    #[serde(default = "default_collection")]
    pub collection: bool,
}

fn default_collection() -> bool {
    true
}

/// A named, addressable collection of one entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySet {
    /// Collection name as addressed in resource paths, e.g. `Customers`.
    pub name: String,

    /// Full name of the element entity type.
    pub entity_type_full_name: String,
}

/// Errors raised while loading a model document.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The document is missing a required field.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// The document is not valid JSON.
    #[error("invalid model document: {0}")]
    Json(#[from] serde_json::Error),

    /// The document could not be read from disk.
    #[error("failed to read model document {0}: {1}")]
    Io(String, #[source] std::io::Error),
}

fn parse_entity_type(json: &serde_json::Value) -> Result<EntityType, ModelError> {
    let full_name = json["full_name"]
        .as_str()
        .ok_or_else(|| ModelError::MissingField("entity_type.full_name".to_string()))?
        .to_string();

    let mut entity = EntityType {
        full_name,
        properties: Vec::new(),
        key_property_names: Vec::new(),
        navigation_properties: Vec::new(),
    };

    if let Some(props) = json["properties"].as_array() {
        for prop_json in props {
            let name = prop_json["name"]
                .as_str()
                .ok_or_else(|| ModelError::MissingField("property.name".to_string()))?;
            let type_name = prop_json["type"]
                .as_str()
                .or_else(|| prop_json["type_name"].as_str())
                .unwrap_or("Edm.String");

            let mut property = Property::new(name, type_name);
            property.nullable = prop_json["nullable"].as_bool().unwrap_or(true);
            entity.properties.push(property);
        }
    }

    let key_field = json
        .get("key")
        .or_else(|| json.get("key_property_names"));
    if let Some(keys) = key_field.and_then(|k| k.as_array()) {
        for key in keys {
            if let Some(name) = key.as_str() {
                entity.key_property_names.push(name.to_string());
                if let Some(prop) = entity.properties.iter_mut().find(|p| p.name == name) {
                    prop.is_key = true;
                }
            }
        }
    }

    if let Some(navs) = json["navigation_properties"].as_array() {
        for nav_json in navs {
            let name = nav_json["name"]
                .as_str()
                .ok_or_else(|| ModelError::MissingField("navigation_property.name".to_string()))?;
            let target = nav_json["target"]
                .as_str()
                .or_else(|| nav_json["target_entity_type"].as_str())
                .ok_or_else(|| ModelError::MissingField("navigation_property.target".to_string()))?;
            entity.navigation_properties.push(NavigationProperty {
                name: name.to_string(),
                target_entity_type: target.to_string(),
                collection: nav_json["collection"].as_bool().unwrap_or(true),
            });
        }
    }

    Ok(entity)
}
