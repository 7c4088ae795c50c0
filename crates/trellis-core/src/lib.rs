//! # trellis-core
//!
//! Shared types for Trellis: the entity metadata model supplied by the
//! external metadata collaborator, the declarative tool generation policy,
//! and process configuration.
//!
//! Nothing in this crate talks to the network; the downstream request
//! translation lives in `trellis-odata` and the MCP surface in
//! `trellis-mcp`.

pub mod config;
pub mod metadata;

pub use config::{
    CallerConfig, ConfigError, GenerationPolicy, McpConfig, OperationKind, PolicyError,
    ServiceConfig, Transport, TrellisConfig,
};
pub use metadata::{
    EntityModel, EntitySet, EntityType, ModelError, NavigationProperty, PrimitiveKind, Property,
};
