//! # trellis-mcp
//!
//! The MCP surface of Trellis: turns an entity metadata model into a
//! catalog of schema-described tools and serves their invocation.
//!
//! ## Architecture
//!
//! ```text
//! AI agent (MCP client)
//!       │
//!       │ JSON-RPC (tools/list, tools/call)
//!       ▼
//! ┌───────────────────────┐
//! │  Trellis MCP server   │
//! │  1. Filter catalog    │  ← authz (scopes/roles)
//! │  2. Validate input    │
//! │  3. Encode keys,      │  ← trellis-odata
//! │     build query       │
//! │  4. Manage etag       │
//! │  5. Issue request     │
//! │  6. Map result        │  → uniform ToolResult envelope
//! └──────────┬────────────┘
//!            │ HTTP (GET/POST/PATCH/DELETE)
//!            ▼
//!    downstream data service
//! ```
//!
//! The catalog is generated once per model (see [`catalog::CatalogBuilder`])
//! and published immutably; refresh swaps the published reference without
//! disturbing in-flight invocations.

pub mod authz;
pub mod catalog;
pub mod context;
pub mod error;
pub mod executor;
pub mod http_transport;
pub mod protocol;
pub mod result;
pub mod server;

pub use authz::{AuthorizationFilter, CallerIdentity};
pub use catalog::{
    CatalogBuilder, CatalogError, CatalogHandle, EntityTarget, ToolCatalog,
    ToolDefinition, ToolTarget,
};
pub use context::{CancellationFlag, InvocationContext};
pub use error::McpError;
pub use executor::{ExecutorSettings, ToolExecutor};
pub use protocol::{
    CallToolParams, JsonRpcRequest, JsonRpcResponse, ToolAnnotations, ToolContent, ToolDescriptor,
};
pub use result::{codes, LocalError, ToolResult};
pub use server::{McpServer, RefreshSource};
