//! MCP server.
//!
//! Routes JSON-RPC methods to the catalog and the executor, applies the
//! authorization filter on listing and (defensively) on invocation, and
//! owns the published-catalog refresh. Two transports are supported:
//! line-delimited JSON-RPC on stdio, and HTTP via [`crate::http_transport`].

use crate::authz::{AuthorizationFilter, CallerIdentity};
use crate::catalog::{CatalogBuilder, CatalogHandle, ToolCatalog};
use crate::context::InvocationContext;
use crate::error::McpError;
use crate::executor::{ExecutorSettings, ToolExecutor};
use crate::http_transport::HttpServer;
use crate::protocol::{CallToolParams, JsonRpcRequest, JsonRpcResponse};
use crate::result::{codes, ToolResult};
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use trellis_core::{EntityModel, GenerationPolicy, McpConfig, Transport};
use trellis_odata::DataService;

/// Where a catalog refresh gets its inputs.
#[derive(Debug, Clone)]
pub struct RefreshSource {
    /// Path to the metadata model document.
    pub model_path: PathBuf,

    /// Policy applied on rebuild.
    pub policy: GenerationPolicy,
}

/// The MCP server.
pub struct McpServer<S: DataService> {
    config: McpConfig,
    catalog: CatalogHandle,
    executor: ToolExecutor<S>,
    authz: AuthorizationFilter,
    stdio_caller: CallerIdentity,
    call_timeout: Duration,
    refresh: Option<RefreshSource>,
}

impl<S: DataService + 'static> McpServer<S> {
    /// Create a server publishing the given catalog.
    pub fn new(
        config: McpConfig,
        catalog: ToolCatalog,
        service: Arc<S>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            config,
            catalog: CatalogHandle::new(catalog),
            executor: ToolExecutor::new(service, settings),
            authz: AuthorizationFilter,
            stdio_caller: CallerIdentity::anonymous(),
            call_timeout: Duration::from_secs(30),
            refresh: None,
        }
    }

    /// Identity assumed for requests arriving on stdio.
    pub fn with_stdio_caller(mut self, caller: CallerIdentity) -> Self {
        self.stdio_caller = caller;
        self
    }

    /// Deadline applied to each invocation.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Enable `model/refresh` from a model document on disk.
    pub fn with_refresh_source(mut self, source: RefreshSource) -> Self {
        self.refresh = Some(source);
        self
    }

    /// The current catalog snapshot.
    pub fn catalog(&self) -> Arc<ToolCatalog> {
        self.catalog.load()
    }

    /// Run the server on the configured transport.
    pub async fn run(self) -> Result<(), McpError> {
        match self.config.transport {
            Transport::Stdio => self.run_stdio().await,
            Transport::Http => self.run_http().await,
        }
    }

    /// Serve line-delimited JSON-RPC on stdin/stdout.
    async fn run_stdio(&self) -> Result<(), McpError> {
        tracing::info!("starting MCP server on stdio");

        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut stdout_lock = stdout.lock();

        for line in stdin.lock().lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
                Ok(request) => self.handle_request(request, &self.stdio_caller).await,
                Err(e) => JsonRpcResponse::error(None, -32700, format!("Parse error: {e}")),
            };
            let response_json = serde_json::to_string(&response)?;

            writeln!(stdout_lock, "{response_json}")?;
            stdout_lock.flush()?;
        }

        Ok(())
    }

    /// Serve JSON-RPC over HTTP. Each request carries its own caller
    /// identity and is handled on its own task.
    async fn run_http(self) -> Result<(), McpError> {
        let bind_address = self.config.bind_address();
        tracing::info!(address = %bind_address, "starting MCP server on HTTP");

        let (request_tx, mut request_rx) =
            mpsc::channel::<(JsonRpcRequest, CallerIdentity, mpsc::Sender<JsonRpcResponse>)>(100);

        let server = Arc::new(self);
        tokio::spawn(async move {
            while let Some((request, caller, response_tx)) = request_rx.recv().await {
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    let response = server.handle_request(request, &caller).await;
                    let _ = response_tx.send(response).await;
                });
            }
        });

        HttpServer::new(bind_address, request_tx).run().await
    }

    /// Handle one JSON-RPC request on behalf of `caller`.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        caller: &CallerIdentity,
    ) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "initialized" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id, caller),
            "tools/call" => self.handle_call_tool(id, request.params, caller).await,
            "model/refresh" => self.handle_model_refresh(id, request.params),
            "shutdown" => {
                tracing::info!("MCP server shutdown requested");
                JsonRpcResponse::success(id, json!(null))
            }
            other => {
                JsonRpcResponse::error(id, -32601, format!("Method not found: {other}"))
            }
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {
                "name": "trellis",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {
                    "listChanged": true
                }
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>, caller: &CallerIdentity) -> JsonRpcResponse {
        let catalog = self.catalog.load();
        let tools: Vec<Value> = self
            .authz
            .visible_tools(&catalog, caller)
            .iter()
            .map(|tool| {
                serde_json::to_value(tool.descriptor()).unwrap_or_else(|_| json!(null))
            })
            .collect();

        tracing::debug!(
            visible = tools.len(),
            total = catalog.len(),
            subject = ?caller.subject,
            "listing tools"
        );
        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_call_tool(
        &self,
        id: Option<Value>,
        params: Option<Value>,
        caller: &CallerIdentity,
    ) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(id, -32602, format!("Invalid params: {e}"));
                }
            },
            None => return JsonRpcResponse::error(id, -32602, "Missing params"),
        };

        let catalog = self.catalog.load();
        let Some(tool) = catalog.get(&params.name) else {
            return JsonRpcResponse::error(id, -32602, format!("Tool not found: {}", params.name));
        };

        let ctx = InvocationContext::new(caller.clone()).with_timeout(self.call_timeout);

        // Listing already filters; this is the defensive invocation-time check.
        let result = if self.authz.can_access(tool, caller) {
            self.executor.execute(tool, params.arguments, &ctx).await
        } else {
            tracing::warn!(
                tool = %tool.name,
                subject = ?caller.subject,
                correlation_id = %ctx.correlation_id,
                "caller lacks required scopes or roles"
            );
            ToolResult::failure(
                401,
                codes::UNAUTHORIZED,
                format!("caller is not authorized to invoke '{}'", tool.name),
            )
            .with_meta(&ctx.correlation_id, Instant::now())
        };

        let is_error = !result.is_success;
        let envelope = match serde_json::to_value(&result) {
            Ok(value) => value,
            Err(e) => return JsonRpcResponse::error(id, -32603, format!("Internal error: {e}")),
        };
        let content = vec![crate::protocol::ToolContent::Json { json: envelope }];

        JsonRpcResponse::success(
            id,
            json!({
                "content": content,
                "isError": is_error
            }),
        )
    }

    /// Rebuild the catalog and swap it in atomically; in-flight calls keep
    /// their snapshot.
    fn handle_model_refresh(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let inline_model = params.as_ref().and_then(|p| p.get("model")).cloned();

        let (model, policy) = match (&inline_model, &self.refresh) {
            (Some(document), Some(source)) => {
                match EntityModel::from_json(document) {
                    Ok(model) => (model, source.policy.clone()),
                    Err(e) => {
                        return JsonRpcResponse::error(id, -32602, format!("Invalid model: {e}"));
                    }
                }
            }
            (None, Some(source)) => match EntityModel::from_path(&source.model_path) {
                Ok(model) => (model, source.policy.clone()),
                Err(e) => {
                    return JsonRpcResponse::error(id, -32603, format!("Model reload failed: {e}"));
                }
            },
            _ => {
                return JsonRpcResponse::error(
                    id,
                    -32601,
                    "Catalog refresh is not configured for this server",
                );
            }
        };

        match CatalogBuilder::new(policy).build(&model) {
            Ok(catalog) => {
                let tool_count = catalog.len();
                self.catalog.swap(catalog);
                tracing::info!(tool_count, "published refreshed tool catalog");
                JsonRpcResponse::success(id, json!({ "toolCount": tool_count }))
            }
            Err(e) => JsonRpcResponse::error(id, -32603, format!("Catalog rebuild failed: {e}")),
        }
    }
}
