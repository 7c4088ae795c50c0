//! Tool execution.
//!
//! The executor turns one tool invocation into requests against the
//! downstream service: it validates arguments locally, encodes entity
//! keys, builds query options, manages the concurrency token on mutations,
//! and maps every outcome into the uniform result envelope.
//!
//! Within a single invocation the downstream calls are sequential (an
//! optional token prefetch, then the primary operation); distinct
//! invocations share nothing but the service client and run concurrently.

use crate::catalog::{EntityTarget, ToolDefinition, ToolTarget};
use crate::context::InvocationContext;
use crate::result::{LocalError, ToolResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use trellis_core::{GenerationPolicy, OperationKind};
use trellis_odata::{encode_key, DataService, QueryOptions, ResourcePath, ServiceError};

/// Argument names accepted for the concurrency token.
const ETAG_ALIASES: [&str; 4] = ["etag", "if_match", "ifMatch", "@odata.etag"];

/// Invocation-time knobs lifted from the generation policy.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Page size applied to listings without an explicit one.
    pub default_page_size: u32,

    /// Compute a default field selection that omits binary properties.
    pub exclude_binary_by_default: bool,

    /// Reject expansion paths deeper than this.
    pub max_expand_depth: usize,
}

impl ExecutorSettings {
    /// Lift the relevant fields from a generation policy.
    pub fn from_policy(policy: &GenerationPolicy) -> Self {
        Self {
            default_page_size: policy.default_page_size,
            exclude_binary_by_default: policy.exclude_binary_by_default,
            max_expand_depth: policy.max_expand_depth,
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from_policy(&GenerationPolicy::default())
    }
}

/// Failures inside one invocation: translation/downstream errors plus the
/// unexpected-local-error escape hatch.
enum ExecError {
    Service(ServiceError),
    Local(LocalError),
}

impl From<ServiceError> for ExecError {
    fn from(error: ServiceError) -> Self {
        ExecError::Service(error)
    }
}

impl From<LocalError> for ExecError {
    fn from(error: LocalError) -> Self {
        ExecError::Local(error)
    }
}

/// Executes tool invocations against a [`DataService`].
pub struct ToolExecutor<S: DataService> {
    service: Arc<S>,
    settings: ExecutorSettings,
}

impl<S: DataService> ToolExecutor<S> {
    /// Create an executor over the given service.
    pub fn new(service: Arc<S>, settings: ExecutorSettings) -> Self {
        Self { service, settings }
    }

    /// Run one invocation to completion and produce its result envelope.
    ///
    /// This never returns an error: every outcome, including local
    /// failures, is folded into the [`ToolResult`].
    pub async fn execute(
        &self,
        tool: &ToolDefinition,
        arguments: Value,
        ctx: &InvocationContext,
    ) -> ToolResult {
        let started = Instant::now();
        let mut warnings = Vec::new();

        tracing::debug!(
            tool = %tool.name,
            correlation_id = %ctx.correlation_id,
            "executing tool"
        );

        let outcome = self.run(tool, &arguments, ctx, &mut warnings).await;
        let result = match outcome {
            Ok((status, data)) => ToolResult::success(status, data),
            Err(ExecError::Service(error)) => {
                tracing::debug!(
                    tool = %tool.name,
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "tool invocation failed"
                );
                ToolResult::from_service_error(&error)
            }
            Err(ExecError::Local(error)) => {
                tracing::error!(
                    tool = %tool.name,
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "unexpected local error during tool invocation"
                );
                ToolResult::from_local_error(&error)
            }
        };

        result
            .with_warnings(warnings)
            .with_meta(&ctx.correlation_id, started)
    }

    async fn run(
        &self,
        tool: &ToolDefinition,
        arguments: &Value,
        ctx: &InvocationContext,
        warnings: &mut Vec<String>,
    ) -> Result<(u16, Value), ExecError> {
        let arguments = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => {
                return Err(ServiceError::Validation(
                    "tool arguments must be a JSON object".to_string(),
                )
                .into());
            }
        };

        validate_arguments(&tool.input_schema, &arguments)?;

        match (tool.operation, &tool.target) {
            (OperationKind::Create, ToolTarget::Entity(target)) => {
                self.create(target, &arguments, ctx).await
            }
            (OperationKind::Read, ToolTarget::Entity(target)) => {
                self.read(target, &arguments, ctx).await
            }
            (OperationKind::Update, ToolTarget::Entity(target)) => {
                self.update(target, &arguments, ctx, warnings).await
            }
            (OperationKind::Delete, ToolTarget::Entity(target)) => {
                self.delete(target, &arguments, ctx, warnings).await
            }
            (
                OperationKind::Navigate,
                ToolTarget::Navigation {
                    entity, navigation, ..
                },
            ) => self.navigate(entity, navigation, &arguments, ctx).await,
            (OperationKind::List, ToolTarget::Collection(target)) => {
                self.list(target, &arguments, ctx).await
            }
            (OperationKind::Query, ToolTarget::Service) => {
                self.query(&arguments, ctx).await
            }
            (operation, _) => Err(LocalError::IllegalState(format!(
                "tool '{}' pairs operation '{operation}' with a mismatched target",
                tool.name
            ))
            .into()),
        }
    }

    async fn create(
        &self,
        target: &EntityTarget,
        arguments: &Map<String, Value>,
        ctx: &InvocationContext,
    ) -> Result<(u16, Value), ExecError> {
        let body = entity_body(arguments, &target.property_names, &[]);
        let created = self
            .service
            .create(&target.collection, &Value::Object(body), ctx.remaining()?)
            .await?;
        Ok((201, created))
    }

    async fn read(
        &self,
        target: &EntityTarget,
        arguments: &Map<String, Value>,
        ctx: &InvocationContext,
    ) -> Result<(u16, Value), ExecError> {
        let key = encode_key(&target.key_names, arguments)?;
        let options = self.checked_options(arguments)?;
        let path = ResourcePath::entity(&target.collection, key);
        let entity = self.service.fetch(&path, &options, ctx.remaining()?).await?;
        Ok((200, entity))
    }

    async fn update(
        &self,
        target: &EntityTarget,
        arguments: &Map<String, Value>,
        ctx: &InvocationContext,
        warnings: &mut Vec<String>,
    ) -> Result<(u16, Value), ExecError> {
        let key = encode_key(&target.key_names, arguments)?;
        let body = entity_body(arguments, &target.property_names, &target.key_names);
        if body.is_empty() {
            return Err(ServiceError::Validation(
                "no updatable properties were supplied".to_string(),
            )
            .into());
        }

        let etag = self
            .resolve_etag(&target.collection, &key, arguments, ctx, warnings)
            .await?;

        let updated = self
            .service
            .update(
                &target.collection,
                &key,
                &Value::Object(body),
                etag.as_deref(),
                ctx.remaining()?,
            )
            .await?;
        Ok((200, updated))
    }

    async fn delete(
        &self,
        target: &EntityTarget,
        arguments: &Map<String, Value>,
        ctx: &InvocationContext,
        warnings: &mut Vec<String>,
    ) -> Result<(u16, Value), ExecError> {
        let key = encode_key(&target.key_names, arguments)?;

        let etag = self
            .resolve_etag(&target.collection, &key, arguments, ctx, warnings)
            .await?;

        self.service
            .delete(
                &target.collection,
                &key,
                etag.as_deref(),
                ctx.remaining()?,
            )
            .await?;
        Ok((204, Value::Null))
    }

    async fn navigate(
        &self,
        entity: &EntityTarget,
        navigation: &str,
        arguments: &Map<String, Value>,
        ctx: &InvocationContext,
    ) -> Result<(u16, Value), ExecError> {
        let key = encode_key(&entity.key_names, arguments)?;
        let options = self.checked_options(arguments)?;
        let path = ResourcePath::navigation(&entity.collection, key, navigation);
        let related = self.service.fetch(&path, &options, ctx.remaining()?).await?;
        Ok((200, related))
    }

    async fn list(
        &self,
        target: &EntityTarget,
        arguments: &Map<String, Value>,
        ctx: &InvocationContext,
    ) -> Result<(u16, Value), ExecError> {
        let mut options = self.checked_options(arguments)?;
        if self.settings.exclude_binary_by_default {
            options.apply_default_select(&target.property_names, &target.binary_properties);
        }
        options.apply_default_page_size(self.settings.default_page_size);

        let path = ResourcePath::collection(&target.collection);
        let entities = self.service.fetch(&path, &options, ctx.remaining()?).await?;
        Ok((200, entities))
    }

    async fn query(
        &self,
        arguments: &Map<String, Value>,
        ctx: &InvocationContext,
    ) -> Result<(u16, Value), ExecError> {
        let collection = arguments
            .get("collection")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ServiceError::Validation("missing target collection".to_string())
            })?;

        let mut options = self.checked_options(arguments)?;
        options.apply_default_page_size(self.settings.default_page_size);

        let path = ResourcePath::collection(collection);
        let entities = self.service.fetch(&path, &options, ctx.remaining()?).await?;
        Ok((200, entities))
    }

    /// Build query options from the arguments and enforce the expansion
    /// depth limit before anything leaves the process.
    fn checked_options(
        &self,
        arguments: &Map<String, Value>,
    ) -> Result<QueryOptions, ServiceError> {
        let options = QueryOptions::from_arguments(arguments);
        let depth = options.expand_depth();
        if depth > self.settings.max_expand_depth {
            return Err(ServiceError::Validation(format!(
                "expansion depth {depth} exceeds the allowed maximum of {}",
                self.settings.max_expand_depth
            )));
        }
        Ok(options)
    }

    /// The concurrency token for a mutation: the caller's, or a
    /// best-effort read of the current one.
    ///
    /// Prefetch failure is deliberately not fatal: it is logged, noted as
    /// a warning, and the mutation proceeds without a precondition, since
    /// the service may not require one.
    async fn resolve_etag(
        &self,
        collection: &str,
        key: &str,
        arguments: &Map<String, Value>,
        ctx: &InvocationContext,
        warnings: &mut Vec<String>,
    ) -> Result<Option<String>, ServiceError> {
        if let Some(etag) = supplied_etag(arguments) {
            return Ok(Some(etag));
        }

        match self
            .service
            .fetch_etag(collection, key, ctx.remaining()?)
            .await
        {
            Ok(etag) => Ok(etag),
            Err(error) => {
                tracing::warn!(
                    collection = %collection,
                    key = %key,
                    error = %error,
                    "concurrency token prefetch failed; proceeding without precondition"
                );
                warnings.push(format!(
                    "could not read the current concurrency token ({error}); the operation was attempted unconditionally"
                ));
                Ok(None)
            }
        }
    }
}

/// The caller-supplied concurrency token, under any accepted alias.
fn supplied_etag(arguments: &Map<String, Value>) -> Option<String> {
    for alias in ETAG_ALIASES {
        if let Some(value) = arguments.get(alias).and_then(Value::as_str) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// Project the arguments onto the entity's properties, excluding
/// `excluded` names (keys, for updates). Unrecognized arguments are left
/// out of the body.
fn entity_body(
    arguments: &Map<String, Value>,
    property_names: &[String],
    excluded: &[String],
) -> Map<String, Value> {
    let mut body = Map::new();
    for name in property_names {
        if excluded.contains(name) {
            continue;
        }
        if let Some(value) = arguments.get(name) {
            body.insert(name.clone(), value.clone());
        }
    }
    body
}

/// Validate arguments against the tool's input schema: required fields,
/// primitive types (with scalar coercion), and closed schemas.
fn validate_arguments(
    schema: &Value,
    arguments: &Map<String, Value>,
) -> Result<(), ServiceError> {
    if let Some(required) = schema["required"].as_array() {
        let missing: Vec<&str> = required
            .iter()
            .filter_map(Value::as_str)
            .filter(|field| !arguments.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::Validation(format!(
                "missing required argument{} {}",
                if missing.len() == 1 { "" } else { "s" },
                missing.join(", ")
            )));
        }
    }

    let properties = schema["properties"].as_object();
    if let Some(properties) = properties {
        for (field, value) in arguments {
            if let Some(expected) = properties
                .get(field)
                .and_then(|p| p["type"].as_str())
            {
                if !value_matches_type(value, expected) {
                    return Err(ServiceError::Validation(format!(
                        "argument '{field}' must be of type {expected}"
                    )));
                }
            }
        }
    }

    if schema["additionalProperties"] == Value::Bool(false) {
        if let Some(properties) = properties {
            for field in arguments.keys() {
                if !properties.contains_key(field)
                    && !ETAG_ALIASES.contains(&field.as_str())
                {
                    return Err(ServiceError::Validation(format!(
                        "unrecognized argument '{field}'"
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Type check with scalar coercion: identifiers frequently arrive as
/// strings, so string values parseable as the expected primitive pass.
fn value_matches_type(value: &Value, expected: &str) -> bool {
    if value.is_null() {
        return true;
    }
    match expected {
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value
                    .as_str()
                    .is_some_and(|s| s.trim().parse::<i64>().is_ok())
        }
        "number" => {
            value.is_number()
                || value
                    .as_str()
                    .is_some_and(|s| s.trim().parse::<f64>().is_ok())
        }
        "boolean" => {
            value.is_boolean()
                || value
                    .as_str()
                    .is_some_and(|s| s.trim().parse::<bool>().is_ok())
        }
        "string" => value.is_string() || value.is_number() || value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::CallerIdentity;
    use crate::catalog::{CatalogBuilder, ToolCatalog};
    use crate::catalog::testing::customer_model;
    use crate::result::codes;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use trellis_core::GenerationPolicy;

    /// What the mock saw, rendered for assertions.
    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Fetch { path: String, query: Vec<(String, String)> },
        Create { collection: String, body: Value },
        Update { collection: String, key: String, body: Value, etag: Option<String> },
        Delete { collection: String, key: String, etag: Option<String> },
        FetchEtag { collection: String, key: String },
    }

    #[derive(Default)]
    struct MockService {
        calls: Mutex<Vec<Call>>,
        fetch_response: Option<Result<Value, ServiceError>>,
        etag_response: Option<Result<Option<String>, ServiceError>>,
    }

    impl MockService {
        fn recorded(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn with_fetch(mut self, response: Result<Value, ServiceError>) -> Self {
            self.fetch_response = Some(response);
            self
        }

        fn with_etag(mut self, response: Result<Option<String>, ServiceError>) -> Self {
            self.etag_response = Some(response);
            self
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl DataService for MockService {
        async fn fetch(
            &self,
            path: &ResourcePath,
            options: &QueryOptions,
            _timeout: Option<Duration>,
        ) -> Result<Value, ServiceError> {
            self.record(Call::Fetch {
                path: path.segment(),
                query: options.to_query_pairs(),
            });
            self.fetch_response
                .clone()
                .unwrap_or(Ok(json!({"value": []})))
        }

        async fn create(
            &self,
            collection: &str,
            body: &Value,
            _timeout: Option<Duration>,
        ) -> Result<Value, ServiceError> {
            self.record(Call::Create {
                collection: collection.to_string(),
                body: body.clone(),
            });
            Ok(body.clone())
        }

        async fn update(
            &self,
            collection: &str,
            key: &str,
            body: &Value,
            etag: Option<&str>,
            _timeout: Option<Duration>,
        ) -> Result<Value, ServiceError> {
            self.record(Call::Update {
                collection: collection.to_string(),
                key: key.to_string(),
                body: body.clone(),
                etag: etag.map(String::from),
            });
            Ok(body.clone())
        }

        async fn delete(
            &self,
            collection: &str,
            key: &str,
            etag: Option<&str>,
            _timeout: Option<Duration>,
        ) -> Result<(), ServiceError> {
            self.record(Call::Delete {
                collection: collection.to_string(),
                key: key.to_string(),
                etag: etag.map(String::from),
            });
            Ok(())
        }

        async fn fetch_etag(
            &self,
            collection: &str,
            key: &str,
            _timeout: Option<Duration>,
        ) -> Result<Option<String>, ServiceError> {
            self.record(Call::FetchEtag {
                collection: collection.to_string(),
                key: key.to_string(),
            });
            self.etag_response.clone().unwrap_or(Ok(None))
        }
    }

    fn catalog() -> ToolCatalog {
        CatalogBuilder::new(GenerationPolicy::default())
            .build(&customer_model())
            .unwrap()
    }

    fn executor(service: MockService) -> (ToolExecutor<MockService>, Arc<MockService>) {
        let service = Arc::new(service);
        (
            ToolExecutor::new(Arc::clone(&service), ExecutorSettings::default()),
            service,
        )
    }

    fn ctx() -> InvocationContext {
        InvocationContext::new(CallerIdentity::anonymous())
    }

    #[tokio::test]
    async fn read_translates_to_keyed_fetch() {
        let (executor, service) = executor(MockService::default().with_fetch(Ok(json!({"Id": 7}))));
        let catalog = catalog();
        let tool = catalog.get("get_customer").unwrap();

        let result = executor.execute(tool, json!({"Id": 7}), &ctx()).await;

        assert!(result.is_success);
        assert_eq!(result.status_code, 200);
        assert_eq!(result.data, Some(json!({"Id": 7})));
        assert!(!result.correlation_id.is_empty());
        assert_eq!(
            service.recorded(),
            vec![Call::Fetch { path: "Customers(7)".to_string(), query: vec![] }]
        );
    }

    #[tokio::test]
    async fn read_maps_not_found() {
        let (executor, _service) =
            executor(MockService::default().with_fetch(Err(ServiceError::NotFound)));
        let catalog = catalog();
        let tool = catalog.get("get_customer").unwrap();

        let result = executor.execute(tool, json!({"Id": 7}), &ctx()).await;

        assert!(!result.is_success);
        assert_eq!(result.status_code, 404);
        assert_eq!(result.error_code.as_deref(), Some(codes::NOT_FOUND));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_network_call() {
        let (executor, service) = executor(MockService::default());
        let catalog = catalog();
        let tool = catalog.get("get_customer").unwrap();

        let result = executor.execute(tool, json!({}), &ctx()).await;

        assert!(!result.is_success);
        assert_eq!(result.status_code, 400);
        assert_eq!(result.error_code.as_deref(), Some(codes::VALIDATION_ERROR));
        assert!(service.recorded().is_empty());
    }

    #[tokio::test]
    async fn string_key_is_coerced_and_encoded() {
        let (executor, service) = executor(MockService::default());
        let catalog = catalog();
        let tool = catalog.get("get_customer").unwrap();

        let result = executor.execute(tool, json!({"Id": "7"}), &ctx()).await;

        assert!(result.is_success, "{:?}", result.error_message);
        assert_eq!(
            service.recorded(),
            vec![Call::Fetch { path: "Customers(7)".to_string(), query: vec![] }]
        );
    }

    #[tokio::test]
    async fn update_without_token_prefetches_exactly_once() {
        let (executor, service) = executor(
            MockService::default().with_etag(Ok(Some("W/\"42\"".to_string()))),
        );
        let catalog = catalog();
        let tool = catalog.get("update_customer").unwrap();

        let result = executor
            .execute(tool, json!({"Id": 7, "Name": "Acme"}), &ctx())
            .await;

        assert!(result.is_success);
        assert!(result.warnings.is_empty());
        let calls = service.recorded();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            Call::FetchEtag { collection: "Customers".to_string(), key: "7".to_string() }
        );
        assert_eq!(
            calls[1],
            Call::Update {
                collection: "Customers".to_string(),
                key: "7".to_string(),
                body: json!({"Name": "Acme"}),
                etag: Some("W/\"42\"".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn supplied_token_skips_prefetch() {
        let (executor, service) = executor(MockService::default());
        let catalog = catalog();
        let tool = catalog.get("update_customer").unwrap();

        let result = executor
            .execute(
                tool,
                json!({"Id": 7, "Name": "Acme", "etag": "W/\"7\""}),
                &ctx(),
            )
            .await;

        assert!(result.is_success);
        let calls = service.recorded();
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            &calls[0],
            Call::Update { etag: Some(e), .. } if e == "W/\"7\""
        ));
    }

    #[tokio::test]
    async fn failed_prefetch_warns_and_still_mutates() {
        let (executor, service) = executor(
            MockService::default().with_etag(Err(ServiceError::Downstream {
                status: 500,
                message: "flaky".to_string(),
            })),
        );
        let catalog = catalog();
        let tool = catalog.get("delete_customer").unwrap();

        let result = executor.execute(tool, json!({"Id": 7}), &ctx()).await;

        assert!(result.is_success);
        assert_eq!(result.status_code, 204);
        assert_eq!(result.warnings.len(), 1);
        let calls = service.recorded();
        assert_eq!(calls.len(), 2);
        assert!(matches!(
            &calls[1],
            Call::Delete { etag: None, .. }
        ));
    }

    #[tokio::test]
    async fn stale_token_maps_to_etag_mismatch() {
        let service = MockService::default();
        let service = Arc::new(service);

        struct ConflictService(Arc<MockService>);

        #[async_trait]
        impl DataService for ConflictService {
            async fn fetch(
                &self,
                path: &ResourcePath,
                options: &QueryOptions,
                timeout: Option<Duration>,
            ) -> Result<Value, ServiceError> {
                self.0.fetch(path, options, timeout).await
            }
            async fn create(
                &self,
                collection: &str,
                body: &Value,
                timeout: Option<Duration>,
            ) -> Result<Value, ServiceError> {
                self.0.create(collection, body, timeout).await
            }
            async fn update(
                &self,
                _collection: &str,
                _key: &str,
                _body: &Value,
                _etag: Option<&str>,
                _timeout: Option<Duration>,
            ) -> Result<Value, ServiceError> {
                Err(ServiceError::PreconditionFailed)
            }
            async fn delete(
                &self,
                collection: &str,
                key: &str,
                etag: Option<&str>,
                timeout: Option<Duration>,
            ) -> Result<(), ServiceError> {
                self.0.delete(collection, key, etag, timeout).await
            }
            async fn fetch_etag(
                &self,
                collection: &str,
                key: &str,
                timeout: Option<Duration>,
            ) -> Result<Option<String>, ServiceError> {
                self.0.fetch_etag(collection, key, timeout).await
            }
        }

        let executor = ToolExecutor::new(
            Arc::new(ConflictService(service)),
            ExecutorSettings::default(),
        );
        let catalog = catalog();
        let tool = catalog.get("update_customer").unwrap();

        let result = executor
            .execute(tool, json!({"Id": 7, "Name": "x", "etag": "W/\"old\""}), &ctx())
            .await;

        assert!(!result.is_success);
        assert_eq!(result.status_code, 412);
        assert_eq!(result.error_code.as_deref(), Some(codes::ETAG_MISMATCH));
    }

    #[tokio::test]
    async fn update_rejects_unrecognized_arguments() {
        let (executor, service) = executor(MockService::default());
        let catalog = catalog();
        let tool = catalog.get("update_customer").unwrap();

        let result = executor
            .execute(tool, json!({"Id": 7, "Nickname": "x"}), &ctx())
            .await;

        assert!(!result.is_success);
        assert_eq!(result.error_code.as_deref(), Some(codes::VALIDATION_ERROR));
        assert!(service.recorded().is_empty());
    }

    #[tokio::test]
    async fn update_with_nothing_to_change_is_rejected() {
        let (executor, service) = executor(MockService::default());
        let catalog = catalog();
        let tool = catalog.get("update_customer").unwrap();

        let result = executor.execute(tool, json!({"Id": 7}), &ctx()).await;

        assert!(!result.is_success);
        assert_eq!(result.status_code, 400);
        assert!(service.recorded().is_empty());
    }

    #[tokio::test]
    async fn create_forwards_only_declared_properties() {
        let (executor, service) = executor(MockService::default());
        let catalog = catalog();
        let tool = catalog.get("create_customer").unwrap();

        let result = executor
            .execute(
                tool,
                json!({"Id": 1, "Name": "Acme", "Email": "a@b.c", "extra": true}),
                &ctx(),
            )
            .await;

        assert!(result.is_success);
        assert_eq!(result.status_code, 201);
        assert_eq!(
            service.recorded(),
            vec![Call::Create {
                collection: "Customers".to_string(),
                body: json!({"Id": 1, "Name": "Acme", "Email": "a@b.c"}),
            }]
        );
    }

    #[tokio::test]
    async fn list_applies_default_selection_and_page_size() {
        let (executor, service) = executor(MockService::default());
        let catalog = catalog();
        let tool = catalog.get("list_customers").unwrap();

        let result = executor.execute(tool, json!({}), &ctx()).await;

        assert!(result.is_success);
        assert_eq!(
            service.recorded(),
            vec![Call::Fetch {
                path: "Customers".to_string(),
                query: vec![
                    ("$select".to_string(), "Id,Name,Email".to_string()),
                    ("$top".to_string(), "20".to_string()),
                ],
            }]
        );
    }

    #[tokio::test]
    async fn list_without_binary_exclusion_emits_no_selection() {
        let service = Arc::new(MockService::default());
        let settings = ExecutorSettings {
            exclude_binary_by_default: false,
            ..Default::default()
        };
        let executor = ToolExecutor::new(Arc::clone(&service), settings);
        let catalog = catalog();
        let tool = catalog.get("list_customers").unwrap();

        executor.execute(tool, json!({}), &ctx()).await;

        assert_eq!(
            service.recorded(),
            vec![Call::Fetch {
                path: "Customers".to_string(),
                query: vec![("$top".to_string(), "20".to_string())],
            }]
        );
    }

    #[tokio::test]
    async fn explicit_page_size_is_preserved() {
        let (executor, service) = executor(MockService::default());
        let catalog = catalog();
        let tool = catalog.get("list_orders").unwrap();

        executor
            .execute(tool, json!({"top": 5, "filter": "Total gt 10"}), &ctx())
            .await;

        assert_eq!(
            service.recorded(),
            vec![Call::Fetch {
                path: "Orders".to_string(),
                query: vec![
                    ("$filter".to_string(), "Total gt 10".to_string()),
                    ("$top".to_string(), "5".to_string()),
                ],
            }]
        );
    }

    #[tokio::test]
    async fn navigate_resolves_relationship_path() {
        let (executor, service) = executor(MockService::default());
        let catalog = catalog();
        let tool = catalog.get("get_customer_orders").unwrap();

        let result = executor
            .execute(tool, json!({"Id": 7, "filter": "Total gt 100"}), &ctx())
            .await;

        assert!(result.is_success);
        assert_eq!(
            service.recorded(),
            vec![Call::Fetch {
                path: "Customers(7)/Orders".to_string(),
                query: vec![("$filter".to_string(), "Total gt 100".to_string())],
            }]
        );
    }

    #[tokio::test]
    async fn query_requires_a_collection() {
        let (executor, service) = executor(MockService::default());
        let catalog = catalog();
        let tool = catalog.get("query_entities").unwrap();

        let result = executor.execute(tool, json!({}), &ctx()).await;

        assert!(!result.is_success);
        assert_eq!(result.error_code.as_deref(), Some(codes::VALIDATION_ERROR));
        assert!(service.recorded().is_empty());

        let result = executor
            .execute(tool, json!({"collection": "Customers", "count": true}), &ctx())
            .await;
        assert!(result.is_success);
        assert_eq!(
            service.recorded(),
            vec![Call::Fetch {
                path: "Customers".to_string(),
                query: vec![
                    ("$top".to_string(), "20".to_string()),
                    ("$count".to_string(), "true".to_string()),
                ],
            }]
        );
    }

    #[tokio::test]
    async fn excessive_expand_depth_is_rejected_locally() {
        let (executor, service) = executor(MockService::default());
        let catalog = catalog();
        let tool = catalog.get("list_customers").unwrap();

        let result = executor
            .execute(tool, json!({"expand": "A/B/C/D"}), &ctx())
            .await;

        assert!(!result.is_success);
        assert_eq!(result.error_code.as_deref(), Some(codes::VALIDATION_ERROR));
        assert!(service.recorded().is_empty());
    }

    #[tokio::test]
    async fn cancelled_invocation_returns_timeout_without_calls() {
        let (executor, service) = executor(MockService::default());
        let catalog = catalog();
        let tool = catalog.get("get_customer").unwrap();

        let ctx = ctx();
        ctx.cancellation.cancel();
        let result = executor.execute(tool, json!({"Id": 7}), &ctx).await;

        assert!(!result.is_success);
        assert_eq!(result.status_code, 408);
        assert_eq!(result.error_code.as_deref(), Some(codes::TIMEOUT));
        assert!(service.recorded().is_empty());
    }

    #[tokio::test]
    async fn guid_key_is_quoted_in_path() {
        let (executor, service) = executor(MockService::default());
        let catalog = catalog();
        let tool = catalog.get("get_order").unwrap();

        executor
            .execute(
                tool,
                json!({"Id": "a1b2c3d4-0000-4000-8000-1234567890ab"}),
                &ctx(),
            )
            .await;

        assert_eq!(
            service.recorded(),
            vec![Call::Fetch {
                path: "Orders('a1b2c3d4-0000-4000-8000-1234567890ab')".to_string(),
                query: vec![],
            }]
        );
    }
}
