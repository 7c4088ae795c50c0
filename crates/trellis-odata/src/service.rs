//! The seam between tool handlers and the downstream service.

use crate::error::ServiceError;
use crate::query::QueryOptions;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// A resource address under the service root:
/// `{collection}[({key})][/{navigation}]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath {
    /// Entity set name.
    pub collection: String,

    /// Encoded entity key, when addressing a single entity.
    pub key: Option<String>,

    /// Navigation property name, when traversing a relationship.
    pub navigation: Option<String>,
}

impl ResourcePath {
    /// Address a whole collection.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            key: None,
            navigation: None,
        }
    }

    /// Address a single entity by encoded key.
    pub fn entity(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: Some(key.into()),
            navigation: None,
        }
    }

    /// Address a relationship of a single entity.
    pub fn navigation(
        collection: impl Into<String>,
        key: impl Into<String>,
        navigation: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            key: Some(key.into()),
            navigation: Some(navigation.into()),
        }
    }

    /// The path segment appended to the service root.
    pub fn segment(&self) -> String {
        let mut segment = self.collection.clone();
        if let Some(key) = &self.key {
            segment.push('(');
            segment.push_str(key);
            segment.push(')');
        }
        if let Some(nav) = &self.navigation {
            segment.push('/');
            segment.push_str(nav);
        }
        segment
    }
}

impl std::fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segment())
    }
}

/// Operations the tool handlers need from the downstream service.
///
/// One invocation performs its downstream calls sequentially (an optional
/// concurrency-token read, then the primary operation), but distinct
/// invocations run concurrently against a shared implementation.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Fetch an entity, collection, or relationship.
    async fn fetch(
        &self,
        path: &ResourcePath,
        options: &QueryOptions,
        timeout: Option<Duration>,
    ) -> Result<Value, ServiceError>;

    /// Create an entity in a collection. Returns the created representation.
    async fn create(
        &self,
        collection: &str,
        body: &Value,
        timeout: Option<Duration>,
    ) -> Result<Value, ServiceError>;

    /// Apply a partial update to an entity. `etag` becomes a
    /// conditional-match precondition when present.
    async fn update(
        &self,
        collection: &str,
        key: &str,
        body: &Value,
        etag: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Value, ServiceError>;

    /// Delete an entity, conditionally when `etag` is present.
    async fn delete(
        &self,
        collection: &str,
        key: &str,
        etag: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<(), ServiceError>;

    /// Best-effort read of an entity's current concurrency token.
    ///
    /// `Ok(None)` means the entity carries no token; errors are for the
    /// caller to log and swallow.
    async fn fetch_etag(
        &self,
        collection: &str,
        key: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, ServiceError>;
}
