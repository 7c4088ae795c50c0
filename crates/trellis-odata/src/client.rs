//! HTTP client for the downstream data service.
//!
//! Requests follow the service's resource-addressing convention:
//! `GET|POST|PATCH|DELETE {base}/{collection}[({key})][/{nav}]?{options}`,
//! with a conditional-match header carrying the concurrency token when one
//! is available, and JSON bodies on mutations.

use crate::error::ServiceError;
use crate::query::QueryOptions;
use crate::service::{DataService, ResourcePath};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use trellis_core::ServiceConfig;
use url::Url;

/// Client for one downstream service root.
#[derive(Debug, Clone)]
pub struct ODataClient {
    http: reqwest::Client,
    base_url: Url,
    credential: Option<(String, String)>,
    default_timeout: Duration,
}

impl ODataClient {
    /// Create a client for the given service root URL.
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        let url = Url::parse(base_url)
            .map_err(|e| ServiceError::Validation(format!("invalid service base URL: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(ServiceError::Validation(format!(
                "service base URL '{base_url}' cannot carry resource paths"
            )));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: url,
            credential: None,
            default_timeout: Duration::from_secs(30),
        })
    }

    /// Create a client from the service section of the configuration.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let mut client = Self::new(&config.base_url)?.with_timeout(config.timeout());
        if let Some(token) = config.credential() {
            client = client.with_credential(&config.auth_header, token);
        }
        Ok(client)
    }

    /// Attach a credential sent on every request.
    pub fn with_credential(mut self, header: &str, value: impl Into<String>) -> Self {
        self.credential = Some((header.to_string(), value.into()));
        self
    }

    /// Set the timeout used when a call supplies none.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// The absolute URL for a resource path plus query options.
    pub fn request_url(
        &self,
        path: &ResourcePath,
        options: &QueryOptions,
    ) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                ServiceError::Validation("service base URL cannot carry resource paths".to_string())
            })?;
            segments.pop_if_empty();

            let mut first = path.collection.clone();
            if let Some(key) = &path.key {
                first.push('(');
                first.push_str(key);
                first.push(')');
            }
            segments.push(&first);
            if let Some(nav) = &path.navigation {
                segments.push(nav);
            }
        }

        for (name, value) in options.to_query_pairs() {
            url.query_pairs_mut().append_pair(&name, &value);
        }

        Ok(url)
    }

    fn prepare(
        &self,
        builder: reqwest::RequestBuilder,
        etag: Option<&str>,
        timeout: Option<Duration>,
    ) -> reqwest::RequestBuilder {
        let mut builder = builder
            .header("Accept", "application/json")
            .timeout(timeout.unwrap_or(self.default_timeout));
        if let Some((header, value)) = &self.credential {
            builder = builder.header(header.as_str(), value.as_str());
        }
        if let Some(etag) = etag {
            builder = builder.header("If-Match", etag);
        }
        builder
    }

    async fn execute(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<(u16, Option<String>, String), ServiceError> {
        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status().as_u16();
        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response.text().await.map_err(map_transport_error)?;
        Ok((status, etag, body))
    }

    async fn execute_json(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<Value, ServiceError> {
        let (status, _etag, body) = self.execute(builder).await?;
        if !(200..300).contains(&status) {
            return Err(ServiceError::from_status(status, &body));
        }
        parse_body(&body)
    }
}

#[async_trait]
impl DataService for ODataClient {
    async fn fetch(
        &self,
        path: &ResourcePath,
        options: &QueryOptions,
        timeout: Option<Duration>,
    ) -> Result<Value, ServiceError> {
        let url = self.request_url(path, options)?;
        tracing::debug!(url = %url, "issuing GET");
        self.execute_json(self.prepare(self.http.get(url), None, timeout))
            .await
    }

    async fn create(
        &self,
        collection: &str,
        body: &Value,
        timeout: Option<Duration>,
    ) -> Result<Value, ServiceError> {
        let path = ResourcePath::collection(collection);
        let url = self.request_url(&path, &QueryOptions::default())?;
        tracing::debug!(url = %url, "issuing POST");
        self.execute_json(
            self.prepare(self.http.post(url), None, timeout)
                .json(body),
        )
        .await
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        body: &Value,
        etag: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Value, ServiceError> {
        let path = ResourcePath::entity(collection, key);
        let url = self.request_url(&path, &QueryOptions::default())?;
        tracing::debug!(url = %url, conditional = etag.is_some(), "issuing PATCH");
        self.execute_json(
            self.prepare(self.http.patch(url), etag, timeout)
                .header("Prefer", "return=representation")
                .json(body),
        )
        .await
    }

    async fn delete(
        &self,
        collection: &str,
        key: &str,
        etag: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<(), ServiceError> {
        let path = ResourcePath::entity(collection, key);
        let url = self.request_url(&path, &QueryOptions::default())?;
        tracing::debug!(url = %url, conditional = etag.is_some(), "issuing DELETE");
        let (status, _etag, body) = self
            .execute(self.prepare(self.http.delete(url), etag, timeout))
            .await?;
        if !(200..300).contains(&status) {
            return Err(ServiceError::from_status(status, &body));
        }
        Ok(())
    }

    async fn fetch_etag(
        &self,
        collection: &str,
        key: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, ServiceError> {
        let path = ResourcePath::entity(collection, key);
        let url = self.request_url(&path, &QueryOptions::default())?;
        tracing::debug!(url = %url, "reading current concurrency token");
        let (status, etag, body) = self
            .execute(self.prepare(self.http.get(url), None, timeout))
            .await?;
        if !(200..300).contains(&status) {
            return Err(ServiceError::from_status(status, &body));
        }
        if etag.is_some() {
            return Ok(etag);
        }
        // Some services only report the token inside the entity body.
        let entity = parse_body(&body)?;
        Ok(entity["@odata.etag"].as_str().map(|s| s.to_string()))
    }
}

fn map_transport_error(error: reqwest::Error) -> ServiceError {
    if error.is_timeout() {
        ServiceError::Timeout
    } else {
        ServiceError::Transport(error.to_string())
    }
}

fn parse_body(body: &str) -> Result<Value, ServiceError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| ServiceError::Transport(format!(
        "downstream service returned a non-JSON body: {e}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ODataClient {
        ODataClient::new("https://svc.example.com/odata").unwrap()
    }

    #[test]
    fn entity_url_embeds_key() {
        let url = client()
            .request_url(
                &ResourcePath::entity("Customers", "7"),
                &QueryOptions::default(),
            )
            .unwrap();
        assert_eq!(url.as_str(), "https://svc.example.com/odata/Customers(7)");
    }

    #[test]
    fn navigation_url_appends_relationship() {
        let url = client()
            .request_url(
                &ResourcePath::navigation("Customers", "7", "Orders"),
                &QueryOptions::default(),
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://svc.example.com/odata/Customers(7)/Orders"
        );
    }

    #[test]
    fn query_components_are_appended() {
        let mut options = QueryOptions::default();
        options.filter = Some("Id gt 5".to_string());
        options.top = Some(10);

        let url = client()
            .request_url(&ResourcePath::collection("Customers"), &options)
            .unwrap();
        assert_eq!(url.path(), "/odata/Customers");
        let query = url.query().unwrap();
        assert!(query.contains("%24filter=Id+gt+5") || query.contains("$filter=Id+gt+5"));
        assert!(query.contains("top=10"));
    }

    #[test]
    fn trailing_slash_in_base_is_harmless() {
        let client = ODataClient::new("https://svc.example.com/odata/").unwrap();
        let url = client
            .request_url(
                &ResourcePath::entity("Customers", "'A1'"),
                &QueryOptions::default(),
            )
            .unwrap();
        assert_eq!(url.path(), "/odata/Customers('A1')");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            ODataClient::new("not a url"),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            ODataClient::new("mailto:someone@example.com"),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn config_credential_is_attached() {
        let config = ServiceConfig {
            base_url: "https://svc.example.com/odata".to_string(),
            auth_token: Some("Bearer xyz".to_string()),
            ..Default::default()
        };
        let client = ODataClient::from_config(&config).unwrap();
        assert_eq!(
            client.credential,
            Some(("Authorization".to_string(), "Bearer xyz".to_string()))
        );
        assert_eq!(client.default_timeout, Duration::from_secs(30));
    }
}
