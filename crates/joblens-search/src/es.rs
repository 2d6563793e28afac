//! Elasticsearch REST implementation of the [`SearchEngine`] collaborator.
//!
//! All read traffic addresses the configured alias; writes resolve the alias
//! to the generation behind it first, mirroring how the synchronization
//! engine keeps exactly one generation live at a time.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use joblens_core::{defaults, Error, Result, SearchEngine};

/// Configuration for the Elasticsearch client.
#[derive(Debug, Clone)]
pub struct EsConfig {
    /// Base URL of the cluster.
    pub url: String,
    /// Basic-auth username (optional).
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
    /// Alias the read path addresses.
    pub alias: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for EsConfig {
    fn default() -> Self {
        Self {
            url: defaults::ES_URL.to_string(),
            username: None,
            password: None,
            alias: defaults::ES_JOB_ALIAS.to_string(),
            timeout_seconds: defaults::ES_TIMEOUT_SECS,
        }
    }
}

impl EsConfig {
    /// Create from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ES_URL` | `http://localhost:9200` | Cluster base URL |
    /// | `ES_USERNAME` / `ES_PASSWORD` | unset | Basic auth |
    /// | `ES_JOB_ALIAS` | `joblens_jobs` | Read alias |
    /// | `ES_TIMEOUT_SECS` | `30` | Per-request timeout |
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("ES_URL").unwrap_or_else(|_| defaults::ES_URL.to_string()),
            username: std::env::var("ES_USERNAME").ok(),
            password: std::env::var("ES_PASSWORD").ok(),
            alias: std::env::var("ES_JOB_ALIAS")
                .unwrap_or_else(|_| defaults::ES_JOB_ALIAS.to_string()),
            timeout_seconds: std::env::var("ES_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::ES_TIMEOUT_SECS),
        }
    }

    /// Set the alias name.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }
}

/// Elasticsearch-backed [`SearchEngine`].
pub struct EsClient {
    client: Client,
    config: EsConfig,
}

impl EsClient {
    /// Create a new client with the given configuration.
    pub fn new(config: EsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        info!(
            subsystem = "search",
            component = "es",
            "Initializing search engine client: url={}, alias={}",
            config.url,
            config.alias
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(EsConfig::from_env())
    }

    /// Get the configured alias name.
    pub fn alias(&self) -> &str {
        &self.config.alias
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.config.url.trim_end_matches('/'), path);
        let mut req = self.client.request(method, url);
        if let Some(ref username) = self.config.username {
            req = req.basic_auth(username, self.config.password.as_deref());
        }
        req
    }

    async fn send(&self, req: RequestBuilder, context: &str) -> Result<JsonValue> {
        let response = req
            .send()
            .await
            .map_err(|e| Error::Search(format!("{context}: {e}")))?;
        let status = response.status();
        let body: JsonValue = response.json().await.unwrap_or(JsonValue::Null);
        if !status.is_success() {
            return Err(Error::Search(format!("{context} returned {status}: {body}")));
        }
        Ok(body)
    }

    /// The generation name currently behind the alias; falls back to the
    /// alias itself before bootstrap.
    async fn resolve_write_index(&self) -> Result<String> {
        let targets = self.get_alias_targets(&self.config.alias).await?;
        Ok(targets
            .into_iter()
            .next()
            .unwrap_or_else(|| self.config.alias.clone()))
    }
}

#[async_trait]
impl SearchEngine for EsClient {
    async fn create_index(&self, name: &str, mapping: &JsonValue) -> Result<()> {
        if self.index_exists(name).await? {
            debug!(
                subsystem = "search",
                component = "es",
                index = name,
                "Index already exists, skipping create"
            );
            return Ok(());
        }
        self.send(
            self.request(Method::PUT, name).json(mapping),
            "create index",
        )
        .await?;
        info!(
            subsystem = "search",
            component = "es",
            index = name,
            "Index created"
        );
        Ok(())
    }

    async fn index_exists(&self, name: &str) -> Result<bool> {
        let response = self
            .request(Method::HEAD, name)
            .send()
            .await
            .map_err(|e| Error::Search(format!("index exists check: {e}")))?;
        Ok(response.status() == StatusCode::OK)
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let path = format!("{}/_doc/{}", self.config.alias, id);
        let response = self
            .request(Method::HEAD, &path)
            .send()
            .await
            .map_err(|e| Error::Search(format!("document exists check: {e}")))?;
        Ok(response.status() == StatusCode::OK)
    }

    async fn index_document(
        &self,
        id: Uuid,
        document: &JsonValue,
        target: Option<&str>,
    ) -> Result<()> {
        let index = match target {
            Some(index) => index.to_string(),
            None => self.resolve_write_index().await?,
        };
        let path = format!("{index}/_doc/{id}");
        self.send(
            self.request(Method::PUT, &path).json(document),
            "index document",
        )
        .await?;
        Ok(())
    }

    async fn update_document(&self, id: Uuid, document: &JsonValue) -> Result<()> {
        let index = self.resolve_write_index().await?;
        let path = format!("{index}/_update/{id}");
        self.send(
            self.request(Method::POST, &path)
                .json(&json!({ "doc": document })),
            "update document",
        )
        .await?;
        Ok(())
    }

    async fn delete_document(&self, id: Uuid) -> Result<()> {
        let index = self.resolve_write_index().await?;
        let path = format!("{index}/_doc/{id}");
        self.send(self.request(Method::DELETE, &path), "delete document")
            .await?;
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        if !self.index_exists(name).await? {
            return Ok(());
        }
        self.send(self.request(Method::DELETE, name), "delete index")
            .await?;
        info!(
            subsystem = "search",
            component = "es",
            index = name,
            "Index deleted"
        );
        Ok(())
    }

    async fn search(&self, query: &JsonValue) -> Result<JsonValue> {
        let path = format!("{}/_search", self.config.alias);
        self.send(self.request(Method::POST, &path).json(query), "search")
            .await
    }

    async fn count(&self, index: &str) -> Result<i64> {
        let path = format!("{index}/_count");
        let body = self.send(self.request(Method::GET, &path), "count").await?;
        body.get("count")
            .and_then(|c| c.as_i64())
            .ok_or_else(|| Error::Search(format!("count response missing count: {body}")))
    }

    async fn reindex(&self, source: &str, dest: &str) -> Result<()> {
        let body = json!({
            "source": { "index": source },
            "dest": { "index": dest }
        });
        self.send(
            self.request(Method::POST, "_reindex?wait_for_completion=true")
                .json(&body),
            "reindex",
        )
        .await?;
        Ok(())
    }

    async fn put_alias(&self, index: &str, alias: &str) -> Result<()> {
        let path = format!("{index}/_alias/{alias}");
        self.send(self.request(Method::PUT, &path), "put alias")
            .await?;
        Ok(())
    }

    async fn update_alias_atomic(
        &self,
        remove: (&str, &str),
        add: (&str, &str),
    ) -> Result<()> {
        let body = json!({
            "actions": [
                { "remove": { "index": remove.0, "alias": remove.1 } },
                { "add": { "index": add.0, "alias": add.1 } }
            ]
        });
        self.send(
            self.request(Method::POST, "_aliases").json(&body),
            "atomic alias update",
        )
        .await?;
        Ok(())
    }

    async fn get_alias_targets(&self, alias: &str) -> Result<Vec<String>> {
        let path = format!("_alias/{alias}");
        let response = self
            .request(Method::GET, &path)
            .send()
            .await
            .map_err(|e| Error::Search(format!("get alias: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let status = response.status();
        let body: JsonValue = response.json().await.unwrap_or(JsonValue::Null);
        if !status.is_success() {
            return Err(Error::Search(format!("get alias returned {status}: {body}")));
        }
        Ok(body
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        let path = format!("{index}/_refresh");
        self.send(self.request(Method::POST, &path), "refresh")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EsConfig::default();
        assert_eq!(config.url, defaults::ES_URL);
        assert_eq!(config.alias, defaults::ES_JOB_ALIAS);
        assert!(config.username.is_none());
    }

    #[test]
    fn test_config_with_alias() {
        let config = EsConfig::default().with_alias("custom_jobs");
        assert_eq!(config.alias, "custom_jobs");
    }

    #[test]
    fn test_client_exposes_alias() {
        let client = EsClient::new(EsConfig::default().with_alias("abc")).unwrap();
        assert_eq!(client.alias(), "abc");
    }
}
