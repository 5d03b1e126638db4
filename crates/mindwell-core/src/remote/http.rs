//! HTTP client for the hosted record store.
//!
//! Speaks the PostgREST dialect the backend exposes under `/rest/v1`:
//! equality filters as `column=eq.value` query parameters, inserts via POST
//! with `Prefer: return=representation`, updates via PATCH. The anon/API key
//! is sent both as the `apikey` header and as a bearer token.

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::ConfigError;
use crate::storage::RemoteConfig;

use super::{Filter, RemoteError, RemoteStore};

pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Build a client from configuration.
    ///
    /// Missing credentials are a fatal startup condition: without them no
    /// remote call can succeed, so construction fails rather than every
    /// later operation.
    pub fn from_config(cfg: &RemoteConfig) -> Result<Self, ConfigError> {
        if cfg.base_url.is_empty() {
            return Err(ConfigError::MissingKey("remote.base_url".into()));
        }
        if cfg.api_key.is_empty() {
            return Err(ConfigError::MissingKey("remote.api_key".into()));
        }
        Url::parse(&cfg.base_url).map_err(|e| ConfigError::InvalidValue {
            key: "remote.base_url".into(),
            message: e.to_string(),
        })?;
        Ok(Self::new(cfg.base_url.clone(), cfg.api_key.clone()))
    }

    fn table_url(&self, table: &str, filter: &Filter, extra: &[(&str, String)]) -> String {
        let mut params = vec!["select=*".to_string()];
        for (column, value) in filter.clauses() {
            params.push(format!("{column}=eq.{}", urlencoding::encode(value)));
        }
        for (name, value) in extra {
            params.push(format!("{name}={}", urlencoding::encode(value)));
        }
        format!(
            "{}/rest/v1/{}?{}",
            self.base_url,
            table,
            params.join("&")
        )
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn read_rows(response: reqwest::Response) -> Result<Vec<Value>, RemoteError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }
        let body: Value = response.json().await?;
        match body {
            Value::Array(rows) => Ok(rows),
            other => Ok(vec![other]),
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn get_record(&self, table: &str, filter: &Filter) -> Result<Value, RemoteError> {
        let url = self.table_url(table, filter, &[("limit", "1".to_string())]);
        let response = self.authed(self.client.get(&url)).send().await?;
        let rows = Self::read_rows(response).await?;
        rows.into_iter().next().ok_or(RemoteError::NotFound)
    }

    async fn query_records(
        &self,
        table: &str,
        filter: &Filter,
        order_by: Option<&str>,
    ) -> Result<Vec<Value>, RemoteError> {
        let extra: Vec<(&str, String)> = match order_by {
            Some(column) => vec![("order", format!("{column}.asc"))],
            None => Vec::new(),
        };
        let url = self.table_url(table, filter, &extra);
        let response = self.authed(self.client.get(&url)).send().await?;
        Self::read_rows(response).await
    }

    async fn insert_record(&self, table: &str, fields: Value) -> Result<Value, RemoteError> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let response = self
            .authed(self.client.post(&url))
            .header("Prefer", "return=representation")
            .json(&fields)
            .send()
            .await?;
        let rows = Self::read_rows(response).await?;
        rows.into_iter().next().ok_or(RemoteError::NotFound)
    }

    async fn update_record(
        &self,
        table: &str,
        filter: &Filter,
        fields: Value,
    ) -> Result<Value, RemoteError> {
        let url = self.table_url(table, filter, &[]);
        let response = self
            .authed(self.client.patch(&url))
            .header("Prefer", "return=representation")
            .json(&fields)
            .send()
            .await?;
        let rows = Self::read_rows(response).await?;
        rows.into_iter().next().ok_or(RemoteError::NotFound)
    }
}
