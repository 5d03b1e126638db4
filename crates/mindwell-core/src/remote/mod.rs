//! Remote data store abstraction.
//!
//! The hosted backend is treated as a generic record store: tables of JSON
//! records with create/read/update/query operations and an auth token. The
//! concrete protocol lives in [`http`]; services depend only on the
//! [`RemoteStore`] trait so tests can substitute an in-memory fake.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod http;

pub use http::HttpRemoteStore;

/// A conjunction of column equality tests applied to a read or write.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, String)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `column = value`.
    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.clauses.push((column.to_string(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, String)] {
        &self.clauses
    }
}

/// Remote store error types.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No record matched the filter. Expected during first use of a
    /// lazily-created table; never surfaced to the user.
    #[error("Record not found")]
    NotFound,

    /// Transport failure (network, timeout, TLS).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success response from the store.
    #[error("Remote store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Every operation the services need from the hosted backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the single record matching `filter`. `Err(NotFound)` when no
    /// record matches.
    async fn get_record(&self, table: &str, filter: &Filter) -> Result<Value, RemoteError>;

    /// Fetch all records matching `filter`, optionally ordered by a column
    /// (ascending).
    async fn query_records(
        &self,
        table: &str,
        filter: &Filter,
        order_by: Option<&str>,
    ) -> Result<Vec<Value>, RemoteError>;

    /// Insert a record and return it as stored (with server-assigned
    /// fields).
    async fn insert_record(&self, table: &str, fields: Value) -> Result<Value, RemoteError>;

    /// Update all records matching `filter` and return the first updated
    /// record. `Err(NotFound)` when nothing matched.
    async fn update_record(
        &self,
        table: &str,
        filter: &Filter,
        fields: Value,
    ) -> Result<Value, RemoteError>;
}
