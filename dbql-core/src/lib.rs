pub mod config;
pub mod connection;
pub mod error;
pub mod testing;

pub use config::{GraphletteConfig, ServerConfig, WarehouseConfig};
pub use connection::Connection;
pub use error::{DbqlError, Result};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One result record: column name → JSON value, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub row_count: usize,
}

impl QueryResult {
    pub fn new(rows: Vec<Row>) -> Self {
        let row_count = rows.len();
        Self { rows, row_count }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub database: String,
}

/// A named statement parameter, bound to a `:name` marker in the SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementParameter {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl StatementParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            type_name: None,
        }
    }

    pub fn typed(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }
}

/// Creates clients for a warehouse. Building a client does no I/O.
pub trait SqlDriver: Send + Sync {
    fn client(&self, config: &WarehouseConfig) -> Result<Arc<dyn SqlClient>>;
}

#[async_trait::async_trait]
pub trait SqlClient: Send + Sync {
    async fn open_session(&self) -> Result<Arc<dyn SqlSession>>;
    async fn close(&self) -> Result<()>;
}

#[async_trait::async_trait]
pub trait SqlSession: Send + Sync {
    async fn execute_statement(
        &self,
        statement: &str,
        parameters: &[StatementParameter],
    ) -> Result<Box<dyn SqlOperation>>;
    async fn close(&self) -> Result<()>;
}

/// Handle for one submitted statement.
#[async_trait::async_trait]
pub trait SqlOperation: Send {
    async fn fetch_all(&mut self) -> Result<Vec<Row>>;
    async fn close(&mut self) -> Result<()>;
}
