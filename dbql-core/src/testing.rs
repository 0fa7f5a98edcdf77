//! In-memory warehouse driver plus shared certification checks.

use crate::config::{HTTP_PATH_VAR, SERVER_HOSTNAME_VAR, TOKEN_VAR};
use crate::error::{DbqlError, Result};
use crate::{
    Connection, Row, SqlClient, SqlDriver, SqlOperation, SqlSession, StatementParameter,
    WarehouseConfig,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Environment with every required warehouse variable set.
pub fn full_env() -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert(
        SERVER_HOSTNAME_VAR.to_string(),
        "stub.cloud.databricks.com".to_string(),
    );
    env.insert(
        HTTP_PATH_VAR.to_string(),
        "/sql/1.0/warehouses/stub".to_string(),
    );
    env.insert(TOKEN_VAR.to_string(), "stub-token".to_string());
    env
}

pub fn lookup_from(
    env: HashMap<String, String>,
) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
    move |key| env.get(key).cloned()
}

#[derive(Default)]
struct StubState {
    rows: Vec<Row>,
    session_failure: Option<String>,
    statement_failure: Option<String>,
    fetch_failure: Option<String>,
    session_close_failure: Option<String>,
    statements: Vec<String>,
    last_parameters: Vec<StatementParameter>,
    clients_created: usize,
    clients_closed: usize,
    sessions_opened: usize,
    sessions_closed: usize,
    operations_closed: usize,
}

/// Driver that answers every statement with a canned row set and records
/// what it was asked to do.
#[derive(Clone, Default)]
pub struct StubDriver {
    state: Arc<Mutex<StubState>>,
}

impl StubDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stub returning the given JSON objects as rows. Non-object values are skipped.
    pub fn returning(rows: Vec<serde_json::Value>) -> Self {
        let driver = Self::new();
        driver.set_rows(rows);
        driver
    }

    pub fn set_rows(&self, rows: Vec<serde_json::Value>) {
        self.state().rows = rows
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
    }

    pub fn fail_sessions_with(&self, message: impl Into<String>) {
        self.state().session_failure = Some(message.into());
    }

    pub fn fail_statements_with(&self, message: impl Into<String>) {
        self.state().statement_failure = Some(message.into());
    }

    pub fn fail_fetches_with(&self, message: impl Into<String>) {
        self.state().fetch_failure = Some(message.into());
    }

    pub fn fail_session_close_with(&self, message: impl Into<String>) {
        self.state().session_close_failure = Some(message.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.session_failure = None;
        state.statement_failure = None;
        state.fetch_failure = None;
        state.session_close_failure = None;
    }

    pub fn statements(&self) -> Vec<String> {
        self.state().statements.clone()
    }

    pub fn last_statement(&self) -> Option<String> {
        self.state().statements.last().cloned()
    }

    pub fn last_parameters(&self) -> Vec<StatementParameter> {
        self.state().last_parameters.clone()
    }

    pub fn clients_created(&self) -> usize {
        self.state().clients_created
    }

    pub fn clients_closed(&self) -> usize {
        self.state().clients_closed
    }

    pub fn sessions_opened(&self) -> usize {
        self.state().sessions_opened
    }

    pub fn sessions_closed(&self) -> usize {
        self.state().sessions_closed
    }

    pub fn operations_closed(&self) -> usize {
        self.state().operations_closed
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SqlDriver for StubDriver {
    fn client(&self, _config: &WarehouseConfig) -> Result<Arc<dyn SqlClient>> {
        self.state().clients_created += 1;
        Ok(Arc::new(StubClient {
            driver: self.clone(),
        }))
    }
}

struct StubClient {
    driver: StubDriver,
}

#[async_trait::async_trait]
impl SqlClient for StubClient {
    async fn open_session(&self) -> Result<Arc<dyn SqlSession>> {
        let mut state = self.driver.state();
        if let Some(msg) = &state.session_failure {
            return Err(DbqlError::RemoteExecution(msg.clone()));
        }
        state.sessions_opened += 1;
        Ok(Arc::new(StubSession {
            driver: self.driver.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.driver.state().clients_closed += 1;
        Ok(())
    }
}

struct StubSession {
    driver: StubDriver,
}

#[async_trait::async_trait]
impl SqlSession for StubSession {
    async fn execute_statement(
        &self,
        statement: &str,
        parameters: &[StatementParameter],
    ) -> Result<Box<dyn SqlOperation>> {
        let mut state = self.driver.state();
        state.statements.push(statement.to_string());
        state.last_parameters = parameters.to_vec();
        if let Some(msg) = &state.statement_failure {
            return Err(DbqlError::RemoteExecution(msg.clone()));
        }
        Ok(Box::new(StubOperation {
            driver: self.driver.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.driver.state();
        state.sessions_closed += 1;
        match &state.session_close_failure {
            Some(msg) => Err(DbqlError::RemoteExecution(msg.clone())),
            None => Ok(()),
        }
    }
}

struct StubOperation {
    driver: StubDriver,
}

#[async_trait::async_trait]
impl SqlOperation for StubOperation {
    async fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let state = self.driver.state();
        if let Some(msg) = &state.fetch_failure {
            return Err(DbqlError::RemoteExecution(msg.clone()));
        }
        Ok(state.rows.clone())
    }

    async fn close(&mut self) -> Result<()> {
        self.driver.state().operations_closed += 1;
        Ok(())
    }
}

// ---- Driver Certification Checks ----
//
// Each check takes a connection whose environment is complete and whose
// warehouse answers `SELECT 1` with a single row.

pub async fn test_connect_reuses_session(conn: &Connection) {
    let first = conn.connect().await.unwrap();
    let second = conn.connect().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

pub async fn test_select_one_returns_single_row(conn: &Connection) {
    let rows = conn.execute_query("SELECT 1", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
}

pub async fn test_close_allows_reconnect(conn: &Connection) {
    let first = conn.connect().await.unwrap();
    conn.close().await.unwrap();
    assert!(!conn.is_connected().await);
    let second = conn.connect().await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}
