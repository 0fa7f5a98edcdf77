use cucumber::World;
use dbql_core::testing::StubDriver;
use dbql_core::{Connection, QueryResult, Row, SqlSession, Table};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

struct DebugConnection(Arc<Connection>);
impl fmt::Debug for DebugConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection")
    }
}

struct DebugSession(Arc<dyn SqlSession>);
impl fmt::Debug for DebugSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session")
    }
}

struct DebugDriver(StubDriver);
impl fmt::Debug for DebugDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StubDriver")
    }
}

#[derive(Debug, World)]
#[world(init = Self::new)]
pub struct CertWorld {
    driver: DebugDriver,
    connection: Option<DebugConnection>,
    sessions: Vec<DebugSession>,

    /// Environment the connection reads at connect time.
    pub env: Arc<Mutex<HashMap<String, String>>>,

    // Outcome of the last operation
    pub last_error: Option<String>,
    pub last_error_is_configuration: bool,
    pub query_result: Option<QueryResult>,
    pub tables: Vec<Table>,
    pub rows: Vec<Row>,

    // HTTP state
    pub server_addr: Option<String>,
    pub graphql_response: Option<serde_json::Value>,
}

impl CertWorld {
    pub fn new() -> Self {
        Self {
            driver: DebugDriver(StubDriver::new()),
            connection: None,
            sessions: Vec::new(),
            env: Arc::new(Mutex::new(HashMap::new())),
            last_error: None,
            last_error_is_configuration: false,
            query_result: None,
            tables: Vec::new(),
            rows: Vec::new(),
            server_addr: None,
            graphql_response: None,
        }
    }

    pub fn driver(&self) -> &StubDriver {
        &self.driver.0
    }

    /// The world's connection, created on first use over the shared env map.
    pub fn connection(&mut self) -> Arc<Connection> {
        if let Some(conn) = &self.connection {
            return Arc::clone(&conn.0);
        }
        let env = Arc::clone(&self.env);
        let conn = Arc::new(Connection::with_lookup(
            Arc::new(self.driver.0.clone()),
            move |key| env.lock().ok().and_then(|map| map.get(key).cloned()),
        ));
        self.connection = Some(DebugConnection(Arc::clone(&conn)));
        conn
    }

    pub fn remember_session(&mut self, session: Arc<dyn SqlSession>) {
        self.sessions.push(DebugSession(session));
    }

    pub fn sessions(&self) -> Vec<Arc<dyn SqlSession>> {
        self.sessions.iter().map(|s| Arc::clone(&s.0)).collect()
    }

    pub fn record_error(&mut self, err: &dbql_core::DbqlError) {
        self.last_error_is_configuration = matches!(
            err,
            dbql_core::DbqlError::Configuration(_)
        );
        self.last_error = Some(err.to_string());
    }

    pub fn clear_outcome(&mut self) {
        self.last_error = None;
        self.last_error_is_configuration = false;
    }
}

impl Default for CertWorld {
    fn default() -> Self {
        Self::new()
    }
}
