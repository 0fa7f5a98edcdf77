use crate::config::WarehouseConfig;
use crate::error::Result;
use crate::{Row, SqlClient, SqlDriver, SqlSession, StatementParameter};
use std::env;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

struct Live {
    client: Arc<dyn SqlClient>,
    session: Arc<dyn SqlSession>,
}

/// Lazily opened, reused session to the SQL warehouse.
///
/// Construct one per process and share it. The first `connect()` reads the
/// warehouse settings and opens a session; every later call returns that same
/// session until `close()` is called.
pub struct Connection {
    driver: Arc<dyn SqlDriver>,
    lookup: EnvLookup,
    live: Mutex<Option<Live>>,
}

impl Connection {
    /// Connection that reads its settings from the process environment.
    pub fn new(driver: Arc<dyn SqlDriver>) -> Self {
        Self::with_lookup(driver, |key| env::var(key).ok())
    }

    pub fn with_lookup<F>(driver: Arc<dyn SqlDriver>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            driver,
            lookup: Arc::new(lookup),
            live: Mutex::new(None),
        }
    }

    pub async fn connect(&self) -> Result<Arc<dyn SqlSession>> {
        let mut live = self.live.lock().await;
        if let Some(existing) = live.as_ref() {
            return Ok(Arc::clone(&existing.session));
        }

        let config = WarehouseConfig::from_lookup(self.lookup.as_ref())?;
        let client = self.driver.client(&config)?;
        let session = match client.open_session().await {
            Ok(session) => session,
            Err(e) => {
                if let Err(close_err) = client.close().await {
                    warn!("Failed to close client after session error: {}", close_err);
                }
                return Err(e);
            }
        };

        info!("Opened warehouse session on {}", config.server_hostname);
        *live = Some(Live {
            client,
            session: Arc::clone(&session),
        });
        Ok(session)
    }

    /// Run one statement and return every row of its result.
    pub async fn execute_query(
        &self,
        statement: &str,
        parameters: &[StatementParameter],
    ) -> Result<Vec<Row>> {
        match self.run_statement(statement, parameters).await {
            Ok(rows) => Ok(rows),
            Err(e) => {
                error!("Error executing warehouse query: {}", e);
                Err(e)
            }
        }
    }

    async fn run_statement(
        &self,
        statement: &str,
        parameters: &[StatementParameter],
    ) -> Result<Vec<Row>> {
        let session = self.connect().await?;
        debug!("Executing statement: {}", statement);
        let mut operation = session.execute_statement(statement, parameters).await?;

        let rows = match operation.fetch_all().await {
            Ok(rows) => rows,
            Err(e) => {
                if let Err(close_err) = operation.close().await {
                    warn!("Failed to release statement after error: {}", close_err);
                }
                return Err(e);
            }
        };
        operation.close().await?;

        debug!("Statement returned {} rows", rows.len());
        Ok(rows)
    }

    /// Release the session and client. The next `connect()` opens new ones.
    /// Both handles are released even if the first close fails; the first
    /// error is returned.
    pub async fn close(&self) -> Result<()> {
        let Some(live) = self.live.lock().await.take() else {
            return Ok(());
        };
        let session_closed = live.session.close().await;
        let client_closed = live.client.close().await;
        if let Err(e) = &session_closed {
            warn!("Failed to close warehouse session: {}", e);
        }
        session_closed.and(client_closed)?;
        info!("Closed warehouse session");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.live.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbqlError;
    use crate::testing::{full_env, lookup_from, StubDriver};
    use serde_json::json;
    use std::collections::HashMap;

    fn connection(driver: &StubDriver, env: HashMap<String, String>) -> Connection {
        Connection::with_lookup(Arc::new(driver.clone()), lookup_from(env))
    }

    #[tokio::test]
    async fn test_connect_twice_returns_same_session() {
        let driver = StubDriver::new();
        let conn = connection(&driver, full_env());

        let first = conn.connect().await.unwrap();
        let second = conn.connect().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(driver.clients_created(), 1);
        assert_eq!(driver.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_missing_env_fails_before_driver_is_used() {
        let driver = StubDriver::new();
        let mut env = full_env();
        env.remove("DATABRICKS_TOKEN");
        let conn = connection(&driver, env);

        let err = conn.connect().await.err().unwrap();
        assert!(matches!(err, DbqlError::Configuration(_)));
        assert_eq!(driver.clients_created(), 0);
        assert!(!conn.is_connected().await);
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_session_unset() {
        let driver = StubDriver::new();
        let env = Arc::new(std::sync::Mutex::new(HashMap::new()));
        let shared = Arc::clone(&env);
        let conn = Connection::with_lookup(Arc::new(driver.clone()), move |key| {
            shared.lock().unwrap().get(key).cloned()
        });

        assert!(conn.connect().await.is_err());
        assert!(!conn.is_connected().await);

        *env.lock().unwrap() = full_env();
        assert!(conn.connect().await.is_ok());
        assert_eq!(driver.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_session_open_failure_is_not_stored() {
        let driver = StubDriver::new();
        driver.fail_sessions_with("warehouse is stopped");
        let conn = connection(&driver, full_env());

        let err = conn.connect().await.err().unwrap();
        assert!(err.to_string().contains("warehouse is stopped"));
        assert!(!conn.is_connected().await);
        assert_eq!(driver.clients_closed(), 1);

        driver.clear_failures();
        conn.connect().await.unwrap();
        assert!(conn.is_connected().await);
    }

    #[tokio::test]
    async fn test_execute_query_returns_rows_and_releases_operation() {
        let driver = StubDriver::returning(vec![json!({"1": 1})]);
        let conn = connection(&driver, full_env());

        let rows = conn.execute_query("SELECT 1", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["1"], json!(1));
        assert_eq!(driver.statements(), vec!["SELECT 1".to_string()]);
        assert_eq!(driver.operations_closed(), 1);
    }

    #[tokio::test]
    async fn test_execute_query_passes_parameters() {
        let driver = StubDriver::new();
        let conn = connection(&driver, full_env());

        let params = vec![StatementParameter::new("id", "7").typed("INT")];
        conn.execute_query("SELECT * FROM t WHERE id = :id", &params)
            .await
            .unwrap();
        assert_eq!(driver.last_parameters(), params);
    }

    #[tokio::test]
    async fn test_remote_failure_is_returned_unchanged() {
        let driver = StubDriver::new();
        driver.fail_statements_with("Table or view not found: nope");
        let conn = connection(&driver, full_env());

        let err = conn.execute_query("SELECT * FROM nope", &[]).await.unwrap_err();
        match err {
            DbqlError::RemoteExecution(msg) => assert_eq!(msg, "Table or view not found: nope"),
            other => panic!("unexpected error: {other:?}"),
        }
        // The session survives a statement failure.
        assert!(conn.is_connected().await);
    }

    #[tokio::test]
    async fn test_fetch_failure_still_releases_operation() {
        let driver = StubDriver::new();
        driver.fail_fetches_with("result expired");
        let conn = connection(&driver, full_env());

        assert!(conn.execute_query("SELECT 1", &[]).await.is_err());
        assert_eq!(driver.operations_closed(), 1);
    }

    #[tokio::test]
    async fn test_close_then_connect_opens_fresh_session() {
        let driver = StubDriver::new();
        let conn = connection(&driver, full_env());

        let first = conn.connect().await.unwrap();
        conn.close().await.unwrap();
        assert!(!conn.is_connected().await);
        assert_eq!(driver.sessions_closed(), 1);
        assert_eq!(driver.clients_closed(), 1);

        let second = conn.connect().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(driver.sessions_opened(), 2);
    }

    #[tokio::test]
    async fn test_session_close_failure_still_closes_client() {
        let driver = StubDriver::new();
        let conn = connection(&driver, full_env());
        conn.connect().await.unwrap();

        driver.fail_session_close_with("session already gone");
        let err = conn.close().await.unwrap_err();
        assert!(err.to_string().contains("session already gone"));
        assert_eq!(driver.sessions_closed(), 1);
        assert_eq!(driver.clients_closed(), 1);
        assert!(!conn.is_connected().await);

        driver.clear_failures();
        conn.connect().await.unwrap();
        assert_eq!(driver.sessions_opened(), 2);
    }

    #[tokio::test]
    async fn test_close_without_session_is_noop() {
        let driver = StubDriver::new();
        let conn = connection(&driver, full_env());
        conn.close().await.unwrap();
        assert_eq!(driver.sessions_closed(), 0);
    }
}
