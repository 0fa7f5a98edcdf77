use async_trait::async_trait;
use dbql_core::{
    DbqlError, Result, Row, SqlClient, SqlDriver, SqlOperation, SqlSession, StatementParameter,
    WarehouseConfig,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{StatementResponse, StatementState};
use crate::client::StatementClient;
use crate::converters::rows_from_data_array;

/// Driver for Databricks SQL warehouses over the Statement Execution API.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabricksDriver;

impl DatabricksDriver {
    pub fn new() -> Self {
        Self
    }
}

impl SqlDriver for DatabricksDriver {
    fn client(&self, config: &WarehouseConfig) -> Result<Arc<dyn SqlClient>> {
        let client = StatementClient::new(config)?;
        Ok(Arc::new(DatabricksClient {
            client,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct DatabricksClient {
    client: StatementClient,
    poll_interval: Duration,
    closed: AtomicBool,
}

#[async_trait]
impl SqlClient for DatabricksClient {
    async fn open_session(&self) -> Result<Arc<dyn SqlSession>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbqlError::RemoteExecution("client is closed".to_string()));
        }

        let warehouse = self.client.get_warehouse().await?;
        let session_id = Uuid::new_v4();
        info!(
            "Session {} bound to warehouse {} ({}), state {}",
            session_id,
            warehouse.id,
            warehouse.name.as_deref().unwrap_or("unnamed"),
            warehouse.state.as_deref().unwrap_or("UNKNOWN")
        );

        Ok(Arc::new(DatabricksSession {
            id: session_id,
            client: self.client.clone(),
            poll_interval: self.poll_interval,
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Warehouse-bound execution context. The REST API is stateless, so the
/// session holds the client and the defaults each statement is sent with.
pub struct DatabricksSession {
    id: Uuid,
    client: StatementClient,
    poll_interval: Duration,
    closed: AtomicBool,
}

impl DatabricksSession {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[async_trait]
impl SqlSession for DatabricksSession {
    async fn execute_statement(
        &self,
        statement: &str,
        parameters: &[StatementParameter],
    ) -> Result<Box<dyn SqlOperation>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbqlError::RemoteExecution(format!(
                "session {} is closed",
                self.id
            )));
        }

        let response = self.client.submit_statement(statement, parameters).await?;
        debug!(
            "Session {} submitted statement {} ({:?})",
            self.id, response.statement_id, response.status.state
        );

        Ok(Box::new(StatementOperation {
            client: self.client.clone(),
            poll_interval: self.poll_interval,
            statement_id: response.statement_id.clone(),
            state: response.status.state,
            latest: Some(response),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        debug!("Session {} closed", self.id);
        Ok(())
    }
}

/// One submitted statement, polled until it settles.
pub struct StatementOperation {
    client: StatementClient,
    poll_interval: Duration,
    statement_id: String,
    state: StatementState,
    latest: Option<StatementResponse>,
}

impl StatementOperation {
    async fn wait_until_settled(&mut self) -> Result<StatementResponse> {
        loop {
            let response = match self.latest.take() {
                Some(r) => r,
                None => self.client.get_statement(&self.statement_id).await?,
            };
            self.state = response.status.state;

            if self.state.is_terminal() {
                return Ok(response);
            }

            debug!(
                "Statement {} is {:?}, polling again",
                self.statement_id, self.state
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl SqlOperation for StatementOperation {
    async fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let response = self.wait_until_settled().await?;

        if response.status.state != StatementState::Succeeded {
            let reason = response
                .status
                .error
                .map(|e| e.describe())
                .unwrap_or_else(|| format!("statement {:?}", response.status.state));
            return Err(DbqlError::RemoteExecution(reason));
        }

        let (columns, total_chunks, total_rows) = match response.manifest {
            Some(m) => (m.schema.columns, m.total_chunk_count, m.total_row_count),
            None => (Vec::new(), None, None),
        };

        let mut rows = Vec::new();
        let mut chunks = 0u64;
        let mut chunk = response.result;
        while let Some(data) = chunk {
            debug!(
                "Statement {} chunk {} of {:?}: {} rows",
                self.statement_id,
                data.chunk_index.unwrap_or(chunks),
                total_chunks,
                data.data_array.len()
            );
            chunks += 1;
            let next = data.next_chunk_internal_link.clone();
            rows.extend(rows_from_data_array(&columns, data.data_array));
            chunk = match next {
                Some(link) => Some(self.client.get_chunk(&link).await?),
                None => None,
            };
        }

        if !row_total_matches(total_rows, rows.len()) {
            warn!(
                "Statement {} reported {:?} rows but {} were fetched",
                self.statement_id,
                total_rows,
                rows.len()
            );
        }

        Ok(rows)
    }

    async fn close(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Ok(());
        }
        warn!(
            "Cancelling unfinished statement {} ({:?})",
            self.statement_id, self.state
        );
        self.client.cancel_statement(&self.statement_id).await?;
        self.state = StatementState::Canceled;
        Ok(())
    }
}

/// A manifest without a row total matches anything.
fn row_total_matches(reported: Option<u64>, fetched: usize) -> bool {
    reported.map_or(true, |total| total == fetched as u64)
}
