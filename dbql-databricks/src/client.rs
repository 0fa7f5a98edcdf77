use dbql_core::{DbqlError, Result, StatementParameter, WarehouseConfig};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use crate::api::{
    ExecuteStatementRequest, ResultData, ServiceError, StatementResponse, WarehouseInfo,
};

/// HTTP client for the Databricks SQL Statement Execution API 2.0.
#[derive(Clone)]
pub struct StatementClient {
    http: Client,
    base_url: String,
    token: String,
    warehouse_id: String,
    catalog: Option<String>,
    schema: Option<String>,
    wait_timeout_secs: u32,
}

impl StatementClient {
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        Ok(Self {
            http: Client::new(),
            base_url: base_url(&config.server_hostname)?,
            token: config.access_token.clone(),
            warehouse_id: config.warehouse_id()?.to_string(),
            catalog: config.catalog.clone(),
            schema: config.schema.clone(),
            wait_timeout_secs: config.wait_timeout_secs,
        })
    }

    pub fn warehouse_id(&self) -> &str {
        &self.warehouse_id
    }

    /// Look up the configured warehouse; fails on bad credentials or an unknown id.
    pub async fn get_warehouse(&self) -> Result<WarehouseInfo> {
        let url = format!("{}/api/2.0/sql/warehouses/{}", self.base_url, self.warehouse_id);
        self.send_json(self.http.get(&url)).await
    }

    pub async fn submit_statement(
        &self,
        statement: &str,
        parameters: &[StatementParameter],
    ) -> Result<StatementResponse> {
        let url = format!("{}/api/2.0/sql/statements", self.base_url);
        let body = ExecuteStatementRequest {
            statement,
            warehouse_id: &self.warehouse_id,
            catalog: self.catalog.as_deref(),
            schema: self.schema.as_deref(),
            parameters,
            disposition: "INLINE",
            format: "JSON_ARRAY",
            wait_timeout: format!("{}s", self.wait_timeout_secs),
            on_wait_timeout: "CONTINUE",
        };

        debug!("Submitting statement to warehouse {}", self.warehouse_id);
        self.send_json(self.http.post(&url).json(&body)).await
    }

    pub async fn get_statement(&self, statement_id: &str) -> Result<StatementResponse> {
        let url = format!("{}/api/2.0/sql/statements/{}", self.base_url, statement_id);
        self.send_json(self.http.get(&url)).await
    }

    /// Fetch a result chunk by the `next_chunk_internal_link` the service handed out.
    pub async fn get_chunk(&self, internal_link: &str) -> Result<ResultData> {
        let url = format!("{}{}", self.base_url, internal_link);
        self.send_json(self.http.get(&url)).await
    }

    pub async fn cancel_statement(&self, statement_id: &str) -> Result<()> {
        let url = format!(
            "{}/api/2.0/sql/statements/{}/cancel",
            self.base_url, statement_id
        );
        self.send(self.http.post(&url)).await?;
        Ok(())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let resp = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| DbqlError::RemoteExecution(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ServiceError>(&body_text)
                .ok()
                .filter(|e| e.message.is_some())
                .map(|e| e.describe())
                .unwrap_or(body_text);
            error!("Warehouse request failed ({}): {}", status, message);
            return Err(DbqlError::RemoteExecution(format!(
                "warehouse request failed ({status}): {message}"
            )));
        }

        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let resp = self.send(request).await?;
        let body_text = resp
            .text()
            .await
            .map_err(|e| DbqlError::RemoteExecution(e.to_string()))?;
        serde_json::from_str(&body_text).map_err(|e| DbqlError::Protocol(e.to_string()))
    }
}

/// Accept `host`, `host:port` or a full URL; default to https.
fn base_url(server_hostname: &str) -> Result<String> {
    let trimmed = server_hostname.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = Url::parse(&candidate).map_err(|e| {
        DbqlError::Configuration(format!("invalid server hostname {server_hostname}: {e}"))
    })?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(DbqlError::Configuration(format!(
            "invalid server hostname {server_hostname}: no host"
        )));
    }
    Ok(candidate.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_adds_https() {
        assert_eq!(
            base_url("dbc-1234.cloud.databricks.com").unwrap(),
            "https://dbc-1234.cloud.databricks.com"
        );
    }

    #[test]
    fn test_base_url_keeps_explicit_scheme() {
        assert_eq!(
            base_url("http://127.0.0.1:8080/").unwrap(),
            "http://127.0.0.1:8080"
        );
    }

    #[test]
    fn test_base_url_rejects_garbage() {
        assert!(matches!(
            base_url("http://"),
            Err(DbqlError::Configuration(_))
        ));
        assert!(matches!(
            base_url("https:///"),
            Err(DbqlError::Configuration(_))
        ));
        assert!(matches!(base_url(""), Err(DbqlError::Configuration(_))));
    }

    #[test]
    fn test_base_url_trims_trailing_slash_after_host() {
        assert_eq!(
            base_url("  dbc-1234.cloud.databricks.com/ ").unwrap(),
            "https://dbc-1234.cloud.databricks.com"
        );
    }
}
