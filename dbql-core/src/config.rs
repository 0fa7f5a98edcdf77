use crate::connection::Connection;
use crate::error::{DbqlError, Result};
use std::env;
use std::sync::Arc;

pub const SERVER_HOSTNAME_VAR: &str = "DATABRICKS_SERVER_HOSTNAME";
pub const HTTP_PATH_VAR: &str = "DATABRICKS_HTTP_PATH";
pub const TOKEN_VAR: &str = "DATABRICKS_TOKEN";

const DEFAULT_WAIT_TIMEOUT_SECS: u32 = 30;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Settings for reaching one SQL warehouse.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub server_hostname: String,
    pub http_path: String,
    pub access_token: String,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub wait_timeout_secs: u32,
    pub poll_interval_ms: u64,
}

impl WarehouseConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key/value source. The three connection
    /// variables are required; empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_hostname = get(SERVER_HOSTNAME_VAR);
        let http_path = get(HTTP_PATH_VAR);
        let access_token = get(TOKEN_VAR);

        let (server_hostname, http_path, access_token) =
            match (server_hostname, http_path, access_token) {
                (Some(host), Some(path), Some(token)) => (host, path, token),
                _ => {
                    return Err(DbqlError::Configuration(format!(
                        "Missing required Databricks environment variables: {}, {}, {}",
                        SERVER_HOSTNAME_VAR, HTTP_PATH_VAR, TOKEN_VAR
                    )))
                }
            };

        let wait_timeout_secs = match get("DATABRICKS_WAIT_TIMEOUT_SECS") {
            Some(v) => v.parse().map_err(|_| {
                DbqlError::Configuration(format!("DATABRICKS_WAIT_TIMEOUT_SECS is not a number: {v}"))
            })?,
            None => DEFAULT_WAIT_TIMEOUT_SECS,
        };
        // The statement API accepts 0 (return immediately) or 5..=50 seconds.
        if wait_timeout_secs != 0 && !(5..=50).contains(&wait_timeout_secs) {
            return Err(DbqlError::Configuration(format!(
                "DATABRICKS_WAIT_TIMEOUT_SECS must be 0 or between 5 and 50: {wait_timeout_secs}"
            )));
        }
        let poll_interval_ms = match get("DATABRICKS_POLL_INTERVAL_MS") {
            Some(v) => v.parse().map_err(|_| {
                DbqlError::Configuration(format!("DATABRICKS_POLL_INTERVAL_MS is not a number: {v}"))
            })?,
            None => DEFAULT_POLL_INTERVAL_MS,
        };

        Ok(Self {
            server_hostname,
            http_path,
            access_token,
            catalog: get("DATABRICKS_CATALOG"),
            schema: get("DATABRICKS_SCHEMA"),
            wait_timeout_secs,
            poll_interval_ms,
        })
    }

    /// The warehouse id is the last segment of the HTTP path,
    /// e.g. `/sql/1.0/warehouses/abc123` → `abc123`.
    pub fn warehouse_id(&self) -> Result<&str> {
        self.http_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                DbqlError::Configuration(format!(
                    "{} does not name a warehouse: {}",
                    HTTP_PATH_VAR, self.http_path
                ))
            })
    }
}

pub struct GraphletteConfig {
    pub path: String,
    pub schema_text: String,
    pub connection: Arc<Connection>,
}

pub struct ServerConfig {
    pub port: u16,
    pub graphlette: GraphletteConfig,
}
