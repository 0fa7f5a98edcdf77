use dbql_core::{Connection, GraphletteConfig, ServerConfig};
use dbql_databricks::DatabricksDriver;
use dbql_graphlette::WAREHOUSE_SCHEMA;
use std::sync::Arc;
use tracing::info;

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_PATH: &str = "/graphql";

fn init_logging(in_lambda: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    // CloudWatch stamps every line already.
    if in_lambda {
        builder.without_time().init();
    } else {
        builder.init();
    }
}

fn server_config() -> anyhow::Result<ServerConfig> {
    let port = match std::env::var("PORT") {
        Ok(p) => p
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT is not a valid port: {p}"))?,
        Err(_) => DEFAULT_PORT,
    };
    let path = std::env::var("DBQL_GRAPHQL_PATH").unwrap_or_else(|_| DEFAULT_PATH.to_string());

    // Credentials are read on the first query, not here.
    let connection = Arc::new(Connection::new(Arc::new(DatabricksDriver::new())));

    Ok(ServerConfig {
        port,
        graphlette: GraphletteConfig {
            path,
            schema_text: WAREHOUSE_SCHEMA.to_string(),
            connection,
        },
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let in_lambda = std::env::var("AWS_LAMBDA_RUNTIME_API").is_ok();
    init_logging(in_lambda);
    let config = server_config()?;

    if in_lambda {
        info!("Running under the Lambda runtime");
        dbql_lambda::run_lambda(config)
            .await
            .map_err(|e| anyhow::anyhow!("Lambda runtime failed: {e}"))
    } else {
        dbql_server::run(config).await
    }
}
