use dbql_core::ServerConfig;
use tracing::info;

/// Run the GraphQL API inside an AWS Lambda runtime.
///
/// Builds the axum Router via `dbql_server::build_app()` and hands it to the
/// `lambda_http` runtime, which translates API Gateway events. The warehouse
/// connection lives as long as the execution environment, so warm
/// invocations reuse the same session.
pub async fn run_lambda(config: ServerConfig) -> Result<(), lambda_http::Error> {
    info!("Starting Lambda handler for {}", config.graphlette.path);
    let app = dbql_server::build_app(config)
        .map_err(|e| lambda_http::Error::from(format!("build_app failed: {e}")))?;
    lambda_http::run(app).await
}
