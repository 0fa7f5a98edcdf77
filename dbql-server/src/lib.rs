use axum::Router;
use dbql_core::ServerConfig;
use dbql_graphlette::{build_schema, GraphletteRouter, Resolvers};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Build the Axum application from a ServerConfig.
///
/// The graphlette's resolvers share the configured connection; nothing
/// talks to the warehouse until the first query arrives.
pub fn build_app(config: ServerConfig) -> anyhow::Result<Router> {
    let g = config.graphlette;
    let resolvers = Resolvers::new(g.connection)
        .map_err(|e| anyhow::anyhow!("Resolver setup failed for {}: {}", g.path, e))?;
    let schema = build_schema(&g.schema_text, Arc::new(resolvers))
        .map_err(|e| anyhow::anyhow!("Schema build error for {}: {:?}", g.path, e))?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(GraphletteRouter::build(&g.path, schema).layer(cors))
}

/// Serve on the configured port until ctrl-c or SIGTERM, then release the
/// warehouse connection.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let port = config.port;
    let path = config.graphlette.path.clone();
    let connection = Arc::clone(&config.graphlette.connection);
    let app = build_app(config)?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    info!("dbql listening on port {port}, GraphQL at {path}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = connection.close().await {
        warn!("Failed to close warehouse connection: {}", e);
    }
    info!("dbql stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
