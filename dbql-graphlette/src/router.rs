use async_graphql::dynamic::Schema;
use async_graphql::http::{parse_query_string, GraphiQLSource};
use async_graphql::ServerError;
use axum::extract::RawQuery;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

/// Axum Router serving a GraphQL schema at the given path.
///
/// `POST` takes a JSON request body. `GET` runs the request encoded in the
/// query string, or serves GraphiQL when there is none.
pub struct GraphletteRouter;

impl GraphletteRouter {
    pub fn build(path: &str, schema: Schema) -> Router {
        let schema = Arc::new(schema);
        let graphiql = GraphiQLSource::build().endpoint(path).finish();
        let get_schema = Arc::clone(&schema);
        Router::new().route(
            path,
            post(move |body: axum::body::Bytes| {
                let schema = Arc::clone(&schema);
                async move {
                    match serde_json::from_slice::<async_graphql::Request>(&body) {
                        Ok(request) => execute(&schema, request).await,
                        Err(e) => bad_request(e.to_string()),
                    }
                }
            })
            .get(move |RawQuery(raw): RawQuery| {
                let schema = Arc::clone(&get_schema);
                let graphiql = graphiql.clone();
                async move {
                    let Some(raw) = raw.filter(|q| !q.is_empty()) else {
                        return Html(graphiql).into_response();
                    };
                    match parse_query_string(&raw) {
                        Ok(request) if request.query.is_empty() => Html(graphiql).into_response(),
                        Ok(request) => execute(&schema, request).await,
                        Err(e) => bad_request(e.to_string()),
                    }
                }
            }),
        )
    }
}

async fn execute(schema: &Schema, request: async_graphql::Request) -> Response {
    let response = schema.execute(request).await;
    let mut body = json!({ "data": response.data });
    if !response.errors.is_empty() {
        body["errors"] = Value::Array(response.errors.iter().map(format_error).collect());
    }
    axum::Json(body).into_response()
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({ "errors": [{ "message": message }] })),
    )
        .into_response()
}

/// Log the error and reduce it to `message`, `locations` and `path`.
pub fn format_error(err: &ServerError) -> Value {
    error!("GraphQL Error: {:?}", err);
    let mut formatted = json!({ "message": err.message });
    if !err.locations.is_empty() {
        formatted["locations"] = json!(err.locations);
    }
    if !err.path.is_empty() {
        formatted["path"] = json!(err.path);
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::{PathSegment, Pos};

    #[test]
    fn test_format_error_drops_extensions() {
        let mut err = ServerError::new("Failed to execute query: boom", Some(Pos { line: 1, column: 3 }));
        err.path = vec![PathSegment::Field("executeQuery".to_string())];
        let mut extensions = async_graphql::ErrorExtensionValues::default();
        extensions.set("code", "INTERNAL");
        err.extensions = Some(extensions);

        let formatted = format_error(&err);
        assert_eq!(
            formatted,
            json!({
                "message": "Failed to execute query: boom",
                "locations": [{"line": 1, "column": 3}],
                "path": ["executeQuery"]
            })
        );
    }

    #[test]
    fn test_format_error_without_location() {
        let err = ServerError::new("Unknown field", None);
        assert_eq!(format_error(&err), json!({"message": "Unknown field"}));
    }
}
