use async_graphql::extensions::{
    Extension, ExtensionContext, ExtensionFactory, NextResolve, ResolveInfo,
};
use async_graphql::{PathSegment, QueryPathNode, QueryPathSegment, ServerResult, Value};
use std::sync::Arc;

/// Schema extension that stamps the response path onto resolver errors.
///
/// Dynamic field resolvers turn a returned error into a `ServerError` with
/// only a location, so without this the client never sees `path`.
pub struct ErrorPath;

impl ExtensionFactory for ErrorPath {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(ErrorPathExtension)
    }
}

struct ErrorPathExtension;

#[async_trait::async_trait]
impl Extension for ErrorPathExtension {
    async fn resolve(
        &self,
        ctx: &ExtensionContext<'_>,
        info: ResolveInfo<'_>,
        next: NextResolve<'_>,
    ) -> ServerResult<Option<Value>> {
        let path_node = info.path_node;
        next.run(ctx, info).await.map_err(|mut err| {
            if err.path.is_empty() {
                err.path = response_path(path_node);
            }
            err
        })
    }
}

/// Root-first path segments for a node in the query path.
fn response_path(node: &QueryPathNode<'_>) -> Vec<PathSegment> {
    let mut path: Vec<PathSegment> = std::iter::once(node)
        .chain(node.parents())
        .map(|n| match n.segment {
            QueryPathSegment::Name(name) => PathSegment::Field(name.to_string()),
            QueryPathSegment::Index(idx) => PathSegment::Index(idx),
        })
        .collect();
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_path_is_root_first() {
        let root = QueryPathNode {
            parent: None,
            segment: QueryPathSegment::Name("executeQuery"),
        };
        let rows = QueryPathNode {
            parent: Some(&root),
            segment: QueryPathSegment::Name("rows"),
        };
        let second = QueryPathNode {
            parent: Some(&rows),
            segment: QueryPathSegment::Index(1),
        };

        assert_eq!(
            response_path(&second),
            vec![
                PathSegment::Field("executeQuery".to_string()),
                PathSegment::Field("rows".to_string()),
                PathSegment::Index(1),
            ]
        );
    }

    #[test]
    fn test_single_field_path() {
        let root = QueryPathNode {
            parent: None,
            segment: QueryPathSegment::Name("getTables"),
        };
        assert_eq!(
            response_path(&root),
            vec![PathSegment::Field("getTables".to_string())]
        );
    }
}
