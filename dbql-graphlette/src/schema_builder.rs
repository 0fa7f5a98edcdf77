use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, InputValue, Object, ResolverContext, Scalar, Schema, TypeRef,
};
use async_graphql_parser::parse_schema;
use async_graphql_parser::types as pt;
use dbql_core::Row;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error_path::ErrorPath;
use crate::resolvers::{Resolvers, DEFAULT_LIMIT};

/// The warehouse API as GraphQL SDL.
pub const WAREHOUSE_SCHEMA: &str = r#"
type Query {
  """
  Execute a custom SQL query against Databricks
  """
  executeQuery(sql: String!): QueryResult!

  """
  Get tables from a specific schema/database
  """
  getTables(database: String!): [Table!]!

  """
  Get data from a specific table with optional limit
  """
  getTableData(database: String!, table: String!, limit: Int = 100): [Row!]!
}

type QueryResult {
  rows: [Row!]!
  rowCount: Int!
}

type Table {
  name: String!
  database: String!
}

"""
Generic row representation as JSON
"""
scalar Row
"#;

/// Convert parser Type (struct with base+nullable) to dynamic TypeRef.
fn convert_type(ty: &pt::Type) -> TypeRef {
    match (&ty.base, ty.nullable) {
        (pt::BaseType::Named(name), true) => TypeRef::named(name.as_ref()),
        (pt::BaseType::Named(name), false) => TypeRef::named_nn(name.as_ref()),
        (pt::BaseType::List(inner), nullable) => {
            let inner_nn = !inner.nullable;
            let inner_name = match &inner.base {
                pt::BaseType::Named(n) => n.as_ref().to_string(),
                pt::BaseType::List(_) => "Row".to_string(), // nested lists are not part of this API
            };
            match (nullable, inner_nn) {
                (true, false) => TypeRef::named_list(&inner_name),
                (true, true) => TypeRef::named_list_nn(&inner_name),
                (false, false) => TypeRef::named_nn_list(&inner_name),
                (false, true) => TypeRef::named_nn_list_nn(&inner_name),
            }
        }
    }
}

/// JSON value → field value, keeping lists as lists so element types are checked.
fn json_field_value<'a>(v: &serde_json::Value) -> FieldValue<'a> {
    match v {
        serde_json::Value::Array(items) => FieldValue::list(items.iter().map(json_field_value)),
        other => FieldValue::value(async_graphql::to_value(other).unwrap_or(async_graphql::Value::Null)),
    }
}

fn to_row<T: Serialize>(value: &T) -> async_graphql::Result<Row> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(async_graphql::Error::new(format!("expected an object, got {other}"))),
    }
}

fn row_list<'a>(rows: Vec<Row>) -> FieldValue<'a> {
    FieldValue::list(
        rows.into_iter()
            .map(|row| json_field_value(&serde_json::Value::Object(row))),
    )
}

fn string_arg(ctx: &ResolverContext<'_>, name: &str) -> async_graphql::Result<String> {
    Ok(ctx.args.try_get(name)?.string()?.to_string())
}

/// Object field: extract value from the parent row and convert to a GraphQL value.
fn row_field(field_name: String, type_ref: TypeRef) -> Field {
    Field::new(field_name.clone(), type_ref, move |ctx| {
        let fname = field_name.clone();
        FieldFuture::new(async move {
            let row = ctx.parent_value.try_downcast_ref::<Row>()?;
            Ok(row.get(&fname).map(json_field_value))
        })
    })
}

/// Root query field bound to one resolver operation, or `None` for unknown fields.
fn query_field(field_name: &str, type_ref: TypeRef, resolvers: &Arc<Resolvers>) -> Option<Field> {
    let r = Arc::clone(resolvers);
    let field = match field_name {
        "executeQuery" => Field::new(field_name, type_ref, move |ctx| {
            let r = Arc::clone(&r);
            FieldFuture::new(async move {
                let sql = string_arg(&ctx, "sql")?;
                let result = r
                    .execute_query(&sql)
                    .await
                    .map_err(|e| async_graphql::Error::new(e.to_string()))?;
                Ok(Some(FieldValue::owned_any(to_row(&result)?)))
            })
        }),
        "getTables" => Field::new(field_name, type_ref, move |ctx| {
            let r = Arc::clone(&r);
            FieldFuture::new(async move {
                let database = string_arg(&ctx, "database")?;
                let tables = r
                    .get_tables(&database)
                    .await
                    .map_err(|e| async_graphql::Error::new(e.to_string()))?;
                let items = tables
                    .iter()
                    .map(|t| to_row(t).map(FieldValue::owned_any))
                    .collect::<async_graphql::Result<Vec<_>>>()?;
                Ok(Some(FieldValue::list(items)))
            })
        }),
        "getTableData" => Field::new(field_name, type_ref, move |ctx| {
            let r = Arc::clone(&r);
            FieldFuture::new(async move {
                let database = string_arg(&ctx, "database")?;
                let table = string_arg(&ctx, "table")?;
                let limit = match ctx.args.get("limit").filter(|v| !v.is_null()) {
                    Some(v) => v.i64()?,
                    None => DEFAULT_LIMIT,
                };
                let rows = r
                    .get_table_data(&database, &table, limit)
                    .await
                    .map_err(|e| async_graphql::Error::new(e.to_string()))?;
                Ok(Some(row_list(rows)))
            })
        }),
        _ => return None,
    };
    Some(field)
}

/// `Row` carries an arbitrary JSON object in both directions unchanged.
fn row_scalar(name: &str, description: Option<&str>) -> Scalar {
    let mut scalar = Scalar::new(name).validator(|v| matches!(v, async_graphql::Value::Object(_)));
    if let Some(desc) = description {
        scalar = scalar.description(desc);
    }
    scalar
}

/// Build the dynamic Schema from SDL, binding root fields to the resolvers.
pub fn build_schema(schema_text: &str, resolvers: Arc<Resolvers>) -> async_graphql::Result<Schema> {
    let service_doc = parse_schema(schema_text)
        .map_err(|e| async_graphql::Error::new(format!("Schema parse error: {e}")))?;

    let mut object_types: HashMap<String, (Option<String>, Vec<pt::FieldDefinition>)> =
        HashMap::new();
    let mut scalars: Vec<(String, Option<String>)> = Vec::new();
    for def in &service_doc.definitions {
        if let pt::TypeSystemDefinition::Type(td) = def {
            let type_def = &td.node;
            let name = type_def.name.node.to_string();
            let description = type_def
                .description
                .as_ref()
                .map(|d| d.node.trim().to_string());
            match &type_def.kind {
                pt::TypeKind::Object(obj) => {
                    let fields = obj.fields.iter().map(|f| f.node.clone()).collect();
                    object_types.insert(name, (description, fields));
                }
                pt::TypeKind::Scalar => scalars.push((name, description)),
                _ => {}
            }
        }
    }

    let mut schema_builder = Schema::build("Query", None, None).extension(ErrorPath);
    for (name, description) in &scalars {
        schema_builder = schema_builder.register(row_scalar(name, description.as_deref()));
    }

    for (type_name, (description, fields)) in &object_types {
        let mut obj = Object::new(type_name.as_str());
        if let Some(desc) = description {
            obj = obj.description(desc.as_str());
        }

        for field_def in fields {
            let field_name = field_def.name.node.to_string();
            let field_type = convert_type(&field_def.ty.node);

            let mut field = if type_name == "Query" {
                match query_field(&field_name, field_type, &resolvers) {
                    Some(f) => f,
                    None => continue,
                }
            } else {
                row_field(field_name, field_type)
            };

            if let Some(desc) = &field_def.description {
                field = field.description(desc.node.trim());
            }

            for arg_def in &field_def.arguments {
                let arg = &arg_def.node;
                let mut input =
                    InputValue::new(arg.name.node.to_string(), convert_type(&arg.ty.node));
                if let Some(default) = &arg.default_value {
                    input = input.default_value(default.node.clone());
                }
                field = field.argument(input);
            }

            obj = obj.field(field);
        }

        schema_builder = schema_builder.register(obj);
    }

    schema_builder
        .finish()
        .map_err(|e| async_graphql::Error::new(e.to_string()))
}
