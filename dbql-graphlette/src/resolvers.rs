use dbql_core::{Connection, DbqlError, QueryResult, Result, Row, Table};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::templates::{StatementTemplates, PREVIEW_TABLE, SHOW_TABLES};

pub const DEFAULT_LIMIT: i64 = 100;

/// The three query operations, backed by one shared warehouse connection.
pub struct Resolvers {
    connection: Arc<Connection>,
    templates: StatementTemplates,
}

impl Resolvers {
    pub fn new(connection: Arc<Connection>) -> Result<Self> {
        Ok(Self {
            connection,
            templates: StatementTemplates::new()?,
        })
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        match self.connection.execute_query(sql, &[]).await {
            Ok(rows) => Ok(QueryResult::new(rows)),
            Err(e) => {
                error!("Error executing query: {}", e);
                Err(DbqlError::wrap("Failed to execute query", e))
            }
        }
    }

    pub async fn get_tables(&self, database: &str) -> Result<Vec<Table>> {
        self.list_tables(database).await.map_err(|e| {
            error!("Error getting tables: {}", e);
            DbqlError::wrap(format!("Failed to get tables from database {database}"), e)
        })
    }

    pub async fn get_table_data(&self, database: &str, table: &str, limit: i64) -> Result<Vec<Row>> {
        self.preview_table(database, table, limit)
            .await
            .map_err(|e| {
                error!("Error getting table data: {}", e);
                DbqlError::wrap(format!("Failed to get data from {database}.{table}"), e)
            })
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<Table>> {
        let sql = self
            .templates
            .render(SHOW_TABLES, &json!({ "database": database }))?;
        let rows = self.connection.execute_query(&sql, &[]).await?;
        rows.iter().map(|row| table_from_row(row, database)).collect()
    }

    async fn preview_table(&self, database: &str, table: &str, limit: i64) -> Result<Vec<Row>> {
        let sql = self.templates.render(
            PREVIEW_TABLE,
            &json!({ "database": database, "table": table, "limit": limit }),
        )?;
        self.connection.execute_query(&sql, &[]).await
    }
}

/// `SHOW TABLES` reports the name as `tableName`; some catalogs use `table_name`.
fn table_from_row(row: &Row, database: &str) -> Result<Table> {
    let name = non_empty_str(row, "tableName")
        .or_else(|| non_empty_str(row, "table_name"))
        .ok_or_else(|| {
            DbqlError::Protocol(format!("table listing row has no table name: {}", Value::Object(row.clone())))
        })?;
    let database = non_empty_str(row, "database").unwrap_or(database);

    Ok(Table {
        name: name.to_string(),
        database: database.to_string(),
    })
}

fn non_empty_str<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbql_core::testing::{full_env, lookup_from, StubDriver};

    fn resolvers(driver: &StubDriver) -> Resolvers {
        let conn = Connection::with_lookup(Arc::new(driver.clone()), lookup_from(full_env()));
        Resolvers::new(Arc::new(conn)).unwrap()
    }

    #[tokio::test]
    async fn test_execute_query_counts_rows() {
        let driver = StubDriver::returning(vec![json!({"1": 1})]);
        let result = resolvers(&driver).execute_query("SELECT 1").await.unwrap();

        assert_eq!(result.row_count, 1);
        assert_eq!(Value::Object(result.rows[0].clone()), json!({"1": 1}));
        assert_eq!(driver.last_statement().as_deref(), Some("SELECT 1"));
    }

    #[tokio::test]
    async fn test_get_tables_reads_both_name_fields() {
        let driver = StubDriver::returning(vec![
            json!({"tableName": "orders"}),
            json!({"table_name": "customers"}),
        ]);
        let tables = resolvers(&driver).get_tables("sales").await.unwrap();

        assert_eq!(
            tables,
            vec![
                Table { name: "orders".into(), database: "sales".into() },
                Table { name: "customers".into(), database: "sales".into() },
            ]
        );
        assert_eq!(driver.last_statement().as_deref(), Some("SHOW TABLES IN sales"));
    }

    #[tokio::test]
    async fn test_get_tables_prefers_row_database() {
        let driver = StubDriver::returning(vec![json!({
            "database": "sales_archive",
            "tableName": "orders_2019",
            "isTemporary": false
        })]);
        let tables = resolvers(&driver).get_tables("sales").await.unwrap();
        assert_eq!(tables[0].database, "sales_archive");
    }

    #[tokio::test]
    async fn test_get_tables_empty_name_falls_through() {
        let driver = StubDriver::returning(vec![json!({"tableName": "", "table_name": "legacy"})]);
        let tables = resolvers(&driver).get_tables("sales").await.unwrap();
        assert_eq!(tables[0].name, "legacy");
    }

    #[tokio::test]
    async fn test_get_tables_row_without_name_is_error() {
        let driver = StubDriver::returning(vec![json!({"database": "sales"})]);
        let err = resolvers(&driver).get_tables("sales").await.unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Failed to get tables from database sales: "));
    }

    #[tokio::test]
    async fn test_get_table_data_limits_and_passes_rows_through() {
        let rows = vec![
            json!({"id": 1, "total": "9.99", "items": [1, 2]}),
            json!({"id": 2, "total": null, "items": []}),
        ];
        let driver = StubDriver::returning(rows.clone());
        let data = resolvers(&driver)
            .get_table_data("sales", "orders", 2)
            .await
            .unwrap();

        let statement = driver.last_statement().unwrap();
        assert!(statement.contains("LIMIT 2"));
        assert_eq!(statement, "SELECT * FROM sales.orders LIMIT 2");
        let data: Vec<Value> = data.into_iter().map(Value::Object).collect();
        assert_eq!(data, rows);
    }

    #[tokio::test]
    async fn test_failure_message_wraps_original() {
        let driver = StubDriver::new();
        driver.fail_statements_with("Warehouse is stopping");
        let r = resolvers(&driver);

        let err = r.execute_query("SELECT 1").await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to execute query: "));
        assert!(err.to_string().contains("Warehouse is stopping"));

        let err = r.get_table_data("sales", "orders", 5).await.unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Failed to get data from sales.orders: "));
    }

    #[tokio::test]
    async fn test_missing_configuration_surfaces_through_resolver() {
        let driver = StubDriver::new();
        let conn = Connection::with_lookup(Arc::new(driver.clone()), |_key: &str| None);
        let r = Resolvers::new(Arc::new(conn)).unwrap();

        let err = r.execute_query("SELECT 1").await.unwrap_err();
        assert!(err.to_string().contains("Missing required Databricks environment variables"));
        assert_eq!(driver.clients_created(), 0);
    }
}
