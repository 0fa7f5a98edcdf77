use cucumber::{given, then, when};
use dbql_graphlette::Resolvers;
use serde_json::{json, Value};

use crate::world::CertWorld;

fn resolvers(world: &mut CertWorld) -> Resolvers {
    Resolvers::new(world.connection()).unwrap()
}

#[given(regex = r"^the warehouse returns rows '(.*)'$")]
async fn warehouse_rows(world: &mut CertWorld, rows: String) {
    let rows: Vec<Value> = serde_json::from_str(&rows).unwrap();
    world.driver().set_rows(rows);
}

#[given(regex = r#"^the warehouse fails statements with "([^"]+)"$"#)]
async fn warehouse_fails(world: &mut CertWorld, message: String) {
    world.driver().fail_statements_with(message);
}

#[when(regex = r#"^I execute the query "([^"]+)"$"#)]
async fn execute_query(world: &mut CertWorld, sql: String) {
    world.clear_outcome();
    match resolvers(world).execute_query(&sql).await {
        Ok(result) => world.query_result = Some(result),
        Err(e) => world.record_error(&e),
    }
}

#[when(regex = r#"^I list the tables of "([^"]+)"$"#)]
async fn get_tables(world: &mut CertWorld, database: String) {
    world.clear_outcome();
    match resolvers(world).get_tables(&database).await {
        Ok(tables) => world.tables = tables,
        Err(e) => world.record_error(&e),
    }
}

#[when(regex = r#"^I preview (\d+) rows of "([^".]+)\.([^"]+)"$"#)]
async fn get_table_data(world: &mut CertWorld, limit: i64, database: String, table: String) {
    world.clear_outcome();
    match resolvers(world).get_table_data(&database, &table, limit).await {
        Ok(rows) => world.rows = rows,
        Err(e) => world.record_error(&e),
    }
}

#[then(regex = r"^the query result is '(.*)'$")]
async fn query_result_is(world: &mut CertWorld, expected: String) {
    let expected: Value = serde_json::from_str(&expected).unwrap();
    let actual = serde_json::to_value(world.query_result.as_ref().unwrap()).unwrap();
    assert_eq!(actual, expected);
}

#[then(regex = r"^the tables are '(.*)'$")]
async fn tables_are(world: &mut CertWorld, expected: String) {
    let expected: Value = serde_json::from_str(&expected).unwrap();
    assert_eq!(serde_json::to_value(&world.tables).unwrap(), expected);
}

#[then(regex = r"^the preview rows are '(.*)'$")]
async fn rows_are(world: &mut CertWorld, expected: String) {
    let expected: Value = serde_json::from_str(&expected).unwrap();
    let actual = json!(world.rows);
    assert_eq!(actual, expected);
}

#[then(regex = r#"^the warehouse received "([^"]+)"$"#)]
async fn warehouse_received(world: &mut CertWorld, statement: String) {
    assert_eq!(world.driver().last_statement(), Some(statement));
}

#[then(regex = r"^(\d+) statements? (?:was|were) released$")]
async fn operations_closed(world: &mut CertWorld, count: usize) {
    assert_eq!(world.driver().operations_closed(), count);
}

#[then("the resolvers share one session")]
async fn one_session(world: &mut CertWorld) {
    assert_eq!(world.driver().sessions_opened(), 1);
    assert_eq!(world.driver().clients_created(), 1);
}
