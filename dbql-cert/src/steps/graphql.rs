use cucumber::{then, when};
use serde_json::{json, Value};

use crate::world::CertWorld;

async fn graphql_query(client: &reqwest::Client, server_addr: &str, query: &str) -> Value {
    let url = format!("{server_addr}/graphql");
    client
        .post(&url)
        .json(&json!({ "query": query }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// Navigate a JSON value by dot-separated path; numeric segments index arrays.
fn json_at_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match segment.parse::<usize>() {
        Ok(index) => current.get(index),
        Err(_) => current.get(segment),
    })
}

#[when(regex = r"^I send the GraphQL query: (.+)$")]
async fn send_query(world: &mut CertWorld, query: String) {
    let server_addr = world.server_addr.clone().expect("server not started");
    let client = reqwest::Client::new();
    world.graphql_response = Some(graphql_query(&client, &server_addr, &query).await);
}

#[when("I post a body that is not JSON")]
async fn send_garbage(world: &mut CertWorld) {
    let server_addr = world.server_addr.clone().expect("server not started");
    let resp = reqwest::Client::new()
        .post(format!("{server_addr}/graphql"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    world.graphql_response = Some(resp.json().await.unwrap());
}

#[then(regex = r"^the response at '([^']+)' should equal '(.*)'$")]
async fn assert_path_equals(world: &mut CertWorld, path: String, expected: String) {
    let resp = world.graphql_response.as_ref().expect("no response");
    let expected: Value = serde_json::from_str(&expected).unwrap();
    let value = json_at_path(resp, &path)
        .unwrap_or_else(|| panic!("path '{path}' not found in response: {resp}"));
    assert_eq!(value, &expected, "mismatch at path '{path}'");
}

#[then(regex = r"^the response at '([^']+)' should have (\d+) items?$")]
async fn assert_path_array_count(world: &mut CertWorld, path: String, count: usize) {
    let resp = world.graphql_response.as_ref().expect("no response");
    let arr = json_at_path(resp, &path)
        .and_then(|v| v.as_array())
        .unwrap_or_else(|| panic!("no array at '{path}' in response: {resp}"));
    assert_eq!(arr.len(), count, "array count mismatch at path '{path}'");
}

#[then(regex = r"^the response data is null$")]
async fn assert_data_null(world: &mut CertWorld) {
    let resp = world.graphql_response.as_ref().expect("no response");
    assert_eq!(resp.get("data"), Some(&Value::Null), "{resp}");
}

#[then(regex = r"^the first error only has the keys '(.*)'$")]
async fn assert_error_keys(world: &mut CertWorld, keys: String) {
    let resp = world.graphql_response.as_ref().expect("no response");
    let error = resp["errors"][0].as_object().expect("no errors in response");
    let mut actual: Vec<&str> = error.keys().map(String::as_str).collect();
    actual.sort_unstable();
    let mut expected: Vec<&str> = keys.split(',').map(str::trim).collect();
    expected.sort_unstable();
    assert_eq!(actual, expected);
}

#[then(regex = r#"^the first error message starts with "([^"]+)"$"#)]
async fn assert_error_prefix(world: &mut CertWorld, prefix: String) {
    let resp = world.graphql_response.as_ref().expect("no response");
    let message = resp["errors"][0]["message"].as_str().unwrap_or_default();
    assert!(message.starts_with(&prefix), "{message:?}");
}

#[then("there should be no GraphQL errors")]
async fn assert_no_errors(world: &mut CertWorld) {
    let resp = world.graphql_response.as_ref().expect("no response");
    if let Some(errors) = resp.get("errors") {
        if !errors.is_null() {
            panic!("GraphQL errors: {errors}");
        }
    }
}
