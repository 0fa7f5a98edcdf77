use cucumber::{given, then, when};
use dbql_core::testing::full_env;
use std::sync::Arc;

use crate::world::CertWorld;

#[given("the warehouse environment is complete")]
async fn complete_env(world: &mut CertWorld) {
    let mut env = world.env.lock().unwrap();
    env.extend(full_env());
}

#[given(regex = r#"^the environment variable "([^"]+)" is unset$"#)]
async fn unset_var(world: &mut CertWorld, name: String) {
    world.env.lock().unwrap().remove(&name);
}

#[given(regex = r#"^the environment variable "([^"]+)" is "([^"]*)"$"#)]
async fn set_var(world: &mut CertWorld, name: String, value: String) {
    world.env.lock().unwrap().insert(name, value);
}

#[given(regex = r#"^the warehouse rejects sessions with "([^"]+)"$"#)]
async fn reject_sessions(world: &mut CertWorld, message: String) {
    world.driver().fail_sessions_with(message);
}

#[given("the warehouse accepts sessions again")]
async fn accept_sessions(world: &mut CertWorld) {
    world.driver().clear_failures();
}

#[when("I connect")]
async fn connect(world: &mut CertWorld) {
    world.clear_outcome();
    match world.connection().connect().await {
        Ok(session) => world.remember_session(session),
        Err(e) => world.record_error(&e),
    }
}

#[when("I close the connection")]
async fn close(world: &mut CertWorld) {
    world.connection().close().await.unwrap();
}

#[then("both connects return the same session")]
async fn same_session(world: &mut CertWorld) {
    let sessions = world.sessions();
    assert_eq!(sessions.len(), 2);
    assert!(Arc::ptr_eq(&sessions[0], &sessions[1]));
}

#[then("the two connects return different sessions")]
async fn different_sessions(world: &mut CertWorld) {
    let sessions = world.sessions();
    assert_eq!(sessions.len(), 2);
    assert!(!Arc::ptr_eq(&sessions[0], &sessions[1]));
}

#[then(regex = r"^(\d+) sessions? (?:was|were) opened$")]
async fn sessions_opened(world: &mut CertWorld, count: usize) {
    assert_eq!(world.driver().sessions_opened(), count);
}

#[then(regex = r"^(\d+) clients? (?:was|were) created$")]
async fn clients_created(world: &mut CertWorld, count: usize) {
    assert_eq!(world.driver().clients_created(), count);
}

#[then(regex = r"^(\d+) clients? (?:was|were) closed$")]
async fn clients_closed(world: &mut CertWorld, count: usize) {
    assert_eq!(world.driver().clients_closed(), count);
}

#[then("the connection is open")]
async fn is_open(world: &mut CertWorld) {
    assert!(world.connection().is_connected().await);
}

#[then("the connection is not open")]
async fn is_not_open(world: &mut CertWorld) {
    assert!(!world.connection().is_connected().await);
}

#[then("a configuration error is reported")]
async fn configuration_error(world: &mut CertWorld) {
    assert!(world.last_error.is_some(), "expected an error");
    assert!(world.last_error_is_configuration);
}

#[then(regex = r#"^the error mentions "([^"]+)"$"#)]
async fn error_mentions(world: &mut CertWorld, fragment: String) {
    let message = world.last_error.as_deref().unwrap_or_default();
    assert!(
        message.contains(&fragment),
        "expected {message:?} to contain {fragment:?}"
    );
}

#[then(regex = r#"^the error starts with "([^"]+)"$"#)]
async fn error_starts_with(world: &mut CertWorld, prefix: String) {
    let message = world.last_error.as_deref().unwrap_or_default();
    assert!(message.starts_with(&prefix), "{message:?}");
}

#[then("no error is reported")]
async fn no_error(world: &mut CertWorld) {
    assert_eq!(world.last_error, None);
}
