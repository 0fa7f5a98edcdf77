use cucumber::World as _;
#[allow(unused_imports)]
use dbql_cert::steps::{connection, resolver};
use dbql_cert::CertWorld;

#[tokio::main]
async fn main() {
    CertWorld::cucumber()
        .run_and_exit("tests/features/resolvers.feature")
        .await;
}
