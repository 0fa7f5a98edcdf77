pub mod connection;
pub mod graphql;
pub mod resolver;
