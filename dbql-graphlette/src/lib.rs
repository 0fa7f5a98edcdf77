pub mod error_path;
pub mod resolvers;
pub mod router;
pub mod schema_builder;
pub mod templates;

pub use resolvers::Resolvers;
pub use router::GraphletteRouter;
pub use schema_builder::{build_schema, WAREHOUSE_SCHEMA};
