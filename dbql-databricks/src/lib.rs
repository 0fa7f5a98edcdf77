pub mod api;
pub mod client;
pub mod converters;
pub mod driver;

pub use client::StatementClient;
pub use driver::DatabricksDriver;
