#[derive(thiserror::Error, Debug)]
pub enum DbqlError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Remote execution error: {0}")]
    RemoteExecution(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Template error: {0}")]
    Template(String),
    #[error("{context}: {source}")]
    Resolver {
        context: String,
        source: Box<DbqlError>,
    },
}

impl DbqlError {
    /// Wrap an error with the resolver's description of what it was doing.
    pub fn wrap(context: impl Into<String>, source: DbqlError) -> Self {
        DbqlError::Resolver {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbqlError>;
