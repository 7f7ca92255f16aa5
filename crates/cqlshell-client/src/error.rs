//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Creating a driver session failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The driver rejected or failed a statement.
    #[error("error executing cql cql={statement:?} err={message}")]
    Execution { statement: String, message: String },

    /// A keyspace or table is absent from the schema metadata.
    #[error("{0} not found")]
    NotFound(String),

    /// Tracing was switched to the state it is already in.
    #[error("{0}")]
    TracingState(String),

    /// The dedicated trace session could not be created.
    #[error("Cannot create trace session: {0}")]
    TraceUnavailable(String),
}

impl Error {
    /// Build an execution error for a statement.
    pub fn execution(statement: &str, message: impl ToString) -> Self {
        Error::Execution {
            statement: statement.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether a script run with fail-on-error should stop on this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Execution { .. })
    }
}
