//! Error types for the ORM system
//!
//! Every fallible operation returns [`ModelResult`]. Hook aborts and failed
//! validation are not errors: `save`/`delete` report them as `Ok(false)`.

use thiserror::Error;

use crate::event_error::EventError;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// Storage unreachable or the connection was lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed SQL or a constraint violation reported by the backend
    #[error("Query error: {message} [SQL: {sql}]")]
    Query { sql: String, message: String },

    /// `find_or_fail` / `first_or_fail` / `refresh` found no row
    #[error("Record not found in table '{table}' for key {key}")]
    NotFound { table: String, key: String },

    /// A stored value could not be converted to its declared cast type
    #[error("Cannot cast column '{column}': {message}")]
    Cast { column: String, message: String },

    /// Programmer error: unguarded mass update, bad BETWEEN arity, etc.
    #[error("Invalid usage: {0}")]
    Usage(String),

    /// Primary key is missing on an operation that needs a persisted row
    #[error("Primary key is missing or invalid")]
    MissingPrimaryKey,

    /// Relationship loading failed
    #[error("Relationship error: {0}")]
    Relationship(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An observer failed
    #[error(transparent)]
    Event(#[from] EventError),
}

impl ModelError {
    pub fn query(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            sql: sql.into(),
            message: message.into(),
        }
    }

    pub fn not_found(table: impl Into<String>, key: impl ToString) -> Self {
        Self::NotFound {
            table: table.into(),
            key: key.to_string(),
        }
    }

    pub fn cast(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Cast {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// The SQL text attached to a query error, if any
    pub fn sql(&self) -> Option<&str> {
        match self {
            ModelError::Query { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}
