//! Error types for pgmapper

use thiserror::Error;

/// Result type alias for pgmapper operations
pub type MapperResult<T> = Result<T, MapperError>;

/// Error types for entity building and CRUD operations
#[derive(Debug, Error)]
pub enum MapperError {
    /// Query execution error, passed through from the driver untouched
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A key in the caller's input matches no field of the entity
    #[error("Unknown field {0}")]
    UnknownField(String),

    /// `save`, `insert` or `update_many` called without input
    #[error("Input not provided.")]
    InputRequired,

    /// Negative offset passed to `find`
    #[error("Param offset={0} not allowed. It must be not negative value.")]
    InvalidOffset(i64),

    /// Negative limit passed to `find`
    #[error("Param limit={0} not allowed. It must be not negative value.")]
    InvalidLimit(i64),

    /// Where clause operator outside the supported set
    #[error("Unsupported where clause operator '{0}'")]
    UnsupportedOperator(String),

    /// Primary key type rejected by a dialect without typed primary keys
    #[error("Invalid Primary Key type. Expected \"integer\", found \"{0}\"")]
    InvalidPrimaryKeyType(String),

    /// The table defines no primary key
    #[error("Table {0} has no primary key")]
    MissingPrimaryKey(String),

    /// Two storage names (or tables) translate to the same external name
    #[error("Name collision: '{first}' and '{second}' both map to '{external}'")]
    NameCollision {
        external: String,
        first: String,
        second: String,
    },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation not provided by the dialect
    #[error("Unsupported by dialect: {0}")]
    Unsupported(&'static str),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl MapperError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the error was raised by the mapper before any statement ran.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownField(_)
                | Self::InputRequired
                | Self::InvalidOffset(_)
                | Self::InvalidLimit(_)
                | Self::UnsupportedOperator(_)
                | Self::InvalidPrimaryKeyType(_)
                | Self::MissingPrimaryKey(_)
                | Self::NameCollision { .. }
                | Self::Validation(_)
        )
    }

    /// SQLSTATE code of a database error, if this wraps one.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Query(err) => err.as_db_error().map(|db| db.code().code()),
            _ => None,
        }
    }

    /// Check if this is a unique violation raised by the database
    pub fn is_unique_violation(&self) -> bool {
        self.sql_state() == Some("23505")
    }

    /// Check if this is a foreign key violation raised by the database
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sql_state() == Some("23503")
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for MapperError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
