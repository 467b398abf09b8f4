//! Custom error types for the common library
//!
//! This module defines the database error type shared by every repository
//! in the timeclock services.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A stored value could not be mapped back into a domain type
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow {
        /// Table the row was read from.
        table: &'static str,
        /// What failed to decode.
        message: String,
    },
}

impl DatabaseError {
    /// True when the underlying query failed on a unique constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::Query(SqlxError::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<SqlxError> for DatabaseError {
    fn from(error: SqlxError) -> Self {
        DatabaseError::Query(error)
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_is_not_unique_violation() {
        let error = DatabaseError::from(SqlxError::RowNotFound);
        assert!(!error.is_unique_violation());
    }

    #[test]
    fn test_corrupt_row_displays_table() {
        let error = DatabaseError::CorruptRow {
            table: "punches",
            message: "unknown punch type 'LUNCH'".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Corrupt row in punches: unknown punch type 'LUNCH'"
        );
    }
}
