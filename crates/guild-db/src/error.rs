//! # Storage Errors
//!
//! Repositories return [`DbError`]. Two sources feed it:
//!
//! ```text
//!   sqlx::Error ──(constraint parsing)──┐
//!                                       ├──► DbError ──► ApiError (guild-commerce)
//!   CoreError (rule decided in a tx) ───┘
//! ```
//!
//! Constraint failures are recovered from SQLite's message text, which has
//! the shape `UNIQUE constraint failed: <table>.<column>`.

use guild_core::{CoreError, ValidationError};
use thiserror::Error;

const UNIQUE_PREFIX: &str = "UNIQUE constraint failed: ";
const FOREIGN_KEY_MARKER: &str = "FOREIGN KEY constraint failed";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// `field` is the `table.column` SQLite reported.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// The slug is held by some artifact, event or venue.
    #[error("QR slug '{0}' is already in use")]
    SlugTaken(String),

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A rule only decidable inside the write transaction: a full event,
    /// a ticket already used, an order settling into a terminal state.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// No connection freed up within the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `true` for a UNIQUE failure whose `table.column` mentions `column`.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        match self {
            DbError::UniqueViolation { field, .. } => field.contains(column),
            _ => false,
        }
    }

    /// Maps a SQLite constraint message onto a variant.
    fn from_sqlite_message(message: &str) -> Self {
        if let Some(field) = message.strip_prefix(UNIQUE_PREFIX) {
            // Composite keys arrive as "t.a, t.b"; keep them verbatim.
            return DbError::duplicate(field, "unknown");
        }
        if message.contains(FOREIGN_KEY_MARKER) {
            return DbError::ForeignKeyViolation {
                message: message.to_string(),
            };
        }
        DbError::QueryFailed(message.to_string())
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => DbError::from_sqlite_message(db_err.message()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}
