//! Unified error type for the realstate persistence layer.
//!
//! Every failure a caller of the store can observe is one of these variants.
//! None of them are swallowed internally; the pool recovers locally only from
//! a failed liveness check and never surfaces that as an error.

use std::fmt;
use std::time::Duration;

/// Which integrity rule rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// A required column was null or missing.
    NotNull,
    /// A uniqueness constraint (e.g. `CodeInternal`) was violated.
    Unique,
    /// A reference points at a parent row that does not exist.
    ForeignKey,
    /// A value fell outside its declared bounds (length, precision).
    Check,
    /// A value had the wrong semantic type for its column.
    Type,
    /// The column is not part of the table definition.
    UnknownColumn,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotNull => "not null",
            Self::Unique => "unique",
            Self::ForeignKey => "foreign key",
            Self::Check => "check",
            Self::Type => "type",
            Self::UnknownColumn => "unknown column",
        };
        f.write_str(s)
    }
}

/// Error type covering every failure mode of the store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A write was rejected by an integrity rule. The session stays usable.
    #[error("Constraint violation ({kind}): {message}")]
    ConstraintViolation {
        /// The rule that rejected the write.
        kind: ConstraintKind,
        /// Human-readable description naming the table/column.
        message: String,
    },

    /// No pooled connection became available within the wait bound.
    #[error("Connection pool exhausted after {waited:?}: {message}")]
    PoolExhausted {
        /// How long the caller waited.
        waited: Duration,
        /// Detail reported by the pool.
        message: String,
    },

    /// The connection died while in use. The session is no longer usable.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The store stayed locked by another writer past the busy timeout.
    /// Nothing was written; the session stays usable and the caller may
    /// try again.
    #[error("Store busy: {0}")]
    Busy(String),

    /// Creating or dropping the schema failed partway.
    #[error("Schema {operation} failed on {table}: {message}")]
    SchemaLifecycle {
        /// `initialize` or `teardown`.
        operation: &'static str,
        /// Table being processed when the failure happened.
        table: String,
        /// Underlying error text.
        message: String,
    },

    /// The requested row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity name (e.g. "Property").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Caller-supplied arguments are invalid (filters, empty updates).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration or connection descriptor problem.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other database failure.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new ConstraintViolation error.
    pub fn constraint<S: Into<String>>(kind: ConstraintKind, msg: S) -> Self {
        Self::ConstraintViolation {
            kind,
            message: msg.into(),
        }
    }

    /// Create a new NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a new SchemaLifecycle error.
    pub fn schema(
        operation: &'static str,
        table: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::SchemaLifecycle {
            operation,
            table: table.into(),
            message: msg.into(),
        }
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// The constraint kind, if this is a constraint violation.
    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            Self::ConstraintViolation { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether another writer held the store for too long.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    /// Whether the connection that produced this error must be discarded.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
