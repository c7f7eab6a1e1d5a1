//! Unified error types for the DAO layer.

use crate::SqlValue;
use std::fmt::Debug;
use thiserror::Error;

/// Error raised by a connection collaborator.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Failure reported by SQLx.
    #[cfg(feature = "sqlx")]
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    /// Failure reported by any other backend.
    #[error("{0}")]
    Backend(String),
}

impl ConnectionError {
    /// Creates a backend error from a message.
    #[must_use]
    pub fn backend<T: Into<String>>(message: T) -> Self {
        Self::Backend(message.into())
    }
}

/// Unified error type for every DAO operation.
#[derive(Error, Debug)]
pub enum DaoError {
    /// A required argument was missing or out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The connection collaborator failed while running a statement.
    #[error("Data access failure running `{sql}`: {source}")]
    DataAccess {
        sql: String,
        params: Vec<SqlValue>,
        #[source]
        source: ConnectionError,
    },

    /// An entity type could not be mapped at all.
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// The operation has no generic implementation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DaoError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::DataAccess { .. } => "DATA_ACCESS_FAILURE",
            Self::Mapping(_) => "MAPPING_ERROR",
            Self::Unsupported(_) => "UNSUPPORTED_OPERATION",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument<T: Into<String>>(message: T) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Wraps a collaborator failure together with the statement that caused it.
    #[must_use]
    pub fn data_access(sql: impl Into<String>, params: &[SqlValue], source: ConnectionError) -> Self {
        Self::DataAccess {
            sql: sql.into(),
            params: params.to_vec(),
            source,
        }
    }

    /// Creates a mapping error.
    #[must_use]
    pub fn mapping<T: Into<String>>(message: T) -> Self {
        Self::Mapping(message.into())
    }

    /// Creates an unsupported operation error.
    #[must_use]
    pub fn unsupported<T: Into<String>>(message: T) -> Self {
        Self::Unsupported(message.into())
    }

    /// Returns the SQL text attached to a data access failure.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::DataAccess { sql, .. } => Some(sql),
            _ => None,
        }
    }

    /// Checks if this error is retriable.
    ///
    /// Only collaborator failures qualify; argument and mapping problems
    /// fail the same way every time.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::DataAccess { .. })
    }
}
