//! Result type aliases for Tabula.

use crate::{ConnectionError, DaoError};

/// A specialized `Result` type for DAO operations.
pub type DaoResult<T> = Result<T, DaoError>;

/// Result returned by a connection collaborator.
pub type ConnectionResult<T> = Result<T, ConnectionError>;
