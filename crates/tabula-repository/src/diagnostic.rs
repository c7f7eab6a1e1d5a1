//! Per-field mapping diagnostics.
//!
//! A diagnostic never aborts an operation: the affected field is skipped
//! (while resolving) or reset to its zero value (while materializing).

use std::fmt;
use thiserror::Error;

/// What went wrong while mapping one field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingProblem {
    /// NULL arrived for a field that cannot represent absence.
    #[error("null value for non-nullable field, using zero value")]
    NullOnPrimitive,

    /// The cell could not be read as the column's kind.
    #[error("cannot read {found} value as {expected}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The number does not fit the field.
    #[error("value {value} is out of range for {expected}")]
    OutOfRange { expected: &'static str, value: i64 },

    /// A string-constructible type rejected the stored text.
    #[error("cannot construct value from {value:?}: {reason}")]
    Construct { value: String, reason: String },

    /// No identifiable enum constant carries the stored id.
    #[error("no constant with id {0:?}")]
    UnknownEnumId(String),

    /// Enums without a lookup-by-id cannot be mapped.
    #[error("enum type has no lookup by id and cannot be mapped")]
    UnsupportedEnum,

    /// The declared type matches no column kind.
    #[error("declared type cannot be mapped to a column")]
    UnsupportedType,
}

/// A mapping problem tied to the entity and column it occurred on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingDiagnostic {
    /// Entity type name.
    pub entity: &'static str,
    /// Column name, or the declared field name for skipped fields.
    pub column: String,
    /// The problem itself.
    pub problem: MappingProblem,
}

impl MappingDiagnostic {
    /// Creates a new diagnostic.
    #[must_use]
    pub fn new(entity: &'static str, column: impl Into<String>, problem: MappingProblem) -> Self {
        Self {
            entity,
            column: column.into(),
            problem,
        }
    }
}

impl fmt::Display for MappingDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.entity, self.column, self.problem)
    }
}
