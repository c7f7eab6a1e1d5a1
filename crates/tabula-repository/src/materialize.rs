//! Row materialization: raw rows into entity instances.

use crate::connection::RawRow;
use crate::diagnostic::{MappingDiagnostic, MappingProblem};
use crate::metadata::EntityDescriptor;
use tabula_core::SqlValue;
use tracing::warn;

static MISSING: SqlValue = SqlValue::Null;

/// An entity built from a row, with the problems met along the way.
#[derive(Debug)]
pub struct Materialized<E> {
    pub entity: E,
    pub diagnostics: Vec<MappingDiagnostic>,
}

impl<E> Materialized<E> {
    /// Discards the diagnostics.
    pub fn into_entity(self) -> E {
        self.entity
    }
}

/// Builds a fresh entity from `row`.
pub fn materialize<E: Default>(descriptor: &EntityDescriptor<E>, row: &RawRow) -> Materialized<E> {
    let mut entity = E::default();
    let diagnostics = populate(descriptor, &mut entity, row);
    Materialized { entity, diagnostics }
}

/// Writes every mapped column of `row` into `entity`.
///
/// Each field is handled on its own: a failure resets that field to its
/// zero value, is logged, and is returned as a diagnostic. Columns missing
/// from the row are treated as NULL.
pub fn populate<E>(descriptor: &EntityDescriptor<E>, entity: &mut E, row: &RawRow) -> Vec<MappingDiagnostic> {
    let mut diagnostics = Vec::new();
    for column in descriptor.columns() {
        let value = row.get(column.name()).unwrap_or(&MISSING);
        if let Err(problem) = column.write(entity, value) {
            column.reset(entity);
            let diagnostic = MappingDiagnostic::new(descriptor.entity_name(), column.name(), problem);
            warn!(%diagnostic, "Field left at its zero value");
            diagnostics.push(diagnostic);
        }
    }
    diagnostics
}

/// Reads a nullable 32-bit integer column.
///
/// # Errors
///
/// Fails when the value is not an integer or does not fit in 32 bits.
pub fn read_nullable_int(row: &RawRow, column: &str) -> Result<Option<i32>, MappingProblem> {
    match read_nullable_long(row, column)? {
        None => Ok(None),
        Some(value) => i32::try_from(value)
            .map(Some)
            .map_err(|_| MappingProblem::OutOfRange {
                expected: "integer",
                value,
            }),
    }
}

/// Reads a nullable 64-bit integer column. A missing column reads as NULL.
///
/// # Errors
///
/// Fails when the value is not an integer.
pub fn read_nullable_long(row: &RawRow, column: &str) -> Result<Option<i64>, MappingProblem> {
    match row.get(column) {
        None | Some(SqlValue::Null) => Ok(None),
        Some(SqlValue::Text(text)) => text.trim().parse::<i64>().map(Some).map_err(|_| {
            MappingProblem::TypeMismatch {
                expected: "long",
                found: "text",
            }
        }),
        Some(value) => value.as_long().map(Some).ok_or(MappingProblem::TypeMismatch {
            expected: "long",
            found: value.type_name(),
        }),
    }
}
