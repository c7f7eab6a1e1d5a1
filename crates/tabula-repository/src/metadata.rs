//! Entity descriptors: the table/column mapping derived from an entity's
//! declared fields.

use crate::diagnostic::{MappingDiagnostic, MappingProblem};
use crate::entity::{Accessor, Cell, Entity, Field, TypeShape};
use chrono::DateTime;
use std::fmt;
use tabula_core::{DaoError, DaoResult, SqlValue};
use tracing::{trace, warn};

/// How a column's cells are coerced before reaching the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    String,
    Date,
    StringConstructible,
    IdentifiableEnum,
    Integer,
    Long,
    Boolean,
}

impl ColumnKind {
    /// Picks the column kind for a declared type.
    ///
    /// Capabilities are checked in a fixed order: string, date,
    /// string-constructible, identifiable enum, integer, long, boolean.
    /// Plain enums and anything else are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`MappingProblem::UnsupportedEnum`] or
    /// [`MappingProblem::UnsupportedType`] for unmappable types.
    pub const fn classify(shape: TypeShape) -> Result<Self, MappingProblem> {
        if shape.text {
            Ok(Self::String)
        } else if shape.date {
            Ok(Self::Date)
        } else if shape.from_string {
            Ok(Self::StringConstructible)
        } else if shape.identifiable_enum {
            Ok(Self::IdentifiableEnum)
        } else if shape.integer {
            Ok(Self::Integer)
        } else if shape.long {
            Ok(Self::Long)
        } else if shape.boolean {
            Ok(Self::Boolean)
        } else if shape.plain_enum {
            Err(MappingProblem::UnsupportedEnum)
        } else {
            Err(MappingProblem::UnsupportedType)
        }
    }

    /// Converts a raw row value into the cell this kind hands to fields.
    ///
    /// # Errors
    ///
    /// Returns the problem when the value cannot be read as this kind.
    pub fn coerce(self, value: &SqlValue) -> Result<Cell, MappingProblem> {
        match (self, value) {
            (_, SqlValue::Null) => Ok(Cell::Null),

            (Self::String, SqlValue::Text(s)) => Ok(Cell::Text(s.clone())),
            (Self::String, other) => Ok(Cell::Text(other.to_string())),

            (Self::Date, SqlValue::Int(secs)) => epoch_seconds(i64::from(*secs)),
            (Self::Date, SqlValue::Long(secs)) => epoch_seconds(*secs),
            (Self::Date, SqlValue::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| mismatch("date", value))
                .and_then(epoch_seconds),

            (Self::StringConstructible | Self::IdentifiableEnum, SqlValue::Text(s)) => {
                Ok(Cell::Text(s.clone()))
            }
            (Self::StringConstructible | Self::IdentifiableEnum, SqlValue::Int(_) | SqlValue::Long(_)) => {
                Ok(Cell::Text(value.to_string()))
            }

            (Self::Integer, SqlValue::Int(i)) => Ok(Cell::Int(*i)),
            (Self::Integer, SqlValue::Long(l)) => i32::try_from(*l)
                .map(Cell::Int)
                .map_err(|_| MappingProblem::OutOfRange {
                    expected: "integer",
                    value: *l,
                }),
            (Self::Integer, SqlValue::Bool(b)) => Ok(Cell::Int(i32::from(*b))),

            (Self::Long, SqlValue::Int(i)) => Ok(Cell::Long(i64::from(*i))),
            (Self::Long, SqlValue::Long(l)) => Ok(Cell::Long(*l)),
            (Self::Long, SqlValue::Bool(b)) => Ok(Cell::Long(i64::from(*b))),

            (Self::Boolean, SqlValue::Bool(b)) => Ok(Cell::Bool(*b)),
            (Self::Boolean, SqlValue::Int(i)) => Ok(Cell::Bool(*i != 0)),
            (Self::Boolean, SqlValue::Long(l)) => Ok(Cell::Bool(*l != 0)),

            (kind, other) => Err(mismatch(kind.expected(), other)),
        }
    }

    const fn expected(self) -> &'static str {
        match self {
            Self::String => "text",
            Self::Date => "date",
            Self::StringConstructible => "string-constructible",
            Self::IdentifiableEnum => "enum id",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Boolean => "boolean",
        }
    }
}

fn mismatch(expected: &'static str, found: &SqlValue) -> MappingProblem {
    MappingProblem::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

fn epoch_seconds(secs: i64) -> Result<Cell, MappingProblem> {
    DateTime::from_timestamp(secs, 0)
        .map(Cell::Date)
        .ok_or(MappingProblem::OutOfRange {
            expected: "date",
            value: secs,
        })
}

/// Why a declared field has no column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Transient,
    ManyToMany,
    Collection,
}

/// One mapped column.
pub struct Column<E> {
    name: String,
    field: &'static str,
    kind: ColumnKind,
    nullable: bool,
    is_id: bool,
    accessor: Accessor<E>,
}

impl<E> Column<E> {
    /// Column name in the table.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared field name.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        self.field
    }

    #[must_use]
    pub const fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Whether the field can hold NULL.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub const fn is_id(&self) -> bool {
        self.is_id
    }

    /// Value bound for this column when writing `entity`.
    pub fn read(&self, entity: &E) -> SqlValue {
        self.accessor.read(entity)
    }

    pub(crate) fn write(&self, entity: &mut E, value: &SqlValue) -> Result<(), MappingProblem> {
        let cell = self.kind.coerce(value)?;
        self.accessor.write(entity, self.kind, cell)
    }

    pub(crate) fn reset(&self, entity: &mut E) {
        self.accessor.reset(entity);
    }
}

impl<E> fmt::Debug for Column<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("kind", &self.kind)
            .field("nullable", &self.nullable)
            .field("is_id", &self.is_id)
            .finish_non_exhaustive()
    }
}

/// Cached mapping metadata for one entity type.
pub struct EntityDescriptor<E> {
    entity: &'static str,
    table_name: String,
    id_column: String,
    id_index: usize,
    columns: Vec<Column<E>>,
    select_fields: String,
    select_fields_with_table_prefix: String,
    insert_fields: String,
    update_set_clause: String,
    update_columns: Vec<String>,
    insert_placeholders: String,
    diagnostics: Vec<MappingDiagnostic>,
}

impl<E: Entity> EntityDescriptor<E> {
    /// Builds the descriptor for `E`.
    ///
    /// `table_override` replaces both the declared and the derived table
    /// name. Prefer [`crate::registry::resolve`], which caches the result.
    ///
    /// # Errors
    ///
    /// Fails with [`DaoError::Mapping`] unless exactly one identifier
    /// column results.
    pub fn build(table_override: Option<&str>) -> DaoResult<Self> {
        let entity = E::TYPE_NAME;
        let entity_snake = snake_case(entity);
        let table_name = table_override
            .or(E::TABLE_NAME)
            .map_or_else(|| entity_snake.clone(), str::to_string);

        let mut columns = Vec::new();
        let mut diagnostics = Vec::new();

        for field in E::fields() {
            if let Some(column) = Self::map_field(field, &entity_snake, &mut diagnostics) {
                columns.push(column);
            }
        }

        let mut ids = columns.iter().enumerate().filter(|(_, c)| c.is_id);
        let id_index = match (ids.next(), ids.next()) {
            (Some((index, _)), None) => index,
            (None, _) => {
                return Err(DaoError::mapping(format!(
                    "{entity} has no mappable identifier field named `id`"
                )))
            }
            (Some(_), Some(_)) => {
                return Err(DaoError::mapping(format!(
                    "{entity} maps more than one identifier column"
                )))
            }
        };
        let id_column = columns[id_index].name.clone();

        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let update_columns: Vec<String> = columns
            .iter()
            .filter(|c| !c.is_id)
            .map(|c| c.name.clone())
            .collect();

        let descriptor = Self {
            entity,
            select_fields: names.join(", "),
            select_fields_with_table_prefix: prefixed(&names, &table_name),
            insert_fields: names.join(","),
            update_set_clause: update_columns
                .iter()
                .map(|c| format!("{c}=?"))
                .collect::<Vec<_>>()
                .join(","),
            insert_placeholders: vec!["?"; names.len()].join(","),
            update_columns,
            table_name,
            id_column,
            id_index,
            columns,
            diagnostics,
        };

        trace!(
            entity,
            table = %descriptor.table_name,
            columns = descriptor.columns.len(),
            "Resolved entity descriptor"
        );

        Ok(descriptor)
    }

    fn map_field(
        field: Field<E>,
        entity_snake: &str,
        diagnostics: &mut Vec<MappingDiagnostic>,
    ) -> Option<Column<E>> {
        let entity = E::TYPE_NAME;
        let exclusion = field
            .exclusion
            .or(field.shape.collection.then_some(Exclusion::Collection));
        if let Some(exclusion) = exclusion {
            trace!(entity, field = field.name, ?exclusion, "Skipping excluded field");
            return None;
        }

        let kind = match ColumnKind::classify(field.shape) {
            Ok(kind) => kind,
            Err(problem) => {
                let diagnostic = MappingDiagnostic::new(entity, field.name, problem);
                warn!(%diagnostic, "Skipping unmappable field");
                diagnostics.push(diagnostic);
                return None;
            }
        };

        let accessor = field.accessor?;
        let is_id = field.name == "id";
        let name = match field.column {
            Some(column) => column.to_string(),
            None if is_id => format!("{entity_snake}_id"),
            None => column_name(field.name, kind),
        };

        Some(Column {
            name,
            field: field.name,
            kind,
            nullable: field.shape.nullable,
            is_id,
            accessor,
        })
    }
}

impl<E> EntityDescriptor<E> {
    /// Entity type name.
    #[must_use]
    pub const fn entity_name(&self) -> &'static str {
        self.entity
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[must_use]
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// The identifier column.
    #[must_use]
    pub fn id(&self) -> &Column<E> {
        &self.columns[self.id_index]
    }

    /// Mapped columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[Column<E>] {
        &self.columns
    }

    /// Finds a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column<E>> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// `a, b, c`
    #[must_use]
    pub fn select_fields(&self) -> &str {
        &self.select_fields
    }

    /// `table.a, table.b, table.c`
    #[must_use]
    pub fn select_fields_with_table_prefix(&self) -> &str {
        &self.select_fields_with_table_prefix
    }

    /// Select list qualified with an arbitrary prefix, such as a join alias.
    /// A blank prefix yields the plain list.
    #[must_use]
    pub fn select_fields_prefixed(&self, prefix: &str) -> String {
        if prefix.trim().is_empty() {
            return self.select_fields.clone();
        }
        let names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        prefixed(&names, prefix)
    }

    /// `a,b,c`
    #[must_use]
    pub fn insert_fields(&self) -> &str {
        &self.insert_fields
    }

    /// `?,?,?`
    #[must_use]
    pub fn insert_placeholders(&self) -> &str {
        &self.insert_placeholders
    }

    /// `b=?,c=?` over every non-identifier column.
    #[must_use]
    pub fn update_set_clause(&self) -> &str {
        &self.update_set_clause
    }

    /// Non-identifier columns, in the order of [`Self::update_set_clause`].
    #[must_use]
    pub fn update_columns(&self) -> &[String] {
        &self.update_columns
    }

    /// Fields skipped while resolving.
    #[must_use]
    pub fn diagnostics(&self) -> &[MappingDiagnostic] {
        &self.diagnostics
    }

    /// Values for every column, in insert order.
    pub fn insert_values(&self, entity: &E) -> Vec<SqlValue> {
        self.columns.iter().map(|c| c.read(entity)).collect()
    }

    /// Non-identifier values followed by the identifier.
    pub fn update_values(&self, entity: &E) -> Vec<SqlValue> {
        let mut values: Vec<SqlValue> = self
            .columns
            .iter()
            .filter(|c| !c.is_id)
            .map(|c| c.read(entity))
            .collect();
        values.push(self.id().read(entity));
        values
    }
}

impl<E> fmt::Debug for EntityDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("entity", &self.entity)
            .field("table_name", &self.table_name)
            .field("id_column", &self.id_column)
            .field("columns", &self.columns)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

fn prefixed(names: &[&str], prefix: &str) -> String {
    names
        .iter()
        .map(|name| format!("{prefix}.{name}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_name(field: &str, kind: ColumnKind) -> String {
    let name = snake_case(field);
    if kind == ColumnKind::Date {
        if let Some(stem) = name.strip_suffix("_date").filter(|s| !s.is_empty()) {
            return stem.to_string();
        }
    }
    name
}

/// Converts `CamelCase` or `camelCase` to `snake_case`. Runs of capitals
/// are kept together: `HTTPServer` becomes `http_server`.
pub(crate) fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
