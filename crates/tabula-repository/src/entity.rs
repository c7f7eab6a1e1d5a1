//! Entity declarations.
//!
//! An entity type lists its fields once, in declaration order, through
//! [`Entity::fields`]. Each [`Field`] carries the [`TypeShape`] of its
//! declared Rust type plus a type-erased accessor pair; the metadata
//! resolver turns that list into an [`EntityDescriptor`].
//!
//! ```ignore
//! impl Entity for Widget {
//!     type Id = WidgetId;
//!     const TYPE_NAME: &'static str = "Widget";
//!
//!     fn fields() -> Vec<Field<Self>> {
//!         vec![
//!             Field::new("id", |w: &Widget| &w.id, |w: &mut Widget, v| w.id = v),
//!             Field::new("name", |w: &Widget| &w.name, |w: &mut Widget, v| w.name = v),
//!         ]
//!     }
//!
//!     fn id(&self) -> Option<&WidgetId> {
//!         self.id.as_ref()
//!     }
//! }
//! ```
//!
//! [`EntityDescriptor`]: crate::metadata::EntityDescriptor

use crate::diagnostic::MappingProblem;
use crate::metadata::{ColumnKind, Exclusion};
use chrono::{DateTime, Utc};
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;
use tabula_core::SqlValue;

/// A record type persisted as one table row.
pub trait Entity: Default + Send + Sync + 'static {
    /// Identifier type; bound as its `Display` text.
    type Id: Display + Send + Sync;

    /// Simple type name. The default table name and the identifier column
    /// name are derived from it.
    const TYPE_NAME: &'static str;

    /// Table name declared by the type itself, overriding the derived one.
    const TABLE_NAME: Option<&'static str> = None;

    /// Declared fields, in column order.
    fn fields() -> Vec<Field<Self>>;

    /// The identifier, if one has been assigned.
    fn id(&self) -> Option<&Self::Id>;
}

/// Enum types whose constants are stored by a stable string id.
pub trait IdentifiableEnum: Sized + 'static {
    /// The stored id of this constant.
    fn id(&self) -> &str;

    /// Every constant of the enum.
    fn values() -> &'static [Self];

    /// Finds the constant whose id equals `id`.
    fn find_by_id(id: &str) -> Option<&'static Self> {
        Self::values().iter().find(|value| value.id() == id)
    }
}

/// Capabilities of a declared field type.
///
/// A type may have several capabilities at once; the resolver picks the
/// column kind by a fixed priority (see [`ColumnKind::classify`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct TypeShape {
    pub text: bool,
    pub date: bool,
    pub from_string: bool,
    pub identifiable_enum: bool,
    pub integer: bool,
    pub long: bool,
    pub boolean: bool,
    pub plain_enum: bool,
    pub collection: bool,
    /// NULL can be represented (boxed rather than primitive storage).
    pub nullable: bool,
}

impl TypeShape {
    pub const UNKNOWN: Self = Self {
        text: false,
        date: false,
        from_string: false,
        identifiable_enum: false,
        integer: false,
        long: false,
        boolean: false,
        plain_enum: false,
        collection: false,
        nullable: false,
    };
    pub const STRING: Self = Self { text: true, ..Self::UNKNOWN };
    pub const DATE: Self = Self { date: true, ..Self::UNKNOWN };
    pub const STRING_CONSTRUCTIBLE: Self = Self { from_string: true, ..Self::UNKNOWN };
    pub const IDENTIFIABLE_ENUM: Self = Self { identifiable_enum: true, ..Self::UNKNOWN };
    pub const INTEGER: Self = Self { integer: true, ..Self::UNKNOWN };
    pub const LONG: Self = Self { long: true, ..Self::UNKNOWN };
    pub const BOOLEAN: Self = Self { boolean: true, ..Self::UNKNOWN };
    pub const PLAIN_ENUM: Self = Self { plain_enum: true, ..Self::UNKNOWN };
    pub const COLLECTION: Self = Self { collection: true, ..Self::UNKNOWN };

    /// The same shape, able to hold NULL.
    #[must_use]
    pub const fn nullable(self) -> Self {
        Self { nullable: true, ..self }
    }

    /// Adds the string-constructible capability.
    #[must_use]
    pub const fn with_from_string(self) -> Self {
        Self { from_string: true, ..self }
    }

    /// Adds the identifiable-enum capability.
    #[must_use]
    pub const fn with_identifiable_enum(self) -> Self {
        Self { identifiable_enum: true, ..self }
    }
}

/// A row value after column-kind coercion, ready for a [`FieldType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Null,
    Text(String),
    Date(DateTime<Utc>),
    Int(i32),
    Long(i64),
    Bool(bool),
}

impl Cell {
    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Date(_) => "date",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Bool(_) => "bool",
        }
    }

    fn mismatch<T>(self, expected: &'static str) -> Result<T, MappingProblem> {
        match self {
            Self::Null => Err(MappingProblem::NullOnPrimitive),
            other => Err(MappingProblem::TypeMismatch {
                expected,
                found: other.type_name(),
            }),
        }
    }

    /// Constructs a string-constructible value from a text cell.
    ///
    /// # Errors
    ///
    /// Fails when the cell is not text or `T::from_str` rejects it.
    pub fn parse<T>(self) -> Result<T, MappingProblem>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self {
            Self::Text(text) => text.parse::<T>().map_err(|e| MappingProblem::Construct {
                reason: e.to_string(),
                value: text,
            }),
            other => other.mismatch("text"),
        }
    }

    /// Looks up the identifiable enum constant named by a text cell.
    ///
    /// # Errors
    ///
    /// Fails when the cell is not text or no constant has that id.
    pub fn lookup<T: IdentifiableEnum + Clone>(self) -> Result<T, MappingProblem> {
        match self {
            Self::Text(id) => T::find_by_id(&id)
                .cloned()
                .ok_or(MappingProblem::UnknownEnumId(id)),
            other => other.mismatch("text"),
        }
    }
}

/// A Rust type that can back a mapped field.
///
/// Implemented here for `String`, `i32`, `i64`, `bool`, `DateTime<Utc>`,
/// `Option<T>` and `Vec<T>`; wrapper identifiers and identifiable enums
/// implement it themselves, usually via [`Cell::parse`] or
/// [`Cell::lookup`].
pub trait FieldType: Sized + Send + Sync + 'static {
    /// Capabilities of this type.
    const SHAPE: TypeShape;

    /// Value bound when this field is written.
    fn to_sql(&self) -> SqlValue;

    /// Builds a value from a coerced cell. `kind` is the column kind the
    /// resolver chose for the field.
    ///
    /// # Errors
    ///
    /// Returns the mapping problem that prevents construction.
    fn from_cell(kind: ColumnKind, cell: Cell) -> Result<Self, MappingProblem>;
}

impl FieldType for String {
    const SHAPE: TypeShape = TypeShape::STRING;

    fn to_sql(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }

    fn from_cell(_kind: ColumnKind, cell: Cell) -> Result<Self, MappingProblem> {
        match cell {
            Cell::Text(text) => Ok(text),
            other => other.mismatch("text"),
        }
    }
}

impl FieldType for i32 {
    const SHAPE: TypeShape = TypeShape::INTEGER;

    fn to_sql(&self) -> SqlValue {
        SqlValue::Int(*self)
    }

    fn from_cell(_kind: ColumnKind, cell: Cell) -> Result<Self, MappingProblem> {
        match cell {
            Cell::Int(value) => Ok(value),
            other => other.mismatch("integer"),
        }
    }
}

impl FieldType for i64 {
    const SHAPE: TypeShape = TypeShape::LONG;

    fn to_sql(&self) -> SqlValue {
        SqlValue::Long(*self)
    }

    fn from_cell(_kind: ColumnKind, cell: Cell) -> Result<Self, MappingProblem> {
        match cell {
            Cell::Long(value) => Ok(value),
            other => other.mismatch("long"),
        }
    }
}

impl FieldType for bool {
    const SHAPE: TypeShape = TypeShape::BOOLEAN;

    fn to_sql(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }

    /// NULL reads as `false`.
    fn from_cell(_kind: ColumnKind, cell: Cell) -> Result<Self, MappingProblem> {
        match cell {
            Cell::Null => Ok(false),
            Cell::Bool(value) => Ok(value),
            other => other.mismatch("boolean"),
        }
    }
}

impl FieldType for DateTime<Utc> {
    const SHAPE: TypeShape = TypeShape::DATE;

    fn to_sql(&self) -> SqlValue {
        SqlValue::from_timestamp(self)
    }

    fn from_cell(_kind: ColumnKind, cell: Cell) -> Result<Self, MappingProblem> {
        match cell {
            Cell::Date(at) => Ok(at),
            other => other.mismatch("date"),
        }
    }
}

impl<T: FieldType> FieldType for Option<T> {
    const SHAPE: TypeShape = T::SHAPE.nullable();

    fn to_sql(&self) -> SqlValue {
        self.as_ref().map_or(SqlValue::Null, FieldType::to_sql)
    }

    fn from_cell(kind: ColumnKind, cell: Cell) -> Result<Self, MappingProblem> {
        match cell {
            Cell::Null => Ok(None),
            other => T::from_cell(kind, other).map(Some),
        }
    }
}

impl<T: Send + Sync + 'static> FieldType for Vec<T> {
    const SHAPE: TypeShape = TypeShape::COLLECTION;

    fn to_sql(&self) -> SqlValue {
        SqlValue::Null
    }

    fn from_cell(_kind: ColumnKind, cell: Cell) -> Result<Self, MappingProblem> {
        cell.mismatch("collection")
    }
}

type ReadFn<E> = Box<dyn Fn(&E) -> SqlValue + Send + Sync>;
type WriteFn<E> = Box<dyn Fn(&mut E, ColumnKind, Cell) -> Result<(), MappingProblem> + Send + Sync>;
type ResetFn<E> = Box<dyn Fn(&mut E) + Send + Sync>;

/// Type-erased getter/setter pair for one field.
pub(crate) struct Accessor<E> {
    read: ReadFn<E>,
    write: WriteFn<E>,
    reset: ResetFn<E>,
}

impl<E> Accessor<E> {
    pub(crate) fn read(&self, entity: &E) -> SqlValue {
        (self.read)(entity)
    }

    pub(crate) fn write(&self, entity: &mut E, kind: ColumnKind, cell: Cell) -> Result<(), MappingProblem> {
        (self.write)(entity, kind, cell)
    }

    /// Puts the field back to its type's zero value.
    pub(crate) fn reset(&self, entity: &mut E) {
        (self.reset)(entity);
    }
}

/// One declared field of an entity.
pub struct Field<E> {
    pub(crate) name: &'static str,
    pub(crate) column: Option<&'static str>,
    pub(crate) shape: TypeShape,
    pub(crate) exclusion: Option<Exclusion>,
    pub(crate) accessor: Option<Accessor<E>>,
}

impl<E: 'static> Field<E> {
    /// Declares a mapped field backed by `T`.
    pub fn new<T, G, S>(name: &'static str, get: G, set: S) -> Self
    where
        T: FieldType + Default,
        G: Fn(&E) -> &T + Send + Sync + 'static,
        S: Fn(&mut E, T) + Send + Sync + 'static,
    {
        let set = Arc::new(set);
        let write_set = Arc::clone(&set);
        Self {
            name,
            column: None,
            shape: T::SHAPE,
            exclusion: None,
            accessor: Some(Accessor {
                read: Box::new(move |entity: &E| get(entity).to_sql()),
                write: Box::new(
                    move |entity: &mut E, kind: ColumnKind, cell: Cell| -> Result<(), MappingProblem> {
                        write_set(entity, T::from_cell(kind, cell)?);
                        Ok(())
                    },
                ),
                reset: Box::new(move |entity: &mut E| set(entity, T::default())),
            }),
        }
    }

    /// Declares a transient field: never read from or written to the table.
    #[must_use]
    pub fn transient(name: &'static str) -> Self {
        Self::excluded(name, Exclusion::Transient)
    }

    /// Declares a many-to-many relation, stored outside this table.
    #[must_use]
    pub fn many_to_many(name: &'static str) -> Self {
        Self::excluded(name, Exclusion::ManyToMany)
    }

    fn excluded(name: &'static str, exclusion: Exclusion) -> Self {
        Self {
            name,
            column: None,
            shape: TypeShape::UNKNOWN,
            exclusion: Some(exclusion),
            accessor: None,
        }
    }

    /// Overrides the derived column name.
    #[must_use]
    pub fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    /// Marks an otherwise mapped field as transient.
    #[must_use]
    pub fn mark_transient(mut self) -> Self {
        self.exclusion = Some(Exclusion::Transient);
        self
    }

    /// Declared field name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Shape of the declared type.
    #[must_use]
    pub fn shape(&self) -> TypeShape {
        self.shape
    }
}

impl<E> fmt::Debug for Field<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("shape", &self.shape)
            .field("exclusion", &self.exclusion)
            .finish_non_exhaustive()
    }
}
