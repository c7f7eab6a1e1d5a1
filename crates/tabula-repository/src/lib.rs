//! # Tabula Repository
//!
//! Metadata-driven data access. An entity declares its fields once and
//! [`GenericDao`] derives the table mapping, builds the SQL and maps rows
//! back, with no per-entity SQL or row-mapping code:
//!
//! ```text
//! Repository
//!   ↓  EntityDao<E>               (trait; wrap to customize)
//! GenericDao<E>
//!   ├─ registry::resolve::<E>()   → EntityDescriptor (cached per type)
//!   ├─ sql::*                     → Statement { sql, params }
//!   └─ materialize::*             → E + MappingDiagnostics
//!   ↓  Arc<dyn Connection>
//! SqlxConnection → SQLite
//! ```
//!
//! ## Structure
//!
//! ```text
//! src/
//!   entity.rs        ← Entity, Field, FieldType, TypeShape
//!   metadata.rs      ← EntityDescriptor, Column, ColumnKind
//!   registry.rs      ← process-wide descriptor cache, table overrides
//!   sql.rs           ← statement builders
//!   criteria.rs      ← Criteria, Where, Limit, OrderBy
//!   materialize.rs   ← row → entity
//!   connection.rs    ← Connection trait, RawRow
//!   traits.rs        ← EntityDao trait
//!   dao/
//!     generic_dao.rs ← GenericDao
//!   pool.rs          ← DatabasePool
//!   sqlite/
//!     connection.rs  ← SqlxConnection
//! ```

pub mod connection;
pub mod criteria;
pub mod dao;
pub mod diagnostic;
pub mod entity;
pub mod materialize;
pub mod metadata;
pub mod pool;
pub mod registry;
pub mod sql;
pub mod sqlite;
pub mod traits;

pub use connection::{Connection, RawRow};
pub use criteria::{Criteria, Limit, Order, OrderBy, Where};
pub use dao::GenericDao;
pub use diagnostic::{MappingDiagnostic, MappingProblem};
pub use entity::{Cell, Entity, Field, FieldType, IdentifiableEnum, TypeShape};
pub use materialize::{materialize, populate, read_nullable_int, read_nullable_long, Materialized};
pub use metadata::{Column, ColumnKind, EntityDescriptor, Exclusion};
pub use pool::*;
pub use registry::{resolve, set_table_name};
pub use sql::Statement;
pub use sqlite::SqlxConnection;
pub use traits::*;
