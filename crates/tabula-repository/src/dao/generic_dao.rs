//! Generic DAO facade.

use crate::connection::{Connection, RawRow};
use crate::criteria::{Criteria, Limit, Where};
use crate::diagnostic::MappingDiagnostic;
use crate::entity::Entity;
use crate::materialize::{materialize, populate};
use crate::metadata::{Column, ColumnKind, EntityDescriptor};
use crate::registry;
use crate::sql::{self, Aggregate, Statement};
use crate::traits::EntityDao;
use async_trait::async_trait;
use chrono::Utc;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tabula_core::{require_param, require_text, DaoError, DaoResult, SqlValue};
use tracing::{debug, warn};

const SQL_TARGET: &str = "tabula::sql";

/// Row count used when a field listing asks for no particular page size.
const ALL_ROWS: u32 = i32::MAX.unsigned_abs();

/// Metadata-driven DAO for any [`Entity`].
///
/// The mapping is resolved on first use and shared process-wide. Every
/// operation runs within the caller's task.
pub struct GenericDao<E: Entity, C: Connection + ?Sized = dyn Connection> {
    connection: Arc<C>,
    descriptor: OnceLock<&'static EntityDescriptor<E>>,
}

impl<E: Entity, C: Connection + ?Sized> GenericDao<E, C> {
    /// Creates a DAO that runs its statements on `connection`.
    #[must_use]
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            connection,
            descriptor: OnceLock::new(),
        }
    }

    /// Returns the connection collaborator.
    #[must_use]
    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    /// Returns the cached descriptor of `E`.
    ///
    /// # Errors
    ///
    /// Returns [`DaoError::Mapping`] when `E` cannot be mapped.
    pub fn descriptor(&self) -> DaoResult<&'static EntityDescriptor<E>> {
        if let Some(descriptor) = self.descriptor.get() {
            return Ok(*descriptor);
        }
        let descriptor = registry::resolve::<E>()?;
        Ok(*self.descriptor.get_or_init(|| descriptor))
    }

    /// Current time as unix seconds, the way dates are stored.
    #[must_use]
    pub fn now() -> i64 {
        Utc::now().timestamp()
    }

    // ---------------------------------------------------------------------
    // Metadata accessors
    // ---------------------------------------------------------------------

    pub fn table_name(&self) -> DaoResult<&'static str> {
        Ok(self.descriptor()?.table_name())
    }

    pub fn columns(&self) -> DaoResult<&'static [Column<E>]> {
        Ok(self.descriptor()?.columns())
    }

    /// Select list, optionally qualified with `table_prefix`.
    pub fn select_fields(&self, table_prefix: Option<&str>) -> DaoResult<String> {
        let descriptor = self.descriptor()?;
        Ok(match table_prefix {
            Some(prefix) => descriptor.select_fields_prefixed(prefix),
            None => descriptor.select_fields().to_string(),
        })
    }

    /// Writes the mapped columns of `row` into an existing entity.
    pub fn auto_populate(&self, entity: &mut E, row: &RawRow) -> DaoResult<Vec<MappingDiagnostic>> {
        Ok(populate(self.descriptor()?, entity, row))
    }

    // ---------------------------------------------------------------------
    // Execution helpers
    // ---------------------------------------------------------------------

    async fn fetch(&self, statement: Statement) -> DaoResult<Vec<E>> {
        let descriptor = self.descriptor()?;
        debug!(target: SQL_TARGET, sql = %statement.sql, params = statement.params.len(), "query");
        let rows = self
            .connection
            .query(&statement.sql, &statement.params)
            .await
            .map_err(|e| DaoError::data_access(statement.sql, &statement.params, e))?;
        Ok(rows
            .iter()
            .map(|row| materialize(descriptor, row).into_entity())
            .collect())
    }

    async fn fetch_first(&self, statement: Statement) -> DaoResult<Option<E>> {
        let sql = statement.sql.clone();
        let entities = self.fetch(statement).await?;
        if entities.len() > 1 {
            warn!(
                target: SQL_TARGET,
                entity = E::TYPE_NAME,
                rows = entities.len(),
                %sql,
                "Expected at most one row, using the first"
            );
        }
        Ok(entities.into_iter().next())
    }

    async fn execute(&self, statement: Statement) -> DaoResult<u64> {
        debug!(target: SQL_TARGET, sql = %statement.sql, params = statement.params.len(), "execute");
        self.connection
            .execute(&statement.sql, &statement.params)
            .await
            .map_err(|e| DaoError::data_access(statement.sql, &statement.params, e))
    }

    async fn scalar_long(&self, statement: Statement) -> DaoResult<i64> {
        debug!(target: SQL_TARGET, sql = %statement.sql, params = statement.params.len(), "scalar");
        self.connection
            .query_scalar_long(&statement.sql, &statement.params)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| DaoError::data_access(statement.sql, &statement.params, e))
    }

    async fn scalar_int(&self, statement: Statement) -> DaoResult<i32> {
        debug!(target: SQL_TARGET, sql = %statement.sql, params = statement.params.len(), "scalar");
        self.connection
            .query_scalar_int(&statement.sql, &statement.params)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| DaoError::data_access(statement.sql, &statement.params, e))
    }

    /// Binds an identifier: numerically for integer id columns, as text
    /// otherwise.
    fn bind_id(descriptor: &EntityDescriptor<E>, id: &E::Id) -> SqlValue {
        let text = id.to_string();
        match descriptor.id().kind() {
            ColumnKind::Integer | ColumnKind::Long => text
                .parse::<i64>()
                .map_or(SqlValue::Text(text), SqlValue::Long),
            _ => SqlValue::Text(text),
        }
    }

    fn require_id(entity: &E) -> DaoResult<&E::Id> {
        require_param(entity.id(), "entity.id")
    }

    // ---------------------------------------------------------------------
    // Singular lookups
    // ---------------------------------------------------------------------

    /// Loads the entity with the given identifier.
    pub async fn load(&self, id: &E::Id) -> DaoResult<Option<E>> {
        let descriptor = self.descriptor()?;
        let statement = sql::select_by_id(descriptor, Self::bind_id(descriptor, id));
        self.fetch_first(statement).await
    }

    /// First entity matching `criteria`. The limit defaults to one row and
    /// may not ask for more.
    pub async fn find(&self, criteria: &Criteria) -> DaoResult<Option<E>> {
        let statement = sql::select_single(self.descriptor()?, criteria)?;
        self.fetch_first(statement).await
    }

    /// [`Self::find`] with a bare where clause and optional limit.
    pub async fn find_where(&self, where_clause: Where, limit: Option<Limit>) -> DaoResult<Option<E>> {
        let mut criteria = Criteria::from_where(where_clause);
        if let Some(limit) = limit {
            criteria = criteria.limit(limit);
        }
        self.find(&criteria).await
    }

    /// First entity matching raw condition text.
    pub async fn find_by_where(&self, where_text: &str) -> DaoResult<Option<E>> {
        let statement = sql::find_where_text(self.descriptor()?, where_text)?;
        self.fetch_first(statement).await
    }

    /// Entity whose `field` equals `value`. The value is always bound, even
    /// the text `"NULL"`.
    pub async fn find_by_field(&self, field: &str, value: impl Into<SqlValue>) -> DaoResult<Option<E>> {
        let statement = sql::select_by_field(self.descriptor()?, field, value.into())?;
        self.fetch_first(statement).await
    }

    /// Entity matching every `field = value` pair.
    pub async fn find_by_fields(&self, fields: &[&str], values: &[SqlValue]) -> DaoResult<Option<E>> {
        let statement = sql::select_by_fields(self.descriptor()?, fields, values)?;
        self.fetch_first(statement).await
    }

    // ---------------------------------------------------------------------
    // Lists
    // ---------------------------------------------------------------------

    /// Entities with any of the given identifiers.
    pub async fn find_by_ids(&self, ids: &[E::Id]) -> DaoResult<Vec<E>> {
        let descriptor = self.descriptor()?;
        let ids = ids.iter().map(|id| Self::bind_id(descriptor, id)).collect();
        let statement = sql::select_by_ids(descriptor, ids)?;
        self.fetch(statement).await
    }

    /// Every entity matching `criteria`.
    pub async fn list(&self, criteria: &Criteria) -> DaoResult<Vec<E>> {
        let statement = sql::select_criteria(self.descriptor()?, criteria);
        self.fetch(statement).await
    }

    /// Every entity matching raw condition text.
    pub async fn list_where(&self, where_text: &str) -> DaoResult<Vec<E>> {
        let statement = sql::select_where_text(self.descriptor()?, where_text)?;
        self.fetch(statement).await
    }

    /// Entities whose `field` equals `value`, ordered by identifier.
    ///
    /// `"NULL"` matches rows where the field is NULL.
    pub async fn list_by_field(&self, field: &str, value: impl Into<SqlValue>) -> DaoResult<Vec<E>> {
        let id_column = self.descriptor()?.id_column();
        self.list_by_field_paged(field, value, id_column, 0, ALL_ROWS)
            .await
    }

    /// [`Self::list_by_field`] with an explicit order column.
    pub async fn list_by_field_ordered(
        &self,
        field: &str,
        value: impl Into<SqlValue>,
        order_by: &str,
    ) -> DaoResult<Vec<E>> {
        self.list_by_field_paged(field, value, order_by, 0, ALL_ROWS)
            .await
    }

    /// One page of [`Self::list_by_field_ordered`]; pages start at 0.
    pub async fn list_by_field_paged(
        &self,
        field: &str,
        value: impl Into<SqlValue>,
        order_by: &str,
        page: u32,
        count: u32,
    ) -> DaoResult<Vec<E>> {
        let statement =
            sql::select_by_field_paged(self.descriptor()?, field, value.into(), order_by, page, count)?;
        self.fetch(statement).await
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Inserts the entity. Its identifier must be set.
    pub async fn insert(&self, entity: &E) -> DaoResult<u64> {
        self.insert_with(entity, false).await
    }

    /// Inserts with the `DELAYED` hint when the connection honors it; a
    /// plain insert otherwise.
    pub async fn insert_delayed(&self, entity: &E) -> DaoResult<u64> {
        let delayed = self.connection.supports_delayed_insert();
        self.insert_with(entity, delayed).await
    }

    async fn insert_with(&self, entity: &E, delayed: bool) -> DaoResult<u64> {
        Self::require_id(entity)?;
        let statement = sql::insert(self.descriptor()?, entity, delayed);
        self.execute(statement).await
    }

    /// Updates every non-identifier column. Returns 0 when no row has the
    /// entity's identifier.
    pub async fn update(&self, entity: &E) -> DaoResult<u64> {
        Self::require_id(entity)?;
        let statement = sql::update(self.descriptor()?, entity);
        self.execute(statement).await
    }

    /// Deletes the row with the given identifier.
    pub async fn delete_by_id(&self, id: &E::Id) -> DaoResult<u64> {
        let descriptor = self.descriptor()?;
        let statement = sql::delete_by_id(descriptor, Self::bind_id(descriptor, id));
        self.execute(statement).await
    }

    /// Not supported generically. Wrap the DAO and implement
    /// [`EntityDao::delete`] to delete entities.
    pub async fn delete(&self, _entity: &E) -> DaoResult<u64> {
        Err(DaoError::unsupported(format!(
            "delete is not implemented for {}; use delete_by_id",
            E::TYPE_NAME
        )))
    }

    /// Adds one to `field`.
    pub async fn increment(&self, entity: &E, field: &str) -> DaoResult<u64> {
        self.increment_by(entity, field, 1).await
    }

    /// Subtracts one from `field`.
    pub async fn decrement(&self, entity: &E, field: &str) -> DaoResult<u64> {
        self.increment_by(entity, field, -1).await
    }

    /// Adds `amount` to `field` in the database row.
    ///
    /// `field` is written into the statement as given. Pass only column
    /// names from calling code.
    pub async fn increment_by(&self, entity: &E, field: &str, amount: i32) -> DaoResult<u64> {
        Self::require_id(entity)?;
        let descriptor = self.descriptor()?;
        let statement = sql::increment(descriptor, field, amount, descriptor.id().read(entity))?;
        self.execute(statement).await
    }

    // ---------------------------------------------------------------------
    // Aggregates
    // ---------------------------------------------------------------------

    /// Number of rows matching `criteria`.
    pub async fn count(&self, criteria: &Criteria) -> DaoResult<i64> {
        let statement = sql::aggregate(self.descriptor()?, Aggregate::Count, None, criteria);
        self.scalar_long(statement).await
    }

    /// Runs a caller-written counting query. NULL reads as 0.
    pub async fn count_sql(&self, sql_text: &str) -> DaoResult<i64> {
        let sql_text = require_text(sql_text, "sql")?;
        self.scalar_long(Statement::text(sql_text)).await
    }

    fn aggregate_statement(&self, function: Aggregate, field: &str, criteria: &Criteria) -> DaoResult<Statement> {
        let field = require_text(field, "field")?;
        Ok(sql::aggregate(self.descriptor()?, function, Some(field), criteria))
    }

    pub async fn min_int(&self, field: &str, criteria: &Criteria) -> DaoResult<i32> {
        let statement = self.aggregate_statement(Aggregate::Min, field, criteria)?;
        self.scalar_int(statement).await
    }

    pub async fn min_long(&self, field: &str, criteria: &Criteria) -> DaoResult<i64> {
        let statement = self.aggregate_statement(Aggregate::Min, field, criteria)?;
        self.scalar_long(statement).await
    }

    pub async fn max_int(&self, field: &str, criteria: &Criteria) -> DaoResult<i32> {
        let statement = self.aggregate_statement(Aggregate::Max, field, criteria)?;
        self.scalar_int(statement).await
    }

    pub async fn max_long(&self, field: &str, criteria: &Criteria) -> DaoResult<i64> {
        let statement = self.aggregate_statement(Aggregate::Max, field, criteria)?;
        self.scalar_long(statement).await
    }
}

impl<E: Entity, C: Connection + ?Sized> Clone for GenericDao<E, C> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            descriptor: self.descriptor.clone(),
        }
    }
}

impl<E: Entity, C: Connection + ?Sized> fmt::Debug for GenericDao<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericDao")
            .field("entity", &E::TYPE_NAME)
            .field("resolved", &self.descriptor.get().is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<E: Entity, C: Connection + ?Sized> EntityDao<E> for GenericDao<E, C> {
    async fn load(&self, id: &E::Id) -> DaoResult<Option<E>> {
        Self::load(self, id).await
    }

    async fn insert(&self, entity: &E) -> DaoResult<u64> {
        Self::insert(self, entity).await
    }

    async fn update(&self, entity: &E) -> DaoResult<u64> {
        Self::update(self, entity).await
    }

    async fn delete_by_id(&self, id: &E::Id) -> DaoResult<u64> {
        Self::delete_by_id(self, id).await
    }

    async fn delete(&self, entity: &E) -> DaoResult<u64> {
        Self::delete(self, entity).await
    }
}
