//! Connection collaborator abstraction.

use async_trait::async_trait;
use tabula_core::{ConnectionError, ConnectionResult, SqlValue};

/// One result row: column names with their values, in select order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, SqlValue)>,
}

impl RawRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cell, builder style.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.cells.push((column.into(), value.into()));
    }

    /// Value of the named column. Names compare case-insensitively.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.cells
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    }

    /// Value of the first column.
    #[must_use]
    pub fn first(&self) -> Option<&SqlValue> {
        self.cells.first().map(|(_, value)| value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Executes SQL on behalf of the DAO.
///
/// Implementations own pooling, blocking I/O and timeouts. Parameters bind
/// positionally to `?` placeholders.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Runs a mutation and returns the number of affected rows.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> ConnectionResult<u64>;

    /// Runs a query and returns every row.
    async fn query(&self, sql: &str, params: &[SqlValue]) -> ConnectionResult<Vec<RawRow>>;

    /// First column of the first row as a 64-bit integer; `None` when there
    /// is no row or the value is NULL.
    async fn query_scalar_long(&self, sql: &str, params: &[SqlValue]) -> ConnectionResult<Option<i64>> {
        let rows = self.query(sql, params).await?;
        match rows.first().and_then(RawRow::first) {
            None | Some(SqlValue::Null) => Ok(None),
            Some(value) => value.as_long().map(Some).ok_or_else(|| {
                ConnectionError::backend(format!("expected an integer, got {}", value.type_name()))
            }),
        }
    }

    /// Like [`Connection::query_scalar_long`], narrowed to 32 bits.
    async fn query_scalar_int(&self, sql: &str, params: &[SqlValue]) -> ConnectionResult<Option<i32>> {
        match self.query_scalar_long(sql, params).await? {
            None => Ok(None),
            Some(value) => i32::try_from(value)
                .map(Some)
                .map_err(|_| ConnectionError::backend(format!("{value} does not fit in 32 bits"))),
        }
    }

    /// Whether `INSERT DELAYED` is honored by the backend.
    fn supports_delayed_insert(&self) -> bool {
        false
    }
}
